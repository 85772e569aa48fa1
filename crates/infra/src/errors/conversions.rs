//! Conversions from external infrastructure errors into domain errors.

use std::io::Error as IoError;

use lrsync_domain::{LrsError, RequestError};
use reqwest::Error as HttpError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub LrsError);

impl From<InfraError> for LrsError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<LrsError> for InfraError {
    fn from(value: LrsError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoLrsError {
    fn into_lrs(self) -> LrsError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → RequestError */
/* -------------------------------------------------------------------------- */

/// Classify a transport-level failure. Anything that kept a response from
/// arriving is transient; a request that could not be built is not.
pub fn request_error_from_http(err: &HttpError) -> RequestError {
    if err.is_timeout() {
        return RequestError::timed_out(format!("HTTP request timed out: {err}"));
    }

    #[cfg(not(target_arch = "wasm32"))]
    if err.is_connect() {
        return RequestError::transport(format!("HTTP connection failure: {err}"));
    }

    if err.is_builder() {
        return RequestError::invalid_argument(format!("HTTP request could not be built: {err}"));
    }

    RequestError::transport(err.to_string())
}

impl IntoLrsError for HttpError {
    fn into_lrs(self) -> LrsError {
        if self.is_builder() {
            return LrsError::Config(format!("HTTP client could not be built: {self}"));
        }
        LrsError::Request(request_error_from_http(&self))
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_lrs())
    }
}

/* -------------------------------------------------------------------------- */
/* std::io::Error → LrsError */
/* -------------------------------------------------------------------------- */

impl IntoLrsError for IoError {
    fn into_lrs(self) -> LrsError {
        use std::io::ErrorKind;

        match self.kind() {
            ErrorKind::NotFound => LrsError::Persistence(format!("queue file not found: {self}")),
            ErrorKind::PermissionDenied => {
                LrsError::Persistence(format!("permission denied on queue file: {self}"))
            }
            ErrorKind::InvalidData | ErrorKind::UnexpectedEof => {
                LrsError::Serialization(format!("queue file is corrupt: {self}"))
            }
            _ => LrsError::Persistence(self.to_string()),
        }
    }
}

impl From<IoError> for InfraError {
    fn from(value: IoError) -> Self {
        InfraError(value.into_lrs())
    }
}

/* -------------------------------------------------------------------------- */
/* toml / serde_json → LrsError */
/* -------------------------------------------------------------------------- */

impl From<toml::de::Error> for InfraError {
    fn from(value: toml::de::Error) -> Self {
        InfraError(LrsError::Config(format!("Invalid TOML format: {value}")))
    }
}

impl From<serde_json::Error> for InfraError {
    fn from(value: serde_json::Error) -> Self {
        InfraError(LrsError::Serialization(value.to_string()))
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use lrsync_domain::RequestErrorKind;
    use reqwest::Client;

    use super::*;

    #[test]
    fn missing_file_maps_to_persistence_error() {
        let err = IoError::new(std::io::ErrorKind::NotFound, "queue.json");
        let mapped: LrsError = InfraError::from(err).into();
        match mapped {
            LrsError::Persistence(msg) => assert!(msg.contains("not found")),
            other => panic!("expected persistence error, got {:?}", other),
        }
    }

    #[test]
    fn truncated_file_maps_to_serialization_error() {
        let err = IoError::new(std::io::ErrorKind::UnexpectedEof, "short read");
        let mapped: LrsError = InfraError::from(err).into();
        assert!(matches!(mapped, LrsError::Serialization(_)));
    }

    #[test]
    fn toml_errors_map_to_config_error() {
        let err = toml::from_str::<toml::Value>("endpoint = ").unwrap_err();
        let mapped: LrsError = InfraError::from(err).into();
        assert!(matches!(mapped, LrsError::Config(_)));
    }

    #[tokio::test]
    async fn refused_connection_is_transient() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener); // release the port so that requests fail with ECONNREFUSED

        let client = Client::builder().no_proxy().build().unwrap();
        let error = client.get(format!("http://{addr}")).send().await.unwrap_err();

        let mapped = request_error_from_http(&error);
        assert_eq!(mapped.kind, RequestErrorKind::TransportUnavailable);
        assert!(mapped.is_transient());
    }
}
