//! Request states, methods and headers

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::impl_wire_name_conversions;

/// Lifecycle state of one HTTP request.
///
/// ```text
/// Created --prepare--> Preparing --start--> Active --success--> Finished
///                                              \--failure/timeout--> Failed
/// Created/Preparing --cancel--> Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestState {
    Created,
    Preparing,
    Active,
    Finished,
    Failed,
    Cancelled,
}

impl_wire_name_conversions!(RequestState {
    Created => "created",
    Preparing => "preparing",
    Active => "active",
    Finished => "finished",
    Failed => "failed",
    Cancelled => "cancelled",
});

impl RequestState {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Failed | Self::Cancelled)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    ///
    /// Failing before activation is allowed so preparation errors can be
    /// reported through the same channel as transport errors.
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Created, Self::Preparing)
                | (Self::Preparing, Self::Active)
                | (Self::Active, Self::Finished)
                | (Self::Active, Self::Failed)
                | (Self::Created, Self::Failed)
                | (Self::Preparing, Self::Failed)
                | (Self::Created, Self::Cancelled)
                | (Self::Preparing, Self::Cancelled)
        )
    }
}

/// HTTP methods used against the record store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outgoing header map with case-insensitive names.
///
/// Setting a header replaces any previous value, so decorating a request
/// twice never duplicates headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestHeaders {
    entries: BTreeMap<String, (String, String)>,
}

impl RequestHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name` to `value`. Values containing a line break are ignored
    /// and `false` is returned.
    pub fn set(&mut self, name: &str, value: impl Into<String>) -> bool {
        let value = value.into();
        if value.contains(['\r', '\n']) || name.contains(['\r', '\n']) {
            return false;
        }
        self.entries.insert(name.to_ascii_lowercase(), (name.to_string(), value));
        true
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(&name.to_ascii_lowercase()).map(|(_, value)| value.as_str())
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.entries.remove(&name.to_ascii_lowercase()).map(|(_, value)| value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Headers with their original casing.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.values().map(|(name, value)| (name.as_str(), value.as_str()))
    }
}
