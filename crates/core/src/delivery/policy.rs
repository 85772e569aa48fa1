//! Failure classification and retry policy

use lrsync_domain::{BatchOutcome, Decision, FailureClass, RequestError, RequestErrorKind};

/// What happens to a resolved batch's statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The store confirmed the batch; drop its entries for good.
    Remove,
    /// Clear the in-flight flags; the next flush retries.
    Requeue,
    /// Drop every queued statement.
    DiscardAll,
}

/// Decides the fate of failed batches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Permanent failures an entry may be kept through. `None` is unbounded.
    pub max_permanent_retries: Option<u32>,
}

impl RetryPolicy {
    pub const fn unbounded() -> Self {
        Self { max_permanent_retries: None }
    }

    pub const fn bounded(max: u32) -> Self {
        Self { max_permanent_retries: Some(max) }
    }

    /// Disposition for a batch given the observers' decisions.
    ///
    /// Decisions are only consulted for permanent failures.
    pub fn disposition(&self, outcome: &BatchOutcome, decisions: &[Decision]) -> Disposition {
        match outcome {
            BatchOutcome::PersistedAll { .. } => Disposition::Remove,
            BatchOutcome::PersistedNone { class: FailureClass::Transient, .. } => Disposition::Requeue,
            BatchOutcome::PersistedNone { class: FailureClass::Permanent, .. } => {
                match aggregate(decisions) {
                    Decision::DiscardAll => Disposition::DiscardAll,
                    Decision::KeepRetrying => Disposition::Requeue,
                }
            }
        }
    }

    /// True once an entry kept through `permanent_failures` permanent
    /// failures must be dropped instead of retried again.
    pub fn exhausted(&self, permanent_failures: u32) -> bool {
        self.max_permanent_retries.is_some_and(|max| permanent_failures > max)
    }
}

/// Combine observer decisions: any `DiscardAll` wins, and no observers
/// means keep.
pub fn aggregate(decisions: &[Decision]) -> Decision {
    if decisions.contains(&Decision::DiscardAll) {
        Decision::DiscardAll
    } else {
        Decision::KeepRetrying
    }
}

/// Error for a response status, or `None` when the status counts as
/// success.
///
/// With `server_errors_are_failures` off, every status that arrived is a
/// success.
pub fn classify_status(
    status: u16,
    body: &str,
    server_errors_are_failures: bool,
    friendly_messages: bool,
) -> Option<RequestError> {
    if status < 400 || !server_errors_are_failures {
        return None;
    }
    Some(RequestError::from_response(status, &server_message(body), friendly_messages))
}

/// Pull a readable message out of an error body. Stores commonly answer
/// with `{"message": "..."}`; anything else is used as text.
fn server_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| value.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

/// Kind used when the request never got a response.
pub const fn transport_kind(timed_out: bool) -> RequestErrorKind {
    if timed_out {
        RequestErrorKind::TimedOut
    } else {
        RequestErrorKind::TransportUnavailable
    }
}
