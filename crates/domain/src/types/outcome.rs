//! Batch outcomes, observer events and retry decisions

use serde::{Deserialize, Serialize};

use super::statement::Statement;
use crate::errors::RequestError;
use crate::impl_wire_name_conversions;

/// Whether a failure is retried silently or surfaced to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureClass {
    Transient,
    Permanent,
}

impl_wire_name_conversions!(FailureClass {
    Transient => "transient",
    Permanent => "permanent",
});

impl FailureClass {
    pub const fn of(error: &RequestError) -> Self {
        if error.is_transient() {
            Self::Transient
        } else {
            Self::Permanent
        }
    }
}

/// Result of one batch dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    /// The store accepted every statement. `assigned_ids` holds the ids
    /// from the response body, in batch order; it may be shorter than the
    /// batch or empty when the store returns no body.
    PersistedAll { assigned_ids: Vec<String> },
    /// The store accepted nothing.
    PersistedNone { class: FailureClass, error: RequestError },
}

impl BatchOutcome {
    pub fn from_result(result: std::result::Result<Vec<String>, RequestError>) -> Self {
        match result {
            Ok(assigned_ids) => Self::PersistedAll { assigned_ids },
            Err(error) => Self::PersistedNone { class: FailureClass::of(&error), error },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::PersistedAll { .. })
    }
}

/// Event delivered to queue observers once per resolved batch.
///
/// Transient failures never produce an event.
#[derive(Debug, Clone, PartialEq)]
pub enum QueueEvent {
    /// Statements confirmed by the store, carrying any assigned ids.
    Persisted { statements: Vec<Statement> },
    /// Statements of a batch that failed permanently.
    FailedToPersist { statements: Vec<Statement>, error: RequestError },
}

impl QueueEvent {
    pub fn statements(&self) -> &[Statement] {
        match self {
            Self::Persisted { statements } | Self::FailedToPersist { statements, .. } => statements,
        }
    }
}

/// An observer's verdict on a permanently failed batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Decision {
    /// Clear the in-flight flags and retry on the next flush.
    #[default]
    KeepRetrying,
    /// Remove every statement currently queued.
    DiscardAll,
}

impl_wire_name_conversions!(Decision {
    KeepRetrying => "keep_retrying",
    DiscardAll => "discard_all",
});
