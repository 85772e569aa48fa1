//! Protocol and configuration constants

// Queue and scheduling defaults
pub const DEFAULT_BATCH_SIZE: usize = 50;
pub const DEFAULT_FLUSH_INTERVAL_SECS: u64 = 120;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const PERSISTED_ID_MEMORY: usize = 10_000;

// Headers
pub const HEADER_AUTHORIZATION: &str = "Authorization";
pub const HEADER_CONTENT_TYPE: &str = "Content-Type";
pub const HEADER_VERSION: &str = "X-Experience-API-Version";
pub const HEADER_IF_MATCH: &str = "If-Match";
pub const HEADER_IF_NONE_MATCH: &str = "If-None-Match";
pub const DEFAULT_API_VERSION: &str = "1.0.0";
pub const CONTENT_TYPE_JSON: &str = "application/json";

// Endpoints, relative to the LRS base URL
pub const STATEMENTS_PATH: &str = "statements";
pub const ACTIVITY_STATE_PATH: &str = "activities/state";
pub const ACTIVITY_PROFILE_PATH: &str = "activities/profile";
pub const ACTIVITIES_PATH: &str = "activities";
pub const ACTOR_PROFILE_PATH: &str = "agents/profile";
pub const ACTORS_PATH: &str = "agents";

// Verbs
pub const VERB_VOIDED: &str = "http://adlnet.gov/expapi/verbs/voided";
