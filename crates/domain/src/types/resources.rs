//! Document resources and the one-shot requests that read and write them
//!
//! Each operation is described by an explicit [`ResourceRequest`] value;
//! the infra crate only executes it.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::request::{HttpMethod, RequestHeaders};
use crate::constants::{
    ACTIVITIES_PATH, ACTIVITY_PROFILE_PATH, ACTIVITY_STATE_PATH, ACTORS_PATH, ACTOR_PROFILE_PATH,
    CONTENT_TYPE_JSON, HEADER_CONTENT_TYPE, HEADER_IF_MATCH, HEADER_IF_NONE_MATCH,
};
use crate::errors::RequestError;
use crate::impl_wire_name_conversions;

/// Per-actor, per-activity document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityState {
    pub state_id: String,
    pub activity_id: String,
    pub actor: Value,
    pub registration: Option<String>,
    pub contents: Value,
    /// ETag reported by the store when the document was read.
    pub etag: Option<String>,
}

impl ActivityState {
    pub fn new(
        state_id: impl Into<String>,
        activity_id: impl Into<String>,
        actor: Value,
        contents: Value,
    ) -> Self {
        Self {
            state_id: state_id.into(),
            activity_id: activity_id.into(),
            actor,
            registration: None,
            contents,
            etag: None,
        }
    }

    pub fn with_registration(mut self, registration: impl Into<String>) -> Self {
        self.registration = Some(registration.into());
        self
    }
}

/// Per-activity document shared by all actors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityProfile {
    pub profile_id: String,
    pub activity_id: String,
    pub contents: Value,
    pub etag: Option<String>,
}

impl ActivityProfile {
    pub fn new(profile_id: impl Into<String>, activity_id: impl Into<String>, contents: Value) -> Self {
        Self { profile_id: profile_id.into(), activity_id: activity_id.into(), contents, etag: None }
    }
}

/// Per-actor document independent of any activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorProfile {
    pub profile_id: String,
    pub actor: Value,
    pub contents: Value,
    pub etag: Option<String>,
}

impl ActorProfile {
    pub fn new(profile_id: impl Into<String>, actor: Value, contents: Value) -> Self {
        Self { profile_id: profile_id.into(), actor, contents, etag: None }
    }
}

/// Which resource family a request addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    ActivityState,
    ActivityProfile,
    ActorProfile,
    Activity,
    Actor,
}

impl_wire_name_conversions!(ResourceKind {
    ActivityState => "activity_state",
    ActivityProfile => "activity_profile",
    ActorProfile => "actor_profile",
    Activity => "activity",
    Actor => "actor",
});

/// A fully described one-shot request against a document resource.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRequest {
    pub kind: ResourceKind,
    pub method: HttpMethod,
    /// Path relative to the store's base URL.
    pub path: &'static str,
    pub query: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub headers: RequestHeaders,
}

impl ResourceRequest {
    fn new(kind: ResourceKind, method: HttpMethod, path: &'static str) -> Self {
        Self { kind, method, path, query: Vec::new(), body: None, headers: RequestHeaders::new() }
    }

    fn param(mut self, name: &str, value: impl Into<String>) -> Self {
        self.query.push((name.to_string(), value.into()));
        self
    }

    fn optional(self, name: &str, value: Option<&str>) -> Self {
        match value {
            Some(value) if !value.is_empty() => self.param(name, value),
            _ => self,
        }
    }

    fn since(self, since: Option<DateTime<Utc>>) -> Self {
        match since {
            Some(since) => self.param("since", since.to_rfc3339_opts(SecondsFormat::Millis, true)),
            None => self,
        }
    }

    fn document(
        mut self,
        contents: &Value,
        overwrite: bool,
        etag: Option<&str>,
    ) -> Result<Self, RequestError> {
        let body = serde_json::to_vec(contents)
            .map_err(|e| RequestError::invalid_argument(format!("unserializable contents: {e}")))?;
        self.headers.set(HEADER_CONTENT_TYPE, CONTENT_TYPE_JSON);
        match (overwrite, etag) {
            (false, _) => {
                self.headers.set(HEADER_IF_NONE_MATCH, "*");
            }
            (true, Some(etag)) => {
                self.headers.set(HEADER_IF_MATCH, etag);
            }
            (true, None) => {}
        }
        self.body = Some(body);
        Ok(self)
    }

    // Activity state

    /// PUT a state document. Without `overwrite` the write only succeeds
    /// when no document exists yet; with it, a known ETag makes the write
    /// conditional on the document being unchanged.
    pub fn save_activity_state(state: &ActivityState, overwrite: bool) -> Result<Self, RequestError> {
        required("stateId", &state.state_id)?;
        required("activityId", &state.activity_id)?;
        let agent = actor_param(&state.actor)?;
        Self::new(ResourceKind::ActivityState, HttpMethod::Put, ACTIVITY_STATE_PATH)
            .param("activityId", state.activity_id.as_str())
            .param("agent", agent)
            .param("stateId", state.state_id.as_str())
            .optional("registration", state.registration.as_deref())
            .document(&state.contents, overwrite, state.etag.as_deref())
    }

    pub fn get_activity_state(
        activity_id: &str,
        actor: &Value,
        state_id: &str,
        registration: Option<&str>,
    ) -> Result<Self, RequestError> {
        required("activityId", activity_id)?;
        required("stateId", state_id)?;
        Ok(Self::new(ResourceKind::ActivityState, HttpMethod::Get, ACTIVITY_STATE_PATH)
            .param("activityId", activity_id)
            .param("agent", actor_param(actor)?)
            .param("stateId", state_id)
            .optional("registration", registration))
    }

    /// GET the ids of every state document, optionally only those
    /// changed after `since`.
    pub fn get_activity_state_ids(
        activity_id: &str,
        actor: &Value,
        registration: Option<&str>,
        since: Option<DateTime<Utc>>,
    ) -> Result<Self, RequestError> {
        required("activityId", activity_id)?;
        Ok(Self::new(ResourceKind::ActivityState, HttpMethod::Get, ACTIVITY_STATE_PATH)
            .param("activityId", activity_id)
            .param("agent", actor_param(actor)?)
            .optional("registration", registration)
            .since(since))
    }

    pub fn delete_activity_state(
        activity_id: &str,
        actor: &Value,
        state_id: &str,
        registration: Option<&str>,
    ) -> Result<Self, RequestError> {
        required("activityId", activity_id)?;
        required("stateId", state_id)?;
        Ok(Self::new(ResourceKind::ActivityState, HttpMethod::Delete, ACTIVITY_STATE_PATH)
            .param("activityId", activity_id)
            .param("agent", actor_param(actor)?)
            .param("stateId", state_id)
            .optional("registration", registration))
    }

    pub fn delete_all_activity_states(
        activity_id: &str,
        actor: &Value,
        registration: Option<&str>,
    ) -> Result<Self, RequestError> {
        required("activityId", activity_id)?;
        Ok(Self::new(ResourceKind::ActivityState, HttpMethod::Delete, ACTIVITY_STATE_PATH)
            .param("activityId", activity_id)
            .param("agent", actor_param(actor)?)
            .optional("registration", registration))
    }

    // Activity profile

    pub fn save_activity_profile(
        profile: &ActivityProfile,
        overwrite: bool,
    ) -> Result<Self, RequestError> {
        required("profileId", &profile.profile_id)?;
        required("activityId", &profile.activity_id)?;
        Self::new(ResourceKind::ActivityProfile, HttpMethod::Put, ACTIVITY_PROFILE_PATH)
            .param("activityId", profile.activity_id.as_str())
            .param("profileId", profile.profile_id.as_str())
            .document(&profile.contents, overwrite, profile.etag.as_deref())
    }

    pub fn get_activity_profile(activity_id: &str, profile_id: &str) -> Result<Self, RequestError> {
        required("activityId", activity_id)?;
        required("profileId", profile_id)?;
        Ok(Self::new(ResourceKind::ActivityProfile, HttpMethod::Get, ACTIVITY_PROFILE_PATH)
            .param("activityId", activity_id)
            .param("profileId", profile_id))
    }

    pub fn get_activity_profile_ids(
        activity_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Self, RequestError> {
        required("activityId", activity_id)?;
        Ok(Self::new(ResourceKind::ActivityProfile, HttpMethod::Get, ACTIVITY_PROFILE_PATH)
            .param("activityId", activity_id)
            .since(since))
    }

    pub fn delete_activity_profile(activity_id: &str, profile_id: &str) -> Result<Self, RequestError> {
        required("activityId", activity_id)?;
        required("profileId", profile_id)?;
        Ok(Self::new(ResourceKind::ActivityProfile, HttpMethod::Delete, ACTIVITY_PROFILE_PATH)
            .param("activityId", activity_id)
            .param("profileId", profile_id))
    }

    // Actor profile

    pub fn save_actor_profile(profile: &ActorProfile, overwrite: bool) -> Result<Self, RequestError> {
        required("profileId", &profile.profile_id)?;
        let agent = actor_param(&profile.actor)?;
        Self::new(ResourceKind::ActorProfile, HttpMethod::Put, ACTOR_PROFILE_PATH)
            .param("agent", agent)
            .param("profileId", profile.profile_id.as_str())
            .document(&profile.contents, overwrite, profile.etag.as_deref())
    }

    pub fn get_actor_profile(actor: &Value, profile_id: &str) -> Result<Self, RequestError> {
        required("profileId", profile_id)?;
        Ok(Self::new(ResourceKind::ActorProfile, HttpMethod::Get, ACTOR_PROFILE_PATH)
            .param("agent", actor_param(actor)?)
            .param("profileId", profile_id))
    }

    pub fn get_actor_profile_ids(
        actor: &Value,
        since: Option<DateTime<Utc>>,
    ) -> Result<Self, RequestError> {
        Ok(Self::new(ResourceKind::ActorProfile, HttpMethod::Get, ACTOR_PROFILE_PATH)
            .param("agent", actor_param(actor)?)
            .since(since))
    }

    pub fn delete_actor_profile(actor: &Value, profile_id: &str) -> Result<Self, RequestError> {
        required("profileId", profile_id)?;
        Ok(Self::new(ResourceKind::ActorProfile, HttpMethod::Delete, ACTOR_PROFILE_PATH)
            .param("agent", actor_param(actor)?)
            .param("profileId", profile_id))
    }

    // Lookups

    pub fn get_activity(activity_id: &str) -> Result<Self, RequestError> {
        required("activityId", activity_id)?;
        Ok(Self::new(ResourceKind::Activity, HttpMethod::Get, ACTIVITIES_PATH)
            .param("activityId", activity_id))
    }

    pub fn get_actor(actor: &Value) -> Result<Self, RequestError> {
        Ok(Self::new(ResourceKind::Actor, HttpMethod::Get, ACTORS_PATH).param("agent", actor_param(actor)?))
    }
}

fn required(name: &str, value: &str) -> Result<(), RequestError> {
    if value.trim().is_empty() {
        Err(RequestError::invalid_argument(format!("{name} must not be empty")))
    } else {
        Ok(())
    }
}

fn actor_param(actor: &Value) -> Result<String, RequestError> {
    match actor {
        Value::Object(map) if !map.is_empty() => Ok(actor.to_string()),
        _ => Err(RequestError::invalid_argument("actor must be a non-empty JSON object")),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::errors::RequestErrorKind;

    fn actor() -> Value {
        json!({ "mbox": "mailto:learner@example.com" })
    }

    fn query_value<'a>(request: &'a ResourceRequest, name: &str) -> Option<&'a str> {
        request.query.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    #[test]
    fn new_state_is_create_only() {
        let state = ActivityState::new("bookmark", "http://example.com/a", actor(), json!({"page": 3}));
        let request = ResourceRequest::save_activity_state(&state, false).unwrap();

        assert_eq!(request.method, HttpMethod::Put);
        assert_eq!(request.path, ACTIVITY_STATE_PATH);
        assert_eq!(request.headers.get(HEADER_IF_NONE_MATCH), Some("*"));
        assert!(!request.headers.contains(HEADER_IF_MATCH));
        assert_eq!(query_value(&request, "stateId"), Some("bookmark"));
        assert_eq!(query_value(&request, "agent"), Some(r#"{"mbox":"mailto:learner@example.com"}"#));
    }

    #[test]
    fn overwrite_with_etag_is_conditional() {
        let mut profile = ActorProfile::new("prefs", actor(), json!({"theme": "dark"}));
        profile.etag = Some("\"abc\"".to_string());
        let request = ResourceRequest::save_actor_profile(&profile, true).unwrap();

        assert_eq!(request.headers.get(HEADER_IF_MATCH), Some("\"abc\""));
        assert!(!request.headers.contains(HEADER_IF_NONE_MATCH));
        assert_eq!(request.body.as_deref(), Some(br#"{"theme":"dark"}"#.as_slice()));
    }

    #[test]
    fn blind_overwrite_sends_no_condition() {
        let profile = ActivityProfile::new("p", "http://example.com/a", json!({}));
        let request = ResourceRequest::save_activity_profile(&profile, true).unwrap();
        assert!(!request.headers.contains(HEADER_IF_MATCH));
        assert!(!request.headers.contains(HEADER_IF_NONE_MATCH));
    }

    #[test]
    fn missing_identifiers_are_invalid_arguments() {
        let err = ResourceRequest::get_activity_state("", &actor(), "s", None).unwrap_err();
        assert_eq!(err.kind, RequestErrorKind::InvalidArgument);

        let err = ResourceRequest::get_actor(&json!(null)).unwrap_err();
        assert_eq!(err.kind, RequestErrorKind::InvalidArgument);
    }

    #[test]
    fn optional_parameters_are_omitted() {
        let request =
            ResourceRequest::get_activity_state_ids("http://example.com/a", &actor(), None, None).unwrap();
        assert!(query_value(&request, "registration").is_none());
        assert!(query_value(&request, "since").is_none());

        let request = ResourceRequest::delete_all_activity_states(
            "http://example.com/a",
            &actor(),
            Some("reg-1"),
        )
        .unwrap();
        assert_eq!(request.method, HttpMethod::Delete);
        assert_eq!(query_value(&request, "registration"), Some("reg-1"));
    }
}
