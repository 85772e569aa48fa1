//! Document resources: activity state, activity and actor profiles, and
//! activity/actor lookups. These are one-shot requests; nothing is queued.

use chrono::{DateTime, Utc};
use lrsync_domain::{
    ActivityProfile, ActivityState, ActorProfile, ResourceRequest, Result,
};
use serde_json::Value;
use tracing::instrument;

use super::{execute, LrsClient};
use crate::request::ApiResponse;

impl LrsClient {
    async fn execute_resource(&self, resource: ResourceRequest) -> Result<ApiResponse> {
        execute(self.context.resource(resource)).await
    }

    // Activity state

    /// Save a state document. Returns the ETag the store reported, if any.
    #[instrument(skip(self, state), fields(state_id = %state.state_id))]
    pub async fn save_activity_state(
        &self,
        state: &ActivityState,
        overwrite: bool,
    ) -> Result<Option<String>> {
        let response =
            self.execute_resource(ResourceRequest::save_activity_state(state, overwrite)?).await?;
        Ok(response.etag)
    }

    #[instrument(skip(self, actor))]
    pub async fn get_activity_state(
        &self,
        activity_id: &str,
        actor: &Value,
        state_id: &str,
        registration: Option<&str>,
    ) -> Result<ActivityState> {
        let response = self
            .execute_resource(ResourceRequest::get_activity_state(
                activity_id,
                actor,
                state_id,
                registration,
            )?)
            .await?;

        let mut state = ActivityState::new(state_id, activity_id, actor.clone(), contents(&response));
        state.registration = registration.map(str::to_string);
        state.etag = response.etag;
        Ok(state)
    }

    #[instrument(skip(self, actor))]
    pub async fn get_activity_state_ids(
        &self,
        activity_id: &str,
        actor: &Value,
        registration: Option<&str>,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<String>> {
        let response = self
            .execute_resource(ResourceRequest::get_activity_state_ids(
                activity_id,
                actor,
                registration,
                since,
            )?)
            .await?;
        response.json()
    }

    #[instrument(skip(self, actor))]
    pub async fn delete_activity_state(
        &self,
        activity_id: &str,
        actor: &Value,
        state_id: &str,
        registration: Option<&str>,
    ) -> Result<()> {
        self.execute_resource(ResourceRequest::delete_activity_state(
            activity_id,
            actor,
            state_id,
            registration,
        )?)
        .await?;
        Ok(())
    }

    #[instrument(skip(self, actor))]
    pub async fn delete_all_activity_states(
        &self,
        activity_id: &str,
        actor: &Value,
        registration: Option<&str>,
    ) -> Result<()> {
        self.execute_resource(ResourceRequest::delete_all_activity_states(
            activity_id,
            actor,
            registration,
        )?)
        .await?;
        Ok(())
    }

    // Activity profile

    #[instrument(skip(self, profile), fields(profile_id = %profile.profile_id))]
    pub async fn save_activity_profile(
        &self,
        profile: &ActivityProfile,
        overwrite: bool,
    ) -> Result<Option<String>> {
        let response = self
            .execute_resource(ResourceRequest::save_activity_profile(profile, overwrite)?)
            .await?;
        Ok(response.etag)
    }

    #[instrument(skip(self))]
    pub async fn get_activity_profile(
        &self,
        activity_id: &str,
        profile_id: &str,
    ) -> Result<ActivityProfile> {
        let response = self
            .execute_resource(ResourceRequest::get_activity_profile(activity_id, profile_id)?)
            .await?;
        let mut profile = ActivityProfile::new(profile_id, activity_id, contents(&response));
        profile.etag = response.etag;
        Ok(profile)
    }

    pub async fn get_activity_profile_ids(
        &self,
        activity_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<String>> {
        self.execute_resource(ResourceRequest::get_activity_profile_ids(activity_id, since)?)
            .await?
            .json()
    }

    pub async fn delete_activity_profile(&self, activity_id: &str, profile_id: &str) -> Result<()> {
        self.execute_resource(ResourceRequest::delete_activity_profile(activity_id, profile_id)?)
            .await?;
        Ok(())
    }

    // Actor profile

    #[instrument(skip(self, profile), fields(profile_id = %profile.profile_id))]
    pub async fn save_actor_profile(
        &self,
        profile: &ActorProfile,
        overwrite: bool,
    ) -> Result<Option<String>> {
        let response =
            self.execute_resource(ResourceRequest::save_actor_profile(profile, overwrite)?).await?;
        Ok(response.etag)
    }

    #[instrument(skip(self, actor))]
    pub async fn get_actor_profile(&self, actor: &Value, profile_id: &str) -> Result<ActorProfile> {
        let response =
            self.execute_resource(ResourceRequest::get_actor_profile(actor, profile_id)?).await?;
        let mut profile = ActorProfile::new(profile_id, actor.clone(), contents(&response));
        profile.etag = response.etag;
        Ok(profile)
    }

    pub async fn get_actor_profile_ids(
        &self,
        actor: &Value,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<String>> {
        self.execute_resource(ResourceRequest::get_actor_profile_ids(actor, since)?).await?.json()
    }

    pub async fn delete_actor_profile(&self, actor: &Value, profile_id: &str) -> Result<()> {
        self.execute_resource(ResourceRequest::delete_actor_profile(actor, profile_id)?).await?;
        Ok(())
    }

    // Lookups

    /// Full definition of an activity as known to the store.
    pub async fn get_activity(&self, activity_id: &str) -> Result<Value> {
        self.execute_resource(ResourceRequest::get_activity(activity_id)?).await?.json_value()
    }

    /// Combined person object for an actor.
    pub async fn get_actor(&self, actor: &Value) -> Result<Value> {
        self.execute_resource(ResourceRequest::get_actor(actor)?).await?.json_value()
    }
}

/// Document body as JSON, or as a string when it is not JSON.
fn contents(response: &ApiResponse) -> Value {
    response.json_value().unwrap_or_else(|_| Value::String(response.text()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use lrsync_domain::{ClientConfig, LrsError, RequestErrorKind};
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::connectivity::StaticConnectivity;

    fn client(server: &MockServer) -> LrsClient {
        LrsClient::builder(ClientConfig::new(server.uri()).with_flush_interval(0))
            .connectivity(Arc::new(StaticConnectivity::default()))
            .build()
            .unwrap()
    }

    fn actor() -> Value {
        json!({ "objectType": "Agent", "mbox": "mailto:learner@example.com" })
    }

    #[tokio::test]
    async fn state_round_trip_carries_etag() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/activities/state"))
            .and(query_param("stateId", "bookmark"))
            .and(header("If-None-Match", "*"))
            .respond_with(ResponseTemplate::new(204).insert_header("ETag", "\"v1\""))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/activities/state"))
            .and(query_param("stateId", "bookmark"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("ETag", "\"v1\"")
                    .set_body_json(json!({ "page": 4 })),
            )
            .mount(&server)
            .await;

        let client = client(&server);
        let state = ActivityState::new("bookmark", "http://example.com/course", actor(), json!({ "page": 4 }));

        let etag = client.save_activity_state(&state, false).await.unwrap();
        assert_eq!(etag.as_deref(), Some("\"v1\""));

        let fetched = client
            .get_activity_state("http://example.com/course", &actor(), "bookmark", None)
            .await
            .unwrap();
        assert_eq!(fetched.contents, json!({ "page": 4 }));
        assert_eq!(fetched.etag.as_deref(), Some("\"v1\""));
    }

    #[tokio::test]
    async fn stale_etag_is_precondition_failed() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/activities/profile"))
            .and(header("If-Match", "\"old\""))
            .respond_with(ResponseTemplate::new(412))
            .mount(&server)
            .await;

        let client = client(&server);
        let mut profile = ActivityProfile::new("settings", "http://example.com/course", json!({}));
        profile.etag = Some("\"old\"".to_string());

        match client.save_activity_profile(&profile, true).await {
            Err(LrsError::Request(err)) => assert_eq!(err.kind, RequestErrorKind::PreconditionFailed),
            other => panic!("expected precondition failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn profile_ids_and_plain_text_documents() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/agents/profile"))
            .and(query_param("profileId", "notes"))
            .respond_with(ResponseTemplate::new(200).set_body_string("free text"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/agents/profile"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(["notes", "prefs"])))
            .mount(&server)
            .await;

        let client = client(&server);
        let profile = client.get_actor_profile(&actor(), "notes").await.unwrap();
        assert_eq!(profile.contents, json!("free text"));

        let ids = client.get_actor_profile_ids(&actor(), None).await.unwrap();
        assert_eq!(ids, vec!["notes", "prefs"]);
    }

    #[tokio::test]
    async fn empty_ids_fail_before_sending() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE")).respond_with(ResponseTemplate::new(204)).expect(0).mount(&server).await;

        let client = client(&server);
        let err = client.delete_activity_profile("", "settings").await.unwrap_err();
        assert!(matches!(err, LrsError::Request(ref e) if e.kind == RequestErrorKind::InvalidArgument));
    }

    #[tokio::test]
    async fn delete_all_states_for_registration() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/activities/state"))
            .and(query_param("registration", "reg-1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server);
        client
            .delete_all_activity_states("http://example.com/course", &actor(), Some("reg-1"))
            .await
            .unwrap();
    }
}
