//! Integration tests for the request lifecycle and the flush scheduler
//!
//! **Coverage:**
//! - Authorization and version headers on every request
//! - Cancelled requests emit no events and send nothing
//! - Scheduler ticks skip while offline and flush once back online

#![allow(dead_code)]

#[path = "support.rs"]
mod support;

use std::sync::Arc;
use std::time::Duration;

use lrsync_core::InMemoryPersistence;
use lrsync_domain::{ClientConfig, HttpMethod, RequestState};
use lrsync_infra::{
    BasicHttpAuthentication, LrsClient, LrsRequest, RequestEvent, RequestObserver,
    RequestOutcome, StaticConnectivity,
};
use parking_lot::Mutex;
use support::statements;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct EventLog(Mutex<Vec<&'static str>>);

impl RequestObserver for EventLog {
    fn on_request_event(&self, _request: &LrsRequest, event: RequestEvent<'_>) {
        let name = match event {
            RequestEvent::Started => "started",
            RequestEvent::Finished(_) => "finished",
            RequestEvent::Failed(_) => "failed",
        };
        self.0.lock().push(name);
    }
}

#[tokio::test]
async fn batches_carry_credentials_and_version() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/xapi/statements"))
        .and(header("Authorization", "Basic dXNlcjpzZWNyZXQ="))
        .and(header("X-Experience-API-Version", "1.0.0"))
        .and(header("Content-Type", "application/json"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let config = ClientConfig::new(format!("{}/xapi", server.uri())).with_flush_interval(0);
    let client = LrsClient::builder(config)
        .authorization(Arc::new(BasicHttpAuthentication::new("user", "secret")))
        .persistence(Arc::new(InMemoryPersistence::new()))
        .connectivity(Arc::new(StaticConnectivity::default()))
        .build()
        .unwrap();

    client.store_statements(statements("auth", 2), false).await.unwrap();
    client.flush_statement_queue_and_wait().await.unwrap();
    assert!(client.queue().is_empty());
}

#[tokio::test]
async fn cancelled_while_preparing_is_silent() {
    let server = MockServer::start().await;
    Mock::given(method("GET")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

    let client = support::client(&server, 50);
    let log = Arc::new(EventLog::default());
    let request = Arc::new(client.request(HttpMethod::Get, "statements").with_observer(log.clone()));

    request.prepare().unwrap();
    assert_eq!(request.state(), RequestState::Preparing);
    assert!(request.cancel());

    assert_eq!(request.start().await.wait().await, RequestOutcome::Cancelled);
    assert!(log.0.lock().is_empty());
}

#[tokio::test]
async fn asynchronous_request_reports_started_and_finished() {
    let server = MockServer::start().await;
    Mock::given(method("GET")).respond_with(ResponseTemplate::new(200)).mount(&server).await;

    let client = support::client(&server, 50);
    let log = Arc::new(EventLog::default());
    let request = Arc::new(client.request(HttpMethod::Get, "about").with_observer(log.clone()));

    let outcome = request.start().await.wait().await;
    assert!(matches!(outcome, RequestOutcome::Finished(_)));
    assert_eq!(*log.0.lock(), vec!["started", "finished"]);
}

#[tokio::test]
async fn scheduler_waits_for_connectivity() {
    let server = MockServer::start().await;
    Mock::given(method("POST")).respond_with(ResponseTemplate::new(200)).mount(&server).await;

    let connectivity = Arc::new(StaticConnectivity::new(false));
    let config = ClientConfig::new(server.uri()).with_flush_interval(1);
    let client = LrsClient::builder(config)
        .persistence(Arc::new(InMemoryPersistence::new()))
        .connectivity(connectivity.clone())
        .build()
        .unwrap();
    client.store_statements(statements("sched", 3), false).await.unwrap();

    client.start().await.unwrap();
    assert!(client.is_statement_post_interval_active());

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(client.queue().len(), 3);
    assert_eq!(client.queue().in_flight_count(), 0);
    assert!(server.received_requests().await.unwrap().is_empty());

    connectivity.set_online(true);
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(client.queue().is_empty());

    client.shutdown().await.unwrap();
    assert!(!client.is_statement_post_interval_active());
}
