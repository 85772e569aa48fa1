use std::sync::Arc;

use lrsync_core::{InMemoryPersistence, StatementPersistence};
use lrsync_domain::{ClientConfig, Decision, QueueEvent, Statement};
use lrsync_infra::{LrsClient, StaticConnectivity};
use parking_lot::Mutex;
use serde_json::json;
use wiremock::MockServer;

/// Statements with ids `<prefix>-0`, `<prefix>-1`, ...
pub fn statements(prefix: &str, count: usize) -> Vec<Statement> {
    (0..count)
        .map(|n| {
            Statement::from_value(json!({
                "id": format!("{prefix}-{n}"),
                "actor": { "mbox": "mailto:learner@example.com" },
                "verb": { "id": "http://adlnet.gov/expapi/verbs/experienced" },
                "object": { "id": format!("http://example.com/page/{n}") }
            }))
            .expect("statement fixture should be an object")
        })
        .collect()
}

pub fn ids(statements: &[Statement]) -> Vec<String> {
    statements.iter().filter_map(Statement::id).map(str::to_string).collect()
}

/// Client against `server` with automatic flushing off.
pub fn client(server: &MockServer, batch_size: usize) -> LrsClient {
    client_with_persistence(server, batch_size, Arc::new(InMemoryPersistence::new()))
}

pub fn client_with_persistence(
    server: &MockServer,
    batch_size: usize,
    persistence: Arc<dyn StatementPersistence>,
) -> LrsClient {
    let config = ClientConfig::new(server.uri())
        .with_flush_interval(0)
        .with_batch_size(batch_size)
        .with_request_timeout(1);
    LrsClient::builder(config)
        .persistence(persistence)
        .connectivity(Arc::new(StaticConnectivity::default()))
        .build()
        .expect("client should build")
}

/// Queue observer that records every event and answers with a fixed
/// decision.
pub struct RecordingObserver {
    decision: Decision,
    events: Mutex<Vec<QueueEvent>>,
}

impl RecordingObserver {
    pub fn new(decision: Decision) -> Arc<Self> {
        Arc::new(Self { decision, events: Mutex::new(Vec::new()) })
    }

    pub fn events(&self) -> Vec<QueueEvent> {
        self.events.lock().clone()
    }
}

impl lrsync_core::QueueObserver for RecordingObserver {
    fn on_queue_event(&self, event: &QueueEvent) -> Decision {
        self.events.lock().push(event.clone());
        self.decision
    }
}
