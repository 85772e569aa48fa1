//! Client facade over the queue, dispatcher, scheduler and direct requests
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use lrsync_domain::{ClientConfig, Statement};
//! use lrsync_infra::auth::BasicHttpAuthentication;
//! use lrsync_infra::client::LrsClient;
//!
//! # async fn example(statement: Statement) -> lrsync_domain::Result<()> {
//! let client = LrsClient::builder(ClientConfig::new("https://lrs.example.com/xapi/"))
//!     .authorization(Arc::new(BasicHttpAuthentication::new("key", "secret")))
//!     .build()?;
//! client.start().await?;
//!
//! client.store_statement(statement, false).await?;
//!
//! client.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod resources;

use std::sync::Arc;
use std::time::Duration;

use lrsync_core::{
    AuthorizationProvider, ConnectivityMonitor, InMemoryPersistence, NoAuthorization,
    QueueObserver, Resolution, RetryPolicy, StatementPersistence, StatementQueue,
};
use lrsync_domain::constants::STATEMENTS_PATH;
use lrsync_domain::{
    ClientConfig, HttpMethod, LrsError, RequestError, RequestErrorKind, Result, Statement,
    StatementQuery, StatementsResult,
};
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::connectivity::TcpProbeConnectivity;
use crate::delivery::{BatchDispatcher, FlushTicket};
use crate::http::HttpClient;
use crate::persistence::FileStatementPersistence;
use crate::request::{ApiResponse, LrsRequest, RequestContext, RequestHandle};
use crate::scheduling::{FlushScheduler, SchedulerError};

/// Builder for [`LrsClient`].
pub struct LrsClientBuilder {
    config: ClientConfig,
    authorization: Arc<dyn AuthorizationProvider>,
    persistence: Option<Arc<dyn StatementPersistence>>,
    connectivity: Option<Arc<dyn ConnectivityMonitor>>,
    http: Option<HttpClient>,
    default_actor: Option<Value>,
}

impl LrsClientBuilder {
    pub fn authorization(mut self, authorization: Arc<dyn AuthorizationProvider>) -> Self {
        self.authorization = authorization;
        self
    }

    /// Queue storage. Defaults to a file at `queue_path` when configured,
    /// in-memory otherwise.
    pub fn persistence(mut self, persistence: Arc<dyn StatementPersistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    /// Defaults to a TCP probe of the endpoint.
    pub fn connectivity(mut self, connectivity: Arc<dyn ConnectivityMonitor>) -> Self {
        self.connectivity = Some(connectivity);
        self
    }

    pub fn http_client(mut self, http: HttpClient) -> Self {
        self.http = Some(http);
        self
    }

    /// Actor used when voiding statements.
    pub fn default_actor(mut self, actor: Value) -> Self {
        self.default_actor = Some(actor);
        self
    }

    /// Validate the configuration, wire the components together and load
    /// any saved queue. The flush scheduler is not started.
    pub fn build(self) -> Result<LrsClient> {
        let config = self.config;
        config.validate()?;

        let http = match self.http {
            Some(http) => http,
            None => HttpClient::new()?,
        };
        let context = RequestContext::new(&config, http, self.authorization)?;

        let persistence: Arc<dyn StatementPersistence> = match (self.persistence, &config.queue_path) {
            (Some(persistence), _) => persistence,
            (None, Some(path)) => Arc::new(FileStatementPersistence::new(path)),
            (None, None) => Arc::new(InMemoryPersistence::new()),
        };
        let policy = RetryPolicy { max_permanent_retries: config.max_permanent_retries };
        let queue = Arc::new(StatementQueue::open(persistence, policy)?);

        let connectivity: Arc<dyn ConnectivityMonitor> = match self.connectivity {
            Some(connectivity) => connectivity,
            None => Arc::new(TcpProbeConnectivity::for_endpoint(context.base_url())?),
        };

        let dispatcher =
            Arc::new(BatchDispatcher::new(Arc::clone(&queue), context.clone(), config.batch_size));
        let scheduler = FlushScheduler::new(
            Arc::clone(&dispatcher),
            Arc::clone(&connectivity),
            config.flush_interval(),
        );

        info!(endpoint = %context.base_url(), queued = queue.len(), "Client ready");

        Ok(LrsClient {
            config,
            context,
            queue,
            dispatcher,
            scheduler,
            connectivity,
            default_actor: RwLock::new(self.default_actor),
        })
    }
}

/// Entry point for sending statements and documents to a record store.
pub struct LrsClient {
    config: ClientConfig,
    context: RequestContext,
    queue: Arc<StatementQueue>,
    dispatcher: Arc<BatchDispatcher>,
    scheduler: FlushScheduler,
    connectivity: Arc<dyn ConnectivityMonitor>,
    default_actor: RwLock<Option<Value>>,
}

impl LrsClient {
    pub fn builder(config: ClientConfig) -> LrsClientBuilder {
        LrsClientBuilder {
            config,
            authorization: Arc::new(NoAuthorization),
            persistence: None,
            connectivity: None,
            http: None,
            default_actor: None,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn queue(&self) -> &Arc<StatementQueue> {
        &self.queue
    }

    pub fn default_actor(&self) -> Option<Value> {
        self.default_actor.read().clone()
    }

    pub fn set_default_actor(&self, actor: Option<Value>) {
        *self.default_actor.write() = actor;
    }

    /// Register a queue observer. Every observer sees every batch outcome.
    pub fn subscribe(&self, observer: Arc<dyn QueueObserver>) {
        self.queue.subscribe(observer);
    }

    // Scheduler

    /// Start automatic flushing. Does nothing when the interval is zero.
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<()> {
        match self.scheduler.start().await {
            Ok(()) | Err(SchedulerError::Disabled) | Err(SchedulerError::AlreadyRunning) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Stop automatic flushing and write the queue snapshot. Outstanding
    /// batches still resolve.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) -> Result<()> {
        if self.scheduler.is_running() {
            self.scheduler.stop().await?;
        }
        self.queue.persist()?;
        info!(queued = self.queue.len(), "Client shut down");
        Ok(())
    }

    pub fn is_statement_post_interval_active(&self) -> bool {
        self.scheduler.is_running()
    }

    /// True while the scheduler waits for its next tick.
    pub fn is_counting_down(&self) -> bool {
        self.scheduler.is_counting_down()
    }

    /// Seconds between automatic flushes; 0 stops automatic flushing.
    pub async fn set_statement_post_interval(&self, secs: u64) -> Result<()> {
        self.scheduler.set_interval(Duration::from_secs(secs)).await.map_err(LrsError::from)
    }

    pub async fn is_online(&self) -> bool {
        self.connectivity.is_online().await
    }

    // Queued statements

    /// Store statements.
    ///
    /// Asynchronous mode appends them to the queue and returns the accepted
    /// ones; duplicates of queued or already stored statements are skipped.
    /// Synchronous mode bypasses the queue and posts them right away.
    #[instrument(skip(self, statements), fields(statement_count = statements.len()))]
    pub async fn store_statements(
        &self,
        statements: Vec<Statement>,
        synchronous: bool,
    ) -> Result<Vec<Statement>> {
        if !synchronous {
            return self.queue.enqueue(statements);
        }

        let mut statements = statements;
        for statement in &mut statements {
            statement.ensure_id();
        }
        self.post_statements(&statements).await?;
        Ok(statements)
    }

    /// Store one statement. Returns `None` when it was skipped as a
    /// duplicate.
    pub async fn store_statement(
        &self,
        statement: Statement,
        synchronous: bool,
    ) -> Result<Option<Statement>> {
        Ok(self.store_statements(vec![statement], synchronous).await?.into_iter().next())
    }

    /// Store one voiding statement per given statement.
    ///
    /// The voiding actor is the default actor when set, else the actor of
    /// the statement being voided.
    pub async fn void_statements(
        &self,
        statements: &[Statement],
        synchronous: bool,
    ) -> Result<Vec<Statement>> {
        let default_actor = self.default_actor();
        let voiding = statements
            .iter()
            .map(|statement| {
                let target = statement.id().ok_or_else(|| {
                    LrsError::InvalidInput("cannot void a statement without an id".to_string())
                })?;
                let actor = default_actor
                    .clone()
                    .or_else(|| statement.actor().cloned())
                    .ok_or_else(|| {
                        LrsError::InvalidInput(format!("no actor available to void statement {target}"))
                    })?;
                Ok(Statement::voiding(target, actor))
            })
            .collect::<Result<Vec<_>>>()?;

        self.store_statements(voiding, synchronous).await
    }

    /// Start one request per batch of unsent statements and return
    /// immediately.
    pub fn flush_statement_queue(&self) -> FlushTicket {
        self.dispatcher.flush()
    }

    /// Flush and wait until every batch of this flush has resolved.
    pub async fn flush_statement_queue_and_wait(&self) -> Result<Vec<Resolution>> {
        self.dispatcher.flush_and_wait().await
    }

    /// Flush the queue, wait for it, then start `request`.
    ///
    /// Flush errors are logged; the request starts either way.
    pub async fn start_request_after_flushing(&self, request: Arc<LrsRequest>) -> RequestHandle {
        if let Err(err) = self.flush_statement_queue_and_wait().await {
            warn!(error = %err, "Flush before request finished with errors");
        }
        request.start().await
    }

    /// Build a request against this client's store.
    pub fn request(&self, method: HttpMethod, path: impl Into<String>) -> LrsRequest {
        self.context.request(method, path)
    }

    // Direct statement API

    /// POST statements immediately. Returns the ids reported by the store.
    #[instrument(skip(self, statements), fields(statement_count = statements.len()))]
    pub async fn post_statements(&self, statements: &[Statement]) -> Result<Vec<String>> {
        let body = serde_json::to_vec(statements)?;
        let request = self.context.request(HttpMethod::Post, STATEMENTS_PATH).with_body(body);
        let response = execute(request).await?;
        Ok(response.statement_ids())
    }

    /// PUT one statement under `id`, its own id, or a generated one.
    #[instrument(skip(self, statement))]
    pub async fn put_statement(&self, mut statement: Statement, id: Option<&str>) -> Result<Statement> {
        let id = match id {
            Some(id) => {
                statement.set_id(id);
                id.to_string()
            }
            None => statement.ensure_id(),
        };

        let request = self
            .context
            .request(HttpMethod::Put, STATEMENTS_PATH)
            .with_query(vec![("statementId".to_string(), id)])
            .with_body(statement.to_bytes()?);
        execute(request).await?;
        Ok(statement)
    }

    #[instrument(skip(self))]
    pub async fn get_statement(&self, id: &str) -> Result<Statement> {
        let result = self.query_statements(&StatementQuery::by_id(id)).await?;
        result.statements.into_iter().next().ok_or_else(|| {
            RequestError::new(RequestErrorKind::NotFound, format!("statement {id} not found")).into()
        })
    }

    /// Query statements, optionally after flushing the queue so queued
    /// statements are included.
    #[instrument(skip(self, query))]
    pub async fn get_statements(
        &self,
        query: &StatementQuery,
        after_flushing_queue: bool,
    ) -> Result<StatementsResult> {
        if after_flushing_queue {
            if let Err(err) = self.flush_statement_queue_and_wait().await {
                warn!(error = %err, "Flush before query finished with errors");
            }
        }
        self.query_statements(query).await
    }

    /// Fetch the next page of `previous` and put the statements of
    /// `previous` in front of it.
    #[instrument(skip(self, previous))]
    pub async fn get_more_statements(&self, previous: &StatementsResult) -> Result<StatementsResult> {
        let Some(more) = previous.more.as_deref() else {
            return Err(LrsError::InvalidInput("statement result has no further pages".to_string()));
        };

        let response = execute(self.context.request(HttpMethod::Get, more)).await?;
        let mut result = StatementsResult::from_slice(&response.body)?;
        result.prepend(previous);
        debug!(statement_count = result.statements.len(), more = result.contains_more(), "Fetched more statements");
        Ok(result)
    }

    async fn query_statements(&self, query: &StatementQuery) -> Result<StatementsResult> {
        let request = self
            .context
            .request(HttpMethod::Get, STATEMENTS_PATH)
            .with_query(query.to_query_pairs());
        let response = execute(request).await?;
        StatementsResult::from_slice(&response.body)
    }
}

impl std::fmt::Debug for LrsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LrsClient")
            .field("endpoint", &self.context.base_url().as_str())
            .field("queued", &self.queue.len())
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

/// Run a one-shot request on the current task.
async fn execute(request: LrsRequest) -> Result<ApiResponse> {
    let request = Arc::new(request.synchronous(true));
    Ok(request.run().await.into_result()?)
}
