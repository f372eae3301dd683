//! Dispatcher the Lambda runtime calls for every event

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use svcstack_core::{
    CachedCounters, ConfigParams, Configurable, CounterTiming, Logger, Openable, Schema, ServiceError,
};
use tracing::{debug, error, info, warn};

/// Handles one action of a function
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn handle(&self, event: Value) -> Result<Value, ServiceError>;
}

#[async_trait]
impl<F, Fut> ActionHandler for F
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, ServiceError>> + Send + 'static,
{
    async fn handle(&self, event: Value) -> Result<Value, ServiceError> {
        (self)(event).await
    }
}

/// Runs once when the function initializes, typically to register actions
#[async_trait]
pub trait Initializer: Send + Sync {
    async fn initialize(&self, function: &LambdaFunction) -> Result<(), ServiceError>;
}

pub(crate) fn instrument(
    counters: &CachedCounters,
    logger: Option<&dyn Logger>,
    trace_id: Option<&str>,
    name: &str,
) -> CounterTiming {
    if let Some(logger) = logger {
        logger.trace(trace_id, &format!("Executing {} method", name));
    }
    counters.increment_one(&format!("{}.exec_count", name));
    counters.begin_timing(&format!("{}.exec_time", name))
}

struct Action {
    schema: Option<Schema>,
    handler: Arc<dyn ActionHandler>,
}

/// Initializers run at most once; dependencies reopen after a close
#[derive(Debug, Default)]
struct InitState {
    initializers_run: usize,
    opened: bool,
}

/// Routes events to registered actions by their `cmd` field
pub struct LambdaFunction {
    name: String,
    description: Option<String>,
    config: ConfigParams,
    actions: RwLock<HashMap<String, Action>>,
    initializers: Vec<Arc<dyn Initializer>>,
    dependencies: Vec<Arc<dyn Openable>>,
    logger: Option<Arc<dyn Logger>>,
    counters: CachedCounters,
    state: tokio::sync::Mutex<InitState>,
}

impl LambdaFunction {
    pub fn new(name: &str, description: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            description: description.map(str::to_string),
            config: ConfigParams::new(),
            actions: RwLock::new(HashMap::new()),
            initializers: Vec::new(),
            dependencies: Vec::new(),
            logger: None,
            counters: CachedCounters::new(),
            state: tokio::sync::Mutex::new(InitState::default()),
        }
    }

    pub fn with_initializer(mut self, initializer: Arc<dyn Initializer>) -> Self {
        self.initializers.push(initializer);
        self
    }

    /// Opened on initialize and closed on close, in registration order
    pub fn with_dependency(mut self, dependency: Arc<dyn Openable>) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn with_counters(mut self, counters: CachedCounters) -> Self {
        self.counters = counters;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn config(&self) -> &ConfigParams {
        &self.config
    }

    pub fn counters(&self) -> &CachedCounters {
        &self.counters
    }

    pub fn logger(&self) -> Option<&Arc<dyn Logger>> {
        self.logger.as_ref()
    }

    /// Count a call of `name` and start timing it
    pub fn instrument(&self, trace_id: Option<&str>, name: &str) -> CounterTiming {
        instrument(&self.counters, self.logger.as_deref(), trace_id, name)
    }

    pub fn register_action<F, Fut>(
        &self,
        command: &str,
        schema: Option<Schema>,
        handler: F,
    ) -> Result<(), ServiceError>
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ServiceError>> + Send + 'static,
    {
        self.register_handler(command, schema, Arc::new(handler))
    }

    pub fn register_handler(
        &self,
        command: &str,
        schema: Option<Schema>,
        handler: Arc<dyn ActionHandler>,
    ) -> Result<(), ServiceError> {
        if command.trim().is_empty() {
            return Err(ServiceError::configuration("NO_COMMAND", "Missing command"));
        }

        let mut actions = self.actions.write();
        if actions.contains_key(command) {
            return Err(ServiceError::configuration(
                "DUPLICATE_ACTION",
                format!("Action {} is already registered", command),
            )
            .with_detail("command", command));
        }

        actions.insert(command.to_string(), Action { schema, handler });
        debug!(function = %self.name, command = %command, "Registered action");
        Ok(())
    }

    pub fn has_action(&self, command: &str) -> bool {
        self.actions.read().contains_key(command)
    }

    pub async fn is_initialized(&self) -> bool {
        self.state.lock().await.opened
    }

    /// Run initializers and open dependencies; later calls are no-ops
    ///
    /// After a failure the next call resumes where this one stopped: completed
    /// initializers are not run again and open dependencies are not reopened.
    pub async fn initialize(&self, trace_id: Option<&str>) -> Result<(), ServiceError> {
        let mut state = self.state.lock().await;
        if state.opened {
            return Ok(());
        }

        for initializer in self.initializers.iter().skip(state.initializers_run) {
            initializer.initialize(self).await?;
            state.initializers_run += 1;
        }
        for dependency in &self.dependencies {
            if !dependency.is_open() {
                dependency.open(trace_id).await?;
            }
        }

        state.opened = true;
        info!(function = %self.name, actions = self.actions.read().len(), "Initialized lambda function");
        Ok(())
    }

    /// Route an event to its action
    pub async fn execute(&self, event: Value) -> Result<Value, ServiceError> {
        let trace_id = event
            .get("correlationId")
            .and_then(Value::as_str)
            .map(str::to_string);

        let command = event
            .get("cmd")
            .and_then(Value::as_str)
            .filter(|cmd| !cmd.trim().is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                ServiceError::bad_request("NO_COMMAND", "Cmd parameter is missing")
                    .with_trace_id(trace_id.as_deref())
            })?;

        let (schema, handler) = {
            let actions = self.actions.read();
            let action = actions.get(&command).ok_or_else(|| {
                ServiceError::bad_request("NO_ACTION", format!("Action {} was not found", command))
                    .with_detail("command", command.clone())
                    .with_trace_id(trace_id.as_deref())
            })?;
            (action.schema.clone(), action.handler.clone())
        };

        if let Some(schema) = schema {
            schema.validate_and_fail(trace_id.as_deref(), &event)?;
        }

        let result = handler.handle(event).await;
        if let Err(err) = &result {
            if let Some(logger) = &self.logger {
                logger.error(trace_id.as_deref(), Some(err), &format!("Failed to execute {}", command));
            }
        }
        result
    }

    /// Runtime entry point, initializing first when needed
    pub async fn handle(&self, event: Value) -> Result<Value, ServiceError> {
        let trace_id = event.get("correlationId").and_then(Value::as_str);
        if let Err(err) = self.initialize(trace_id).await {
            error!(function = %self.name, error = %err, "Failed to initialize lambda function");
            return Err(err);
        }
        self.execute(event).await
    }

    /// Close dependencies in reverse order; the first failure is returned
    ///
    /// Registered actions stay, so a later `handle` only reopens dependencies.
    pub async fn close(&self, trace_id: Option<&str>) -> Result<(), ServiceError> {
        let mut state = self.state.lock().await;

        let mut first_error = None;
        for dependency in self.dependencies.iter().rev() {
            if let Err(err) = dependency.close(trace_id).await {
                warn!(function = %self.name, error = %err, "Failed to close dependency");
                first_error.get_or_insert(err);
            }
        }

        state.opened = false;
        info!(function = %self.name, "Closed lambda function");
        first_error.map_or(Ok(()), Err)
    }
}

impl Configurable for LambdaFunction {
    fn configure(&mut self, config: &ConfigParams) {
        if let Some(name) = config.get_as_nullable_string("name") {
            self.name = name;
        }
        if let Some(description) = config.get_as_nullable_string("description") {
            self.description = Some(description);
        }
        self.config = config.clone();
    }
}
