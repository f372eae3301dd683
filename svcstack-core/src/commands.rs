//! Command pattern used by commandable controllers

use crate::error::ServiceError;
use crate::schema::Schema;
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;

/// Command or action arguments
pub type Parameters = Map<String, Value>;

/// Non-blank string argument
pub fn get_as_nullable_string(args: &Parameters, key: &str) -> Option<String> {
    match args.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    }
}

/// A named operation exposed by a controller
#[async_trait]
pub trait Command: Send + Sync {
    fn name(&self) -> &str;

    fn schema(&self) -> Option<&Schema> {
        None
    }

    async fn execute(&self, trace_id: Option<&str>, args: Parameters) -> Result<Value, ServiceError>;
}

type CommandFn =
    dyn Fn(Option<String>, Parameters) -> BoxFuture<'static, Result<Value, ServiceError>> + Send + Sync;

/// Command backed by an async closure
#[derive(Clone)]
pub struct FnCommand {
    name: String,
    schema: Option<Schema>,
    func: Arc<CommandFn>,
}

impl FnCommand {
    pub fn new<F, Fut>(name: &str, schema: Option<Schema>, func: F) -> Self
    where
        F: Fn(Option<String>, Parameters) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ServiceError>> + Send + 'static,
    {
        Self {
            name: name.to_string(),
            schema,
            func: Arc::new(move |trace_id, args| Box::pin(func(trace_id, args))),
        }
    }
}

#[async_trait]
impl Command for FnCommand {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }

    async fn execute(&self, trace_id: Option<&str>, args: Parameters) -> Result<Value, ServiceError> {
        (self.func)(trace_id.map(str::to_string), args).await
    }
}

/// Ordered set of uniquely named commands
#[derive(Clone, Default)]
pub struct CommandSet {
    commands: Vec<Arc<dyn Command>>,
}

impl CommandSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a command; a later command with the same name replaces the earlier one
    pub fn add_command(&mut self, command: Arc<dyn Command>) {
        self.commands.retain(|c| c.name() != command.name());
        self.commands.push(command);
    }

    pub fn add_command_set(&mut self, other: &CommandSet) {
        for command in &other.commands {
            self.add_command(command.clone());
        }
    }

    pub fn commands(&self) -> &[Arc<dyn Command>] {
        &self.commands
    }

    pub fn find_command(&self, name: &str) -> Option<Arc<dyn Command>> {
        self.commands.iter().find(|c| c.name() == name).cloned()
    }

    /// Validate arguments against the command schema, then execute it
    pub async fn execute(
        &self,
        trace_id: Option<&str>,
        name: &str,
        args: Parameters,
    ) -> Result<Value, ServiceError> {
        let command = self.find_command(name).ok_or_else(|| {
            ServiceError::bad_request("CMD_NOT_FOUND", format!("Requested command does not exist: {}", name))
                .with_detail("command", name)
                .with_trace_id(trace_id)
        })?;

        if let Some(schema) = command.schema() {
            schema.validate_and_fail(trace_id, &Value::Object(args.clone()))?;
        }

        command.execute(trace_id, args).await
    }
}

/// A controller that exposes its operations as commands
pub trait Commandable: Send + Sync {
    fn command_set(&self) -> &CommandSet;
}
