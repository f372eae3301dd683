//! Exposes a commandable controller's commands as function actions

use crate::function::{instrument, ActionHandler, Initializer, LambdaFunction};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use svcstack_core::{CachedCounters, Command, Commandable, Logger, Parameters, ServiceError};

/// Registers one instrumented action per controller command
pub struct CommandRegistration {
    controller: Arc<dyn Commandable>,
}

impl CommandRegistration {
    pub fn new(controller: Arc<dyn Commandable>) -> Self {
        Self { controller }
    }
}

#[async_trait]
impl Initializer for CommandRegistration {
    async fn initialize(&self, function: &LambdaFunction) -> Result<(), ServiceError> {
        for command in self.controller.command_set().commands() {
            let action = CommandAction {
                prefix: format!("{}.{}", function.name(), command.name()),
                command: command.clone(),
                counters: function.counters().clone(),
                logger: function.logger().cloned(),
            };
            function.register_handler(command.name(), command.schema().cloned(), Arc::new(action))?;
        }
        Ok(())
    }
}

struct CommandAction {
    prefix: String,
    command: Arc<dyn Command>,
    counters: CachedCounters,
    logger: Option<Arc<dyn Logger>>,
}

#[async_trait]
impl ActionHandler for CommandAction {
    async fn handle(&self, event: Value) -> Result<Value, ServiceError> {
        let trace_id = event
            .get("correlationId")
            .and_then(Value::as_str)
            .map(str::to_string);
        let args = match event {
            Value::Object(map) => map,
            _ => Parameters::new(),
        };

        let timing = instrument(&self.counters, self.logger.as_deref(), trace_id.as_deref(), &self.prefix);

        let result = self.command.execute(trace_id.as_deref(), args).await;
        timing.end_timing();
        result
    }
}

impl LambdaFunction {
    /// A function whose actions are the commands of `controller`
    pub fn commandable(name: &str, description: Option<&str>, controller: Arc<dyn Commandable>) -> Self {
        Self::new(name, description).with_initializer(Arc::new(CommandRegistration::new(controller)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use svcstack_core::{CommandSet, CounterType, FnCommand, Schema, TypeCode};

    struct GreetingController {
        commands: CommandSet,
    }

    impl GreetingController {
        fn new() -> Self {
            let mut commands = CommandSet::new();
            commands.add_command(Arc::new(FnCommand::new(
                "greet",
                Some(Schema::new().with_required_property("name", TypeCode::String)),
                |_trace_id, args| async move {
                    let name = args.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
                    Ok(json!({ "greeting": format!("Hello, {}", name) }))
                },
            )));
            Self { commands }
        }
    }

    impl Commandable for GreetingController {
        fn command_set(&self) -> &CommandSet {
            &self.commands
        }
    }

    #[tokio::test]
    async fn test_commands_become_actions() {
        let function = LambdaFunction::commandable("greeter", None, Arc::new(GreetingController::new()));
        let result = function
            .handle(json!({ "cmd": "greet", "correlationId": "t1", "name": "Ann" }))
            .await
            .unwrap();
        assert_eq!(result, json!({ "greeting": "Hello, Ann" }));
        assert!(function.has_action("greet"));

        let count = function.counters().get("greeter.greet.exec_count").unwrap();
        assert_eq!(count.count, Some(1));
        let time = function.counters().get("greeter.greet.exec_time").unwrap();
        assert_eq!(time.counter_type, CounterType::Interval);
    }

    #[tokio::test]
    async fn test_command_schema_applies() {
        let function = LambdaFunction::commandable("greeter", None, Arc::new(GreetingController::new()));
        let err = function.handle(json!({ "cmd": "greet" })).await.unwrap_err();
        assert_eq!(err.code, "INVALID_DATA");
        assert!(function.counters().get("greeter.greet.exec_count").is_none());
    }

    #[tokio::test]
    async fn test_commands_survive_close() {
        let function = LambdaFunction::commandable("greeter", None, Arc::new(GreetingController::new()));
        let event = json!({ "cmd": "greet", "name": "Ann" });

        function.handle(event.clone()).await.unwrap();
        function.close(None).await.unwrap();

        let result = function.handle(event).await.unwrap();
        assert_eq!(result, json!({ "greeting": "Hello, Ann" }));
        let count = function.counters().get("greeter.greet.exec_count").unwrap();
        assert_eq!(count.count, Some(2));
    }
}
