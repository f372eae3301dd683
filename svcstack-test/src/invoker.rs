//! Function invokers for exercising `LambdaClient` without AWS

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use svcstack_core::{AwsConnectionParams, ClientTimeouts, ServiceError};
use svcstack_lambda::runtime::to_diagnostic;
use svcstack_lambda::{
    FunctionInvoker, InvocationRequest, InvocationResult, InvocationType, InvokerError, InvokerFactory,
    LambdaFunction,
};

#[derive(Default)]
struct InvokerState {
    requests: Mutex<Vec<InvocationRequest>>,
    responses: Mutex<VecDeque<Result<InvocationResult, InvokerError>>>,
    connections: Mutex<Vec<AwsConnectionParams>>,
    timeouts: Mutex<Vec<ClientTimeouts>>,
    delay: Mutex<Option<Duration>>,
}

/// Records invocations and replays scripted results
///
/// Without a scripted result, `RequestResponse` calls return `{}` and `Event`
/// calls are accepted with no payload.
#[derive(Clone, Default)]
pub struct RecordingInvoker {
    state: Arc<InvokerState>,
}

impl RecordingInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn factory(&self) -> Arc<dyn InvokerFactory> {
        Arc::new(self.clone())
    }

    pub fn respond_with(&self, result: InvocationResult) {
        self.state.responses.lock().push_back(Ok(result));
    }

    pub fn fail_with(&self, error: InvokerError) {
        self.state.responses.lock().push_back(Err(error));
    }

    /// Wait this long before answering
    pub fn set_delay(&self, delay: Duration) {
        *self.state.delay.lock() = Some(delay);
    }

    pub fn requests(&self) -> Vec<InvocationRequest> {
        self.state.requests.lock().clone()
    }

    /// Request payloads decoded as JSON
    pub fn payloads(&self) -> Vec<Value> {
        self.state
            .requests
            .lock()
            .iter()
            .filter_map(|r| serde_json::from_slice(&r.payload).ok())
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.state.requests.lock().len()
    }

    pub fn connections(&self) -> Vec<AwsConnectionParams> {
        self.state.connections.lock().clone()
    }

    pub fn timeouts(&self) -> Vec<ClientTimeouts> {
        self.state.timeouts.lock().clone()
    }
}

#[async_trait]
impl FunctionInvoker for RecordingInvoker {
    async fn invoke(&self, request: InvocationRequest) -> Result<InvocationResult, InvokerError> {
        let invocation_type = request.invocation_type;
        self.state.requests.lock().push(request);

        let delay = *self.state.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.state.responses.lock().pop_front();
        scripted.unwrap_or_else(|| {
            Ok(match invocation_type {
                InvocationType::RequestResponse => InvocationResult::success("{}"),
                InvocationType::Event => InvocationResult::accepted(),
            })
        })
    }
}

#[async_trait]
impl InvokerFactory for RecordingInvoker {
    async fn create(
        &self,
        connection: &AwsConnectionParams,
        timeouts: ClientTimeouts,
    ) -> Result<Arc<dyn FunctionInvoker>, ServiceError> {
        self.state.connections.lock().push(connection.clone());
        self.state.timeouts.lock().push(timeouts);
        Ok(Arc::new(self.clone()))
    }
}

/// Runs a [`LambdaFunction`] in-process, the way the Lambda runtime would
///
/// Errors come back as an unhandled function error whose payload carries the
/// runtime's `{errorType, errorMessage}` shape.
#[derive(Clone)]
pub struct LocalFunctionInvoker {
    function: Arc<LambdaFunction>,
}

impl LocalFunctionInvoker {
    pub fn new(function: Arc<LambdaFunction>) -> Self {
        Self { function }
    }

    pub fn factory(&self) -> Arc<dyn InvokerFactory> {
        Arc::new(self.clone())
    }
}

#[async_trait]
impl FunctionInvoker for LocalFunctionInvoker {
    async fn invoke(&self, request: InvocationRequest) -> Result<InvocationResult, InvokerError> {
        let event: Value = match serde_json::from_slice(&request.payload) {
            Ok(event) => event,
            Err(err) => {
                return Ok(InvocationResult::unhandled_error(
                    "Runtime.InvalidPayload",
                    &err.to_string(),
                ))
            }
        };

        let result = match self.function.handle(event).await {
            Ok(value) => InvocationResult::success(value.to_string()),
            Err(err) => {
                let diagnostic = to_diagnostic(&err);
                InvocationResult::unhandled_error(&diagnostic.error_type, &diagnostic.error_message)
            }
        };

        Ok(match request.invocation_type {
            InvocationType::RequestResponse => result,
            InvocationType::Event => InvocationResult::accepted(),
        })
    }
}

#[async_trait]
impl InvokerFactory for LocalFunctionInvoker {
    async fn create(
        &self,
        _connection: &AwsConnectionParams,
        _timeouts: ClientTimeouts,
    ) -> Result<Arc<dyn FunctionInvoker>, ServiceError> {
        Ok(Arc::new(self.clone()))
    }
}
