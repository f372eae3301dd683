//! Client for calling actions on a remote Lambda function

use crate::invocation::{
    FunctionInvoker, InvocationRequest, InvocationResult, InvocationType, InvokerError, InvokerFactory,
    LambdaErrorResponse, SdkInvokerFactory,
};
use bytes::Bytes;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use svcstack_core::{
    AwsConnectionParams, AwsConnectionResolver, CachedCounters, ClientTimeouts, ConfigParams, Configurable,
    CredentialStore, Discovery, ErrorCategory, ErrorDescription, Parameters, ServiceError, TraceId,
};
use tracing::{debug, error, info};

const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

struct Remote {
    connection: AwsConnectionParams,
    function_arn: String,
    invoker: Arc<dyn FunctionInvoker>,
}

/// Invokes named actions on a remote Lambda function
///
/// The payload sent is the call arguments plus `cmd` (the action name) and
/// `correlationId` (the trace id). The function's reply is decoded as JSON; a
/// function error is decoded back into a [`ServiceError`].
pub struct LambdaClient {
    name: String,
    resolver: AwsConnectionResolver,
    connect_timeout: Duration,
    timeout: Option<Duration>,
    factory: Arc<dyn InvokerFactory>,
    counters: Option<CachedCounters>,
    remote: RwLock<Option<Arc<Remote>>>,
    opening: tokio::sync::Mutex<()>,
}

impl Default for LambdaClient {
    fn default() -> Self {
        Self::new()
    }
}

impl LambdaClient {
    pub fn new() -> Self {
        Self {
            name: "lambda".to_string(),
            resolver: AwsConnectionResolver::new().with_service("lambda"),
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            timeout: None,
            factory: Arc::new(SdkInvokerFactory),
            counters: None,
            remote: RwLock::new(None),
            opening: tokio::sync::Mutex::new(()),
        }
    }

    /// Prefix of the counters this client records
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_invoker_factory(mut self, factory: Arc<dyn InvokerFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn with_counters(mut self, counters: CachedCounters) -> Self {
        self.counters = Some(counters);
        self
    }

    pub fn set_discovery(&mut self, discovery: Arc<dyn Discovery>) {
        self.resolver.set_discovery(discovery);
    }

    pub fn set_credential_store(&mut self, store: Arc<dyn CredentialStore>) {
        self.resolver.set_credential_store(store);
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn is_open(&self) -> bool {
        self.remote.read().is_some()
    }

    /// Resolved connection, once opened
    pub fn connection(&self) -> Option<AwsConnectionParams> {
        self.remote.read().as_ref().map(|r| r.connection.clone())
    }

    pub async fn open(&self, trace_id: Option<&str>) -> Result<(), ServiceError> {
        let _guard = self.opening.lock().await;
        if self.is_open() {
            return Ok(());
        }

        let connection = self.resolver.resolve(trace_id).await?;
        let function_arn = connection.arn().ok_or_else(|| {
            ServiceError::configuration("NO_AWS_CONNECTION", "no connection configured").with_trace_id(trace_id)
        })?;

        let invoker = self
            .factory
            .create(
                &connection,
                ClientTimeouts::connect(self.connect_timeout).with_operation(self.timeout),
            )
            .await?;

        info!(
            function_arn = %function_arn,
            region = %connection.region().unwrap_or_default(),
            "Opened lambda client"
        );

        *self.remote.write() = Some(Arc::new(Remote {
            connection,
            function_arn,
            invoker,
        }));
        Ok(())
    }

    pub async fn close(&self, _trace_id: Option<&str>) -> Result<(), ServiceError> {
        let _guard = self.opening.lock().await;
        if let Some(remote) = self.remote.write().take() {
            info!(function_arn = %remote.function_arn, "Closed lambda client");
        }
        Ok(())
    }

    /// Call an action and wait for its result
    pub async fn call(
        &self,
        command: &str,
        trace_id: Option<&str>,
        args: &Parameters,
    ) -> Result<Value, ServiceError> {
        self.invoke(InvocationType::RequestResponse, command, trace_id, args)
            .await
    }

    /// Fire an action without waiting for its result
    ///
    /// Failures of the remote call itself are logged, not returned.
    pub async fn call_one_way(
        &self,
        command: &str,
        trace_id: Option<&str>,
        args: &Parameters,
    ) -> Result<(), ServiceError> {
        match self.invoke(InvocationType::Event, command, trace_id, args).await {
            Ok(_) => Ok(()),
            Err(err) if err.category == ErrorCategory::Invocation => {
                error!(
                    command = %command,
                    trace_id = ?err.trace_id,
                    error = %err,
                    "One-way lambda call failed"
                );
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    pub async fn invoke(
        &self,
        invocation_type: InvocationType,
        command: &str,
        trace_id: Option<&str>,
        args: &Parameters,
    ) -> Result<Value, ServiceError> {
        if command.trim().is_empty() {
            return Err(ServiceError::invalid_action("NO_COMMAND", "Missing command").with_trace_id(trace_id));
        }

        let remote = self.remote.read().clone().ok_or_else(|| {
            ServiceError::not_opened("NOT_OPENED", "Lambda client is not opened").with_trace_id(trace_id)
        })?;

        let trace_id = TraceId::or_generate(trace_id);
        let trace = Some(trace_id.as_str());

        let mut payload = args.clone();
        payload.insert("cmd".to_string(), Value::String(command.to_string()));
        payload.insert("correlationId".to_string(), Value::String(trace_id.to_string()));
        let body = serde_json::to_vec(&Value::Object(payload)).map_err(|e| {
            ServiceError::internal("SERIALIZATION_FAILED", "Failed to serialize call arguments")
                .with_cause(e)
                .with_trace_id(trace)
        })?;

        debug!(
            function_arn = %remote.function_arn,
            command = %command,
            invocation_type = invocation_type.as_str(),
            trace_id = %trace_id,
            "Invoking lambda function"
        );

        let timing = self.counters.as_ref().map(|counters| {
            counters.increment_one(&format!("{}.call_count", self.name));
            counters.begin_timing(&format!("{}.call_time", self.name))
        });

        let request = InvocationRequest {
            function_arn: remote.function_arn.clone(),
            invocation_type,
            payload: Bytes::from(body),
        };
        let outcome = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, remote.invoker.invoke(request))
                .await
                .unwrap_or(Err(InvokerError::Timeout(limit))),
            None => remote.invoker.invoke(request).await,
        };

        if let Some(timing) = timing {
            timing.end_timing();
        }

        let result = outcome.map_err(|err| match err {
            InvokerError::Timeout(limit) => ServiceError::invocation(
                "TIMEOUT",
                format!("Call to {} timed out after {} ms", remote.function_arn, limit.as_millis()),
            )
            .with_trace_id(trace),
            other => ServiceError::invocation(
                "CALL_FAILED",
                format!("Failed to invoke lambda function {}", remote.function_arn),
            )
            .with_cause(other)
            .with_trace_id(trace),
        })?;

        decode_result(trace, result)
    }
}

fn decode_result(trace_id: Option<&str>, result: InvocationResult) -> Result<Value, ServiceError> {
    let payload = result.payload.unwrap_or_default();

    if let Some(function_error) = result.function_error {
        return Err(decode_function_error(trace_id, &function_error, &payload));
    }

    if payload.is_empty() {
        return Ok(Value::Null);
    }

    serde_json::from_slice(&payload).map_err(|e| {
        ServiceError::deserialization("DESERIALIZATION_FAILED", "Failed to deserialize function result")
            .with_detail("payload", String::from_utf8_lossy(&payload).into_owned())
            .with_cause(e)
            .with_trace_id(trace_id)
    })
}

/// Re-create the error a function reported
///
/// Accepts an [`ErrorDescription`], or the runtime's `{errorType, errorMessage}`
/// shape whose message may itself carry an [`ErrorDescription`].
fn decode_function_error(trace_id: Option<&str>, function_error: &str, payload: &[u8]) -> ServiceError {
    if let Ok(description) = serde_json::from_slice::<ErrorDescription>(payload) {
        return description.into();
    }

    if let Ok(response) = serde_json::from_slice::<LambdaErrorResponse>(payload) {
        if let Ok(description) = serde_json::from_str::<ErrorDescription>(&response.error_message) {
            return description.into();
        }
        let code = if response.error_type.is_empty() {
            "FUNCTION_ERROR".to_string()
        } else {
            response.error_type
        };
        return ServiceError::invocation(code, response.error_message)
            .with_detail("function_error", function_error)
            .with_trace_id(trace_id);
    }

    ServiceError::invocation("FUNCTION_ERROR", String::from_utf8_lossy(payload).into_owned())
        .with_detail("function_error", function_error)
        .with_trace_id(trace_id)
}

impl Configurable for LambdaClient {
    fn configure(&mut self, config: &ConfigParams) {
        self.resolver.configure(config);
        self.connect_timeout =
            config.get_as_millis_with_default("options.connect_timeout", DEFAULT_CONNECT_TIMEOUT_MS);
        self.timeout = config
            .get_as_nullable_long("options.timeout")
            .filter(|ms| *ms > 0)
            .map(|ms| Duration::from_millis(ms.unsigned_abs()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_configure_timeouts() {
        let mut client = LambdaClient::new();
        assert_eq!(client.connect_timeout(), Duration::from_millis(10_000));
        assert_eq!(client.timeout(), None);

        client.configure(&ConfigParams::from_tuples([
            ("options.connect_timeout", "2500"),
            ("options.timeout", "500"),
        ]));
        assert_eq!(client.connect_timeout(), Duration::from_millis(2500));
        assert_eq!(client.timeout(), Some(Duration::from_millis(500)));
    }

    #[tokio::test]
    async fn test_call_before_open() {
        let client = LambdaClient::new();
        let err = client.call("ping", None, &Parameters::new()).await.unwrap_err();
        assert_eq!(err.category, ErrorCategory::NotOpened);
    }

    #[test]
    fn test_decode_empty_payload() {
        let value = decode_result(None, InvocationResult::accepted()).unwrap();
        assert_eq!(value, Value::Null);
    }

    #[test]
    fn test_decode_invalid_payload() {
        let err = decode_result(Some("t1"), InvocationResult::success("not json")).unwrap_err();
        assert_eq!(err.category, ErrorCategory::Deserialization);
        assert_eq!(err.code, "DESERIALIZATION_FAILED");
        assert_eq!(err.details.get("payload"), Some(&json!("not json")));
    }

    #[test]
    fn test_decode_error_description() {
        let description = ServiceError::bad_request("NO_ACTION", "Action ping was not found")
            .with_detail("command", "ping")
            .to_description();
        let payload = serde_json::to_vec(&description).unwrap();

        let err = decode_result(None, InvocationResult::error(payload)).unwrap_err();
        assert!(err.is(ErrorCategory::BadRequest, "NO_ACTION"));
        assert_eq!(err.details.get("command"), Some(&json!("ping")));
    }

    #[test]
    fn test_decode_runtime_error() {
        let result = InvocationResult::unhandled_error("Runtime.ExitError", "exit status 1");
        let err = decode_result(Some("t1"), result).unwrap_err();
        assert_eq!(err.category, ErrorCategory::Invocation);
        assert_eq!(err.code, "Runtime.ExitError");
        assert_eq!(err.message, "exit status 1");
    }

    #[test]
    fn test_decode_wrapped_description() {
        let description = ServiceError::validation("INVALID_DATA", "name is required").to_description();
        let response = LambdaErrorResponse {
            error_type: "INVALID_DATA".to_string(),
            error_message: serde_json::to_string(&description).unwrap(),
            stack_trace: None,
        };
        let payload = serde_json::to_vec(&response).unwrap();

        let err = decode_result(None, InvocationResult::error(payload)).unwrap_err();
        assert!(err.is(ErrorCategory::Validation, "INVALID_DATA"));
    }
}
