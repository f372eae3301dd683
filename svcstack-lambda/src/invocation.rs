//! Lambda invocation types and the remote invocation seam

use async_trait::async_trait;
use aws_sdk_lambda::error::SdkError;
use aws_sdk_lambda::operation::invoke::InvokeError;
use aws_sdk_lambda::primitives::Blob;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use svcstack_core::{load_sdk_config, AwsConnectionParams, BoxError, ClientTimeouts, ServiceError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InvokerError {
    #[error("Function not found: {0}")]
    FunctionNotFound(String),

    #[error("Invocation timeout after {0:?}")]
    Timeout(Duration),

    #[error("Service error: {0}")]
    Service(String),

    #[error("Transport error: {0}")]
    Transport(#[source] BoxError),
}

/// Invocation type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationType {
    /// Synchronous invocation (wait for response)
    RequestResponse,
    /// Asynchronous invocation (fire and forget)
    Event,
}

impl InvocationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RequestResponse => "RequestResponse",
            Self::Event => "Event",
        }
    }

    fn to_sdk(self) -> aws_sdk_lambda::types::InvocationType {
        match self {
            Self::RequestResponse => aws_sdk_lambda::types::InvocationType::RequestResponse,
            Self::Event => aws_sdk_lambda::types::InvocationType::Event,
        }
    }
}

/// One remote invocation
#[derive(Debug, Clone)]
pub struct InvocationRequest {
    pub function_arn: String,
    pub invocation_type: InvocationType,
    pub payload: Bytes,
}

/// Invocation result
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationResult {
    pub status_code: i32,
    pub payload: Option<Bytes>,
    pub function_error: Option<String>,
}

impl InvocationResult {
    pub fn success(payload: impl Into<Bytes>) -> Self {
        Self {
            status_code: 200,
            payload: Some(payload.into()),
            function_error: None,
        }
    }

    /// Result of an `Event` invocation
    pub fn accepted() -> Self {
        Self {
            status_code: 202,
            payload: None,
            function_error: None,
        }
    }

    pub fn error(payload: impl Into<Bytes>) -> Self {
        Self {
            status_code: 200, // Lambda returns 200 even for handled errors
            payload: Some(payload.into()),
            function_error: Some("Handled".to_string()),
        }
    }

    pub fn unhandled_error(error_type: &str, error_message: &str) -> Self {
        let body = serde_json::to_vec(&LambdaErrorResponse {
            error_message: error_message.to_string(),
            error_type: error_type.to_string(),
            stack_trace: None,
        })
        .unwrap_or_default();

        Self {
            status_code: 200,
            payload: Some(Bytes::from(body)),
            function_error: Some("Unhandled".to_string()),
        }
    }
}

/// Lambda runtime error response format
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LambdaErrorResponse {
    #[serde(default)]
    pub error_message: String,
    #[serde(default)]
    pub error_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<Vec<String>>,
}

/// Remote function invocation
#[async_trait]
pub trait FunctionInvoker: Send + Sync {
    async fn invoke(&self, request: InvocationRequest) -> Result<InvocationResult, InvokerError>;
}

/// Creates an invoker for a resolved connection
#[async_trait]
pub trait InvokerFactory: Send + Sync {
    async fn create(
        &self,
        connection: &AwsConnectionParams,
        timeouts: ClientTimeouts,
    ) -> Result<Arc<dyn FunctionInvoker>, ServiceError>;
}

/// Invoker backed by `aws-sdk-lambda`
#[derive(Clone)]
pub struct SdkInvoker {
    client: aws_sdk_lambda::Client,
}

impl SdkInvoker {
    pub fn new(client: aws_sdk_lambda::Client) -> Self {
        Self { client }
    }

    pub async fn from_connection(connection: &AwsConnectionParams, timeouts: ClientTimeouts) -> Self {
        let config = load_sdk_config(connection, timeouts).await;
        Self::new(aws_sdk_lambda::Client::new(&config))
    }
}

fn map_sdk_error(function_arn: &str, err: SdkError<InvokeError>) -> InvokerError {
    if let Some(service) = err.as_service_error() {
        if service.is_resource_not_found_exception() {
            return InvokerError::FunctionNotFound(function_arn.to_string());
        }
        return InvokerError::Service(service.to_string());
    }
    InvokerError::Transport(Box::new(err))
}

#[async_trait]
impl FunctionInvoker for SdkInvoker {
    async fn invoke(&self, request: InvocationRequest) -> Result<InvocationResult, InvokerError> {
        let output = self
            .client
            .invoke()
            .function_name(&request.function_arn)
            .invocation_type(request.invocation_type.to_sdk())
            .payload(Blob::new(request.payload.to_vec()))
            .send()
            .await
            .map_err(|err| map_sdk_error(&request.function_arn, err))?;

        Ok(InvocationResult {
            status_code: output.status_code(),
            payload: output.payload().map(|blob| Bytes::copy_from_slice(blob.as_ref())),
            function_error: output.function_error().map(str::to_string),
        })
    }
}

/// Default factory building an [`SdkInvoker`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SdkInvokerFactory;

#[async_trait]
impl InvokerFactory for SdkInvokerFactory {
    async fn create(
        &self,
        connection: &AwsConnectionParams,
        timeouts: ClientTimeouts,
    ) -> Result<Arc<dyn FunctionInvoker>, ServiceError> {
        Ok(Arc::new(SdkInvoker::from_connection(connection, timeouts).await))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unhandled_error_payload() {
        let result = InvocationResult::unhandled_error("Runtime.ExitError", "exit status 1");
        assert_eq!(result.function_error.as_deref(), Some("Unhandled"));

        let body: LambdaErrorResponse = serde_json::from_slice(result.payload.as_ref().unwrap()).unwrap();
        assert_eq!(body.error_type, "Runtime.ExitError");
        assert_eq!(body.error_message, "exit status 1");
    }

    #[test]
    fn test_invocation_type_names() {
        assert_eq!(InvocationType::RequestResponse.as_str(), "RequestResponse");
        assert_eq!(InvocationType::Event.as_str(), "Event");
        assert_eq!(
            InvocationType::Event.to_sdk(),
            aws_sdk_lambda::types::InvocationType::Event
        );
    }
}
