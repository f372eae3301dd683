//! CloudWatch Logs operations used by the logger

use async_trait::async_trait;
use aws_sdk_cloudwatchlogs::error::SdkError;
use aws_sdk_cloudwatchlogs::operation::put_log_events::PutLogEventsError;
use aws_sdk_cloudwatchlogs::types::InputLogEvent;
use std::sync::Arc;
use svcstack_core::{load_sdk_config, AwsConnectionParams, BoxError, ClientTimeouts, ServiceError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LogsApiError {
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid sequence token, expected {expected:?}")]
    InvalidSequenceToken { expected: Option<String> },

    #[error("Data already accepted, expected {expected:?}")]
    DataAlreadyAccepted { expected: Option<String> },

    #[error("Invalid log event: {0}")]
    InvalidEvent(String),

    #[error("Service error: {0}")]
    Service(String),

    #[error("Transport error: {0}")]
    Transport(#[source] BoxError),
}

/// A log event ready to be sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    /// Milliseconds since the epoch
    pub timestamp: i64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogStreamInfo {
    pub name: String,
    pub upload_sequence_token: Option<String>,
}

#[async_trait]
pub trait LogsApi: Send + Sync {
    async fn create_log_group(&self, group: &str) -> Result<(), LogsApiError>;

    async fn create_log_stream(&self, group: &str, stream: &str) -> Result<(), LogsApiError>;

    async fn describe_log_streams(&self, group: &str, prefix: &str) -> Result<Vec<LogStreamInfo>, LogsApiError>;

    /// Append events; returns the next sequence token
    async fn put_log_events(
        &self,
        group: &str,
        stream: &str,
        events: Vec<LogEvent>,
        sequence_token: Option<String>,
    ) -> Result<Option<String>, LogsApiError>;
}

#[async_trait]
pub trait LogsApiFactory: Send + Sync {
    async fn create(
        &self,
        connection: &AwsConnectionParams,
        timeouts: ClientTimeouts,
    ) -> Result<Arc<dyn LogsApi>, ServiceError>;
}

/// [`LogsApi`] backed by `aws-sdk-cloudwatchlogs`
#[derive(Clone)]
pub struct SdkLogsApi {
    client: aws_sdk_cloudwatchlogs::Client,
}

impl SdkLogsApi {
    pub fn new(client: aws_sdk_cloudwatchlogs::Client) -> Self {
        Self { client }
    }
}

fn service_or_transport<E>(err: SdkError<E>) -> LogsApiError
where
    E: std::error::Error + Send + Sync + 'static,
{
    if let Some(service) = err.as_service_error() {
        return LogsApiError::Service(service.to_string());
    }
    LogsApiError::Transport(Box::new(err))
}

#[async_trait]
impl LogsApi for SdkLogsApi {
    async fn create_log_group(&self, group: &str) -> Result<(), LogsApiError> {
        match self.client.create_log_group().log_group_name(group).send().await {
            Ok(_) => Ok(()),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_resource_already_exists_exception()) =>
            {
                Err(LogsApiError::AlreadyExists(group.to_string()))
            }
            Err(err) => Err(service_or_transport(err)),
        }
    }

    async fn create_log_stream(&self, group: &str, stream: &str) -> Result<(), LogsApiError> {
        let result = self
            .client
            .create_log_stream()
            .log_group_name(group)
            .log_stream_name(stream)
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_resource_already_exists_exception()) =>
            {
                Err(LogsApiError::AlreadyExists(stream.to_string()))
            }
            Err(err) if err.as_service_error().is_some_and(|e| e.is_resource_not_found_exception()) => {
                Err(LogsApiError::NotFound(group.to_string()))
            }
            Err(err) => Err(service_or_transport(err)),
        }
    }

    async fn describe_log_streams(&self, group: &str, prefix: &str) -> Result<Vec<LogStreamInfo>, LogsApiError> {
        let output = self
            .client
            .describe_log_streams()
            .log_group_name(group)
            .log_stream_name_prefix(prefix)
            .send()
            .await
            .map_err(service_or_transport)?;

        Ok(output
            .log_streams
            .unwrap_or_default()
            .into_iter()
            .filter_map(|stream| {
                stream.log_stream_name.map(|name| LogStreamInfo {
                    name,
                    upload_sequence_token: stream.upload_sequence_token,
                })
            })
            .collect())
    }

    async fn put_log_events(
        &self,
        group: &str,
        stream: &str,
        events: Vec<LogEvent>,
        sequence_token: Option<String>,
    ) -> Result<Option<String>, LogsApiError> {
        let mut request = self
            .client
            .put_log_events()
            .log_group_name(group)
            .log_stream_name(stream)
            .set_sequence_token(sequence_token);

        for event in events {
            let input = InputLogEvent::builder()
                .timestamp(event.timestamp)
                .message(event.message)
                .build()
                .map_err(|e| LogsApiError::InvalidEvent(e.to_string()))?;
            request = request.log_events(input);
        }

        let output = request.send().await.map_err(|err| {
            match err.as_service_error() {
                Some(PutLogEventsError::InvalidSequenceTokenException(e)) => {
                    return LogsApiError::InvalidSequenceToken {
                        expected: e.expected_sequence_token().map(str::to_string),
                    };
                }
                Some(PutLogEventsError::DataAlreadyAcceptedException(e)) => {
                    return LogsApiError::DataAlreadyAccepted {
                        expected: e.expected_sequence_token().map(str::to_string),
                    };
                }
                Some(PutLogEventsError::ResourceNotFoundException(_)) => {
                    return LogsApiError::NotFound(format!("{}/{}", group, stream));
                }
                _ => {}
            }
            service_or_transport(err)
        })?;

        Ok(output.next_sequence_token)
    }
}

/// Default factory building an [`SdkLogsApi`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SdkLogsApiFactory;

#[async_trait]
impl LogsApiFactory for SdkLogsApiFactory {
    async fn create(
        &self,
        connection: &AwsConnectionParams,
        timeouts: ClientTimeouts,
    ) -> Result<Arc<dyn LogsApi>, ServiceError> {
        let config = load_sdk_config(connection, timeouts).await;
        Ok(Arc::new(SdkLogsApi::new(aws_sdk_cloudwatchlogs::Client::new(&config))))
    }
}
