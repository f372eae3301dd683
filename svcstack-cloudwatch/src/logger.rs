//! Logger that buffers messages and ships them to CloudWatch Logs

use crate::logs_api::{LogEvent, LogsApi, LogsApiError, LogsApiFactory, SdkLogsApiFactory};
use crate::timer::{flush_interval, FlushTimer};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use svcstack_core::trace_id::short_id;
use svcstack_core::{
    AwsConnectionResolver, ClientTimeouts, ConfigParams, Configurable, CredentialStore, Discovery, LogLevel,
    LogMessage, Logger, Openable, ResolveOptions, ServiceError,
};
use tracing::{debug, error, info, warn};

const DEFAULT_INTERVAL_MS: u64 = 300_000;
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_MAX_CACHE_SIZE: usize = 100;

struct LogsRemote {
    api: Arc<dyn LogsApi>,
    group: String,
    stream: String,
    last_token: Option<String>,
}

impl LogsRemote {
    /// Current upload token of the stream, or the last known one
    async fn fetch_token(&self) -> Option<String> {
        match self.api.describe_log_streams(&self.group, &self.stream).await {
            Ok(streams) => streams
                .into_iter()
                .find(|s| s.name == self.stream)
                .and_then(|s| s.upload_sequence_token),
            Err(err) => {
                warn!(group = %self.group, stream = %self.stream, error = %err, "Failed to describe log stream");
                self.last_token.clone()
            }
        }
    }

    async fn put(&mut self, events: Vec<LogEvent>) {
        let token = self.fetch_token().await;

        let result = match self
            .api
            .put_log_events(&self.group, &self.stream, events.clone(), token)
            .await
        {
            Err(LogsApiError::InvalidSequenceToken { expected }) => {
                debug!(group = %self.group, stream = %self.stream, "Sequence token was stale, retrying");
                let token = self.fetch_token().await.or(expected);
                self.api
                    .put_log_events(&self.group, &self.stream, events, token)
                    .await
            }
            other => other,
        };

        match result {
            Ok(next) => self.last_token = next,
            Err(LogsApiError::DataAlreadyAccepted { expected }) => self.last_token = expected,
            Err(err) => {
                error!(group = %self.group, stream = %self.stream, error = %err, "Failed to write log events");
            }
        }
    }
}

fn format_message(message: &LogMessage) -> String {
    let mut line = format!(
        "[{}:{}:{}] {}",
        message.source.as_deref().unwrap_or("---"),
        message.trace_id.as_deref().unwrap_or("---"),
        message.level,
        message.message
    );

    if let Some(error) = &message.error {
        line.push_str(if message.message.is_empty() { "Error: " } else { ": " });
        line.push_str(&error.message);
        if let Some(cause) = &error.cause {
            line.push_str(" Caused by: ");
            line.push_str(cause);
        }
    }
    line
}

/// Buffered messages and the remote handle they are flushed to
#[derive(Clone, Default)]
struct LogBuffer {
    cache: Arc<Mutex<VecDeque<LogMessage>>>,
    remote: Arc<tokio::sync::Mutex<Option<LogsRemote>>>,
}

impl LogBuffer {
    fn push(&self, message: LogMessage, max_cache_size: usize) {
        let mut cache = self.cache.lock();
        cache.push_back(message);
        while cache.len() > max_cache_size {
            cache.pop_front();
        }
    }

    async fn dump(&self) {
        let mut remote = self.remote.lock().await;
        let Some(remote) = remote.as_mut() else {
            return;
        };

        let messages: Vec<LogMessage> = self.cache.lock().drain(..).collect();
        if !messages.is_empty() {
            Self::write(remote, messages).await;
        }
    }

    async fn save(&self, messages: Vec<LogMessage>) -> Result<(), ServiceError> {
        if messages.is_empty() {
            return Ok(());
        }

        let mut remote = self.remote.lock().await;
        let remote = remote
            .as_mut()
            .ok_or_else(|| ServiceError::not_opened("NOT_OPENED", "CloudWatch logger is not opened"))?;
        Self::write(remote, messages).await;
        Ok(())
    }

    async fn write(remote: &mut LogsRemote, mut messages: Vec<LogMessage>) {
        messages.sort_by_key(|m| m.time);
        let events = messages
            .iter()
            .map(|m| LogEvent {
                timestamp: m.time.timestamp_millis(),
                message: format_message(m),
            })
            .collect();
        remote.put(events).await;
    }
}

/// Logger backed by a CloudWatch Logs stream
///
/// Messages are cached in memory and written on every `options.interval` tick
/// and on close. Write failures are reported to `tracing` and dropped.
pub struct CloudWatchLogger {
    resolver: AwsConnectionResolver,
    factory: Arc<dyn LogsApiFactory>,
    group: String,
    stream: String,
    source: Option<String>,
    level: LogLevel,
    interval: Duration,
    connect_timeout: Duration,
    max_cache_size: usize,
    buffer: LogBuffer,
    timer: Mutex<Option<FlushTimer>>,
}

impl Default for CloudWatchLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl CloudWatchLogger {
    pub fn new() -> Self {
        Self {
            resolver: AwsConnectionResolver::new()
                .with_service("logs")
                .with_options(ResolveOptions {
                    require_arn: false,
                    require_credentials: true,
                }),
            factory: Arc::new(SdkLogsApiFactory),
            group: String::new(),
            stream: short_id(),
            source: None,
            level: LogLevel::Info,
            interval: Duration::from_millis(DEFAULT_INTERVAL_MS),
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            max_cache_size: DEFAULT_MAX_CACHE_SIZE,
            buffer: LogBuffer::default(),
            timer: Mutex::new(None),
        }
    }

    pub fn with_logs_factory(mut self, factory: Arc<dyn LogsApiFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn set_discovery(&mut self, discovery: Arc<dyn Discovery>) {
        self.resolver.set_discovery(discovery);
    }

    pub fn set_credential_store(&mut self, store: Arc<dyn CredentialStore>) {
        self.resolver.set_credential_store(store);
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn cached(&self) -> usize {
        self.buffer.cache.lock().len()
    }

    /// Write the cached messages now; a no-op while closed
    pub async fn dump(&self) {
        self.buffer.dump().await;
    }

    /// Write `messages` directly, bypassing the cache
    pub async fn save(&self, messages: Vec<LogMessage>) -> Result<(), ServiceError> {
        self.buffer.save(messages).await
    }
}

impl Logger for CloudWatchLogger {
    fn level(&self) -> LogLevel {
        self.level
    }

    fn write(&self, mut message: LogMessage) {
        if message.source.is_none() {
            message.source = self.source.clone();
        }
        self.buffer.push(message, self.max_cache_size);
    }
}

#[async_trait]
impl Openable for CloudWatchLogger {
    fn is_open(&self) -> bool {
        self.timer.lock().is_some()
    }

    async fn open(&self, trace_id: Option<&str>) -> Result<(), ServiceError> {
        let mut remote = self.buffer.remote.lock().await;
        if remote.is_some() {
            return Ok(());
        }

        if self.group.is_empty() {
            return Err(
                ServiceError::configuration("NO_LOG_GROUP", "Log group is not configured").with_trace_id(trace_id)
            );
        }

        let connection = self.resolver.resolve(trace_id).await?;
        let api = self
            .factory
            .create(&connection, ClientTimeouts::connect(self.connect_timeout))
            .await?;

        match api.create_log_group(&self.group).await {
            Ok(()) | Err(LogsApiError::AlreadyExists(_)) => {}
            Err(err) => {
                return Err(ServiceError::invocation(
                    "OPEN_FAILED",
                    format!("Failed to create log group {}", self.group),
                )
                .with_cause(err)
                .with_trace_id(trace_id))
            }
        }

        let mut opened = LogsRemote {
            api,
            group: self.group.clone(),
            stream: self.stream.clone(),
            last_token: None,
        };

        match opened.api.create_log_stream(&self.group, &self.stream).await {
            Ok(()) => {}
            Err(LogsApiError::AlreadyExists(_)) => {
                opened.last_token = opened.fetch_token().await;
            }
            Err(err) => {
                return Err(ServiceError::invocation(
                    "OPEN_FAILED",
                    format!("Failed to create log stream {}", self.stream),
                )
                .with_cause(err)
                .with_trace_id(trace_id))
            }
        }

        *remote = Some(opened);
        drop(remote);

        let buffer = self.buffer.clone();
        let timer = FlushTimer::start("cloudwatch-logger", self.interval, move || {
            let buffer = buffer.clone();
            async move { buffer.dump().await }
        });
        *self.timer.lock() = Some(timer);

        info!(group = %self.group, stream = %self.stream, "Opened CloudWatch logger");
        Ok(())
    }

    async fn close(&self, _trace_id: Option<&str>) -> Result<(), ServiceError> {
        self.buffer.dump().await;

        let timer = self.timer.lock().take();
        if let Some(timer) = timer {
            timer.stop().await;
        }

        if self.buffer.remote.lock().await.take().is_some() {
            info!(group = %self.group, stream = %self.stream, "Closed CloudWatch logger");
        }
        Ok(())
    }
}

impl Configurable for CloudWatchLogger {
    fn configure(&mut self, config: &ConfigParams) {
        self.resolver.configure(config);
        self.group = config.get_as_string_with_default("group", &self.group);
        self.stream = config.get_as_string_with_default("stream", &self.stream);
        self.source = config.get_as_nullable_string("source").or(self.source.take());
        if let Some(level) = config.get_as_nullable_string("level").and_then(|l| LogLevel::parse(&l)) {
            self.level = level;
        }
        self.interval = flush_interval(config, DEFAULT_INTERVAL_MS);
        self.connect_timeout =
            config.get_as_millis_with_default("options.connect_timeout", DEFAULT_CONNECT_TIMEOUT_MS);
        self.max_cache_size = config
            .get_as_nullable_long("options.max_cache_size")
            .and_then(|size| usize::try_from(size).ok())
            .unwrap_or(DEFAULT_MAX_CACHE_SIZE);
    }
}
