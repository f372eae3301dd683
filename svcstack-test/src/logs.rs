//! In-memory CloudWatch Logs

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use svcstack_cloudwatch::{LogEvent, LogStreamInfo, LogsApi, LogsApiError, LogsApiFactory};
use svcstack_core::{AwsConnectionParams, ClientTimeouts, ServiceError};
use tracing::debug;

/// A log group containing multiple streams
struct LogGroup {
    streams: DashMap<String, LogStream>,
}

/// A log stream containing events
struct LogStream {
    upload_sequence_token: Option<String>,
    events: Vec<StoredEvent>,
}

/// A single stored log event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEvent {
    pub timestamp: i64,
    pub message: String,
    pub ingestion_time: i64,
}

#[derive(Default)]
struct LogsState {
    log_groups: DashMap<String, LogGroup>,
    calls: Mutex<Vec<String>>,
    connections: Mutex<Vec<AwsConnectionParams>>,
    concurrent_writes: AtomicUsize,
    unavailable: AtomicBool,
    tokens: AtomicU64,
}

/// CloudWatch Logs service kept in memory
///
/// Sequence tokens behave like the real service: every accepted put issues a
/// new token, and a put with any other token is rejected with the expected one.
#[derive(Clone, Default)]
pub struct MemoryLogsService {
    state: Arc<LogsState>,
}

impl MemoryLogsService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory handing out this service; records the connections it was given
    pub fn factory(&self) -> Arc<dyn LogsApiFactory> {
        Arc::new(self.clone())
    }

    /// After each of the next `count` describe calls, another writer appends to
    /// the described stream and its token moves on
    pub fn simulate_concurrent_writes(&self, count: usize) {
        self.state.concurrent_writes.store(count, Ordering::SeqCst);
    }

    /// Make every put fail with a service error
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Create a stream holding one event, as if written by an earlier process
    pub fn seed_event(&self, group: &str, stream: &str, message: &str) {
        let timestamp = Utc::now().timestamp_millis();
        let token = self.next_token();
        let group = self
            .state
            .log_groups
            .entry(group.to_string())
            .or_insert_with(|| LogGroup {
                streams: DashMap::new(),
            });
        let mut stream = group.streams.entry(stream.to_string()).or_insert_with(|| LogStream {
            upload_sequence_token: None,
            events: Vec::new(),
        });
        stream.events.push(StoredEvent {
            timestamp,
            message: message.to_string(),
            ingestion_time: timestamp,
        });
        stream.upload_sequence_token = Some(token);
    }

    pub fn has_group(&self, group: &str) -> bool {
        self.state.log_groups.contains_key(group)
    }

    pub fn has_stream(&self, group: &str, stream: &str) -> bool {
        self.state
            .log_groups
            .get(group)
            .is_some_and(|g| g.streams.contains_key(stream))
    }

    pub fn sequence_token(&self, group: &str, stream: &str) -> Option<String> {
        let group = self.state.log_groups.get(group)?;
        let stream = group.streams.get(stream)?;
        stream.upload_sequence_token.clone()
    }

    pub fn events(&self, group: &str, stream: &str) -> Vec<StoredEvent> {
        self.state
            .log_groups
            .get(group)
            .and_then(|g| g.streams.get(stream).map(|s| s.events.clone()))
            .unwrap_or_default()
    }

    pub fn messages(&self, group: &str, stream: &str) -> Vec<String> {
        self.events(group, stream).into_iter().map(|e| e.message).collect()
    }

    /// Operation names in call order
    pub fn calls(&self) -> Vec<String> {
        self.state.calls.lock().clone()
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.state.calls.lock().iter().filter(|c| *c == operation).count()
    }

    pub fn connections(&self) -> Vec<AwsConnectionParams> {
        self.state.connections.lock().clone()
    }

    fn record(&self, operation: &str) {
        self.state.calls.lock().push(operation.to_string());
    }

    fn next_token(&self) -> String {
        format!("{:016x}", self.state.tokens.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn take_concurrent_write(&self) -> bool {
        self.state
            .concurrent_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl LogsApi for MemoryLogsService {
    async fn create_log_group(&self, group: &str) -> Result<(), LogsApiError> {
        self.record("CreateLogGroup");
        if self.state.log_groups.contains_key(group) {
            return Err(LogsApiError::AlreadyExists(group.to_string()));
        }
        self.state.log_groups.insert(
            group.to_string(),
            LogGroup {
                streams: DashMap::new(),
            },
        );
        debug!(group = %group, "Created log group");
        Ok(())
    }

    async fn create_log_stream(&self, group: &str, stream: &str) -> Result<(), LogsApiError> {
        self.record("CreateLogStream");
        let log_group = self
            .state
            .log_groups
            .get(group)
            .ok_or_else(|| LogsApiError::NotFound(group.to_string()))?;

        if log_group.streams.contains_key(stream) {
            return Err(LogsApiError::AlreadyExists(stream.to_string()));
        }
        log_group.streams.insert(
            stream.to_string(),
            LogStream {
                upload_sequence_token: None,
                events: Vec::new(),
            },
        );
        Ok(())
    }

    async fn describe_log_streams(&self, group: &str, prefix: &str) -> Result<Vec<LogStreamInfo>, LogsApiError> {
        self.record("DescribeLogStreams");
        let log_group = self
            .state
            .log_groups
            .get(group)
            .ok_or_else(|| LogsApiError::NotFound(group.to_string()))?;

        let mut streams: Vec<LogStreamInfo> = log_group
            .streams
            .iter()
            .filter(|s| s.key().starts_with(prefix))
            .map(|s| LogStreamInfo {
                name: s.key().clone(),
                upload_sequence_token: s.upload_sequence_token.clone(),
            })
            .collect();
        streams.sort_by(|a, b| a.name.cmp(&b.name));

        if self.take_concurrent_write() {
            for info in &streams {
                if let Some(mut stream) = log_group.streams.get_mut(&info.name) {
                    stream.upload_sequence_token = Some(self.next_token());
                }
            }
        }

        Ok(streams)
    }

    async fn put_log_events(
        &self,
        group: &str,
        stream: &str,
        events: Vec<LogEvent>,
        sequence_token: Option<String>,
    ) -> Result<Option<String>, LogsApiError> {
        self.record("PutLogEvents");
        if self.state.unavailable.load(Ordering::SeqCst) {
            return Err(LogsApiError::Service("ServiceUnavailableException".to_string()));
        }

        let log_group = self
            .state
            .log_groups
            .get(group)
            .ok_or_else(|| LogsApiError::NotFound(group.to_string()))?;
        let mut log_stream = log_group
            .streams
            .get_mut(stream)
            .ok_or_else(|| LogsApiError::NotFound(stream.to_string()))?;

        if log_stream.upload_sequence_token != sequence_token {
            return Err(LogsApiError::InvalidSequenceToken {
                expected: log_stream.upload_sequence_token.clone(),
            });
        }

        let ingestion_time = Utc::now().timestamp_millis();
        for event in events {
            log_stream.events.push(StoredEvent {
                timestamp: event.timestamp,
                message: event.message,
                ingestion_time,
            });
        }

        let next = self.next_token();
        log_stream.upload_sequence_token = Some(next.clone());
        Ok(Some(next))
    }
}

#[async_trait]
impl LogsApiFactory for MemoryLogsService {
    async fn create(
        &self,
        connection: &AwsConnectionParams,
        _timeouts: ClientTimeouts,
    ) -> Result<Arc<dyn LogsApi>, ServiceError> {
        self.state.connections.lock().push(connection.clone());
        Ok(Arc::new(self.clone()))
    }
}
