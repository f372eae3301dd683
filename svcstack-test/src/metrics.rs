//! Recording CloudWatch metrics service

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use svcstack_cloudwatch::{MetricPoint, MetricsApi, MetricsApiError, MetricsApiFactory};
use svcstack_core::{AwsConnectionParams, ClientTimeouts, ServiceError};

#[derive(Default)]
struct MetricsState {
    requests: Mutex<Vec<(String, Vec<MetricPoint>)>>,
    failing_calls: Mutex<HashSet<usize>>,
    calls: Mutex<usize>,
    connections: Mutex<Vec<AwsConnectionParams>>,
}

/// Metrics service that keeps every `put_metric_data` request
#[derive(Clone, Default)]
pub struct RecordingMetricsService {
    state: Arc<MetricsState>,
}

impl RecordingMetricsService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn factory(&self) -> Arc<dyn MetricsApiFactory> {
        Arc::new(self.clone())
    }

    /// Fail the call with the given zero-based index
    pub fn fail_call(&self, index: usize) {
        self.state.failing_calls.lock().insert(index);
    }

    /// Accepted requests as (namespace, points)
    pub fn requests(&self) -> Vec<(String, Vec<MetricPoint>)> {
        self.state.requests.lock().clone()
    }

    /// Number of points per accepted request
    pub fn chunk_sizes(&self) -> Vec<usize> {
        self.state.requests.lock().iter().map(|(_, points)| points.len()).collect()
    }

    pub fn points(&self) -> Vec<MetricPoint> {
        self.state
            .requests
            .lock()
            .iter()
            .flat_map(|(_, points)| points.clone())
            .collect()
    }

    /// All calls, accepted or failed
    pub fn call_count(&self) -> usize {
        *self.state.calls.lock()
    }

    pub fn connections(&self) -> Vec<AwsConnectionParams> {
        self.state.connections.lock().clone()
    }
}

#[async_trait]
impl MetricsApi for RecordingMetricsService {
    async fn put_metric_data(&self, namespace: &str, data: Vec<MetricPoint>) -> Result<(), MetricsApiError> {
        let index = {
            let mut calls = self.state.calls.lock();
            *calls += 1;
            *calls - 1
        };

        if self.state.failing_calls.lock().contains(&index) {
            return Err(MetricsApiError::Service("InternalServiceFault".to_string()));
        }

        self.state.requests.lock().push((namespace.to_string(), data));
        Ok(())
    }
}

#[async_trait]
impl MetricsApiFactory for RecordingMetricsService {
    async fn create(
        &self,
        connection: &AwsConnectionParams,
        _timeouts: ClientTimeouts,
    ) -> Result<Arc<dyn MetricsApi>, ServiceError> {
        self.state.connections.lock().push(connection.clone());
        Ok(Arc::new(self.clone()))
    }
}
