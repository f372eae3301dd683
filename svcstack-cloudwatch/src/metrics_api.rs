//! CloudWatch metrics operations used by the counters

use async_trait::async_trait;
use aws_sdk_cloudwatch::error::SdkError;
use aws_sdk_cloudwatch::primitives::DateTime;
use aws_sdk_cloudwatch::types::{Dimension, MetricDatum, StandardUnit, StatisticSet};
use chrono::Utc;
use std::sync::Arc;
use svcstack_core::{load_sdk_config, AwsConnectionParams, BoxError, ClientTimeouts, ServiceError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricsApiError {
    #[error("Invalid metric datum: {0}")]
    InvalidDatum(String),

    #[error("Service error: {0}")]
    Service(String),

    #[error("Transport error: {0}")]
    Transport(#[source] BoxError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricUnit {
    Count,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Value(f64),
    Statistics {
        sample_count: f64,
        sum: f64,
        minimum: f64,
        maximum: f64,
    },
}

/// One metric data point
#[derive(Debug, Clone, PartialEq)]
pub struct MetricPoint {
    pub name: String,
    pub timestamp: chrono::DateTime<Utc>,
    pub unit: Option<MetricUnit>,
    pub value: MetricValue,
    pub dimensions: Vec<(String, String)>,
}

#[async_trait]
pub trait MetricsApi: Send + Sync {
    async fn put_metric_data(&self, namespace: &str, data: Vec<MetricPoint>) -> Result<(), MetricsApiError>;
}

#[async_trait]
pub trait MetricsApiFactory: Send + Sync {
    async fn create(
        &self,
        connection: &AwsConnectionParams,
        timeouts: ClientTimeouts,
    ) -> Result<Arc<dyn MetricsApi>, ServiceError>;
}

/// [`MetricsApi`] backed by `aws-sdk-cloudwatch`
#[derive(Clone)]
pub struct SdkMetricsApi {
    client: aws_sdk_cloudwatch::Client,
}

impl SdkMetricsApi {
    pub fn new(client: aws_sdk_cloudwatch::Client) -> Self {
        Self { client }
    }
}

fn invalid<E: std::fmt::Display>(err: E) -> MetricsApiError {
    MetricsApiError::InvalidDatum(err.to_string())
}

fn to_datum(point: MetricPoint) -> Result<MetricDatum, MetricsApiError> {
    let mut builder = MetricDatum::builder()
        .metric_name(point.name)
        .timestamp(DateTime::from_millis(point.timestamp.timestamp_millis()))
        .set_unit(point.unit.map(|unit| match unit {
            MetricUnit::Count => StandardUnit::Count,
        }));

    builder = match point.value {
        MetricValue::Value(value) => builder.value(value),
        MetricValue::Statistics {
            sample_count,
            sum,
            minimum,
            maximum,
        } => builder.statistic_values(
            StatisticSet::builder()
                .sample_count(sample_count)
                .sum(sum)
                .minimum(minimum)
                .maximum(maximum)
                .build(),
        ),
    };

    for (name, value) in point.dimensions {
        builder = builder.dimensions(Dimension::builder().name(name).value(value).build());
    }

    Ok(builder.build())
}

#[async_trait]
impl MetricsApi for SdkMetricsApi {
    async fn put_metric_data(&self, namespace: &str, data: Vec<MetricPoint>) -> Result<(), MetricsApiError> {
        let data = data.into_iter().map(to_datum).collect::<Result<Vec<_>, _>>()?;

        match self
            .client
            .put_metric_data()
            .namespace(namespace)
            .set_metric_data(Some(data))
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(SdkError::ServiceError(err)) => Err(MetricsApiError::Service(err.err().to_string())),
            Err(err) => Err(MetricsApiError::Transport(Box::new(err))),
        }
    }
}

/// Default factory building an [`SdkMetricsApi`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SdkMetricsApiFactory;

#[async_trait]
impl MetricsApiFactory for SdkMetricsApiFactory {
    async fn create(
        &self,
        connection: &AwsConnectionParams,
        timeouts: ClientTimeouts,
    ) -> Result<Arc<dyn MetricsApi>, ServiceError> {
        let config = load_sdk_config(connection, timeouts).await;
        Ok(Arc::new(SdkMetricsApi::new(aws_sdk_cloudwatch::Client::new(&config))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datum_from_statistics() {
        let point = MetricPoint {
            name: "orders.get.exec_time".to_string(),
            timestamp: Utc::now(),
            unit: None,
            value: MetricValue::Statistics {
                sample_count: 2.0,
                sum: 30.0,
                minimum: 10.0,
                maximum: 20.0,
            },
            dimensions: vec![("InstanceID".to_string(), "i-1".to_string())],
        };

        assert!(to_datum(point).is_ok());
    }

    #[test]
    fn test_datum_from_value() {
        let point = MetricPoint {
            name: "orders.get.exec_count".to_string(),
            timestamp: Utc::now(),
            unit: Some(MetricUnit::Count),
            value: MetricValue::Value(3.0),
            dimensions: Vec::new(),
        };

        assert!(to_datum(point).is_ok());
    }
}
