//! Performance counters published as CloudWatch metrics

use crate::metrics_api::{MetricPoint, MetricUnit, MetricValue, MetricsApi, MetricsApiFactory, SdkMetricsApiFactory};
use crate::timer::{flush_interval, FlushTimer};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use svcstack_core::trace_id::short_id;
use svcstack_core::{
    AwsConnectionResolver, CachedCounters, ClientTimeouts, ConfigParams, Configurable, Counter, CounterSink,
    CounterType, CredentialStore, Discovery, Openable, ResolveOptions, ServiceError,
};
use tracing::{debug, error, info};

const DEFAULT_INTERVAL_MS: u64 = 300_000;
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 30_000;

/// Most data points CloudWatch accepts in one request
pub const MAX_METRIC_DATA: usize = 20;

const INSTANCE_DIMENSION: &str = "InstanceID";

struct MetricsRemote {
    api: Arc<dyn MetricsApi>,
    namespace: String,
    instance: String,
}

/// Converts a counter to a data point; counters without samples yield nothing
fn to_point(counter: &Counter, instance: &str) -> Option<MetricPoint> {
    #[allow(clippy::cast_precision_loss)]
    let (unit, value) = match counter.counter_type {
        CounterType::Increment => (Some(MetricUnit::Count), MetricValue::Value(counter.count? as f64)),
        CounterType::Interval | CounterType::Statistics => {
            let count = counter.count? as f64;
            (
                None,
                MetricValue::Statistics {
                    sample_count: count,
                    sum: count * counter.average?,
                    minimum: counter.min?,
                    maximum: counter.max?,
                },
            )
        }
        CounterType::LastValue => (None, MetricValue::Value(counter.last?)),
        CounterType::Timestamp => (None, MetricValue::Value(counter.time?.timestamp_millis() as f64)),
    };

    Some(MetricPoint {
        name: counter.name.clone(),
        timestamp: counter.time.unwrap_or_else(Utc::now),
        unit,
        value,
        dimensions: vec![(INSTANCE_DIMENSION.to_string(), instance.to_string())],
    })
}

/// Publishes counter snapshots through the remote handle
#[derive(Clone, Default)]
struct MetricsPublisher {
    remote: Arc<tokio::sync::Mutex<Option<MetricsRemote>>>,
}

#[async_trait]
impl CounterSink for MetricsPublisher {
    async fn save(&self, counters: Vec<Counter>) -> Result<(), ServiceError> {
        if counters.is_empty() {
            return Ok(());
        }

        let remote = self.remote.lock().await;
        let remote = remote
            .as_ref()
            .ok_or_else(|| ServiceError::not_opened("NOT_OPENED", "CloudWatch counters are not opened"))?;

        let points: Vec<MetricPoint> = counters
            .iter()
            .filter_map(|counter| to_point(counter, &remote.instance))
            .collect();
        let chunks: Vec<Vec<MetricPoint>> = points.chunks(MAX_METRIC_DATA).map(<[_]>::to_vec).collect();

        debug!(
            namespace = %remote.namespace,
            points = points.len(),
            chunks = chunks.len(),
            "Publishing counters"
        );

        for (index, chunk) in chunks.into_iter().enumerate() {
            if let Err(err) = remote.api.put_metric_data(&remote.namespace, chunk).await {
                error!(namespace = %remote.namespace, chunk = index, error = %err, "Failed to put metric data");
            }
        }
        Ok(())
    }
}

/// Counters that are periodically published to CloudWatch
///
/// Record values through [`CloudWatchCounters::counters`]; the cache is
/// published on every `options.interval` tick and on close.
pub struct CloudWatchCounters {
    resolver: AwsConnectionResolver,
    factory: Arc<dyn MetricsApiFactory>,
    source: String,
    instance: String,
    interval: Duration,
    connect_timeout: Duration,
    counters: CachedCounters,
    publisher: MetricsPublisher,
    timer: Mutex<Option<FlushTimer>>,
}

impl Default for CloudWatchCounters {
    fn default() -> Self {
        Self::new()
    }
}

impl CloudWatchCounters {
    pub fn new() -> Self {
        Self {
            resolver: AwsConnectionResolver::new()
                .with_service("monitoring")
                .with_options(ResolveOptions {
                    require_arn: false,
                    require_credentials: true,
                }),
            factory: Arc::new(SdkMetricsApiFactory),
            source: String::new(),
            instance: short_id(),
            interval: Duration::from_millis(DEFAULT_INTERVAL_MS),
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            counters: CachedCounters::new(),
            publisher: MetricsPublisher::default(),
            timer: Mutex::new(None),
        }
    }

    pub fn with_metrics_factory(mut self, factory: Arc<dyn MetricsApiFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn set_discovery(&mut self, discovery: Arc<dyn Discovery>) {
        self.resolver.set_discovery(discovery);
    }

    pub fn set_credential_store(&mut self, store: Arc<dyn CredentialStore>) {
        self.resolver.set_credential_store(store);
    }

    /// Shared counter cache; clones record into the same counters
    pub fn counters(&self) -> &CachedCounters {
        &self.counters
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Publish the cache if anything changed since the last dump
    pub async fn dump(&self) -> Result<(), ServiceError> {
        self.counters.dump(&self.publisher).await
    }
}

#[async_trait]
impl CounterSink for CloudWatchCounters {
    async fn save(&self, counters: Vec<Counter>) -> Result<(), ServiceError> {
        self.publisher.save(counters).await
    }
}

#[async_trait]
impl Openable for CloudWatchCounters {
    fn is_open(&self) -> bool {
        self.timer.lock().is_some()
    }

    async fn open(&self, trace_id: Option<&str>) -> Result<(), ServiceError> {
        let mut remote = self.publisher.remote.lock().await;
        if remote.is_some() {
            return Ok(());
        }

        if self.source.is_empty() {
            return Err(
                ServiceError::configuration("NO_SOURCE", "Metrics source is not configured").with_trace_id(trace_id)
            );
        }

        let connection = self.resolver.resolve(trace_id).await?;
        let api = self
            .factory
            .create(&connection, ClientTimeouts::connect(self.connect_timeout))
            .await?;

        *remote = Some(MetricsRemote {
            api,
            namespace: self.source.clone(),
            instance: self.instance.clone(),
        });
        drop(remote);

        let counters = self.counters.clone();
        let publisher = self.publisher.clone();
        let timer = FlushTimer::start("cloudwatch-counters", self.interval, move || {
            let counters = counters.clone();
            let publisher = publisher.clone();
            async move {
                if let Err(err) = counters.dump(&publisher).await {
                    error!(error = %err, "Failed to dump counters");
                }
            }
        });
        *self.timer.lock() = Some(timer);

        info!(namespace = %self.source, instance = %self.instance, "Opened CloudWatch counters");
        Ok(())
    }

    async fn close(&self, _trace_id: Option<&str>) -> Result<(), ServiceError> {
        if self.publisher.remote.lock().await.is_some() {
            if let Err(err) = self.dump().await {
                error!(error = %err, "Failed to dump counters on close");
            }
        }

        let timer = self.timer.lock().take();
        if let Some(timer) = timer {
            timer.stop().await;
        }

        if self.publisher.remote.lock().await.take().is_some() {
            info!(namespace = %self.source, "Closed CloudWatch counters");
        }
        Ok(())
    }
}

impl Configurable for CloudWatchCounters {
    fn configure(&mut self, config: &ConfigParams) {
        self.resolver.configure(config);
        self.source = config.get_as_string_with_default("source", &self.source);
        self.instance = config.get_as_string_with_default("instance", &self.instance);
        self.interval = flush_interval(config, DEFAULT_INTERVAL_MS);
        self.connect_timeout =
            config.get_as_millis_with_default("options.connect_timeout", DEFAULT_CONNECT_TIMEOUT_MS);
    }
}
