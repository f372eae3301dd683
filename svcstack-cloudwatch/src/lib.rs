//! CloudWatch adapters for svcstack
//!
//! `CloudWatchLogger` ships toolkit log messages to a CloudWatch Logs stream and
//! `CloudWatchCounters` publishes performance counters as CloudWatch metrics.
//! Both buffer locally and flush on a timer and on close.

pub mod counters;
pub mod logger;
pub mod logs_api;
pub mod metrics_api;
pub mod timer;

pub use counters::{CloudWatchCounters, MAX_METRIC_DATA};
pub use logger::CloudWatchLogger;
pub use logs_api::{LogEvent, LogStreamInfo, LogsApi, LogsApiError, LogsApiFactory, SdkLogsApi, SdkLogsApiFactory};
pub use metrics_api::{
    MetricPoint, MetricUnit, MetricValue, MetricsApi, MetricsApiError, MetricsApiFactory, SdkMetricsApi,
    SdkMetricsApiFactory,
};
pub use timer::FlushTimer;
