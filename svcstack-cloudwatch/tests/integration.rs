//! Integration tests for the CloudWatch logger and counters
//!
//! Both sinks run against in-memory services from svcstack-test.

use std::time::Duration;

use svcstack_cloudwatch::{CloudWatchCounters, CloudWatchLogger, MetricUnit, MetricValue};
use svcstack_core::{ConfigParams, Configurable, ErrorCategory, LogLevel, LogMessage, Logger, Openable};
use svcstack_test::{init_tracing, MemoryLogsService, RecordingMetricsService};

const GROUP: &str = "orders-logs";

fn connection(extra: &[(&str, &str)]) -> ConfigParams {
    let mut pairs = vec![
        ("connection.region", "us-east-1"),
        ("credential.access_id", "A"),
        ("credential.access_key", "B"),
    ];
    pairs.extend_from_slice(extra);
    ConfigParams::from_tuples(pairs)
}

fn logger(logs: &MemoryLogsService, extra: &[(&str, &str)]) -> CloudWatchLogger {
    let mut logger = CloudWatchLogger::new().with_logs_factory(logs.factory());
    let mut pairs = vec![("group", GROUP), ("source", "orders")];
    pairs.extend_from_slice(extra);
    logger.configure(&connection(&pairs));
    logger
}

fn counters(metrics: &RecordingMetricsService, extra: &[(&str, &str)]) -> CloudWatchCounters {
    let mut counters = CloudWatchCounters::new().with_metrics_factory(metrics.factory());
    let mut pairs = vec![("source", "orders"), ("instance", "i-1")];
    pairs.extend_from_slice(extra);
    counters.configure(&connection(&pairs));
    counters
}

// ============================================================================
// Logger
// ============================================================================

#[tokio::test]
async fn test_open_creates_group_and_stream() {
    init_tracing();
    let logs = MemoryLogsService::new();
    let logger = logger(&logs, &[("stream", "s1")]);

    logger.open(Some("t1")).await.unwrap();
    assert!(logger.is_open());
    assert!(logs.has_group(GROUP));
    assert!(logs.has_stream(GROUP, "s1"));
    assert_eq!(logs.connections()[0].region().as_deref(), Some("us-east-1"));

    logger.open(None).await.unwrap();
    assert_eq!(logs.call_count("CreateLogGroup"), 1);

    logger.close(None).await.unwrap();
    assert!(!logger.is_open());
}

#[tokio::test]
async fn test_open_without_group() {
    let logs = MemoryLogsService::new();
    let mut logger = CloudWatchLogger::new().with_logs_factory(logs.factory());
    logger.configure(&connection(&[]));

    let err = logger.open(None).await.unwrap_err();
    assert!(err.is(ErrorCategory::Configuration, "NO_LOG_GROUP"));
    assert!(logs.calls().is_empty());
}

#[tokio::test]
async fn test_open_without_credentials() {
    let logs = MemoryLogsService::new();
    let mut logger = CloudWatchLogger::new().with_logs_factory(logs.factory());
    logger.configure(&ConfigParams::from_tuples([("group", GROUP), ("connection.region", "us-east-1")]));

    let err = logger.open(None).await.unwrap_err();
    assert_eq!(err.code, "NO_ACCESS_ID");
}

#[tokio::test]
async fn test_close_flushes_cache() {
    let logs = MemoryLogsService::new();
    let logger = logger(&logs, &[("stream", "s1")]);
    logger.open(None).await.unwrap();

    logger.info(Some("t1"), "Order created");
    logger.debug(Some("t1"), "Below the configured level");
    assert_eq!(logger.cached(), 1);
    assert!(logs.messages(GROUP, "s1").is_empty());

    logger.close(None).await.unwrap();
    assert_eq!(logs.messages(GROUP, "s1"), vec!["[orders:t1:INFO] Order created"]);
    assert_eq!(logger.cached(), 0);
}

#[tokio::test]
async fn test_existing_stream_continues() {
    let logs = MemoryLogsService::new();
    logs.seed_event(GROUP, "s1", "written earlier");

    let logger = logger(&logs, &[("stream", "s1")]);
    logger.open(None).await.unwrap();
    logger.warn(None, "Restarted");
    logger.dump().await;

    assert_eq!(
        logs.messages(GROUP, "s1"),
        vec!["written earlier", "[orders:---:WARN] Restarted"]
    );
    assert_eq!(logs.call_count("PutLogEvents"), 1);
}

#[tokio::test]
async fn test_stale_token_is_retried() {
    let logs = MemoryLogsService::new();
    let logger = logger(&logs, &[("stream", "s1")]);
    logger.open(None).await.unwrap();

    logs.simulate_concurrent_writes(1);
    logger.info(None, "First");
    logger.info(None, "Second");
    logger.dump().await;

    assert_eq!(logs.call_count("PutLogEvents"), 2);
    assert_eq!(
        logs.messages(GROUP, "s1"),
        vec!["[orders:---:INFO] First", "[orders:---:INFO] Second"]
    );
}

#[tokio::test]
async fn test_write_failures_are_dropped() {
    let logs = MemoryLogsService::new();
    let logger = logger(&logs, &[("stream", "s1")]);
    logger.open(None).await.unwrap();

    logs.set_unavailable(true);
    logger.info(None, "Lost");
    logger.dump().await;
    assert_eq!(logger.cached(), 0);

    logger
        .save(vec![LogMessage::new(LogLevel::Info, None, "Also lost")])
        .await
        .unwrap();
    assert!(logs.messages(GROUP, "s1").is_empty());

    logs.set_unavailable(false);
    logger.info(None, "Delivered");
    logger.close(None).await.unwrap();
    assert_eq!(logs.messages(GROUP, "s1"), vec!["[orders:---:INFO] Delivered"]);
}

#[tokio::test]
async fn test_error_message_format() {
    let logs = MemoryLogsService::new();
    let logger = logger(&logs, &[("stream", "s1")]);
    logger.open(None).await.unwrap();

    let err = svcstack_core::ServiceError::invocation("CALL_FAILED", "Connection refused");
    logger.error(Some("t2"), Some(&err), "Payment failed");
    logger.close(None).await.unwrap();

    assert_eq!(
        logs.messages(GROUP, "s1"),
        vec!["[orders:t2:ERROR] Payment failed: Connection refused"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_logger_flushes_on_interval() {
    let logs = MemoryLogsService::new();
    let logger = logger(&logs, &[("stream", "s1"), ("options.interval", "1000")]);
    logger.open(None).await.unwrap();

    logger.info(None, "Tick");
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(logs.messages(GROUP, "s1").is_empty());

    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert_eq!(logs.messages(GROUP, "s1"), vec!["[orders:---:INFO] Tick"]);

    logger.close(None).await.unwrap();
}

// ============================================================================
// Counters
// ============================================================================

#[tokio::test]
async fn test_counters_are_chunked() {
    init_tracing();
    let metrics = RecordingMetricsService::new();
    let counters = counters(&metrics, &[]);
    counters.open(None).await.unwrap();

    for i in 0..45 {
        counters.counters().increment_one(&format!("orders.counter_{:02}", i));
    }
    counters.dump().await.unwrap();

    assert_eq!(metrics.chunk_sizes(), vec![20, 20, 5]);
    let requests = metrics.requests();
    assert!(requests.iter().all(|(namespace, _)| namespace == "orders"));

    let point = &requests[0].1[0];
    assert_eq!(point.name, "orders.counter_00");
    assert_eq!(point.unit, Some(MetricUnit::Count));
    assert_eq!(point.value, MetricValue::Value(1.0));
    assert_eq!(point.dimensions, vec![("InstanceID".to_string(), "i-1".to_string())]);

    counters.close(None).await.unwrap();
}

#[tokio::test]
async fn test_failed_chunk_does_not_stop_others() {
    let metrics = RecordingMetricsService::new();
    metrics.fail_call(0);
    let counters = counters(&metrics, &[]);
    counters.open(None).await.unwrap();

    for i in 0..45 {
        counters.counters().increment_one(&format!("orders.counter_{:02}", i));
    }
    counters.dump().await.unwrap();

    assert_eq!(metrics.call_count(), 3);
    assert_eq!(metrics.chunk_sizes(), vec![20, 5]);
}

#[tokio::test]
async fn test_timing_becomes_statistics() {
    let metrics = RecordingMetricsService::new();
    let counters = counters(&metrics, &[]);
    counters.open(None).await.unwrap();

    counters.counters().begin_timing("orders.exec_time").end_timing();
    counters.counters().begin_timing("orders.exec_time").end_timing();
    counters.close(None).await.unwrap();

    let points = metrics.points();
    assert_eq!(points.len(), 1);
    match points[0].value {
        MetricValue::Statistics { sample_count, .. } => assert_eq!(sample_count, 2.0),
        MetricValue::Value(_) => panic!("expected a statistic set"),
    }
}

#[tokio::test]
async fn test_dump_skips_unchanged_counters() {
    let metrics = RecordingMetricsService::new();
    let counters = counters(&metrics, &[]);
    counters.open(None).await.unwrap();

    counters.dump().await.unwrap();
    assert_eq!(metrics.call_count(), 0);

    counters.counters().increment_one("orders.calls");
    counters.dump().await.unwrap();
    counters.dump().await.unwrap();
    assert_eq!(metrics.call_count(), 1);
}

#[tokio::test]
async fn test_counters_open_without_source() {
    let metrics = RecordingMetricsService::new();
    let mut counters = CloudWatchCounters::new().with_metrics_factory(metrics.factory());
    counters.configure(&connection(&[]));

    let err = counters.open(None).await.unwrap_err();
    assert!(err.is(ErrorCategory::Configuration, "NO_SOURCE"));
}

#[tokio::test]
async fn test_dump_before_open() {
    let metrics = RecordingMetricsService::new();
    let counters = counters(&metrics, &[]);
    counters.counters().increment_one("orders.calls");

    let err = counters.dump().await.unwrap_err();
    assert_eq!(err.category, ErrorCategory::NotOpened);

    counters.open(None).await.unwrap();
    counters.dump().await.unwrap();
    assert_eq!(metrics.call_count(), 1);
    assert_eq!(metrics.points()[0].name, "orders.calls");
}

#[tokio::test(start_paused = true)]
async fn test_zero_interval_keeps_default_schedule() {
    let logs = MemoryLogsService::new();
    let logger = logger(&logs, &[("stream", "s1"), ("options.interval", "0")]);
    logger.open(None).await.unwrap();

    logger.info(None, "Pending");
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(logs.messages(GROUP, "s1").is_empty());

    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(logs.messages(GROUP, "s1"), vec!["[orders:---:INFO] Pending"]);

    logger.close(None).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_counters_publish_on_interval() {
    let metrics = RecordingMetricsService::new();
    let counters = counters(&metrics, &[("options.interval", "1000")]);
    counters.open(None).await.unwrap();

    counters.counters().increment_one("orders.calls");
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(metrics.call_count(), 1);

    counters.close(None).await.unwrap();
    assert_eq!(metrics.call_count(), 1);
}
