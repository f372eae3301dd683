//! Test utilities for svcstack
//!
//! In-memory stand-ins for the remote AWS services the adapters talk to:
//! - `MemoryLogsService`: CloudWatch Logs groups, streams and sequence tokens
//! - `RecordingMetricsService`: records every metric data request
//! - `RecordingInvoker`: records Lambda invocations and replays scripted results
//! - `LocalFunctionInvoker`: invokes a `LambdaFunction` in-process
//!
//! ## Usage
//!
//! ```rust,no_run
//! use svcstack_test::RecordingInvoker;
//! use svcstack_lambda::LambdaClient;
//!
//! let invoker = RecordingInvoker::new();
//! let client = LambdaClient::new().with_invoker_factory(invoker.factory());
//! ```

pub mod invoker;
pub mod logs;
pub mod metrics;

pub use invoker::{LocalFunctionInvoker, RecordingInvoker};
pub use logs::{MemoryLogsService, StoredEvent};
pub use metrics::RecordingMetricsService;

/// Install a test-friendly tracing subscriber once per process
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}
