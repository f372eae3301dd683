//! Periodic flush task

use std::future::Future;
use std::time::Duration;
use svcstack_core::ConfigParams;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};

/// `options.interval` in milliseconds; values that are not positive use `default_ms`
pub fn flush_interval(config: &ConfigParams, default_ms: u64) -> Duration {
    match config.get_as_nullable_long("options.interval") {
        Some(millis) if millis > 0 => Duration::from_millis(millis.unsigned_abs()),
        Some(millis) => {
            warn!(interval = millis, default_ms, "Flush interval must be positive, using default");
            Duration::from_millis(default_ms)
        }
        None => Duration::from_millis(default_ms),
    }
}

/// Runs a flush every `period` until stopped
///
/// Each flush is awaited before the next tick, so at most one is in flight.
/// Stopping never interrupts a running flush.
pub struct FlushTimer {
    name: String,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl FlushTimer {
    pub fn start<F, Fut>(name: &str, period: Duration, flush: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown, mut stopped) = oneshot::channel();
        let task_name = name.to_string();

        let handle = tokio::spawn(async move {
            if period.is_zero() {
                warn!(timer = %task_name, "Flush timer has a zero period, periodic flush disabled");
                let _ = stopped.await;
                return;
            }

            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        debug!(timer = %task_name, "Flush timer fired");
                        flush().await;
                    }
                    _ = &mut stopped => break,
                }
            }
        });

        Self {
            name: name.to_string(),
            shutdown: Some(shutdown),
            handle,
        }
    }

    /// Signal the task and wait for it to finish
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Err(err) = self.handle.await {
            warn!(timer = %self.name, error = %err, "Flush timer task failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_flushes_on_interval() {
        let flushes = Arc::new(AtomicUsize::new(0));
        let counter = flushes.clone();
        let timer = FlushTimer::start("test", Duration::from_secs(60), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(flushes.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(100)).await;
        assert_eq!(flushes.load(Ordering::SeqCst), 2);

        timer.stop().await;
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(flushes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_period_never_fires() {
        let flushes = Arc::new(AtomicUsize::new(0));
        let counter = flushes.clone();
        let timer = FlushTimer::start("test", Duration::ZERO, move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(flushes.load(Ordering::SeqCst), 0);
        assert!(!timer.handle.is_finished());

        timer.stop().await;
    }

    #[test]
    fn test_flush_interval_falls_back() {
        let interval = |value: &str| flush_interval(&ConfigParams::from_tuples([("options.interval", value)]), 300_000);

        assert_eq!(interval("1000"), Duration::from_millis(1000));
        assert_eq!(interval("0"), Duration::from_millis(300_000));
        assert_eq!(interval("-5"), Duration::from_millis(300_000));
        assert_eq!(flush_interval(&ConfigParams::new(), 60_000), Duration::from_millis(60_000));
    }
}
