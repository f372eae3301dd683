//! Performance counters kept in memory until a sink saves them

use crate::error::ServiceError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Semantic kind of a counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterType {
    /// Elapsed-time samples in milliseconds
    Interval,
    LastValue,
    /// Arbitrary value samples
    Statistics,
    Timestamp,
    Increment,
}

/// A single named counter
#[derive(Debug, Clone, PartialEq)]
pub struct Counter {
    pub name: String,
    pub counter_type: CounterType,
    pub last: Option<f64>,
    pub count: Option<i64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub average: Option<f64>,
    pub time: Option<DateTime<Utc>>,
}

impl Counter {
    pub fn new(name: impl Into<String>, counter_type: CounterType) -> Self {
        Self {
            name: name.into(),
            counter_type,
            last: None,
            count: None,
            min: None,
            max: None,
            average: None,
            time: None,
        }
    }

    fn record_sample(&mut self, value: f64) {
        let count = self.count.unwrap_or(0) + 1;
        #[allow(clippy::cast_precision_loss)]
        let n = count as f64;

        self.last = Some(value);
        self.min = Some(self.min.map_or(value, |m| m.min(value)));
        self.max = Some(self.max.map_or(value, |m| m.max(value)));
        self.average = Some((self.average.unwrap_or(0.0) * (n - 1.0) + value) / n);
        self.count = Some(count);
    }
}

/// Persists counter snapshots
#[async_trait]
pub trait CounterSink: Send + Sync {
    async fn save(&self, counters: Vec<Counter>) -> Result<(), ServiceError>;
}

/// Thread-safe counter cache; clones share the same counters
#[derive(Clone, Default)]
pub struct CachedCounters {
    counters: Arc<Mutex<HashMap<String, Counter>>>,
    updated: Arc<AtomicBool>,
}

impl CachedCounters {
    pub fn new() -> Self {
        Self::default()
    }

    fn update(&self, name: &str, counter_type: CounterType, apply: impl FnOnce(&mut Counter)) {
        let mut counters = self.counters.lock();
        let counter = counters
            .entry(name.to_string())
            .or_insert_with(|| Counter::new(name, counter_type));
        if counter.counter_type != counter_type {
            *counter = Counter::new(name, counter_type);
        }
        apply(counter);
        counter.time = Some(Utc::now());
        self.updated.store(true, Ordering::SeqCst);
    }

    pub fn increment(&self, name: &str, value: i64) {
        self.update(name, CounterType::Increment, |c| {
            c.count = Some(c.count.unwrap_or(0) + value);
        });
    }

    pub fn increment_one(&self, name: &str) {
        self.increment(name, 1);
    }

    pub fn stats(&self, name: &str, value: f64) {
        self.update(name, CounterType::Statistics, |c| c.record_sample(value));
    }

    pub fn last(&self, name: &str, value: f64) {
        self.update(name, CounterType::LastValue, |c| c.last = Some(value));
    }

    pub fn timestamp(&self, name: &str, value: DateTime<Utc>) {
        self.update(name, CounterType::Timestamp, |_| {});
        if let Some(counter) = self.counters.lock().get_mut(name) {
            counter.time = Some(value);
        }
    }

    pub fn timestamp_now(&self, name: &str) {
        self.timestamp(name, Utc::now());
    }

    fn record_interval(&self, name: &str, elapsed_ms: f64) {
        self.update(name, CounterType::Interval, |c| c.record_sample(elapsed_ms));
    }

    /// Start timing; the elapsed time is recorded by [`CounterTiming::end_timing`]
    pub fn begin_timing(&self, name: &str) -> CounterTiming {
        CounterTiming {
            counters: self.clone(),
            name: name.to_string(),
            start: Instant::now(),
        }
    }

    pub fn get(&self, name: &str) -> Option<Counter> {
        self.counters.lock().get(name).cloned()
    }

    /// Snapshot sorted by name
    pub fn get_all(&self) -> Vec<Counter> {
        let mut all: Vec<Counter> = self.counters.lock().values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    pub fn clear(&self, name: &str) {
        self.counters.lock().remove(name);
    }

    pub fn clear_all(&self) {
        self.counters.lock().clear();
        self.updated.store(false, Ordering::SeqCst);
    }

    pub fn is_updated(&self) -> bool {
        self.updated.load(Ordering::SeqCst)
    }

    /// Save a snapshot when anything changed since the last dump
    ///
    /// A failed save leaves the cache marked as updated for the next dump.
    pub async fn dump(&self, sink: &dyn CounterSink) -> Result<(), ServiceError> {
        if !self.updated.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        let result = sink.save(self.get_all()).await;
        if result.is_err() {
            self.updated.store(true, Ordering::SeqCst);
        }
        result
    }
}

/// Running timer for an interval counter
pub struct CounterTiming {
    counters: CachedCounters,
    name: String,
    start: Instant,
}

impl CounterTiming {
    pub fn end_timing(self) {
        let elapsed = self.start.elapsed().as_secs_f64() * 1000.0;
        self.counters.record_interval(&self.name, elapsed);
    }
}
