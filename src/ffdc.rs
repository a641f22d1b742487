use std::collections::HashMap;
use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::error;

/// First-failure data capture: every unexpected failure is logged once with
/// where it happened and counted per source.
#[derive(Debug, Default)]
pub struct FailureRecorder {
    counters: RwLock<HashMap<String, Arc<AtomicU64>>>,
}

impl FailureRecorder {

    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, source: &str, site: &str, failure: &dyn Display) {
        error!(source, site, error = %failure, "ffdc");
        self.counter(source).fetch_add(1, Ordering::Relaxed);
    }

    fn counter(&self, source: &str) -> Arc<AtomicU64> {
        if let Ok(counters) = self.counters.read() {
            if let Some(counter) = counters.get(source) {
                return counter.clone();
            }
        }

        // A poisoned lock still holds valid counters.
        let mut counters = match self.counters.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        counters.entry(source.to_string())
            .or_insert_with(|| Arc::new(AtomicU64::new(0)))
            .clone()
    }

    pub fn count(&self, source: &str) -> u64 {
        match self.counters.read() {
            Ok(counters) => counters.get(source).map(|c| c.load(Ordering::Relaxed)).unwrap_or(0),
            Err(poisoned) => poisoned.into_inner().get(source).map(|c| c.load(Ordering::Relaxed)).unwrap_or(0),
        }
    }

    pub fn total(&self) -> u64 {
        match self.counters.read() {
            Ok(counters) => counters.values().map(|c| c.load(Ordering::Relaxed)).sum(),
            Err(poisoned) => poisoned.into_inner().values().map(|c| c.load(Ordering::Relaxed)).sum(),
        }
    }
}
