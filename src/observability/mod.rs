use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide metrics handle. Created once in main and handed to each
/// component at construction; registering a name twice returns the existing
/// counter, so components can register independently.
#[derive(Default)]
pub struct Metrics {
    counters: DashMap<String, Arc<AtomicU64>>,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn counter(&self, name: &str) -> Arc<AtomicU64> {
        self.counters.entry(name.to_string()).or_default().clone()
    }

    pub fn labeled_counter(&self, name: &str, label: &str, value: &str) -> Arc<AtomicU64> {
        self.counter(&format!("{name}{{{label}=\"{value}\"}}"))
    }

    pub fn incr(&self, name: &str) {
        self.counter(name).fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_labeled(&self, name: &str, label: &str, value: &str) {
        self.labeled_counter(name, label, value)
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn value(&self, name: &str) -> u64 {
        self.counters
            .get(name)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn labeled_value(&self, name: &str, label: &str, value: &str) -> u64 {
        self.value(&format!("{name}{{{label}=\"{value}\"}}"))
    }

    /// Prometheus text exposition, sorted for stable output.
    pub fn render(&self) -> String {
        let mut lines: Vec<String> = self
            .counters
            .iter()
            .map(|entry| format!("{} {}", entry.key(), entry.value().load(Ordering::Relaxed)))
            .collect();
        lines.sort();
        let mut out = lines.join("\n");
        out.push('\n');
        out
    }
}
