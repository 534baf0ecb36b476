//! Named counters shared between a background task and its observers.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// A fixed set of named, thread-safe counters.
///
/// Names are declared up front; increments of unknown names are ignored so a
/// typo never panics a background task.
#[derive(Debug)]
pub struct StatsCounter {
    counters: Vec<(&'static str, AtomicU64)>,
}

impl StatsCounter {
    pub fn new(names: &[&'static str]) -> Self {
        Self {
            counters: names.iter().map(|&n| (n, AtomicU64::new(0))).collect(),
        }
    }

    fn slot(&self, name: &str) -> Option<&AtomicU64> {
        self.counters.iter().find(|(n, _)| *n == name).map(|(_, c)| c)
    }

    pub fn increment(&self, name: &str) {
        self.add(name, 1);
    }

    pub fn add(&self, name: &str, value: u64) {
        if let Some(counter) = self.slot(name) {
            counter.fetch_add(value, Ordering::Relaxed);
        }
    }

    pub fn get(&self, name: &str) -> u64 {
        self.slot(name).map(|c| c.load(Ordering::Relaxed)).unwrap_or(0)
    }

    /// Point-in-time copy of every counter, sorted by name.
    pub fn snapshot(&self) -> BTreeMap<&'static str, u64> {
        self.counters
            .iter()
            .map(|(n, c)| (*n, c.load(Ordering::Relaxed)))
            .collect()
    }

    /// `name=value` pairs joined by spaces, for log lines.
    pub fn render(&self) -> String {
        self.snapshot()
            .iter()
            .map(|(n, v)| format!("{n}={v}"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn unknown_names_are_ignored() {
        let stats = StatsCounter::new(&["sent"]);
        stats.increment("typo");
        assert_eq!(stats.get("typo"), 0);
        assert_eq!(stats.render(), "sent=0");
    }

    #[test]
    fn concurrent_increments_are_counted() {
        let stats = Arc::new(StatsCounter::new(&["sent", "dropped"]));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let s = Arc::clone(&stats);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        s.increment("sent");
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        stats.add("dropped", 3);
        assert_eq!(stats.get("sent"), 400);
        assert_eq!(stats.render(), "dropped=3 sent=400");
    }
}
