//! Debounce coalescing (spec §4.7 trigger 1, §4.7 "All enqueues coalesce").

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Per-key debounce: repeated `trigger` calls within the window reset the
/// deadline rather than scheduling more work. `take_ready` drains keys whose
/// window has elapsed.
pub struct Debouncer {
    window: Duration,
    deadlines: Mutex<HashMap<String, Instant>>,
}

impl Debouncer {
    pub fn new(window_seconds: u64) -> Self {
        Debouncer {
            window: Duration::from_secs(window_seconds),
            deadlines: Mutex::new(HashMap::new()),
        }
    }

    pub fn trigger(&self, key: &str) {
        self.deadlines
            .lock()
            .unwrap()
            .insert(key.to_string(), Instant::now() + self.window);
    }

    pub fn take_ready(&self) -> Vec<String> {
        let now = Instant::now();
        let mut deadlines = self.deadlines.lock().unwrap();
        let ready: Vec<String> = deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &ready {
            deadlines.remove(key);
        }
        ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_triggers_extend_the_window() {
        let debouncer = Debouncer::new(0);
        debouncer.trigger("book1");
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(debouncer.take_ready(), vec!["book1".to_string()]);
    }

    #[test]
    fn not_ready_until_window_elapses() {
        let debouncer = Debouncer::new(60);
        debouncer.trigger("book1");
        assert!(debouncer.take_ready().is_empty());
    }
}
