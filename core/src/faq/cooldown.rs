use std::collections::HashMap;
use std::time::{Duration, Instant};

/// When each FAQ was last served by the intent matcher.
#[derive(Debug, Clone)]
pub struct CooldownTable {
    window: Duration,
    served: HashMap<usize, Instant>,
}

impl CooldownTable {
    pub fn new(window: Duration) -> Self {
        Self { window, served: HashMap::new() }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn is_cool(&self, index: usize, now: Instant) -> bool {
        match self.served.get(&index) {
            Some(at) => now.saturating_duration_since(*at) >= self.window,
            None => true,
        }
    }

    /// Candidates that may be served at `now`, order preserved.
    pub fn filter(&self, candidates: &[usize], now: Instant) -> Vec<usize> {
        candidates.iter().copied().filter(|i| self.is_cool(*i, now)).collect()
    }

    pub fn mark_served(&mut self, index: usize, now: Instant) {
        self.served.insert(index, now);
    }

    pub fn clear(&mut self) {
        self.served.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn served_index_waits_out_the_window() {
        let mut table = CooldownTable::new(Duration::from_secs(30));
        let t0 = Instant::now();
        table.mark_served(3, t0);
        assert!(!table.is_cool(3, t0 + Duration::from_secs(29)));
        assert!(table.is_cool(3, t0 + Duration::from_secs(30)));
        assert_eq!(table.filter(&[1, 3, 4], t0 + Duration::from_secs(1)), vec![1, 4]);
    }
}
