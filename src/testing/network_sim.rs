//! Network condition simulation for testing
//!
//! Models what a consumer observes on a lossy, jittery path: whether an
//! Object arrives and when. Arrivals never go backwards, matching a
//! transport that delivers each Group in order.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const MS: i64 = 1_000_000;

/// Network condition simulator
#[derive(Clone, Debug)]
pub struct NetworkSimulator {
    /// Object loss probability (0.0 to 1.0)
    pub loss_rate: f64,
    /// Jitter range (max extra delay) in nanoseconds
    pub jitter_ns: i64,
    /// Base delay added to every Object in nanoseconds
    pub delay_ns: i64,
    rng: StdRng,
    last_arrival_ns: Option<i64>,
}

impl NetworkSimulator {
    /// Simulator with explicit conditions and a fixed seed
    #[must_use]
    pub fn new(loss_rate: f64, delay_ns: i64, jitter_ns: i64, seed: u64) -> Self {
        Self {
            loss_rate: loss_rate.clamp(0.0, 1.0),
            jitter_ns: jitter_ns.max(0),
            delay_ns: delay_ns.max(0),
            rng: StdRng::seed_from_u64(seed),
            last_arrival_ns: None,
        }
    }

    /// Perfect network (no issues)
    #[must_use]
    pub fn perfect() -> Self {
        Self::new(0.0, 0, 0, 0)
    }

    /// Good `WiFi` conditions
    #[must_use]
    pub fn good_wifi(seed: u64) -> Self {
        Self::new(0.001, 2 * MS, 5 * MS, seed)
    }

    /// Moderate `WiFi` conditions
    #[must_use]
    pub fn moderate_wifi(seed: u64) -> Self {
        Self::new(0.01, 10 * MS, 20 * MS, seed)
    }

    /// Poor `WiFi` conditions
    #[must_use]
    pub fn poor_wifi(seed: u64) -> Self {
        Self::new(0.05, 30 * MS, 50 * MS, seed)
    }

    /// Should the next Object be lost?
    pub fn should_drop(&mut self) -> bool {
        if self.loss_rate <= 0.0 {
            return false;
        }
        self.rng.gen_bool(self.loss_rate)
    }

    /// Delay for the next Object
    pub fn next_delay_ns(&mut self) -> i64 {
        let jitter = if self.jitter_ns > 0 {
            self.rng.gen_range(0..=self.jitter_ns)
        } else {
            0
        };
        self.delay_ns + jitter
    }

    /// Arrival time of an Object sent at `sent_ns`, or `None` if lost
    pub fn arrival_ns(&mut self, sent_ns: i64) -> Option<i64> {
        if self.should_drop() {
            return None;
        }
        let mut arrival = sent_ns.saturating_add(self.next_delay_ns());
        if let Some(last) = self.last_arrival_ns {
            arrival = arrival.max(last);
        }
        self.last_arrival_ns = Some(arrival);
        Some(arrival)
    }

    /// Apply conditions to a sequence of `(item, sent_ns)` pairs
    pub fn deliver<T>(&mut self, sent: impl IntoIterator<Item = (T, i64)>) -> Vec<(T, i64)> {
        sent.into_iter()
            .filter_map(|(item, sent_ns)| self.arrival_ns(sent_ns).map(|at| (item, at)))
            .collect()
    }
}
