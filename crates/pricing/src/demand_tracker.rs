//! Sliding window of recent demand per product.
//!
//! Each order event contributes `units` demand signals stamped with the
//! event time. Entries age out lazily: only a write for the same product
//! evicts, reads never do. A read can therefore see a slightly stale count
//! for a product that has gone quiet, which is fine because every write
//! reprices against the evicted truth.

use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};

use dynprice_core::ProductId;

/// Length of the demand window.
pub const DEMAND_WINDOW_SECS: i64 = 120;

/// `units` demand signals recorded at the same instant.
///
/// Stored run-length encoded so a single large order costs one entry
/// instead of one timestamp per unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DemandEntry {
    at: DateTime<Utc>,
    units: usize,
}

#[derive(Debug, Default)]
struct DemandWindow {
    entries: VecDeque<DemandEntry>,
    total: usize,
}

impl DemandWindow {
    fn push(&mut self, at: DateTime<Utc>, units: usize) {
        self.entries.push_back(DemandEntry { at, units });
        self.total = self.total.saturating_add(units);
    }

    /// Drop every entry strictly older than `cutoff`.
    fn evict_before(&mut self, cutoff: DateTime<Utc>) {
        // Events may arrive out of order, so the deque is not guaranteed sorted.
        let before = self.entries.len();
        self.entries.retain(|e| e.at >= cutoff);
        if self.entries.len() != before {
            // `total` saturates, so it cannot be decremented back to the true count.
            self.total = self
                .entries
                .iter()
                .fold(0usize, |acc, e| acc.saturating_add(e.units));
        }
    }
}

/// Product id -> demand window.
#[derive(Debug)]
pub struct DemandTracker {
    window: Duration,
    inner: RwLock<HashMap<ProductId, DemandWindow>>,
}

impl Default for DemandTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl DemandTracker {
    pub fn new() -> Self {
        Self {
            window: Duration::seconds(DEMAND_WINDOW_SECS),
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Record `units` demand signals at `at`, then evict entries of this
    /// product older than `at - window`. Returns the count after eviction.
    pub fn record_demand(&self, product_id: ProductId, units: usize, at: DateTime<Utc>) -> usize {
        let cutoff = at - self.window;

        let mut map = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let window = map.entry(product_id).or_default();
        window.push(at, units);
        window.evict_before(cutoff);
        window.total
    }

    /// Current count for a product, without triggering eviction.
    pub fn current_demand(&self, product_id: &ProductId) -> usize {
        let map = self.inner.read().unwrap_or_else(|e| e.into_inner());
        map.get(product_id).map_or(0, |w| w.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Arc;
    use std::thread;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn records_units_and_reads_back() {
        let tracker = DemandTracker::new();
        let id = ProductId::new();

        assert_eq!(tracker.record_demand(id, 3, t0()), 3);
        assert_eq!(tracker.record_demand(id, 2, t0() + Duration::seconds(10)), 5);
        assert_eq!(tracker.current_demand(&id), 5);
    }

    #[test]
    fn unknown_product_has_zero_demand() {
        let tracker = DemandTracker::new();
        assert_eq!(tracker.current_demand(&ProductId::new()), 0);
    }

    #[test]
    fn evicts_entries_older_than_window_on_write() {
        let tracker = DemandTracker::new();
        let id = ProductId::new();

        tracker.record_demand(id, 10, t0());
        let count = tracker.record_demand(id, 1, t0() + Duration::minutes(3));

        assert_eq!(count, 1);
    }

    #[test]
    fn entry_exactly_on_the_boundary_is_kept() {
        let tracker = DemandTracker::new();
        let id = ProductId::new();

        tracker.record_demand(id, 4, t0());
        let count = tracker.record_demand(id, 1, t0() + Duration::seconds(DEMAND_WINDOW_SECS));

        assert_eq!(count, 5);
    }

    #[test]
    fn reads_do_not_evict() {
        let tracker = DemandTracker::new();
        let id = ProductId::new();

        // Recorded long ago; nothing has written since.
        tracker.record_demand(id, 7, t0() - Duration::hours(5));
        assert_eq!(tracker.current_demand(&id), 7);
    }

    #[test]
    fn eviction_is_per_product() {
        let tracker = DemandTracker::new();
        let a = ProductId::new();
        let b = ProductId::new();

        tracker.record_demand(a, 2, t0());
        tracker.record_demand(b, 6, t0() + Duration::minutes(10));

        assert_eq!(tracker.current_demand(&a), 2);
        assert_eq!(tracker.current_demand(&b), 6);
    }

    #[test]
    fn late_event_keeps_newer_entries() {
        let tracker = DemandTracker::new();
        let id = ProductId::new();

        tracker.record_demand(id, 2, t0() + Duration::minutes(5));
        // Arrives late with an older timestamp; cutoff is t0 - 2min, nothing newer is dropped.
        assert_eq!(tracker.record_demand(id, 1, t0()), 3);
    }

    #[test]
    fn enormous_orders_saturate_and_still_age_out() {
        let tracker = DemandTracker::new();
        let id = ProductId::new();
        let huge = i64::MAX as usize;

        for _ in 0..3 {
            tracker.record_demand(id, huge, t0());
        }
        assert_eq!(tracker.current_demand(&id), usize::MAX);

        let count = tracker.record_demand(id, 1, t0() + Duration::minutes(3));
        assert_eq!(count, 1);
        assert_eq!(tracker.current_demand(&id), 1);
    }

    #[test]
    fn partial_eviction_recounts_remaining_entries() {
        let tracker = DemandTracker::new();
        let id = ProductId::new();

        tracker.record_demand(id, usize::MAX, t0());
        tracker.record_demand(id, 5, t0() + Duration::minutes(2));
        let count = tracker.record_demand(id, 2, t0() + Duration::minutes(3));

        assert_eq!(count, 7);
    }

    #[test]
    fn concurrent_writers_lose_no_units() {
        let tracker = Arc::new(DemandTracker::new());
        let id = ProductId::new();
        let at = t0();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tracker = tracker.clone();
                thread::spawn(move || {
                    for _ in 0..250 {
                        tracker.record_demand(id, 2, at);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(tracker.current_demand(&id), 8 * 250 * 2);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: after each in-order write, the count equals the units
            /// recorded no earlier than `latest - window`.
            #[test]
            fn count_matches_window_of_latest_write(
                events in prop::collection::vec((0i64..600, 1usize..20), 1..40)
            ) {
                let tracker = DemandTracker::new();
                let id = ProductId::new();

                let mut offsets: Vec<(i64, usize)> = events;
                offsets.sort_by_key(|(secs, _)| *secs);

                for (idx, (secs, units)) in offsets.iter().enumerate() {
                    let at = t0() + Duration::seconds(*secs);
                    let got = tracker.record_demand(id, *units, at);

                    let expected: usize = offsets[..=idx]
                        .iter()
                        .filter(|(s, _)| *s >= secs - DEMAND_WINDOW_SECS)
                        .map(|(_, u)| *u)
                        .sum();
                    prop_assert_eq!(got, expected);
                }
            }
        }
    }
}
