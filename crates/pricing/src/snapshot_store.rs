use std::collections::HashMap;
use std::sync::RwLock;

use dynprice_core::ProductId;

use crate::model::ProductSnapshot;

/// Product id -> last known catalog snapshot.
///
/// Many readers, one writer. A missing entry is a normal state (the product
/// has not been observed yet), not an error.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    inner: RwLock<HashMap<ProductId, ProductSnapshot>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace whatever is stored for the snapshot's product (last write wins).
    pub fn put(&self, snapshot: ProductSnapshot) {
        // A poisoned lock still guards a consistent map: inserts are atomic.
        let mut map = self.inner.write().unwrap_or_else(|e| e.into_inner());
        map.insert(snapshot.product_id, snapshot);
    }

    pub fn get(&self, product_id: &ProductId) -> Option<ProductSnapshot> {
        let map = self.inner.read().unwrap_or_else(|e| e.into_inner());
        map.get(product_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use std::sync::Arc;
    use std::thread;

    fn snapshot(id: ProductId, n: i64) -> ProductSnapshot {
        ProductSnapshot {
            product_id: id,
            base_price: Decimal::from(n),
            stock_level: n,
            observed_at: Utc::now(),
        }
    }

    #[test]
    fn put_replaces_unconditionally() {
        let store = SnapshotStore::new();
        let id = ProductId::new();

        store.put(snapshot(id, 10));
        store.put(snapshot(id, 3));

        let got = store.get(&id).unwrap();
        assert_eq!(got.stock_level, 3);
        assert_eq!(got.base_price, Decimal::from(3));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn missing_entry_is_none() {
        let store = SnapshotStore::new();
        assert!(store.get(&ProductId::new()).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn concurrent_writers_never_tear_a_snapshot() {
        let store = Arc::new(SnapshotStore::new());
        let id = ProductId::new();
        store.put(snapshot(id, 0));

        let writers: Vec<_> = (1..=8)
            .map(|w| {
                let store = store.clone();
                thread::spawn(move || {
                    for i in 0..500 {
                        store.put(snapshot(id, w * 1000 + i));
                    }
                })
            })
            .collect();

        let reader = {
            let store = store.clone();
            thread::spawn(move || {
                for _ in 0..2000 {
                    let s = store.get(&id).unwrap();
                    // Every write sets base_price == stock_level.
                    assert_eq!(s.base_price, Decimal::from(s.stock_level));
                }
            })
        };

        for w in writers {
            w.join().unwrap();
        }
        reader.join().unwrap();
    }
}
