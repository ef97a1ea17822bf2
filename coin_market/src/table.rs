//! Latest snapshot per instrument.
use std::collections::HashMap;
use std::sync::Mutex;

use coin_common::{InstrumentSnapshot, Result};

/// Shared mapping from instrument id to the most recently merged snapshot.
///
/// Entries are created or replaced, never removed. The lock is held only for the
/// single read or write, never while a message is decoded.
#[derive(Debug, Default)]
pub struct SnapshotTable {
    entries: Mutex<HashMap<String, InstrumentSnapshot>>,
}

impl SnapshotTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `snapshot` under its id, returning the entry it replaced.
    pub fn merge(&self, snapshot: InstrumentSnapshot) -> Result<Option<InstrumentSnapshot>> {
        let id = snapshot.id.clone();
        Ok(self.entries.lock()?.insert(id, snapshot))
    }

    /// Latest snapshot for `id`.
    pub fn get(&self, id: &str) -> Result<Option<InstrumentSnapshot>> {
        Ok(self.entries.lock()?.get(id).cloned())
    }

    /// Number of instruments seen.
    pub fn len(&self) -> Result<usize> {
        Ok(self.entries.lock()?.len())
    }

    /// Whether nothing has been merged yet.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Copy of every entry, ordered by id.
    pub fn snapshot_all(&self) -> Result<Vec<InstrumentSnapshot>> {
        let mut all: Vec<InstrumentSnapshot> = self.entries.lock()?.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_merge_wins() {
        let table = SnapshotTable::new();
        assert!(table.is_empty().unwrap());

        let mut first = InstrumentSnapshot::new("bitcoin", "btc", "Bitcoin");
        first.current_price = Some(60_000.0);
        let mut second = first.clone();
        second.current_price = Some(61_000.0);

        assert_eq!(table.merge(first.clone()).unwrap(), None);
        assert_eq!(table.merge(second.clone()).unwrap(), Some(first));
        assert_eq!(table.get("bitcoin").unwrap(), Some(second));
        assert_eq!(table.get("ethereum").unwrap(), None);
        assert_eq!(table.len().unwrap(), 1);
    }

    #[test]
    fn snapshot_all_is_sorted() {
        let table = SnapshotTable::new();
        for id in ["solana", "bitcoin", "ethereum"] {
            table.merge(InstrumentSnapshot::new(id, id, id)).unwrap();
        }
        let ids: Vec<String> = table.snapshot_all().unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, ["bitcoin", "ethereum", "solana"]);
    }
}
