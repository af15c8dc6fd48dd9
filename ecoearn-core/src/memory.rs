//! In-process backend holding every collection in memory.
//!
//! Used for tests and for running the console offline against a JSON seed file.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::backend::Backend;
use crate::model::{
    Bin, BinId, FillLevel, LedgerEntry, NewLedgerEntry, Occupancy, OccupancyEvent,
    RecyclingRecord, Report, TransactionId, UserAccount,
};
use crate::ports::{BinStore, LedgerStore, OccupancyLog, ReportStore, StatsSource, StoreError};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// Initial contents for a [`MemoryStore`].
pub struct MemorySeed {
    /// Bins.
    pub bins: Vec<Bin>,
    /// User reports.
    pub reports: Vec<Report>,
    /// Funds ledger.
    pub ledger: Vec<LedgerEntry>,
    /// App users.
    pub users: Vec<UserAccount>,
    /// Recycling deposits.
    pub recycling: Vec<RecyclingRecord>,
}

#[derive(Debug, Default)]
struct Collections {
    bins: BTreeMap<BinId, Bin>,
    events: Vec<OccupancyEvent>,
    reports: Vec<Report>,
    ledger: Vec<LedgerEntry>,
    users: Vec<UserAccount>,
    recycling: Vec<RecyclingRecord>,
    next_transaction: u64,
}

/// Memory-backed implementation of every store port.
///
/// Each operation takes the lock once, so conditional writes are atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Collections>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-filled from `seed`.
    #[must_use]
    pub fn seeded(seed: MemorySeed) -> Self {
        let next_transaction = seed
            .ledger
            .iter()
            .filter_map(|entry| transaction_number(&entry.id))
            .max()
            .unwrap_or_default();
        let collections = Collections {
            bins: seed
                .bins
                .into_iter()
                .map(|bin| (bin.id.clone(), bin))
                .collect(),
            events: Vec::new(),
            reports: seed.reports,
            ledger: seed.ledger,
            users: seed.users,
            recycling: seed.recycling,
            next_transaction,
        };
        Self {
            inner: RwLock::new(collections),
        }
    }

    /// Parse a JSON seed document and build a store from it.
    ///
    /// # Errors
    ///
    /// Returns the JSON error when the document does not match [`MemorySeed`].
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json).map(Self::seeded)
    }

    /// Wrap the store into a [`Backend`] with every port pointing at it.
    #[must_use]
    pub fn into_backend(self: Arc<Self>) -> Backend {
        let bins: Arc<dyn BinStore> = Arc::<Self>::clone(&self);
        let occupancy_log: Arc<dyn OccupancyLog> = Arc::<Self>::clone(&self);
        let reports: Arc<dyn ReportStore> = Arc::<Self>::clone(&self);
        let ledger: Arc<dyn LedgerStore> = Arc::<Self>::clone(&self);
        Backend {
            name: String::from("memory"),
            bins,
            occupancy_log,
            reports,
            ledger,
            stats: self,
        }
    }
}

/// Numeric part of ids this store hands out (`tx-000042` is 42).
fn transaction_number(id: &TransactionId) -> Option<u64> {
    id.as_str().strip_prefix("tx-")?.parse().ok()
}

#[async_trait]
impl BinStore for MemoryStore {
    async fn get(&self, id: &BinId) -> Result<Option<Bin>, StoreError> {
        Ok(self.inner.read().await.bins.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<Bin>, StoreError> {
        Ok(self.inner.read().await.bins.values().cloned().collect())
    }

    async fn insert(&self, bin: &Bin) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.bins.contains_key(&bin.id) {
            return Err(StoreError::Conflict);
        }
        inner.bins.insert(bin.id.clone(), bin.clone());
        Ok(())
    }

    async fn swap_occupancy(
        &self,
        id: &BinId,
        expected: &Occupancy,
        next: &Occupancy,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let bin = inner.bins.get_mut(id).ok_or(StoreError::NotFound)?;
        if &bin.occupancy != expected {
            return Err(StoreError::Conflict);
        }
        bin.occupancy = next.clone();
        Ok(())
    }

    async fn set_qr_data(&self, id: &BinId, qr_data: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let bin = inner.bins.get_mut(id).ok_or(StoreError::NotFound)?;
        bin.qr_data = Some(qr_data.to_owned());
        Ok(())
    }

    async fn set_fill_level(&self, id: &BinId, level: FillLevel) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let bin = inner.bins.get_mut(id).ok_or(StoreError::NotFound)?;
        bin.level = level;
        Ok(())
    }
}

#[async_trait]
impl OccupancyLog for MemoryStore {
    async fn append(&self, event: &OccupancyEvent) -> Result<(), StoreError> {
        self.inner.write().await.events.push(event.clone());
        Ok(())
    }

    async fn history(&self, bin: &BinId) -> Result<Vec<OccupancyEvent>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .events
            .iter()
            .filter(|event| &event.bin_id == bin)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ReportStore for MemoryStore {
    async fn list(&self) -> Result<Vec<Report>, StoreError> {
        Ok(self.inner.read().await.reports.clone())
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn list(&self) -> Result<Vec<LedgerEntry>, StoreError> {
        Ok(self.inner.read().await.ledger.clone())
    }

    async fn append(&self, entry: NewLedgerEntry) -> Result<LedgerEntry, StoreError> {
        let mut inner = self.inner.write().await;
        let id = loop {
            inner.next_transaction += 1;
            let candidate = TransactionId(format!("tx-{:06}", inner.next_transaction));
            if !inner.ledger.iter().any(|existing| existing.id == candidate) {
                break candidate;
            }
        };
        let stored = LedgerEntry {
            id,
            kind: entry.kind,
            amount: entry.amount,
            description: entry.description,
            recorded_at: entry.recorded_at,
        };
        inner.ledger.push(stored.clone());
        Ok(stored)
    }
}

#[async_trait]
impl StatsSource for MemoryStore {
    async fn users(&self) -> Result<Vec<UserAccount>, StoreError> {
        Ok(self.inner.read().await.users.clone())
    }

    async fn recycling_records(&self) -> Result<Vec<RecyclingRecord>, StoreError> {
        Ok(self.inner.read().await.recycling.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UserId;

    fn bin(id: &str) -> Bin {
        Bin {
            id: BinId::from(id),
            name: format!("Bin {id}"),
            location: None,
            level: FillLevel::EMPTY,
            occupancy: Occupancy::Inactive,
            image: None,
            qr_data: None,
        }
    }

    #[tokio::test]
    async fn swap_only_applies_when_expectation_holds() {
        let store = MemoryStore::new();
        store.insert(&bin("b1")).await.expect("insert");
        let alice = Occupancy::held_by(UserId::from("alice"));
        let bob = Occupancy::held_by(UserId::from("bob"));

        store
            .swap_occupancy(&BinId::from("b1"), &Occupancy::Inactive, &alice)
            .await
            .expect("first swap wins");
        let lost = store
            .swap_occupancy(&BinId::from("b1"), &Occupancy::Inactive, &bob)
            .await;

        assert!(matches!(lost, Err(StoreError::Conflict)), "stale expectation loses");
        let stored = store.get(&BinId::from("b1")).await.expect("get").expect("present");
        assert_eq!(stored.occupancy, alice, "winner keeps the bin");
    }

    #[tokio::test]
    async fn duplicate_insert_conflicts() {
        let store = MemoryStore::new();
        store.insert(&bin("b1")).await.expect("insert");
        assert!(
            matches!(store.insert(&bin("b1")).await, Err(StoreError::Conflict)),
            "second insert with the same id is rejected"
        );
    }

    #[tokio::test]
    async fn seed_json_populates_collections() {
        let json = r#"{
            "bins": [{"id": "b1", "name": "Mobod MRF", "location": {"lat": 8.2, "lng": 124.2},
                      "level": 40, "occupancy": {"status": "active", "occupant": "u1"},
                      "image": null, "qr_data": null}],
            "users": [{"id": "u1", "name": "Ana", "status": "active"}]
        }"#;
        let store = MemoryStore::from_json(json).expect("seed parses");

        let bins = BinStore::list(&store).await.expect("list");
        let users = store.users().await.expect("users");

        assert_eq!(bins.len(), 1, "one bin seeded");
        assert_eq!(bins.first().map(|bin| bin.level.percent()), Some(40), "level read");
        assert!(
            bins.first().is_some_and(|bin| bin.occupancy.is_active()),
            "occupancy read"
        );
        assert_eq!(users.len(), 1, "one user seeded");
    }

    #[tokio::test]
    async fn ledger_assigns_sequential_ids() {
        let store = MemoryStore::new();
        let entry = || NewLedgerEntry {
            kind: crate::model::TransactionKind::Add,
            amount: rust_decimal::Decimal::ONE_HUNDRED,
            description: String::from("seed"),
            recorded_at: chrono::Utc::now(),
        };
        let first = LedgerStore::append(&store, entry()).await.expect("append");
        let second = LedgerStore::append(&store, entry()).await.expect("append");
        assert_ne!(first.id, second.id, "ids are unique");
    }

    #[tokio::test]
    async fn seeded_ledger_ids_are_never_reissued() {
        let seeded = |id: &str| LedgerEntry {
            id: TransactionId::from(id),
            kind: crate::model::TransactionKind::Add,
            amount: rust_decimal::Decimal::TEN,
            description: String::from("imported"),
            recorded_at: chrono::Utc::now(),
        };
        let store = MemoryStore::seeded(MemorySeed {
            ledger: vec![seeded("tx-000002"), seeded("legacy-9")],
            ..MemorySeed::default()
        });

        let appended = LedgerStore::append(
            &store,
            NewLedgerEntry {
                kind: crate::model::TransactionKind::Withdraw,
                amount: rust_decimal::Decimal::ONE,
                description: String::from("payout"),
                recorded_at: chrono::Utc::now(),
            },
        )
        .await
        .expect("append");

        assert_eq!(appended.id.as_str(), "tx-000003", "continues after the seeded ids");
        let ids: Vec<TransactionId> = LedgerStore::list(&store)
            .await
            .expect("list")
            .into_iter()
            .map(|entry| entry.id)
            .collect();
        assert_eq!(ids.len(), 3, "all entries kept");
        assert!(
            ids.iter().all(|id| ids.iter().filter(|other| *other == id).count() == 1),
            "ids stay unique"
        );
    }
}
