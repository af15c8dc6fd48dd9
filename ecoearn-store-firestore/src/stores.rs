//! Port implementations over [`FirestoreClient`].

use async_trait::async_trait;
use ecoearn_core::model::{
    Bin, BinId, FillLevel, LedgerEntry, NewLedgerEntry, Occupancy, OccupancyEvent,
    RecyclingRecord, Report, UserAccount,
};
use ecoearn_core::ports::{
    BinStore, LedgerStore, OccupancyLog, ReportStore, StatsSource, StoreError,
};
use tracing::debug;

use crate::client::{FirestoreClient, Precondition};
use crate::mapping::{self, BINS, BIN_EVENTS, RECYCLING, REPORTS, TRANSACTIONS, USERS};
use crate::value::{Fields, Value};

/// Bin records in the `bins` collection.
#[derive(Debug, Clone)]
pub struct FirestoreBinStore {
    client: FirestoreClient,
}

impl FirestoreBinStore {
    pub(crate) fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    async fn patch_existing(&self, id: &BinId, fields: &Fields) -> Result<(), StoreError> {
        self.client
            .patch(BINS, id.as_str(), fields, Precondition::Exists)
            .await
            .map(|_document| ())
    }
}

#[async_trait]
impl BinStore for FirestoreBinStore {
    async fn get(&self, id: &BinId) -> Result<Option<Bin>, StoreError> {
        self.client
            .get(BINS, id.as_str())
            .await?
            .as_ref()
            .map(mapping::bin_from)
            .transpose()
    }

    async fn list(&self) -> Result<Vec<Bin>, StoreError> {
        self.client
            .list(BINS)
            .await?
            .iter()
            .map(mapping::bin_from)
            .collect()
    }

    async fn insert(&self, bin: &Bin) -> Result<(), StoreError> {
        self.client
            .create(BINS, Some(bin.id.as_str()), &mapping::bin_fields(bin))
            .await?;
        Ok(())
    }

    async fn swap_occupancy(
        &self,
        id: &BinId,
        expected: &Occupancy,
        next: &Occupancy,
    ) -> Result<(), StoreError> {
        let document = self
            .client
            .get(BINS, id.as_str())
            .await?
            .ok_or(StoreError::NotFound)?;
        let current = mapping::bin_from(&document)?;
        if &current.occupancy != expected {
            debug!(bin = %id, "occupancy changed before the write");
            return Err(StoreError::Conflict);
        }

        let Some(update_time) = document.update_time else {
            return Err(StoreError::Internal(format!(
                "document {} has no update time",
                document.name
            )));
        };

        self.client
            .patch(
                BINS,
                id.as_str(),
                &mapping::occupancy_fields(next),
                Precondition::UpdatedAt(update_time),
            )
            .await?;
        Ok(())
    }

    async fn set_qr_data(&self, id: &BinId, qr_data: &str) -> Result<(), StoreError> {
        let fields: Fields = [(String::from("qrData"), Value::string(qr_data))]
            .into_iter()
            .collect();
        self.patch_existing(id, &fields).await
    }

    async fn set_fill_level(&self, id: &BinId, level: FillLevel) -> Result<(), StoreError> {
        let fields: Fields = [(String::from("level"), Value::integer(i64::from(level)))]
            .into_iter()
            .collect();
        self.patch_existing(id, &fields).await
    }
}

/// Occupancy audit trail in the `bin_events` collection.
#[derive(Debug, Clone)]
pub struct FirestoreOccupancyLog {
    client: FirestoreClient,
}

impl FirestoreOccupancyLog {
    pub(crate) fn new(client: FirestoreClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl OccupancyLog for FirestoreOccupancyLog {
    async fn append(&self, event: &OccupancyEvent) -> Result<(), StoreError> {
        self.client
            .create(BIN_EVENTS, None, &mapping::event_fields(event))
            .await?;
        Ok(())
    }

    async fn history(&self, bin: &BinId) -> Result<Vec<OccupancyEvent>, StoreError> {
        self.client
            .run_query(BIN_EVENTS, "binId", &Value::string(bin.as_str()), "timestamp")
            .await?
            .iter()
            .map(mapping::event_from)
            .collect()
    }
}

/// User reports in the `reports` collection.
#[derive(Debug, Clone)]
pub struct FirestoreReportStore {
    client: FirestoreClient,
}

impl FirestoreReportStore {
    pub(crate) fn new(client: FirestoreClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ReportStore for FirestoreReportStore {
    async fn list(&self) -> Result<Vec<Report>, StoreError> {
        self.client
            .list(REPORTS)
            .await?
            .iter()
            .map(mapping::report_from)
            .collect()
    }
}

/// Funds ledger in the `admin_transactions` collection.
#[derive(Debug, Clone)]
pub struct FirestoreLedgerStore {
    client: FirestoreClient,
}

impl FirestoreLedgerStore {
    pub(crate) fn new(client: FirestoreClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LedgerStore for FirestoreLedgerStore {
    async fn list(&self) -> Result<Vec<LedgerEntry>, StoreError> {
        self.client
            .list(TRANSACTIONS)
            .await?
            .iter()
            .map(mapping::ledger_from)
            .collect()
    }

    async fn append(&self, entry: NewLedgerEntry) -> Result<LedgerEntry, StoreError> {
        let created = self
            .client
            .create(TRANSACTIONS, None, &mapping::ledger_fields(&entry))
            .await?;
        mapping::ledger_from(&created)
    }
}

/// Users and recycling deposits.
#[derive(Debug, Clone)]
pub struct FirestoreStatsSource {
    client: FirestoreClient,
}

impl FirestoreStatsSource {
    pub(crate) fn new(client: FirestoreClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StatsSource for FirestoreStatsSource {
    async fn users(&self) -> Result<Vec<UserAccount>, StoreError> {
        self.client
            .list(USERS)
            .await?
            .iter()
            .map(mapping::user_from)
            .collect()
    }

    async fn recycling_records(&self) -> Result<Vec<RecyclingRecord>, StoreError> {
        let mut records = Vec::new();
        for document in self.client.list(RECYCLING).await? {
            if let Some(record) = mapping::recycling_from(&document)? {
                records.push(record);
            }
        }
        Ok(records)
    }
}
