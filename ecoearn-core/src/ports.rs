//! Traits describing the storage capabilities a backend must provide, and their shared error type.

use async_trait::async_trait;
use reqwest::Error as ReqwestError;

use crate::model::{
    Bin, BinId, FillLevel, LedgerEntry, NewLedgerEntry, Occupancy, OccupancyEvent,
    RecyclingRecord, Report, UserAccount,
};

#[derive(thiserror::Error, Debug)]
/// Errors that can occur while talking to a storage backend.
pub enum StoreError {
    /// Network layer failed.
    #[error("Network error: {0}")]
    Network(#[from] ReqwestError),
    /// The addressed document does not exist.
    #[error("Document not found")]
    NotFound,
    /// A conditional write lost against a concurrent change, or a create hit an existing id.
    #[error("Write conflict")]
    Conflict,
    /// The backend rejected the request.
    #[error("Backend rejected request ({status}): {message}")]
    Rejected {
        /// HTTP status or backend status code.
        status: u16,
        /// Backend-provided message.
        message: String,
    },
    /// A stored document could not be mapped to the domain model.
    #[error("Malformed document {document}: {reason}")]
    Decode {
        /// Document path or identifier.
        document: String,
        /// What was wrong with it.
        reason: String,
    },
    /// Internal backend error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[async_trait]
/// Storage for bin records.
pub trait BinStore: Send + Sync {
    /// Fetch a bin by id, `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the backend request fails.
    async fn get(&self, id: &BinId) -> Result<Option<Bin>, StoreError>;

    /// List every bin.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the backend request fails.
    async fn list(&self) -> Result<Vec<Bin>, StoreError>;

    /// Create a new bin record under `bin.id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] when the id is taken, or another
    /// [`StoreError`] when the backend request fails.
    async fn insert(&self, bin: &Bin) -> Result<(), StoreError>;

    /// Atomically replace the bin's occupancy with `next`, but only if it is
    /// currently `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the bin does not exist and
    /// [`StoreError::Conflict`] when the current occupancy differs from
    /// `expected` or changed while the write was in flight.
    async fn swap_occupancy(
        &self,
        id: &BinId,
        expected: &Occupancy,
        next: &Occupancy,
    ) -> Result<(), StoreError>;

    /// Overwrite the stored QR payload.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the bin does not exist.
    async fn set_qr_data(&self, id: &BinId, qr_data: &str) -> Result<(), StoreError>;

    /// Overwrite the fill level.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the bin does not exist.
    async fn set_fill_level(&self, id: &BinId, level: FillLevel) -> Result<(), StoreError>;
}

#[async_trait]
/// Append-only audit trail of occupancy changes.
pub trait OccupancyLog: Send + Sync {
    /// Append one event.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the backend request fails.
    async fn append(&self, event: &OccupancyEvent) -> Result<(), StoreError>;

    /// Events for one bin, oldest first.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the backend request fails.
    async fn history(&self, bin: &BinId) -> Result<Vec<OccupancyEvent>, StoreError>;
}

#[async_trait]
/// Read access to user-submitted reports.
pub trait ReportStore: Send + Sync {
    /// All reports, in backend order.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the backend request fails.
    async fn list(&self) -> Result<Vec<Report>, StoreError>;
}

#[async_trait]
/// Storage for the admin funds ledger.
pub trait LedgerStore: Send + Sync {
    /// All ledger entries, in backend order.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the backend request fails.
    async fn list(&self) -> Result<Vec<LedgerEntry>, StoreError>;

    /// Append an entry and return it with its assigned id.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the backend request fails.
    async fn append(&self, entry: NewLedgerEntry) -> Result<LedgerEntry, StoreError>;
}

#[async_trait]
/// Read-only aggregation sources behind the dashboard statistics.
pub trait StatsSource: Send + Sync {
    /// Every app user account.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the backend request fails.
    async fn users(&self) -> Result<Vec<UserAccount>, StoreError>;

    /// Every completed recycling deposit.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the backend request fails.
    async fn recycling_records(&self) -> Result<Vec<RecyclingRecord>, StoreError>;
}
