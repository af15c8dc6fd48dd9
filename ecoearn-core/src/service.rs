//! High-level service facade combining all storage ports.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::info;

use crate::activation::{
    Activation, ActivationError, ActivationProtocol, Deactivation, DeactivationPolicy,
};
use crate::backend::Backend;
use crate::ledger::{self, KindFilter, Ledger, LedgerError};
use crate::model::{
    Bin, BinId, FillLevel, LedgerEntry, OccupancyEvent, RecyclingRecord, TransactionKind, UserId,
};
use crate::ports::StoreError;
use crate::registry::{BinImage, BinRegistry, RegistryError};
use crate::reports::{self, ReportPage, ReportQuery};
use crate::scanner::ScannerSession;
use crate::stats::{self, RecyclingTotals, SummaryInputs, UserStats, YearSummary};

#[derive(Debug, Clone, PartialEq)]
/// Figures shown on the dashboard.
pub struct Dashboard {
    /// Account counts.
    pub users: UserStats,
    /// Deposits over all time.
    pub totals: RecyclingTotals,
    /// Number of user reports.
    pub reports: usize,
    /// Latest deposits.
    pub recent: Vec<RecyclingRecord>,
    /// Years selectable for the monthly chart, most recent first.
    pub years: Vec<i32>,
}

/// Public entry point for the admin console.
#[derive(Debug)]
pub struct EcoEarnService {
    backend: Backend,
    activation: Arc<ActivationProtocol>,
    registry: BinRegistry,
    ledger: Ledger,
}

impl EcoEarnService {
    /// Create a new service bound to `backend`.
    #[must_use]
    pub fn new(backend: Backend, policy: DeactivationPolicy) -> Self {
        let activation = Arc::new(ActivationProtocol::new(
            Arc::clone(&backend.bins),
            Arc::clone(&backend.occupancy_log),
            policy,
        ));
        let registry = BinRegistry::new(Arc::clone(&backend.bins));
        let ledger = Ledger::new(Arc::clone(&backend.ledger));
        info!(backend = %backend.name, ?policy, "service ready");
        Self {
            backend,
            activation,
            registry,
            ledger,
        }
    }

    /// Name of the backing store.
    #[must_use]
    pub fn backend_name(&self) -> &str {
        &self.backend.name
    }

    /// A fresh scanner session for `user`.
    #[must_use]
    pub fn scanner(&self, user: UserId) -> ScannerSession {
        ScannerSession::new(Arc::clone(&self.activation), user)
    }

    /// All bins, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns a [`RegistryError`] when the store fails.
    pub async fn bins(&self) -> Result<Vec<Bin>, RegistryError> {
        self.registry.list_bins().await
    }

    /// Register a new bin.
    ///
    /// # Errors
    ///
    /// See [`BinRegistry::create_bin`].
    pub async fn create_bin(&self, name: &str, image: &BinImage) -> Result<Bin, RegistryError> {
        self.registry.create_bin(name, image).await
    }

    /// Register a new bin with its picture read from disk.
    ///
    /// # Errors
    ///
    /// See [`BinRegistry::create_bin_from_file`].
    pub async fn create_bin_from_file(
        &self,
        name: &str,
        image: &Path,
    ) -> Result<Bin, RegistryError> {
        self.registry.create_bin_from_file(name, image).await
    }

    /// Issue and store a new QR payload for `id`.
    ///
    /// # Errors
    ///
    /// See [`BinRegistry::regenerate_qr`].
    pub async fn regenerate_qr(&self, id: &BinId) -> Result<String, RegistryError> {
        self.registry.regenerate_qr(id).await
    }

    /// Write the QR payload for `id` into `dir`.
    ///
    /// # Errors
    ///
    /// See [`BinRegistry::export_qr`].
    pub async fn export_qr(&self, id: &BinId, dir: &Path) -> Result<PathBuf, RegistryError> {
        self.registry.export_qr(id, dir).await
    }

    /// Update the fill level of `id`.
    ///
    /// # Errors
    ///
    /// See [`BinRegistry::set_fill_level`].
    pub async fn set_fill_level(&self, id: &BinId, level: FillLevel) -> Result<(), RegistryError> {
        self.registry.set_fill_level(id, level).await
    }

    /// Claim `bin` for `user`.
    ///
    /// # Errors
    ///
    /// See [`ActivationProtocol::activate`].
    pub async fn activate(&self, bin: &BinId, user: &UserId) -> Result<Activation, ActivationError> {
        self.activation.activate(bin, user).await
    }

    /// Release `bin` on behalf of `user`.
    ///
    /// # Errors
    ///
    /// See [`ActivationProtocol::deactivate`].
    pub async fn deactivate(
        &self,
        bin: &BinId,
        user: &UserId,
    ) -> Result<Deactivation, ActivationError> {
        self.activation.deactivate(bin, user).await
    }

    /// Release `bin` whoever holds it.
    ///
    /// # Errors
    ///
    /// See [`ActivationProtocol::force_release`].
    pub async fn force_release(
        &self,
        bin: &BinId,
        admin: &UserId,
    ) -> Result<Deactivation, ActivationError> {
        self.activation.force_release(bin, admin).await
    }

    /// Occupancy transitions recorded for `bin`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the log cannot be read.
    pub async fn occupancy_history(&self, bin: &BinId) -> Result<Vec<OccupancyEvent>, StoreError> {
        let mut events = self.backend.occupancy_log.history(bin).await?;
        events.sort_by(|left, right| left.at.cmp(&right.at));
        Ok(events)
    }

    /// One page of user reports.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when reports cannot be loaded.
    pub async fn reports(&self, query: &ReportQuery) -> Result<ReportPage, StoreError> {
        let all = self.backend.reports.list().await?;
        Ok(reports::page(all, query))
    }

    /// Ledger entries matching `kind` and `search`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Store`] when entries cannot be loaded.
    pub async fn ledger_entries(
        &self,
        kind: KindFilter,
        search: &str,
    ) -> Result<Vec<LedgerEntry>, LedgerError> {
        let entries = self.ledger.entries().await?;
        Ok(ledger::filter(&entries, kind, search))
    }

    /// Current admin cash balance.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Store`] when entries cannot be loaded.
    pub async fn balance(&self) -> Result<Decimal, LedgerError> {
        self.ledger.balance().await
    }

    /// Add funds to the ledger.
    ///
    /// # Errors
    ///
    /// See [`Ledger::record`].
    pub async fn add_funds(&self, amount: &str, description: &str) -> Result<LedgerEntry, LedgerError> {
        self.ledger.record(TransactionKind::Add, amount, description).await
    }

    /// Withdraw funds from the ledger.
    ///
    /// # Errors
    ///
    /// See [`Ledger::record`].
    pub async fn withdraw_funds(
        &self,
        amount: &str,
        description: &str,
    ) -> Result<LedgerEntry, LedgerError> {
        self.ledger
            .record(TransactionKind::Withdraw, amount, description)
            .await
    }

    /// Dashboard figures as of `now`.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when any input cannot be loaded.
    pub async fn dashboard(&self, now: DateTime<Utc>) -> Result<Dashboard, StoreError> {
        let users = self.backend.stats.users().await?;
        let records = self.backend.stats.recycling_records().await?;
        let reports = self.backend.reports.list().await?.len();
        Ok(Dashboard {
            users: stats::user_stats(&users),
            totals: stats::recycling_totals(&records),
            reports,
            recent: stats::recent_recycles(&records, stats::RECENT_RECYCLES),
            years: stats::available_years(&records, now),
        })
    }

    /// Monthly deposits for `year`.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when records cannot be loaded.
    pub async fn monthly_series(&self, year: i32) -> Result<stats::MonthlySeries, StoreError> {
        let records = self.backend.stats.recycling_records().await?;
        Ok(stats::monthly_series(&records, year))
    }

    /// Aggregate the yearly report for `year`.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when any input cannot be loaded.
    pub async fn year_summary(&self, year: i32, now: DateTime<Utc>) -> Result<YearSummary, StoreError> {
        let users = self.backend.stats.users().await?;
        let records = self.backend.stats.recycling_records().await?;
        let entries = self.backend.ledger.list().await?;
        let bins = self.backend.bins.list().await?;
        let reports = self.backend.reports.list().await?.len();
        Ok(YearSummary::build(
            year,
            SummaryInputs {
                users: &users,
                records: &records,
                ledger: &entries,
                bins: &bins,
                reports,
            },
            now,
        ))
    }

    /// Render the yearly report for `year` into `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Store`] when inputs cannot be loaded and
    /// [`RegistryError::Io`] when the file cannot be written.
    pub async fn export_year_summary(
        &self,
        year: i32,
        dir: &Path,
    ) -> Result<PathBuf, RegistryError> {
        let summary = self.year_summary(year, Utc::now()).await?;
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(summary.file_name());
        tokio::fs::write(&path, summary.render()).await?;
        info!(year, path = %path.display(), "exported yearly report");
        Ok(path)
    }
}
