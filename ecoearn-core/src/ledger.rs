//! Admin funds ledger: validated add / withdraw entries and the running balance.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::info;

use crate::model::{LedgerEntry, NewLedgerEntry, TransactionKind};
use crate::ports::{LedgerStore, StoreError};

#[derive(thiserror::Error, Debug)]
/// Errors raised by ledger operations.
pub enum LedgerError {
    /// Amount is not a positive number.
    #[error("Please enter a valid positive amount.")]
    InvalidAmount,
    /// Store access failed.
    #[error("Failed to process funds: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
/// Which entries the ledger view shows.
pub enum KindFilter {
    /// Everything.
    #[default]
    All,
    /// Only additions.
    Add,
    /// Only withdrawals.
    Withdraw,
}

impl KindFilter {
    /// Cycle All -> Add -> Withdraw -> All.
    #[must_use]
    pub fn next(self) -> Self {
        match self {
            KindFilter::All => KindFilter::Add,
            KindFilter::Add => KindFilter::Withdraw,
            KindFilter::Withdraw => KindFilter::All,
        }
    }

    fn admits(self, kind: TransactionKind) -> bool {
        match self {
            KindFilter::All => true,
            KindFilter::Add => kind == TransactionKind::Add,
            KindFilter::Withdraw => kind == TransactionKind::Withdraw,
        }
    }
}

/// Parse an operator-typed amount, rounded to centavos.
///
/// # Errors
///
/// Returns [`LedgerError::InvalidAmount`] unless the text is a number greater than zero.
pub fn parse_amount(text: &str) -> Result<Decimal, LedgerError> {
    let cleaned: String = text
        .trim()
        .trim_start_matches('₱')
        .chars()
        .filter(|ch| *ch != ',')
        .collect();
    let amount = Decimal::from_str(cleaned.trim()).map_err(|_parse| LedgerError::InvalidAmount)?;
    let amount = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    if amount <= Decimal::ZERO {
        return Err(LedgerError::InvalidAmount);
    }
    Ok(amount)
}

/// Balance implied by `entries`: additions minus withdrawals.
#[must_use]
pub fn balance(entries: &[LedgerEntry]) -> Decimal {
    entries.iter().fold(Decimal::ZERO, |sum, entry| match entry.kind {
        TransactionKind::Add => sum + entry.amount,
        TransactionKind::Withdraw => sum - entry.amount,
    })
}

/// Entries matching `filter` whose description contains `search`, newest first.
#[must_use]
pub fn filter(entries: &[LedgerEntry], kind: KindFilter, search: &str) -> Vec<LedgerEntry> {
    let needle = search.trim().to_lowercase();
    let mut matching: Vec<LedgerEntry> = entries
        .iter()
        .filter(|entry| kind.admits(entry.kind))
        .filter(|entry| needle.is_empty() || entry.description.to_lowercase().contains(&needle))
        .cloned()
        .collect();
    matching.sort_by(|left, right| right.recorded_at.cmp(&left.recorded_at));
    matching
}

fn default_description(kind: TransactionKind) -> &'static str {
    match kind {
        TransactionKind::Add => "Admin added funds",
        TransactionKind::Withdraw => "Admin withdrew funds",
    }
}

/// Ledger operations over a [`LedgerStore`].
pub struct Ledger {
    store: Arc<dyn LedgerStore>,
}

impl fmt::Debug for Ledger {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_struct("Ledger").finish_non_exhaustive()
    }
}

impl Ledger {
    /// Create a ledger over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// All entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Store`] when the store fails.
    pub async fn entries(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        let entries = self.store.list().await?;
        Ok(filter(&entries, KindFilter::All, ""))
    }

    /// Current admin cash balance.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Store`] when the store fails.
    pub async fn balance(&self) -> Result<Decimal, LedgerError> {
        Ok(balance(&self.store.list().await?))
    }

    /// Validate and append an entry. A blank description gets a default.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidAmount`] for bad amounts and
    /// [`LedgerError::Store`] when the append fails.
    pub async fn record(
        &self,
        kind: TransactionKind,
        amount: &str,
        description: &str,
    ) -> Result<LedgerEntry, LedgerError> {
        let amount = parse_amount(amount)?;
        let description = match description.trim() {
            "" => default_description(kind).to_owned(),
            given => given.to_owned(),
        };

        let entry = self
            .store
            .append(NewLedgerEntry {
                kind,
                amount,
                description,
                recorded_at: Utc::now(),
            })
            .await?;
        info!(id = %entry.id, kind = kind.tag(), %amount, "ledger entry recorded");
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    #[test]
    fn amounts_must_be_positive_numbers() {
        for bad in ["", "abc", "0", "-5", "0.001", "NaN"] {
            assert!(
                matches!(parse_amount(bad), Err(LedgerError::InvalidAmount)),
                "{bad:?} rejected"
            );
        }
        assert_eq!(parse_amount(" 1,000 ").ok(), Some(Decimal::from(1000)), "grouping");
        assert_eq!(parse_amount("₱250.50").ok(), Decimal::from_str("250.50").ok(), "peso sign");
        assert_eq!(parse_amount("10.005").ok(), Decimal::from_str("10.01").ok(), "rounded");
    }

    #[tokio::test]
    async fn balance_adds_and_subtracts() {
        let ledger = Ledger::new(Arc::new(MemoryStore::new()));
        ledger.record(TransactionKind::Add, "1000", "Initial deposit").await.expect("add");
        ledger.record(TransactionKind::Withdraw, "250.25", "").await.expect("withdraw");

        assert_eq!(
            ledger.balance().await.ok(),
            Decimal::from_str("749.75").ok(),
            "1000 - 250.25"
        );
    }

    #[tokio::test]
    async fn blank_description_gets_default() {
        let ledger = Ledger::new(Arc::new(MemoryStore::new()));
        let added = ledger.record(TransactionKind::Add, "5", "  ").await.expect("add");
        let withdrawn = ledger.record(TransactionKind::Withdraw, "5", "").await.expect("withdraw");

        assert_eq!(added.description, "Admin added funds", "add default");
        assert_eq!(withdrawn.description, "Admin withdrew funds", "withdraw default");
    }

    #[tokio::test]
    async fn invalid_amount_writes_nothing() {
        let ledger = Ledger::new(Arc::new(MemoryStore::new()));
        assert!(
            matches!(
                ledger.record(TransactionKind::Add, "-1", "oops").await,
                Err(LedgerError::InvalidAmount)
            ),
            "rejected"
        );
        assert!(ledger.entries().await.expect("entries").is_empty(), "nothing stored");
    }

    #[tokio::test]
    async fn filter_by_kind_and_description() {
        let ledger = Ledger::new(Arc::new(MemoryStore::new()));
        ledger.record(TransactionKind::Add, "100", "Initial deposit").await.expect("add");
        ledger.record(TransactionKind::Withdraw, "40", "Points redemption").await.expect("w");
        ledger.record(TransactionKind::Add, "60", "Sponsor top-up").await.expect("add");
        let entries = ledger.entries().await.expect("entries");

        assert_eq!(filter(&entries, KindFilter::Add, "").len(), 2, "adds only");
        assert_eq!(filter(&entries, KindFilter::Withdraw, "").len(), 1, "withdrawals only");
        assert_eq!(filter(&entries, KindFilter::All, "DEPOSIT").len(), 1, "search");
        assert_eq!(KindFilter::Withdraw.next(), KindFilter::All, "filter cycles");
    }
}
