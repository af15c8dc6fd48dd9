//! Dashboard statistics and the yearly summary report.

use std::collections::BTreeSet;
use std::fmt::{self, Write as _};
use std::iter;

use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::ledger;
use crate::model::{
    AccountStatus, Bin, LedgerEntry, Material, RecyclingRecord, TransactionKind, UserAccount,
};

/// Recent deposits shown on the dashboard.
pub const RECENT_RECYCLES: usize = 5;

/// Short month names used by the monthly series.
pub const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
/// Account counts.
pub struct UserStats {
    /// Every account.
    pub total: usize,
    /// Accounts marked active.
    pub active: usize,
    /// Accounts marked inactive.
    pub inactive: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
/// Deposited quantity per material.
pub struct RecyclingTotals {
    /// Plastic.
    pub plastic: f64,
    /// Tin cans.
    pub tin_cans: f64,
}

impl RecyclingTotals {
    fn add(&mut self, material: Material, quantity: f64) {
        match material {
            Material::Plastic => self.plastic += quantity,
            Material::TinCans => self.tin_cans += quantity,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
/// Per-month deposited quantity for one year, January first.
pub struct MonthlySeries {
    /// Plastic per month.
    pub plastic: [f64; 12],
    /// Tin cans per month.
    pub tin_cans: [f64; 12],
}

/// Count accounts by status.
#[must_use]
pub fn user_stats(users: &[UserAccount]) -> UserStats {
    let active = users
        .iter()
        .filter(|user| user.status == AccountStatus::Active)
        .count();
    UserStats {
        total: users.len(),
        active,
        inactive: users.len() - active,
    }
}

/// Totals over every record.
#[must_use]
pub fn recycling_totals(records: &[RecyclingRecord]) -> RecyclingTotals {
    totals_where(records, |_| true)
}

fn totals_where(
    records: &[RecyclingRecord],
    keep: impl Fn(&RecyclingRecord) -> bool,
) -> RecyclingTotals {
    records
        .iter()
        .filter(|record| keep(record))
        .fold(RecyclingTotals::default(), |mut totals, record| {
            totals.add(record.material, record.quantity);
            totals
        })
}

/// Monthly series for `year`.
#[must_use]
pub fn monthly_series(records: &[RecyclingRecord], year: i32) -> MonthlySeries {
    let mut series = MonthlySeries::default();
    for record in records.iter().filter(|record| record.recorded_at.year() == year) {
        let month = record.recorded_at.month0() as usize;
        let bucket = match record.material {
            Material::Plastic => series.plastic.get_mut(month),
            Material::TinCans => series.tin_cans.get_mut(month),
        };
        if let Some(bucket) = bucket {
            *bucket += record.quantity;
        }
    }
    series
}

/// Years with data plus the current year, most recent first.
#[must_use]
pub fn available_years(records: &[RecyclingRecord], now: DateTime<Utc>) -> Vec<i32> {
    let years: BTreeSet<i32> = records
        .iter()
        .map(|record| record.recorded_at.year())
        .chain(iter::once(now.year()))
        .collect();
    years.into_iter().rev().collect()
}

/// The `count` most recent deposits.
#[must_use]
pub fn recent_recycles(records: &[RecyclingRecord], count: usize) -> Vec<RecyclingRecord> {
    let mut sorted = records.to_vec();
    sorted.sort_by(|left, right| right.recorded_at.cmp(&left.recorded_at));
    sorted.truncate(count);
    sorted
}

#[derive(Debug, Clone, PartialEq, Serialize)]
/// Everything the yearly report shows.
pub struct YearSummary {
    /// Report year.
    pub year: i32,
    /// When the summary was produced.
    pub generated_at: DateTime<Utc>,
    /// Account counts (all time).
    pub users: UserStats,
    /// Number of user reports (all time).
    pub reports: usize,
    /// Registered bins.
    pub bins_total: usize,
    /// Bins currently active.
    pub bins_active: usize,
    /// Deposits within the year.
    pub totals: RecyclingTotals,
    /// Points awarded within the year.
    pub points: u64,
    /// Month-by-month deposits within the year.
    pub monthly: MonthlySeries,
    /// Funds added within the year.
    pub funds_added: Decimal,
    /// Funds withdrawn within the year.
    pub funds_withdrawn: Decimal,
    /// Balance at generation time.
    pub balance: Decimal,
}

/// Inputs to [`YearSummary::build`].
#[derive(Debug, Clone, Copy)]
pub struct SummaryInputs<'data> {
    /// App accounts.
    pub users: &'data [UserAccount],
    /// Recycling deposits.
    pub records: &'data [RecyclingRecord],
    /// Ledger entries.
    pub ledger: &'data [LedgerEntry],
    /// Registered bins.
    pub bins: &'data [Bin],
    /// Number of user reports.
    pub reports: usize,
}

impl YearSummary {
    /// Aggregate `inputs` for `year`.
    #[must_use]
    pub fn build(year: i32, inputs: SummaryInputs<'_>, now: DateTime<Utc>) -> Self {
        let in_year = |at: &DateTime<Utc>| at.year() == year;

        let mut funds_added = Decimal::ZERO;
        let mut funds_withdrawn = Decimal::ZERO;
        for entry in inputs.ledger.iter().filter(|entry| in_year(&entry.recorded_at)) {
            match entry.kind {
                TransactionKind::Add => funds_added += entry.amount,
                TransactionKind::Withdraw => funds_withdrawn += entry.amount,
            }
        }

        Self {
            year,
            generated_at: now,
            users: user_stats(inputs.users),
            reports: inputs.reports,
            bins_total: inputs.bins.len(),
            bins_active: inputs
                .bins
                .iter()
                .filter(|bin| bin.occupancy.is_active())
                .count(),
            totals: totals_where(inputs.records, |record| in_year(&record.recorded_at)),
            points: inputs
                .records
                .iter()
                .filter(|record| in_year(&record.recorded_at))
                .map(|record| u64::from(record.points))
                .sum(),
            monthly: monthly_series(inputs.records, year),
            funds_added,
            funds_withdrawn,
            balance: ledger::balance(inputs.ledger),
        }
    }

    /// Suggested file name for the exported report.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("EcoEarn_Report_{}.txt", self.year)
    }

    /// Plain-text rendering of the report.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        // Writing to a String cannot fail.
        let _written = self.render_into(&mut out);
        out
    }

    fn render_into(&self, out: &mut String) -> fmt::Result {
        writeln!(out, "EcoEarn Report {}", self.year)?;
        writeln!(out, "Generated {}", self.generated_at.format("%Y-%m-%d %H:%M UTC"))?;
        writeln!(out)?;
        writeln!(out, "Users")?;
        writeln!(out, "  Total     {:>10}", self.users.total)?;
        writeln!(out, "  Active    {:>10}", self.users.active)?;
        writeln!(out, "  Inactive  {:>10}", self.users.inactive)?;
        writeln!(out, "  Reports   {:>10}", self.reports)?;
        writeln!(out)?;
        writeln!(out, "Bins")?;
        writeln!(out, "  Registered {:>9}", self.bins_total)?;
        writeln!(out, "  In use     {:>9}", self.bins_active)?;
        writeln!(out)?;
        writeln!(out, "Recycling")?;
        writeln!(out, "  Plastic   {:>10.1}", self.totals.plastic)?;
        writeln!(out, "  Tin Cans  {:>10.1}", self.totals.tin_cans)?;
        writeln!(out, "  Points    {:>10}", self.points)?;
        writeln!(out)?;
        writeln!(out, "  Month   Plastic  Tin Cans")?;
        for (index, month) in MONTHS.iter().enumerate() {
            let plastic = self.monthly.plastic.get(index).copied().unwrap_or_default();
            let tin_cans = self.monthly.tin_cans.get(index).copied().unwrap_or_default();
            writeln!(out, "  {month:<5} {plastic:>9.1} {tin_cans:>9.1}")?;
        }
        writeln!(out)?;
        writeln!(out, "Funds")?;
        writeln!(out, "  Added     {:>12}", format_peso(self.funds_added))?;
        writeln!(out, "  Withdrawn {:>12}", format_peso(self.funds_withdrawn))?;
        writeln!(out, "  Balance   {:>12}", format_peso(self.balance))?;
        Ok(())
    }
}

/// Format an amount as pesos with two decimals, e.g. `₱1250.00`.
#[must_use]
pub fn format_peso(amount: Decimal) -> String {
    format!("₱{:.2}", amount)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::model::{BinId, FillLevel, Occupancy, TransactionId, UserId};

    fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 12, 0, 0)
            .single()
            .expect("valid date")
    }

    fn record(material: Material, quantity: f64, when: DateTime<Utc>) -> RecyclingRecord {
        RecyclingRecord {
            id: format!("rec-{}", when.timestamp()),
            user_id: UserId::from("u1"),
            user_name: String::from("Ana"),
            material,
            quantity,
            points: 10,
            recorded_at: when,
            profile_picture: None,
        }
    }

    fn records() -> Vec<RecyclingRecord> {
        vec![
            record(Material::Plastic, 3.0, at(2024, 1, 10)),
            record(Material::Plastic, 2.0, at(2024, 1, 20)),
            record(Material::TinCans, 5.0, at(2024, 3, 1)),
            record(Material::TinCans, 1.0, at(2023, 12, 31)),
        ]
    }

    #[test]
    fn users_split_by_status() {
        let users = vec![
            UserAccount {
                id: UserId::from("a"),
                name: String::from("A"),
                status: AccountStatus::Active,
            },
            UserAccount {
                id: UserId::from("b"),
                name: String::from("B"),
                status: AccountStatus::Inactive,
            },
            UserAccount {
                id: UserId::from("c"),
                name: String::from("C"),
                status: AccountStatus::Active,
            },
        ];
        assert_eq!(
            user_stats(&users),
            UserStats {
                total: 3,
                active: 2,
                inactive: 1
            },
            "2 active, 1 inactive"
        );
    }

    #[test]
    fn monthly_series_buckets_by_month_within_year() {
        let series = monthly_series(&records(), 2024);
        assert_eq!(series.plastic.first().copied(), Some(5.0), "January plastic");
        assert_eq!(series.tin_cans.get(2).copied(), Some(5.0), "March cans");
        assert_eq!(series.tin_cans.get(11).copied(), Some(0.0), "2023 excluded");
    }

    #[test]
    fn totals_cover_all_years() {
        let totals = recycling_totals(&records());
        assert_eq!((totals.plastic, totals.tin_cans), (5.0, 6.0), "all records summed");
    }

    #[test]
    fn years_include_current_and_are_descending() {
        assert_eq!(
            available_years(&records(), at(2026, 6, 1)),
            vec![2026, 2024, 2023],
            "data years plus now"
        );
    }

    #[test]
    fn recent_recycles_are_newest_first() {
        let recent = recent_recycles(&records(), 2);
        let dates: Vec<DateTime<Utc>> = recent.iter().map(|record| record.recorded_at).collect();
        assert_eq!(dates, vec![at(2024, 3, 1), at(2024, 1, 20)], "two newest");
    }

    #[test]
    fn summary_restricts_flows_to_the_year() {
        let ledger = vec![
            LedgerEntry {
                id: TransactionId::from("t1"),
                kind: TransactionKind::Add,
                amount: Decimal::from(1000),
                description: String::from("seed"),
                recorded_at: at(2023, 6, 1),
            },
            LedgerEntry {
                id: TransactionId::from("t2"),
                kind: TransactionKind::Withdraw,
                amount: Decimal::from(200),
                description: String::from("payout"),
                recorded_at: at(2024, 2, 1),
            },
        ];
        let bins = vec![Bin {
            id: BinId::from("b1"),
            name: String::from("Plaza"),
            location: None,
            level: FillLevel::EMPTY,
            occupancy: Occupancy::held_by(UserId::from("u1")),
            image: None,
            qr_data: None,
        }];
        let records = records();
        let inputs = SummaryInputs {
            users: &[],
            records: &records,
            ledger: &ledger,
            bins: &bins,
            reports: 4,
        };

        let summary = YearSummary::build(2024, inputs, at(2024, 12, 31));

        assert_eq!(summary.funds_added, Decimal::ZERO, "2023 deposit excluded");
        assert_eq!(summary.funds_withdrawn, Decimal::from(200), "2024 payout included");
        assert_eq!(summary.balance, Decimal::from(800), "balance is all-time");
        assert_eq!(summary.points, 30, "three 2024 deposits");
        assert_eq!(summary.bins_active, 1, "one bin in use");
        assert_eq!(summary.file_name(), "EcoEarn_Report_2024.txt", "file name");

        let text = summary.render();
        assert!(text.contains("EcoEarn Report 2024"), "title rendered");
        assert!(text.contains("₱800.00"), "balance rendered");
    }
}
