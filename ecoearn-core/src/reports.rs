//! Browsing user reports: search by user name, order by time, fixed-size pages.

use serde::{Deserialize, Serialize};

use crate::model::Report;

/// Reports shown per page.
pub const REPORTS_PER_PAGE: usize = 8;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Sort direction for reports.
pub enum ReportOrder {
    /// Most recent first.
    #[default]
    Newest,
    /// Oldest first.
    Oldest,
}

impl ReportOrder {
    /// The other direction.
    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            ReportOrder::Newest => ReportOrder::Oldest,
            ReportOrder::Oldest => ReportOrder::Newest,
        }
    }
}

#[derive(Debug, Clone, Default)]
/// What to show in the report browser.
pub struct ReportQuery {
    /// Case-insensitive substring of the reporter's name.
    pub search: String,
    /// Sort direction.
    pub order: ReportOrder,
    /// 1-based page number; out-of-range values are clamped.
    pub page: usize,
}

#[derive(Debug, Clone, PartialEq)]
/// One page of reports.
pub struct ReportPage {
    /// Reports on this page.
    pub items: Vec<Report>,
    /// 1-based page number actually shown.
    pub page: usize,
    /// Number of pages for the current filter, zero when nothing matches.
    pub total_pages: usize,
    /// Number of reports matching the filter.
    pub total: usize,
}

/// Filter, sort, and slice `reports` according to `query`.
#[must_use]
pub fn page(mut reports: Vec<Report>, query: &ReportQuery) -> ReportPage {
    let needle = query.search.trim().to_lowercase();
    if !needle.is_empty() {
        reports.retain(|report| report.user_name.to_lowercase().contains(&needle));
    }

    match query.order {
        ReportOrder::Newest => {
            reports.sort_by(|left, right| right.submitted_at.cmp(&left.submitted_at));
        }
        ReportOrder::Oldest => {
            reports.sort_by(|left, right| left.submitted_at.cmp(&right.submitted_at));
        }
    }

    let total = reports.len();
    let total_pages = total.div_ceil(REPORTS_PER_PAGE);
    let page = query.page.clamp(1, total_pages.max(1));
    let items = reports
        .into_iter()
        .skip((page - 1) * REPORTS_PER_PAGE)
        .take(REPORTS_PER_PAGE)
        .collect();

    ReportPage {
        items,
        page,
        total_pages,
        total,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::model::ReportId;

    fn reports(count: i64) -> Vec<Report> {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).single().expect("date");
        (0..count)
            .map(|index| Report {
                id: ReportId(format!("r{index}")),
                user_name: if index % 2 == 0 { "Ana Cruz" } else { "Ben Reyes" }.to_owned(),
                description: String::from("Overflowing bin"),
                location: String::from("Market"),
                image: None,
                submitted_at: start + Duration::hours(index),
            })
            .collect()
    }

    #[test]
    fn newest_first_by_default_with_eight_per_page() {
        let page = page(reports(10), &ReportQuery::default());

        assert_eq!(page.total, 10, "all reports counted");
        assert_eq!(page.total_pages, 2, "ceil(10 / 8)");
        assert_eq!(page.items.len(), REPORTS_PER_PAGE, "first page is full");
        assert_eq!(page.items.first().map(|report| report.id.as_str()), Some("r9"), "newest");
    }

    #[test]
    fn oldest_order_and_last_page() {
        let query = ReportQuery {
            order: ReportOrder::Oldest,
            page: 2,
            ..ReportQuery::default()
        };
        let page = page(reports(10), &query);

        let ids: Vec<&str> = page.items.iter().map(|report| report.id.as_str()).collect();
        assert_eq!(ids, ["r8", "r9"], "remaining two reports, oldest first");
    }

    #[test]
    fn search_is_case_insensitive_on_user_name() {
        let query = ReportQuery {
            search: String::from("  ben "),
            ..ReportQuery::default()
        };
        let page = page(reports(10), &query);

        assert_eq!(page.total, 5, "only Ben's reports");
        assert!(
            page.items.iter().all(|report| report.user_name == "Ben Reyes"),
            "every hit is Ben"
        );
    }

    #[test]
    fn page_number_is_clamped() {
        let query = ReportQuery {
            page: 99,
            ..ReportQuery::default()
        };
        assert_eq!(page(reports(10), &query).page, 2, "clamped to last page");
        let empty = page(Vec::new(), &query);
        assert_eq!((empty.page, empty.total_pages), (1, 0), "empty result stays on page 1");
    }
}
