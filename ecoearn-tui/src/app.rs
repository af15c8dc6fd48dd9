use std::mem;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Datelike, Utc};
use ecoearn_core::ledger::KindFilter;
use ecoearn_core::model::{Bin, LedgerEntry, OccupancyEvent, TransactionKind, UserId};
use ecoearn_core::reports::{ReportPage, ReportQuery};
use ecoearn_core::scanner::{ScanFailure, ScannerSession};
use ecoearn_core::service::{Dashboard, EcoEarnService};
use ecoearn_core::stats::MonthlySeries;
use rust_decimal::Decimal;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Screen {
    Dashboard,
    Bins,
    Scanner,
    Reports,
    Ledger,
}

impl Screen {
    pub(crate) const ALL: [Screen; 5] = [
        Screen::Dashboard,
        Screen::Bins,
        Screen::Scanner,
        Screen::Reports,
        Screen::Ledger,
    ];

    pub(crate) fn title(self) -> &'static str {
        match self {
            Screen::Dashboard => "Dashboard",
            Screen::Bins => "Bins",
            Screen::Scanner => "Scanner",
            Screen::Reports => "Reports",
            Screen::Ledger => "Transactions",
        }
    }

    pub(crate) fn index(self) -> usize {
        Screen::ALL
            .iter()
            .position(|screen| *screen == self)
            .unwrap_or_default()
    }

    pub(crate) fn next(self) -> Self {
        Screen::ALL
            .get((self.index() + 1) % Screen::ALL.len())
            .copied()
            .unwrap_or(Screen::Dashboard)
    }

    pub(crate) fn previous(self) -> Self {
        Screen::ALL
            .get((self.index() + Screen::ALL.len() - 1) % Screen::ALL.len())
            .copied()
            .unwrap_or(Screen::Dashboard)
    }
}

/// Text field currently receiving keystrokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Field {
    BinName,
    BinImage,
    FillLevel,
    ManualPayload,
    ReportSearch,
    LedgerSearch,
    FundAmount(TransactionKind),
    FundDescription(TransactionKind),
}

impl Field {
    pub(crate) fn prompt(self) -> &'static str {
        match self {
            Field::BinName => "New bin name",
            Field::BinImage => "Path to bin picture",
            Field::FillLevel => "Fill level (0-100)",
            Field::ManualPayload => "Paste QR payload",
            Field::ReportSearch => "Search by user name",
            Field::LedgerSearch => "Search descriptions",
            Field::FundAmount(TransactionKind::Add) => "Amount to add (₱)",
            Field::FundAmount(TransactionKind::Withdraw) => "Amount to withdraw (₱)",
            Field::FundDescription(_) => "Description (optional)",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InputMode {
    Normal,
    Editing(Field),
}

pub(crate) type ScanTask = JoinHandle<Result<String, ScanFailure>>;

pub(crate) struct App {
    pub(crate) service: Arc<EcoEarnService>,
    pub(crate) user: UserId,
    pub(crate) export_dir: PathBuf,
    pub(crate) capture_command: String,

    pub(crate) screen: Screen,
    pub(crate) mode: InputMode,
    pub(crate) input: String,

    pub(crate) dashboard: Option<Dashboard>,
    pub(crate) year: i32,
    pub(crate) monthly: Option<MonthlySeries>,

    pub(crate) bins: Vec<Bin>,
    pub(crate) bin_index: usize,
    pub(crate) history: Vec<OccupancyEvent>,
    pub(crate) pending_bin_name: String,

    pub(crate) scanner: ScannerSession,
    pub(crate) scan_task: Option<ScanTask>,

    pub(crate) report_query: ReportQuery,
    pub(crate) report_page: Option<ReportPage>,
    pub(crate) report_index: usize,

    pub(crate) ledger_filter: KindFilter,
    pub(crate) ledger_search: String,
    pub(crate) ledger_entries: Vec<LedgerEntry>,
    pub(crate) balance: Decimal,
    pub(crate) pending_amount: String,

    pub(crate) is_loading: bool,
    pub(crate) error_message: Option<String>,
    pub(crate) notice: Option<String>,
}

impl App {
    pub(crate) fn new(
        service: Arc<EcoEarnService>,
        user: UserId,
        export_dir: PathBuf,
        capture_command: String,
    ) -> Self {
        let scanner = service.scanner(user.clone());
        Self {
            service,
            user,
            export_dir,
            capture_command,
            screen: Screen::Dashboard,
            mode: InputMode::Normal,
            input: String::new(),
            dashboard: None,
            year: Utc::now().year(),
            monthly: None,
            bins: Vec::new(),
            bin_index: 0,
            history: Vec::new(),
            pending_bin_name: String::new(),
            scanner,
            scan_task: None,
            report_query: ReportQuery {
                page: 1,
                ..ReportQuery::default()
            },
            report_page: None,
            report_index: 0,
            ledger_filter: KindFilter::All,
            ledger_search: String::new(),
            ledger_entries: Vec::new(),
            balance: Decimal::ZERO,
            pending_amount: String::new(),
            is_loading: false,
            error_message: None,
            notice: None,
        }
    }

    pub(crate) fn begin_editing(&mut self, field: Field) {
        self.input.clear();
        self.mode = InputMode::Editing(field);
    }

    /// Leave editing mode and hand back what was typed.
    pub(crate) fn take_input(&mut self) -> String {
        self.mode = InputMode::Normal;
        mem::take(&mut self.input)
    }

    pub(crate) fn selected_bin(&self) -> Option<&Bin> {
        self.bins.get(self.bin_index)
    }

    pub(crate) fn set_bins(&mut self, bins: Vec<Bin>) {
        self.bins = bins;
        self.bin_index = self.bin_index.min(self.bins.len().saturating_sub(1));
    }

    pub(crate) fn report_count(&self) -> usize {
        self.report_page.as_ref().map_or(0, |page| page.items.len())
    }

    pub(crate) fn fail(&mut self, message: impl Into<String>) {
        self.notice = None;
        self.error_message = Some(message.into());
    }

    pub(crate) fn inform(&mut self, message: impl Into<String>) {
        self.error_message = None;
        self.notice = Some(message.into());
    }

    pub(crate) fn is_scanning(&self) -> bool {
        self.scan_task.is_some()
    }

    /// Abort a running capture; dropping the task kills the reader process.
    pub(crate) fn cancel_scan(&mut self) {
        if let Some(task) = self.scan_task.take() {
            task.abort();
        }
        self.scanner.stop();
    }
}

/// Move `index` one step within `0..len`.
pub(crate) fn step(index: usize, len: usize, forward: bool) -> usize {
    if forward {
        if index + 1 < len { index + 1 } else { index }
    } else {
        index.saturating_sub(1)
    }
}
