use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ecoearn_core::model::TransactionKind;

use crate::app::{self, App, Field, InputMode, Screen};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
    None,
    Quit,
    /// Reload whatever the current screen shows
    Refresh,
    /// Load the monthly series for `app.year`
    LoadMonthly,
    /// Write the yearly report for `app.year`
    ExportSummary,
    /// Create a bin from `app.pending_bin_name` and the typed image path
    CreateBin,
    RegenerateQr,
    ExportQr,
    /// Release the selected bin on behalf of the admin
    ForceRelease,
    /// Apply the typed fill level to the selected bin
    SetFillLevel,
    LoadHistory,
    /// Start the capture task
    StartScan,
    /// Abort the capture task
    StopScan,
    /// Submit the typed payload to the scanner session
    SubmitManualScan,
    /// Release the bin activated in this session
    DeactivateScan,
    LoadReports,
    /// Record a ledger entry from `app.pending_amount` and the typed description
    RecordFunds(TransactionKind),
}

pub(crate) fn handle_key_event(key: KeyEvent, app: &mut App) -> Action {
    // Global quit shortcut, also while typing
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Action::Quit;
    }

    match app.mode {
        InputMode::Editing(field) => handle_editing(key, app, field),
        InputMode::Normal => handle_normal(key, app),
    }
}

fn handle_editing(key: KeyEvent, app: &mut App, field: Field) -> Action {
    use KeyCode::{Backspace, Char, Enter, Esc};

    match key.code {
        Char(character)
            if !key.modifiers.contains(KeyModifiers::CONTROL)
                && !key.modifiers.contains(KeyModifiers::ALT) =>
        {
            app.input.push(character);
            Action::None
        }
        Backspace => {
            app.input.pop();
            Action::None
        }
        Esc => {
            app.take_input();
            Action::None
        }
        Enter => finish_field(app, field),
        _ => Action::None,
    }
}

fn finish_field(app: &mut App, field: Field) -> Action {
    match field {
        Field::BinName => {
            app.pending_bin_name = app.take_input();
            app.begin_editing(Field::BinImage);
            Action::None
        }
        Field::FundAmount(kind) => {
            app.pending_amount = app.take_input();
            app.begin_editing(Field::FundDescription(kind));
            Action::None
        }
        Field::ReportSearch => {
            app.report_query.search = app.take_input();
            app.report_query.page = 1;
            app.report_index = 0;
            Action::LoadReports
        }
        Field::LedgerSearch => {
            app.ledger_search = app.take_input();
            Action::Refresh
        }
        // The remaining fields are consumed by the action handler.
        Field::BinImage => Action::CreateBin,
        Field::FillLevel => Action::SetFillLevel,
        Field::ManualPayload => Action::SubmitManualScan,
        Field::FundDescription(kind) => Action::RecordFunds(kind),
    }
}

fn handle_normal(key: KeyEvent, app: &mut App) -> Action {
    use KeyCode::{BackTab, Char, Down, Esc, Left, Right, Tab, Up};

    match key.code {
        Char('q') => return Action::Quit,
        Tab => {
            app.screen = app.screen.next();
            return Action::Refresh;
        }
        BackTab => {
            app.screen = app.screen.previous();
            return Action::Refresh;
        }
        Char('r') => return Action::Refresh,
        _ => {}
    }

    match app.screen {
        Screen::Dashboard => match key.code {
            Left | Char('[') => {
                app.year -= 1;
                Action::LoadMonthly
            }
            Right | Char(']') => {
                app.year += 1;
                Action::LoadMonthly
            }
            Char('p') => Action::ExportSummary,
            _ => Action::None,
        },

        Screen::Bins => match key.code {
            Up | Char('k') => {
                app.bin_index = app::step(app.bin_index, app.bins.len(), false);
                app.history.clear();
                Action::None
            }
            Down | Char('j') => {
                app.bin_index = app::step(app.bin_index, app.bins.len(), true);
                app.history.clear();
                Action::None
            }
            Char('n') => {
                app.begin_editing(Field::BinName);
                Action::None
            }
            Char('l') if app.selected_bin().is_some() => {
                app.begin_editing(Field::FillLevel);
                Action::None
            }
            Char('g') => Action::RegenerateQr,
            Char('e') => Action::ExportQr,
            Char('f') => Action::ForceRelease,
            Char('h') => Action::LoadHistory,
            _ => Action::None,
        },

        Screen::Scanner => match key.code {
            Char('s') if !app.is_scanning() => Action::StartScan,
            Char('x') | Esc if app.is_scanning() => Action::StopScan,
            Char('m') if !app.is_scanning() => {
                app.begin_editing(Field::ManualPayload);
                Action::None
            }
            Char('d') => Action::DeactivateScan,
            _ => Action::None,
        },

        Screen::Reports => match key.code {
            Up | Char('k') => {
                app.report_index = app::step(app.report_index, app.report_count(), false);
                Action::None
            }
            Down | Char('j') => {
                app.report_index = app::step(app.report_index, app.report_count(), true);
                Action::None
            }
            Left | Char('[') if app.report_query.page > 1 => {
                app.report_query.page -= 1;
                app.report_index = 0;
                Action::LoadReports
            }
            Right | Char(']') => {
                let last = app
                    .report_page
                    .as_ref()
                    .map_or(1, |page| page.total_pages.max(1));
                if app.report_query.page < last {
                    app.report_query.page += 1;
                    app.report_index = 0;
                    Action::LoadReports
                } else {
                    Action::None
                }
            }
            Char('o') => {
                app.report_query.order = app.report_query.order.toggled();
                app.report_query.page = 1;
                app.report_index = 0;
                Action::LoadReports
            }
            Char('/') => {
                app.begin_editing(Field::ReportSearch);
                Action::None
            }
            _ => Action::None,
        },

        Screen::Ledger => match key.code {
            Char('a') => {
                app.begin_editing(Field::FundAmount(TransactionKind::Add));
                Action::None
            }
            Char('w') => {
                app.begin_editing(Field::FundAmount(TransactionKind::Withdraw));
                Action::None
            }
            Char('t') => {
                app.ledger_filter = app.ledger_filter.next();
                Action::Refresh
            }
            Char('/') => {
                app.begin_editing(Field::LedgerSearch);
                Action::None
            }
            _ => Action::None,
        },
    }
}
