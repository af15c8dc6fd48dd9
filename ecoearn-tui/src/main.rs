//! Terminal admin console for EcoEarn: bins, QR activation, reports, funds and statistics.

mod app;
mod capture;
mod config;
mod input;
mod logging;
mod ui;

use std::{io, mem, path::Path, sync::Arc, time::Duration as StdDuration};

use anyhow::{Context, Result};
use chrono::Utc;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event as CEvent, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ecoearn_core::{
    Backend, BinId, Deactivation, EcoEarnService, FillLevel, MemoryStore, RegistryError,
    ScanFailure, ScanStatus, TransactionKind, UserId,
    scanner::{self, NoFrameDecoder},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use reqwest::Client;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::app::{App, ScanTask, Screen};
use crate::capture::ReaderProcess;
use crate::config::{BackendKind, Config};
use crate::input::Action;

type Term = Terminal<CrosstermBackend<io::Stdout>>;

#[tokio::main]
async fn main() -> Result<()> {
    let config = match Config::load() {
        Ok(config) => config,
        Err(err) => err.exit(),
    };
    logging::init(&config.log_level, &config.log_dir)?;

    // Storage + service setup
    let store = open_backend(&config).await?;
    info!(backend = %store.name, user = %config.user, "console starting");
    let service = Arc::new(EcoEarnService::new(
        store,
        config.deactivation_policy.into(),
    ));

    // App state
    let app = App::new(
        service,
        UserId::from(config.user.as_str()),
        config.export_dir.clone(),
        config.capture_command.clone(),
    );

    // Terminal init
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run event loop
    let res = run(&mut terminal, app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    res
}

async fn open_backend(config: &Config) -> Result<Backend> {
    match config.backend {
        BackendKind::Memory => {
            let store = match &config.seed {
                Some(path) => {
                    let json = tokio::fs::read_to_string(path)
                        .await
                        .with_context(|| format!("Failed to read seed {}", path.display()))?;
                    MemoryStore::from_json(&json).context("Failed to parse seed data")?
                }
                None => MemoryStore::new(),
            };
            Ok(Arc::new(store).into_backend())
        }
        BackendKind::Firestore => {
            let firestore = config
                .firestore()
                .context("--project-id is required for the firestore backend")?;
            let client = Client::builder()
                .user_agent("ecoearn/0.1")
                .timeout(StdDuration::from_secs(config.http_timeout))
                .build()?;
            Ok(ecoearn_store_firestore::backend(client, firestore))
        }
    }
}

async fn run(terminal: &mut Term, mut app: App) -> Result<()> {
    perform(terminal, &mut app, Action::Refresh).await?;

    loop {
        // Draw current UI
        terminal.draw(|frame| ui::draw(frame, &app))?;

        poll_scan(&mut app).await;

        // Poll for input (non-blocking, small timeout to keep CPU low)
        if event::poll(StdDuration::from_millis(100))?
            && let CEvent::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            match input::handle_key_event(key, &mut app) {
                Action::Quit => break,
                Action::None => {}
                action => perform(terminal, &mut app, action).await?,
            }
        }
    }

    app.cancel_scan();
    Ok(())
}

/// Run `action` with the loading indicator shown; failures end up in the status bar.
async fn perform(terminal: &mut Term, app: &mut App, action: Action) -> Result<()> {
    app.is_loading = true;
    app.error_message = None;
    terminal.draw(|frame| ui::draw(frame, app))?;

    let outcome = dispatch(app, action).await;

    app.is_loading = false;
    if let Err(err) = outcome {
        let message = format!("{err:#}");
        warn!(?action, error = %message, "action failed");
        app.fail(message);
    }
    Ok(())
}

#[expect(clippy::too_many_lines, reason = "one arm per action")]
async fn dispatch(app: &mut App, action: Action) -> Result<()> {
    match action {
        Action::None | Action::Quit => {}
        Action::Refresh => refresh(app).await?,
        Action::LoadMonthly => load_monthly(app).await?,
        Action::ExportSummary => {
            let path = app
                .service
                .export_year_summary(app.year, &app.export_dir)
                .await
                .context("Failed to export report")?;
            app.inform(format!("Report saved to {}", path.display()));
        }
        Action::CreateBin => {
            let image = app.take_input();
            let name = mem::take(&mut app.pending_bin_name);
            let created = if image.trim().is_empty() {
                Err(RegistryError::MissingImage)
            } else {
                app.service
                    .create_bin_from_file(&name, Path::new(image.trim()))
                    .await
            };
            let bin = created.context("Failed to create bin")?;
            app.inform(format!("Bin {} created successfully! QR code generated.", bin.name));
            load_bins(app).await?;
        }
        Action::RegenerateQr => {
            let id = selected_bin_id(app)?;
            app.service
                .regenerate_qr(&id)
                .await
                .context("Failed to generate QR code")?;
            app.inform(format!("New QR payload issued for bin {id}"));
            load_bins(app).await?;
        }
        Action::ExportQr => {
            let id = selected_bin_id(app)?;
            let path = app
                .service
                .export_qr(&id, &app.export_dir)
                .await
                .context("Failed to export QR code")?;
            app.inform(format!("QR payload saved to {}", path.display()));
        }
        Action::ForceRelease => {
            let id = selected_bin_id(app)?;
            let outcome = app
                .service
                .force_release(&id, &app.user)
                .await
                .context("Failed to release bin")?;
            match outcome {
                Deactivation::Deactivated => app.inform(format!("Bin {id} released")),
                Deactivation::AlreadyInactive => app.inform(format!("Bin {id} is not in use")),
            }
            load_bins(app).await?;
        }
        Action::SetFillLevel => {
            let id = selected_bin_id(app)?;
            let typed = app.take_input();
            let raw: i64 = typed
                .trim()
                .parse()
                .with_context(|| format!("`{}` is not a number", typed.trim()))?;
            let level = FillLevel::try_from(raw)?;
            app.service
                .set_fill_level(&id, level)
                .await
                .context("Failed to update fill level")?;
            app.inform(format!("Bin {id} is now {level} full"));
            load_bins(app).await?;
        }
        Action::LoadHistory => {
            let id = selected_bin_id(app)?;
            app.history = app
                .service
                .occupancy_history(&id)
                .await
                .context("Failed to load occupancy history")?;
            if app.history.is_empty() {
                app.inform(format!("Bin {id} has no recorded activity"));
            }
        }
        Action::StartScan => {
            let command = app.capture_command.clone();
            app.scanner.begin();
            let task: ScanTask = tokio::spawn(async move {
                let mut source = ReaderProcess::spawn(&command)?;
                scanner::acquire_token(&mut source, &NoFrameDecoder).await
            });
            app.scan_task = Some(task);
            info!(user = %app.user, "live scan started");
        }
        Action::StopScan => {
            app.cancel_scan();
            app.inform("Scanning stopped");
        }
        Action::SubmitManualScan => {
            let raw = app.take_input();
            submit_scan(app, &raw).await?;
        }
        Action::DeactivateScan => match app.scanner.deactivate().await {
            Ok(bin) => {
                app.inform(format!("Bin {bin} deactivated"));
                load_bins(app).await?;
            }
            Err(failure) => app.fail(failure.to_string()),
        },
        Action::LoadReports => load_reports(app).await?,
        Action::RecordFunds(kind) => {
            let description = app.take_input();
            let amount = mem::take(&mut app.pending_amount);
            match kind {
                TransactionKind::Add => {
                    app.service.add_funds(&amount, &description).await?;
                    app.inform("Funds added successfully!");
                }
                TransactionKind::Withdraw => {
                    app.service.withdraw_funds(&amount, &description).await?;
                    app.inform("Funds withdrawn successfully!");
                }
            }
            load_ledger(app).await?;
        }
    }
    Ok(())
}

/// Collect the result of a finished capture task, if any.
async fn poll_scan(app: &mut App) {
    if !app.scan_task.as_ref().is_some_and(JoinHandle::is_finished) {
        return;
    }
    let Some(task) = app.scan_task.take() else {
        return;
    };

    match task.await {
        Ok(Ok(text)) => {
            if let Err(err) = submit_scan(app, &text).await {
                app.fail(format!("{err:#}"));
            }
        }
        Ok(Err(failure)) => app.scanner.fail(failure),
        Err(err) => app
            .scanner
            .fail(ScanFailure::CameraUnavailable(err.to_string())),
    }
}

async fn submit_scan(app: &mut App, raw: &str) -> Result<()> {
    let activated = matches!(app.scanner.submit(raw).await, ScanStatus::Success { .. });
    if activated {
        load_bins(app).await?;
    }
    Ok(())
}

fn selected_bin_id(app: &App) -> Result<BinId> {
    app.selected_bin()
        .map(|bin| bin.id.clone())
        .context("No bin selected")
}

async fn refresh(app: &mut App) -> Result<()> {
    match app.screen {
        Screen::Dashboard => {
            app.dashboard = Some(
                app.service
                    .dashboard(Utc::now())
                    .await
                    .context("Failed to load statistics")?,
            );
            app.balance = app.service.balance().await?;
            load_monthly(app).await
        }
        Screen::Bins | Screen::Scanner => load_bins(app).await,
        Screen::Reports => load_reports(app).await,
        Screen::Ledger => load_ledger(app).await,
    }
}

async fn load_bins(app: &mut App) -> Result<()> {
    let bins = app.service.bins().await.context("Failed to load bins")?;
    app.set_bins(bins);
    Ok(())
}

async fn load_monthly(app: &mut App) -> Result<()> {
    app.monthly = Some(
        app.service
            .monthly_series(app.year)
            .await
            .context("Failed to load monthly statistics")?,
    );
    Ok(())
}

async fn load_reports(app: &mut App) -> Result<()> {
    let page = app
        .service
        .reports(&app.report_query)
        .await
        .context("Failed to load reports")?;
    app.report_query.page = page.page;
    app.report_index = app.report_index.min(page.items.len().saturating_sub(1));
    app.report_page = Some(page);
    Ok(())
}

async fn load_ledger(app: &mut App) -> Result<()> {
    app.ledger_entries = app
        .service
        .ledger_entries(app.ledger_filter, &app.ledger_search)
        .await?;
    app.balance = app.service.balance().await?;
    Ok(())
}
