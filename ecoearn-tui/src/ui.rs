use chrono::{DateTime, Local, Utc};
use ecoearn_core::ledger::KindFilter;
use ecoearn_core::model::{Bin, FillLevel, Occupancy, TransactionKind};
use ecoearn_core::scanner::ScanStatus;
use ecoearn_core::stats::{MONTHS, format_peso};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Cell, List, ListItem, Paragraph, Row, Table, TableState, Tabs, Wrap},
};

use crate::app::{App, InputMode, Screen};

pub(crate) fn draw(frame: &mut Frame<'_>, app: &App) {
    let area = frame.area();

    // Outer layout: tabs, main content, input line, status line
    let layout_chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(area);

    let chunks = layout_chunks.as_ref();
    let [header_area, content_area, input_area, status_area] = chunks else {
        return;
    };

    let titles: Vec<&str> = Screen::ALL.iter().map(|screen| screen.title()).collect();
    let tabs = Tabs::new(titles)
        .select(app.screen.index())
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("EcoEarn admin · {}", app.service.backend_name())),
        )
        .highlight_style(
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        );
    frame.render_widget(tabs, *header_area);

    match app.screen {
        Screen::Dashboard => draw_dashboard(frame, app, *content_area),
        Screen::Bins => draw_bins(frame, app, *content_area),
        Screen::Scanner => draw_scanner(frame, app, *content_area),
        Screen::Reports => draw_reports(frame, app, *content_area),
        Screen::Ledger => draw_ledger(frame, app, *content_area),
    }

    draw_input(frame, app, *input_area);
    draw_status(frame, app, *status_area);
}

fn draw_input(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let (title, text, style) = match app.mode {
        InputMode::Editing(field) => (
            format!("{} (Enter confirm · Esc cancel)", field.prompt()),
            format!("{}▏", app.input),
            Style::default().fg(Color::Yellow),
        ),
        InputMode::Normal => (String::from("Input"), String::new(), Style::default()),
    };
    let input = Paragraph::new(text)
        .style(style)
        .block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(input, area);
}

fn draw_status(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let nav_hint = match (app.mode, app.screen) {
        (InputMode::Editing(_), _) => "Type to edit · Enter confirm · Esc cancel · Ctrl-C quit",
        (_, Screen::Dashboard) => "←/→ year · p export report · Tab next · r refresh · q quit",
        (_, Screen::Bins) => {
            "↑/↓ move · n new · g new QR · e export QR · l level · f force release · h history · q quit"
        }
        (_, Screen::Scanner) if app.is_scanning() => "x/Esc stop scanning · q quit",
        (_, Screen::Scanner) => "s scan · m manual payload · d deactivate · Tab next · q quit",
        (_, Screen::Reports) => "↑/↓ move · ←/→ page · o order · / search · Tab next · q quit",
        (_, Screen::Ledger) => "a add · w withdraw · t type filter · / search · Tab next · q quit",
    };

    let status_text = if app.is_loading {
        format!("Loading… · {nav_hint}")
    } else if let Some(msg) = app.error_message.as_ref().or(app.notice.as_ref()) {
        format!("{msg} · {nav_hint}")
    } else {
        nav_hint.to_owned()
    };

    let status_style = if app.error_message.is_some() {
        Style::default().fg(Color::Red)
    } else if app.is_loading {
        Style::default().fg(Color::Yellow)
    } else if app.notice.is_some() {
        Style::default().fg(Color::Green)
    } else {
        Style::default()
    };

    let status = Paragraph::new(status_text)
        .block(Block::default().borders(Borders::ALL).title("Status"))
        .style(status_style)
        .wrap(Wrap { trim: true });

    frame.render_widget(status, area);
}

fn draw_dashboard(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let Some(dashboard) = &app.dashboard else {
        let paragraph = Paragraph::new("Press r to load statistics.")
            .block(Block::default().borders(Borders::ALL).title("Dashboard"));
        frame.render_widget(paragraph, area);
        return;
    };

    let layout_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(area);
    let chunks = layout_chunks.as_ref();
    let [left_area, right_area] = chunks else {
        return;
    };

    let left_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(9), Constraint::Min(0)])
        .split(*left_area);
    let left = left_chunks.as_ref();
    let [stats_area, recent_area] = left else {
        return;
    };

    let lines = vec![
        Line::from(format!("Users           {}", dashboard.users.total)),
        Line::from(format!("  active        {}", dashboard.users.active)),
        Line::from(format!("  inactive      {}", dashboard.users.inactive)),
        Line::from(format!("Reports         {}", dashboard.reports)),
        Line::from(format!("Plastic         {:.1}", dashboard.totals.plastic)),
        Line::from(format!("Tin Cans        {:.1}", dashboard.totals.tin_cans)),
        Line::from(format!("Balance         {}", format_peso(app.balance))),
    ];
    let stats = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Totals"));
    frame.render_widget(stats, *stats_area);

    let recent: Vec<ListItem<'_>> = if dashboard.recent.is_empty() {
        vec![ListItem::new("No recycling activity yet.")]
    } else {
        dashboard
            .recent
            .iter()
            .map(|record| {
                ListItem::new(format!(
                    "{}  {}  {} × {:.0}  +{} pts",
                    local_time(record.recorded_at),
                    record.user_name,
                    record.material,
                    record.quantity,
                    record.points
                ))
            })
            .collect()
    };
    let recent = List::new(recent).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Recent recycles"),
    );
    frame.render_widget(recent, *recent_area);

    let years = dashboard
        .years
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<String>>()
        .join(" ");
    let title = format!("Monthly deposits {} (years with data: {years})", app.year);

    let rows = MONTHS.iter().enumerate().map(|(index, month)| {
        let (plastic, tin_cans) = app.monthly.as_ref().map_or((0.0, 0.0), |series| {
            (
                series.plastic.get(index).copied().unwrap_or_default(),
                series.tin_cans.get(index).copied().unwrap_or_default(),
            )
        });
        Row::new(vec![
            Cell::from(*month),
            Cell::from(format!("{plastic:.1}")),
            Cell::from(bar(plastic)).style(Style::default().fg(Color::Magenta)),
            Cell::from(format!("{tin_cans:.1}")),
            Cell::from(bar(tin_cans)).style(Style::default().fg(Color::Yellow)),
        ])
    });
    let table = Table::new(
        rows,
        [
            Constraint::Length(5),
            Constraint::Length(8),
            Constraint::Min(10),
            Constraint::Length(8),
            Constraint::Min(10),
        ],
    )
    .header(
        Row::new(vec!["Month", "Plastic", "", "Tin Cans", ""])
            .style(Style::default().add_modifier(Modifier::BOLD)),
    )
    .block(Block::default().borders(Borders::ALL).title(title))
    .column_spacing(1);
    frame.render_widget(table, *right_area);
}

fn bar(quantity: f64) -> String {
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "clamped to a small positive width"
    )]
    let width = quantity.clamp(0.0, 30.0).round() as usize;
    "█".repeat(width)
}

fn draw_bins(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let layout_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(8)])
        .split(area);
    let chunks = layout_chunks.as_ref();
    let [list_area, detail_area] = chunks else {
        return;
    };

    let rows = app.bins.iter().map(|bin| {
        let style = match bin.occupancy {
            Occupancy::Active { .. } => Style::default().fg(Color::Blue),
            Occupancy::Inactive => Style::default(),
        };
        Row::new(vec![
            Cell::from(bin.name.clone()),
            Cell::from(status_label(&bin.occupancy)),
            Cell::from(
                bin.occupancy
                    .occupant()
                    .map_or_else(|| String::from("-"), ToString::to_string),
            ),
            Cell::from(bin.level.to_string()).style(level_style(bin.level)),
            Cell::from(if bin.qr_data.is_some() { "yes" } else { "no" }),
        ])
        .style(style)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Min(20),
            Constraint::Length(10),
            Constraint::Length(20),
            Constraint::Length(6),
            Constraint::Length(4),
        ],
    )
    .header(
        Row::new(vec!["Name", "Status", "User", "Level", "QR"])
            .style(Style::default().add_modifier(Modifier::BOLD)),
    )
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("Bins ({})", app.bins.len())),
    )
    .row_highlight_style(
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    );

    let mut state = TableState::default();
    if !app.bins.is_empty() {
        state.select(Some(app.bin_index));
    }
    frame.render_stateful_widget(table, *list_area, &mut state);

    let detail = app
        .selected_bin()
        .map_or_else(|| vec![Line::from("No bin selected.")], |bin| bin_detail(app, bin));
    let paragraph = Paragraph::new(detail)
        .block(Block::default().borders(Borders::ALL).title("Details"))
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, *detail_area);
}

fn bin_detail(app: &App, bin: &Bin) -> Vec<Line<'static>> {
    let location = bin.location.map_or_else(
        || String::from("not reported"),
        |point| format!("{:.5}, {:.5}", point.lat, point.lng),
    );
    let mut lines = vec![
        Line::from(format!("Id: {}", bin.id)),
        Line::from(format!("Location: {location}")),
    ];
    if app.history.is_empty() {
        lines.push(Line::from("Press h for occupancy history."));
    } else {
        lines.extend(app.history.iter().rev().take(4).map(|event| {
            Line::from(format!(
                "{}  {}  by {}",
                local_time(event.at),
                event.transition,
                event.user_id
            ))
        }));
    }
    lines
}

fn status_label(occupancy: &Occupancy) -> &'static str {
    match occupancy {
        Occupancy::Active { .. } => "Active",
        Occupancy::Inactive => "Inactive",
    }
}

fn level_style(level: FillLevel) -> Style {
    match level.percent() {
        0..=49 => Style::default().fg(Color::Green),
        50..=79 => Style::default().fg(Color::Yellow),
        _ => Style::default().fg(Color::Red),
    }
}

fn draw_scanner(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let (message, style) = match app.scanner.status() {
        ScanStatus::Idle => (
            String::from("Ready. Press s to scan with the camera or m to paste a payload."),
            Style::default(),
        ),
        ScanStatus::Scanning => (
            String::from("Scanning… hold the bin's QR code in front of the camera."),
            Style::default().fg(Color::Yellow),
        ),
        ScanStatus::Success { bin } => (
            format!("Bin {bin} activated successfully!"),
            Style::default().fg(Color::Green),
        ),
        ScanStatus::Error(failure) => (failure.to_string(), Style::default().fg(Color::Red)),
    };

    let active = app.scanner.active_bin().map_or_else(
        || String::from("No bin active in this session."),
        |bin| format!("Active bin: {bin} (press d to deactivate)"),
    );

    let lines = vec![
        Line::from(format!("Scanning as {}", app.scanner.user())),
        Line::from(""),
        Line::styled(message, style.add_modifier(Modifier::BOLD)),
        Line::from(""),
        Line::from(active),
    ];

    let paragraph = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("QR scanner"))
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}

fn draw_reports(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let layout_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(area);
    let chunks = layout_chunks.as_ref();
    let [list_area, detail_area] = chunks else {
        return;
    };

    let Some(page) = &app.report_page else {
        let paragraph = Paragraph::new("Press r to load reports.")
            .block(Block::default().borders(Borders::ALL).title("Reports"));
        frame.render_widget(paragraph, area);
        return;
    };

    let rows = page.items.iter().map(|report| {
        Row::new(vec![
            Cell::from(report.user_name.clone()),
            Cell::from(local_time(report.submitted_at)),
            Cell::from(report.location.clone()),
        ])
    });
    let search = if app.report_query.search.is_empty() {
        String::new()
    } else {
        format!(" · \"{}\"", app.report_query.search)
    };
    let title = format!(
        "Reports {}/{} · {} total · {:?} first{search}",
        page.page,
        page.total_pages.max(1),
        page.total,
        app.report_query.order
    );
    let table = Table::new(
        rows,
        [
            Constraint::Min(14),
            Constraint::Length(18),
            Constraint::Min(10),
        ],
    )
    .header(
        Row::new(vec!["User", "Submitted", "Location"])
            .style(Style::default().add_modifier(Modifier::BOLD)),
    )
    .block(Block::default().borders(Borders::ALL).title(title))
    .row_highlight_style(
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    );

    let mut state = TableState::default();
    if !page.items.is_empty() {
        state.select(Some(app.report_index));
    }
    frame.render_stateful_widget(table, *list_area, &mut state);

    let detail = page.items.get(app.report_index).map_or_else(
        || vec![Line::from("No reports found.")],
        |report| {
            vec![
                Line::from(format!("From: {}", report.user_name)),
                Line::from(format!("Location: {}", report.location)),
                Line::from(format!(
                    "Submitted: {}",
                    local_time(report.submitted_at)
                )),
                Line::from(format!(
                    "Photo: {}",
                    if report.image.is_some() { "attached" } else { "none" }
                )),
                Line::from(""),
                Line::from(report.description.clone()),
            ]
        },
    );
    let paragraph = Paragraph::new(detail)
        .block(Block::default().borders(Borders::ALL).title("Report"))
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, *detail_area);
}

fn draw_ledger(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let layout_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(area);
    let chunks = layout_chunks.as_ref();
    let [balance_area, list_area] = chunks else {
        return;
    };

    let balance = Paragraph::new(format!("Current balance: {}", format_peso(app.balance)))
        .style(Style::default().add_modifier(Modifier::BOLD))
        .block(Block::default().borders(Borders::ALL).title("Admin funds"));
    frame.render_widget(balance, *balance_area);

    let filter = match app.ledger_filter {
        KindFilter::All => "all",
        KindFilter::Add => "funds added",
        KindFilter::Withdraw => "withdrawals",
    };
    let title = if app.ledger_search.is_empty() {
        format!("Transactions · {filter}")
    } else {
        format!("Transactions · {filter} · \"{}\"", app.ledger_search)
    };

    if app.ledger_entries.is_empty() {
        let paragraph = Paragraph::new("No transactions yet.")
            .block(Block::default().borders(Borders::ALL).title(title));
        frame.render_widget(paragraph, *list_area);
        return;
    }

    let rows = app.ledger_entries.iter().map(|entry| {
        let (label, sign, color) = match entry.kind {
            TransactionKind::Add => ("Funds Added", "+", Color::Green),
            TransactionKind::Withdraw => ("Points Redemption", "-", Color::Red),
        };
        Row::new(vec![
            Cell::from(local_time(entry.recorded_at)),
            Cell::from(label),
            Cell::from(entry.description.clone()),
            Cell::from(format!("{sign}{}", format_peso(entry.amount)))
                .style(Style::default().fg(color)),
        ])
    });
    let table = Table::new(
        rows,
        [
            Constraint::Length(18),
            Constraint::Length(18),
            Constraint::Min(20),
            Constraint::Length(14),
        ],
    )
    .header(
        Row::new(vec!["When", "Type", "Description", "Amount"])
            .style(Style::default().add_modifier(Modifier::BOLD)),
    )
    .block(Block::default().borders(Borders::ALL).title(title))
    .column_spacing(1);
    frame.render_widget(table, *list_area);
}

fn local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%b %d, %Y %H:%M").to_string()
}
