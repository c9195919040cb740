use std::io::{self, IsTerminal, Write};

use chrono::NaiveDate;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::datetime::{format_date, format_long_date};
use crate::ledger::MaintenanceLedger;
use crate::notice::{Level, Notice};
use crate::settings::IntervalSettings;
use crate::status::{StatusReport, Stats, Urgency, status_for_event};

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> Self {
        Self {
            color: cfg.color() && io::stdout().is_terminal(),
        }
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip_all)]
    pub fn write_dashboard<W: Write>(
        &self,
        out: &mut W,
        report: &StatusReport,
        settings: &IntervalSettings,
        stats: Stats,
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        writeln!(out, "{}", format_long_date(today))?;
        writeln!(out)?;

        for status in report.iter() {
            let badge = self.badge(&status.label().to_uppercase(), status.urgency(settings));
            writeln!(out, "{}  {}", status.category.label(), badge)?;
            writeln!(out, "  every {} days", status.interval_days)?;
            writeln!(out, "  next: {}", format_date(status.next_due))?;
            writeln!(out)?;
        }

        writeln!(out, "Total changes  {}", stats.total)?;
        writeln!(out, "Still valid    {}", stats.active)?;
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(count = ledger.len()))]
    pub fn write_history<W: Write>(
        &self,
        out: &mut W,
        ledger: &MaintenanceLedger,
        settings: &IntervalSettings,
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        if ledger.is_empty() {
            writeln!(out, "No oil changes recorded yet.")?;
            return Ok(());
        }

        let headers = vec![
            "ID".to_string(),
            "Type".to_string(),
            "Date".to_string(),
            "Next".to_string(),
            "Notes".to_string(),
        ];

        let mut rows = Vec::with_capacity(ledger.len());
        for event in ledger.newest_first() {
            let status = status_for_event(event, settings, today);
            let next = format_date(status.next_due);
            let next = if status.is_overdue() {
                self.paint(&next, "31")
            } else {
                next
            };
            rows.push(vec![
                self.paint(event.id.short(), "33"),
                event.category.to_string(),
                format_date(event.performed_on),
                next,
                event.note.clone(),
            ]);
        }

        write_table(out, headers, rows)?;
        Ok(())
    }

    pub fn write_settings<W: Write>(
        &self,
        out: &mut W,
        settings: &IntervalSettings,
        cfg: &Config,
    ) -> anyhow::Result<()> {
        let on_off = |v: bool| if v { "on" } else { "off" };
        let headers = vec!["Setting".to_string(), "Value".to_string()];
        let mut rows = vec![
            vec![
                "engine".to_string(),
                format!("{} days", settings.engine_interval_days),
            ],
            vec![
                "differential".to_string(),
                format!("{} days", settings.differential_interval_days),
            ],
            vec![
                "reminder".to_string(),
                format!("{} days before", settings.reminder_lead_days),
            ],
            vec![
                "notifications".to_string(),
                on_off(settings.notifications).to_string(),
            ],
        ];

        for (key, value) in cfg.iter() {
            rows.push(vec![format!("rc.{}", key.name()), value]);
        }

        write_table(out, headers, rows)
    }

    pub fn write_notices<W: Write>(&self, out: &mut W, notices: &[Notice]) -> anyhow::Result<()> {
        for notice in notices {
            let line = notice.to_string();
            let line = match notice.level {
                Level::Success => self.paint(&line, "32"),
                Level::Info => line,
                Level::Warning => self.paint(&line, "33"),
                Level::Error => self.paint(&line, "31"),
            };
            writeln!(out, "{line}")?;
        }
        Ok(())
    }

    fn badge(&self, text: &str, urgency: Urgency) -> String {
        let text = format!("[{text}]");
        match urgency {
            Urgency::Due => self.paint(&text, "1;31"),
            Urgency::Soon => self.paint(&text, "33"),
            Urgency::Ok => self.paint(&text, "1"),
        }
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
