use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveDate;
use tracing::info;

use crate::datetime::format_date;
use crate::event::MaintenanceEvent;
use crate::ledger::MaintenanceLedger;
use crate::settings::IntervalSettings;
use crate::store::{stored_entries, write_atomic};

pub fn backup_file_name(today: NaiveDate) -> String {
    format!("oli-reminder-backup-{}.json", format_date(today))
}

/// A `.json` target is used verbatim; anything else is treated as the
/// directory that receives the dated backup file.
pub fn resolve_target(target: Option<&Path>, today: NaiveDate) -> PathBuf {
    match target {
        Some(path) if path.extension().is_some_and(|ext| ext == "json") => path.to_path_buf(),
        Some(dir) => dir.join(backup_file_name(today)),
        None => PathBuf::from(backup_file_name(today)),
    }
}

pub fn to_json(
    ledger: &MaintenanceLedger,
    settings: &IntervalSettings,
    today: NaiveDate,
) -> anyhow::Result<String> {
    let rows = stored_entries(ledger, settings, today);
    serde_json::to_string_pretty(&rows).context("failed to serialize export")
}

pub fn parse(raw: &str) -> anyhow::Result<Vec<MaintenanceEvent>> {
    serde_json::from_str(raw).context("failed to parse export")
}

#[tracing::instrument(skip(ledger, settings))]
pub fn write_export(
    ledger: &MaintenanceLedger,
    settings: &IntervalSettings,
    today: NaiveDate,
    target: &Path,
) -> anyhow::Result<()> {
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let payload = to_json(ledger, settings, today)?;
    write_atomic(target, &payload)?;
    info!(file = %target.display(), count = ledger.len(), "exported history");
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::event::Category;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn file_name_carries_export_date() {
        assert_eq!(
            backup_file_name(ymd(2024, 7, 9)),
            "oli-reminder-backup-2024-07-09.json"
        );
        assert_eq!(
            resolve_target(Some(Path::new("out/backup.json")), ymd(2024, 7, 9)),
            PathBuf::from("out/backup.json")
        );
        assert_eq!(
            resolve_target(Some(Path::new("out")), ymd(2024, 7, 9)),
            PathBuf::from("out/oli-reminder-backup-2024-07-09.json")
        );
    }

    #[test]
    fn export_round_trips_events() {
        let mut ledger = MaintenanceLedger::new();
        ledger
            .append(MaintenanceEvent::new(Category::Engine, ymd(2024, 1, 1), "10W-40"))
            .expect("append");
        ledger
            .append(MaintenanceEvent::new(Category::Differential, ymd(2024, 2, 3), ""))
            .expect("append");

        let temp = tempdir().expect("tempdir");
        let target = resolve_target(Some(temp.path()), ymd(2024, 3, 1));
        write_export(&ledger, &IntervalSettings::default(), ymd(2024, 3, 1), &target)
            .expect("export");

        let raw = std::fs::read_to_string(&target).expect("read export");
        let events = parse(&raw).expect("parse export");
        assert_eq!(events, ledger.events());
    }
}
