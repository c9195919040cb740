use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow, bail};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Map, Value};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::datetime::format_date;
use crate::error::ValidationError;
use crate::event::MaintenanceEvent;
use crate::ledger::MaintenanceLedger;
use crate::settings::{IntervalSettings, parse_interval, parse_reminder_lead, parse_switch};
use crate::status::status_for_event;

pub const HISTORY_KEY: &str = "oliHistory";
pub const SETTINGS_KEY: &str = "oliSettings";

/// Flat key-value blob storage. Keys are independent: there is no
/// transaction spanning two of them.
pub trait KvStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn put(&mut self, key: &str, value: &str) -> anyhow::Result<()>;
    /// Removing a key that does not exist succeeds.
    fn remove(&mut self, key: &str) -> anyhow::Result<()>;
}

/// One JSON document per key inside the data directory.
#[derive(Debug)]
pub struct FileStore {
    pub data_dir: PathBuf,
}

impl FileStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        info!(data_dir = %data_dir.display(), "opened store");
        Ok(Self { data_dir })
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!("{key}.json"))
    }
}

impl KvStore for FileStore {
    #[tracing::instrument(skip(self))]
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(raw) => {
                debug!(file = %path.display(), bytes = raw.len(), "read key");
                Ok(Some(raw))
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("failed reading {}", path.display())),
        }
    }

    #[tracing::instrument(skip(self, value), fields(bytes = value.len()))]
    fn put(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        let path = self.path_for(key);
        write_atomic(&path, value)
    }

    #[tracing::instrument(skip(self))]
    fn remove(&mut self, key: &str) -> anyhow::Result<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(file = %path.display(), "removed key");
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("failed removing {}", path.display())),
        }
    }
}

/// In-process store. `quota` caps the total stored bytes and makes writes
/// past it fail, the way a browser's storage quota does.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
    quota: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            quota: Some(quota),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        if let Some(quota) = self.quota {
            let others: usize = self
                .entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            if others + key.len() + value.len() > quota {
                bail!("storage quota of {quota} bytes exceeded writing {key}");
            }
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> anyhow::Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Persisted history row. `nextDate` and `daysLeft` are a display cache
/// written for compatibility; readers recompute them.
#[derive(Debug, Serialize)]
pub struct StoredEntry<'a> {
    #[serde(flatten)]
    pub event: &'a MaintenanceEvent,
    #[serde(rename = "nextDate")]
    pub next_date: String,
    #[serde(rename = "daysLeft")]
    pub days_left: u32,
}

pub fn stored_entries<'a>(
    ledger: &'a MaintenanceLedger,
    settings: &IntervalSettings,
    today: NaiveDate,
) -> Vec<StoredEntry<'a>> {
    ledger
        .iter()
        .map(|event| {
            let status = status_for_event(event, settings, today);
            StoredEntry {
                event,
                next_date: format_date(status.next_due),
                days_left: status.days_remaining,
            }
        })
        .collect()
}

/// A value read back from the store, plus whatever had to be skipped or
/// defaulted to produce it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loaded<T> {
    pub value: T,
    pub problems: Vec<String>,
}

impl<T> Loaded<T> {
    fn clean(value: T) -> Self {
        Self {
            value,
            problems: Vec::new(),
        }
    }

    fn fallback(value: T, problem: String) -> Self {
        Self {
            value,
            problems: vec![problem],
        }
    }
}

/// Never fails: an unreadable key becomes an empty history, and unreadable
/// rows are dropped one by one.
#[tracing::instrument(skip(store))]
pub fn load_ledger(store: &dyn KvStore) -> Loaded<MaintenanceLedger> {
    let raw = match store.get(HISTORY_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            debug!("no history persisted yet");
            return Loaded::clean(MaintenanceLedger::new());
        }
        Err(err) => {
            return Loaded::fallback(
                MaintenanceLedger::new(),
                format!("could not read {HISTORY_KEY}: {err:#}"),
            );
        }
    };

    let rows: Vec<Value> = match serde_json::from_str(&raw) {
        Ok(rows) => rows,
        Err(err) => {
            warn!(error = %err, "history is not a JSON list");
            return Loaded::fallback(
                MaintenanceLedger::new(),
                format!("{HISTORY_KEY} is unreadable ({err}); starting with an empty history"),
            );
        }
    };

    let mut problems = Vec::new();
    let mut events = Vec::with_capacity(rows.len());
    for (idx, row) in rows.into_iter().enumerate() {
        match serde_json::from_value::<MaintenanceEvent>(row) {
            Ok(event) if events.iter().any(|e: &MaintenanceEvent| e.id == event.id) => {
                problems.push(format!("skipped {HISTORY_KEY} entry {idx}: duplicate id {}", event.id));
            }
            Ok(event) => events.push(event),
            Err(err) => {
                warn!(row = idx, error = %err, "skipping unreadable history row");
                problems.push(format!("skipped {HISTORY_KEY} entry {idx}: {err}"));
            }
        }
    }
    debug!(count = events.len(), skipped = problems.len(), "loaded history");
    Loaded {
        value: MaintenanceLedger::from_events(events),
        problems,
    }
}

#[tracing::instrument(skip(store, ledger, settings), fields(count = ledger.len()))]
pub fn save_ledger(
    store: &mut dyn KvStore,
    ledger: &MaintenanceLedger,
    settings: &IntervalSettings,
    today: NaiveDate,
) -> anyhow::Result<()> {
    let rows = stored_entries(ledger, settings, today);
    let payload = serde_json::to_string(&rows)?;
    store
        .put(HISTORY_KEY, &payload)
        .with_context(|| format!("failed to save {HISTORY_KEY}"))
}

#[tracing::instrument(skip(store))]
pub fn remove_ledger(store: &mut dyn KvStore) -> anyhow::Result<()> {
    store
        .remove(HISTORY_KEY)
        .with_context(|| format!("failed to remove {HISTORY_KEY}"))
}

/// Reads each field on its own. A field that is missing keeps its default
/// quietly; one that is mistyped or out of range keeps its default and is
/// reported.
#[tracing::instrument(skip(store))]
pub fn load_settings(store: &dyn KvStore) -> Loaded<IntervalSettings> {
    let defaults = IntervalSettings::default();
    let raw = match store.get(SETTINGS_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            debug!("no settings persisted yet; using defaults");
            return Loaded::clean(defaults);
        }
        Err(err) => {
            return Loaded::fallback(defaults, format!("could not read {SETTINGS_KEY}: {err:#}"));
        }
    };

    let fields = match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Object(fields)) => fields,
        Ok(_) => {
            return Loaded::fallback(
                defaults,
                format!("{SETTINGS_KEY} is not an object; using default settings"),
            );
        }
        Err(err) => {
            warn!(error = %err, "settings are not valid JSON");
            return Loaded::fallback(
                defaults,
                format!("{SETTINGS_KEY} is unreadable ({err}); using default settings"),
            );
        }
    };

    let mut problems = Vec::new();
    let engine = stored_field(
        &fields,
        "oliMesinInterval",
        &|v: &str| parse_interval("engine interval", v),
        &mut problems,
    );
    let differential = stored_field(
        &fields,
        "oliGardanInterval",
        &|v: &str| parse_interval("differential interval", v),
        &mut problems,
    );
    let lead = stored_field(&fields, "reminderDays", &parse_reminder_lead, &mut problems);
    let notifications = stored_field(&fields, "notifications", &parse_switch, &mut problems);

    Loaded {
        value: IntervalSettings {
            reminder_lead_days: lead.unwrap_or(defaults.reminder_lead_days),
            notifications: notifications.unwrap_or(defaults.notifications),
            engine_interval_days: engine.unwrap_or(defaults.engine_interval_days),
            differential_interval_days: differential
                .unwrap_or(defaults.differential_interval_days),
        },
        problems,
    }
}

fn stored_field<T>(
    fields: &Map<String, Value>,
    key: &str,
    parse: &dyn Fn(&str) -> Result<T, ValidationError>,
    problems: &mut Vec<String>,
) -> Option<T> {
    let text = match fields.get(key)? {
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    match parse(&text) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(key, error = %err, "ignoring stored setting");
            problems.push(format!("{SETTINGS_KEY}.{key}: {err}; using the default"));
            None
        }
    }
}

#[tracing::instrument(skip(store, settings))]
pub fn save_settings(store: &mut dyn KvStore, settings: &IntervalSettings) -> anyhow::Result<()> {
    let payload = serde_json::to_string(settings)?;
    store
        .put(SETTINGS_KEY, &payload)
        .with_context(|| format!("failed to save {SETTINGS_KEY}"))
}

#[tracing::instrument(skip(path, contents))]
pub(crate) fn write_atomic(path: &Path, contents: &str) -> anyhow::Result<()> {
    debug!(file = %path.display(), bytes = contents.len(), "writing atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(contents.as_bytes())?;
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
