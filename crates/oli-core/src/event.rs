use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::datetime::{iso_date_serde, parse_date_expr};
use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    #[serde(rename = "mesin")]
    Engine,
    #[serde(rename = "gardan")]
    Differential,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::Engine, Category::Differential];

    pub fn label(self) -> &'static str {
        match self {
            Category::Engine => "Engine oil",
            Category::Differential => "Differential oil",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Engine => f.write_str("engine"),
            Category::Differential => f.write_str("differential"),
        }
    }
}

impl FromStr for Category {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "engine" | "mesin" | "e" => Ok(Category::Engine),
            "differential" | "diff" | "gardan" | "d" => Ok(Category::Differential),
            other => Err(ValidationError::UnknownCategory(other.to_string())),
        }
    }
}

/// Opaque entry identifier. New entries get a v4 UUID; ids written by
/// older versions (millisecond timestamps) are kept as-is.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct EntryId(String);

impl EntryId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn short(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }
}

impl From<&str> for EntryId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MaintenanceEvent {
    pub id: EntryId,

    #[serde(rename = "type")]
    pub category: Category,

    #[serde(rename = "date", with = "iso_date_serde")]
    pub performed_on: NaiveDate,

    #[serde(rename = "notes", default)]
    pub note: String,
}

impl MaintenanceEvent {
    pub fn new(category: Category, performed_on: NaiveDate, note: impl Into<String>) -> Self {
        Self {
            id: EntryId::generate(),
            category,
            performed_on,
            note: note.into(),
        }
    }
}

/// Raw form input for a new entry, before the date has been validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDraft {
    pub category: Category,
    pub date: Option<String>,
    pub note: String,
}

impl EventDraft {
    pub fn new(category: Category, date: Option<String>, note: impl Into<String>) -> Self {
        Self {
            category,
            date,
            note: note.into(),
        }
    }

    pub fn into_event(self, today: NaiveDate) -> Result<MaintenanceEvent, ValidationError> {
        let raw = self.date.ok_or(ValidationError::MissingDate)?;
        let performed_on = parse_date_expr(&raw, today)?;
        Ok(MaintenanceEvent::new(
            self.category,
            performed_on,
            self.note.trim(),
        ))
    }
}
