use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::event::Category;

pub const MIN_INTERVAL_DAYS: u32 = 1;
pub const MAX_INTERVAL_DAYS: u32 = 365;
pub const REMINDER_LEAD_CHOICES: [u32; 4] = [1, 2, 3, 7];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntervalSettings {
    #[serde(rename = "reminderDays")]
    pub reminder_lead_days: u32,

    pub notifications: bool,

    #[serde(rename = "oliMesinInterval")]
    pub engine_interval_days: u32,

    #[serde(rename = "oliGardanInterval")]
    pub differential_interval_days: u32,
}

impl Default for IntervalSettings {
    fn default() -> Self {
        Self {
            reminder_lead_days: 3,
            notifications: true,
            engine_interval_days: 30,
            differential_interval_days: 60,
        }
    }
}

impl IntervalSettings {
    pub fn interval_for(&self, category: Category) -> u32 {
        match category {
            Category::Engine => self.engine_interval_days,
            Category::Differential => self.differential_interval_days,
        }
    }

    /// Merges every field set in `patch` over the current value.
    pub fn update(&mut self, patch: &SettingsPatch) -> IntervalSettings {
        if let Some(days) = patch.engine_interval_days {
            self.engine_interval_days = days;
        }
        if let Some(days) = patch.differential_interval_days {
            self.differential_interval_days = days;
        }
        if let Some(days) = patch.reminder_lead_days {
            self.reminder_lead_days = days;
        }
        if let Some(on) = patch.notifications {
            self.notifications = on;
        }
        *self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettingsPatch {
    pub engine_interval_days: Option<u32>,
    pub differential_interval_days: Option<u32>,
    pub reminder_lead_days: Option<u32>,
    pub notifications: Option<bool>,
}

impl SettingsPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Parses `key=value` assignments from the command line. Each field is
    /// bounds-checked on its own.
    #[tracing::instrument(skip(assignments))]
    pub fn parse_assignments<S: AsRef<str>>(assignments: &[S]) -> Result<Self, ValidationError> {
        let mut patch = SettingsPatch::default();
        for raw in assignments {
            let raw = raw.as_ref();
            let (key, value) = raw
                .split_once('=')
                .or_else(|| raw.split_once(':'))
                .ok_or_else(|| ValidationError::UnknownSetting(raw.to_string()))?;
            let value = value.trim();

            match key.trim().to_ascii_lowercase().as_str() {
                "engine" | "mesin" | "engine.interval" => {
                    patch.engine_interval_days = Some(parse_interval("engine interval", value)?);
                }
                "differential" | "diff" | "gardan" | "differential.interval" => {
                    patch.differential_interval_days =
                        Some(parse_interval("differential interval", value)?);
                }
                "reminder" | "reminder.days" | "lead" => {
                    patch.reminder_lead_days = Some(parse_reminder_lead(value)?);
                }
                "notifications" | "notify" => {
                    patch.notifications = Some(parse_switch(value)?);
                }
                other => return Err(ValidationError::UnknownSetting(other.to_string())),
            }
        }
        Ok(patch)
    }
}

pub fn parse_interval(field: &'static str, value: &str) -> Result<u32, ValidationError> {
    let parsed: i64 = value
        .parse()
        .map_err(|_| ValidationError::NotANumber(value.to_string()))?;
    u32::try_from(parsed)
        .ok()
        .filter(|days| (MIN_INTERVAL_DAYS..=MAX_INTERVAL_DAYS).contains(days))
        .ok_or(ValidationError::IntervalOutOfRange {
            field,
            value: parsed,
            min: MIN_INTERVAL_DAYS,
            max: MAX_INTERVAL_DAYS,
        })
}

pub fn parse_reminder_lead(value: &str) -> Result<u32, ValidationError> {
    let parsed: i64 = value
        .parse()
        .map_err(|_| ValidationError::NotANumber(value.to_string()))?;
    u32::try_from(parsed)
        .ok()
        .filter(|days| REMINDER_LEAD_CHOICES.contains(days))
        .ok_or(ValidationError::InvalidReminderLead(parsed))
}

pub fn parse_switch(value: &str) -> Result<bool, ValidationError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "y" | "yes" | "on" | "true" => Ok(true),
        "0" | "n" | "no" | "off" | "false" => Ok(false),
        other => Err(ValidationError::InvalidBool(other.to_string())),
    }
}
