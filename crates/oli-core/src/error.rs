use thiserror::Error;

/// Rejected user input. Raising one of these never mutates state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("choose the date the oil was changed")]
    MissingDate,

    #[error("invalid date: {0}")]
    InvalidDate(String),

    #[error("an entry with id {0} already exists")]
    DuplicateId(String),

    #[error("{field} must be between {min} and {max} days, got {value}")]
    IntervalOutOfRange {
        field: &'static str,
        value: i64,
        min: u32,
        max: u32,
    },

    #[error("expected a whole number of days, got: {0}")]
    NotANumber(String),

    #[error("reminder lead must be one of 1, 2, 3 or 7 days, got {0}")]
    InvalidReminderLead(i64),

    #[error("unknown category: {0} (expected engine or differential)")]
    UnknownCategory(String),

    #[error("unknown setting: {0}")]
    UnknownSetting(String),

    #[error("expected on/off, got: {0}")]
    InvalidBool(String),

    #[error("unknown timezone: {0}")]
    UnknownTimezone(String),

    #[error("id prefix {0} matches more than one entry")]
    AmbiguousId(String),
}
