use std::sync::OnceLock;

use chrono::{
  Days,
  Local,
  NaiveDate,
  Utc
};
use chrono_tz::Tz;
use regex::Regex;

use crate::error::ValidationError;

const TIMEZONE_ENV_VAR: &str =
  "OLI_TIMEZONE";

pub const DATE_FORMAT: &str =
  "%Y-%m-%d";

/// Picks the zone that decides what
/// "today" is. `OLI_TIMEZONE` wins
/// over the rc value; `None` means the
/// system local zone.
pub fn resolve_timezone(
  configured: Option<&str>
) -> Option<Tz> {
  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && let Some(tz) = parse_timezone(
      &raw,
      TIMEZONE_ENV_VAR
    )
  {
    return Some(tz);
  }

  configured.and_then(|raw| {
    parse_timezone(raw, "rc.timezone")
  })
}

#[must_use]
pub fn today_in(
  tz: Option<Tz>
) -> NaiveDate {
  match tz {
    | Some(tz) => {
      Utc::now()
        .with_timezone(&tz)
        .date_naive()
    }
    | None => Local::now().date_naive()
  }
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::info!(
        source,
        timezone = %trimmed,
        "configured timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

fn days_ago_regex() -> Option<&'static Regex>
{
  static RE: OnceLock<Option<Regex>> =
    OnceLock::new();
  RE.get_or_init(|| {
    Regex::new(
      r"(?i)^(?P<num>\d+)\s*d(?:ays?)?(?:\s+ago)?$"
    )
    .ok()
  })
  .as_ref()
}

/// Parses the date of a maintenance
/// event. Accepts `YYYY-MM-DD`,
/// `today`, `yesterday` and `Nd` /
/// `N days ago`.
#[tracing::instrument(skip(today), fields(input = input))]
pub fn parse_date_expr(
  input: &str,
  today: NaiveDate
) -> Result<NaiveDate, ValidationError>
{
  let token = input.trim();
  if token.is_empty() {
    return Err(
      ValidationError::MissingDate
    );
  }

  let lower =
    token.to_ascii_lowercase();
  match lower.as_str() {
    | "today" => return Ok(today),
    | "yesterday" => {
      return Ok(sub_days(today, 1));
    }
    | _ => {}
  }

  if let Some(re) = days_ago_regex()
    && let Some(caps) =
      re.captures(token)
  {
    let num = caps
      .name("num")
      .and_then(|m| {
        m.as_str().parse::<u64>().ok()
      })
      .ok_or_else(|| {
        ValidationError::InvalidDate(
          token.to_string()
        )
      })?;
    return today
      .checked_sub_days(Days::new(num))
      .ok_or_else(|| {
        ValidationError::InvalidDate(
          token.to_string()
        )
      });
  }

  NaiveDate::parse_from_str(
    token,
    DATE_FORMAT
  )
  .map_err(|_| {
    ValidationError::InvalidDate(
      token.to_string()
    )
  })
}

/// Calendar-day addition that
/// saturates at the end of the
/// representable range.
#[must_use]
pub fn add_days(
  date: NaiveDate,
  days: u32
) -> NaiveDate {
  date
    .checked_add_days(Days::new(
      u64::from(days)
    ))
    .unwrap_or(NaiveDate::MAX)
}

fn sub_days(
  date: NaiveDate,
  days: u64
) -> NaiveDate {
  date
    .checked_sub_days(Days::new(days))
    .unwrap_or(NaiveDate::MIN)
}

/// Signed whole days from `from` to
/// `to`.
#[must_use]
pub fn days_between(
  from: NaiveDate,
  to: NaiveDate
) -> i64 {
  to.signed_duration_since(from)
    .num_days()
}

#[must_use]
pub fn format_date(
  date: NaiveDate
) -> String {
  date.format(DATE_FORMAT).to_string()
}

#[must_use]
pub fn format_long_date(
  date: NaiveDate
) -> String {
  date
    .format("%A, %-d %B %Y")
    .to_string()
}

/// Date-only values on the wire. Older
/// records may carry a full RFC 3339
/// timestamp; only its date part is
/// kept.
pub mod iso_date_serde {
  use chrono::NaiveDate;
  use serde::{
    Deserialize,
    Deserializer,
    Serializer
  };

  use super::DATE_FORMAT;

  pub fn serialize<S>(
    date: &NaiveDate,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    serializer.serialize_str(
      &date
        .format(DATE_FORMAT)
        .to_string()
    )
  }

  pub fn deserialize<'de, D>(
    deserializer: D
  ) -> Result<NaiveDate, D::Error>
  where
    D: Deserializer<'de>
  {
    let raw = String::deserialize(
      deserializer
    )?;
    parse_lenient(&raw)
      .map_err(serde::de::Error::custom)
  }

  pub(super) fn parse_lenient(
    raw: &str
  ) -> Result<NaiveDate, chrono::ParseError>
  {
    let trimmed = raw.trim();
    let date_part = trimmed
      .split_once('T')
      .map_or(trimmed, |(date, _)| date);
    NaiveDate::parse_from_str(
      date_part,
      DATE_FORMAT
    )
  }
}
