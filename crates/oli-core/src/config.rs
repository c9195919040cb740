use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow,
  bail
};
use chrono_tz::Tz;
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::error::ValidationError;
use crate::settings::parse_switch;

/// Names an alternate rc file;
/// `/dev/null` disables rc loading.
pub const OLIRC_ENV_VAR: &str = "OLIRC";

const DEFAULT_DATA_LOCATION: &str =
  "~/.oli";
const DEFAULT_COMMAND: &str = "status";
const MAX_INCLUDE_DEPTH: usize = 8;

/// The rc keys oli understands.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord
)]
pub enum RcKey {
  DataLocation,
  DefaultCommand,
  Color,
  Confirmation,
  Timezone
}

impl RcKey {
  pub const ALL: [RcKey; 5] = [
    RcKey::DataLocation,
    RcKey::DefaultCommand,
    RcKey::Color,
    RcKey::Confirmation,
    RcKey::Timezone
  ];

  pub fn name(self) -> &'static str {
    match self {
      | RcKey::DataLocation => {
        "data.location"
      }
      | RcKey::DefaultCommand => {
        "default.command"
      }
      | RcKey::Color => "color",
      | RcKey::Confirmation => {
        "confirmation"
      }
      | RcKey::Timezone => "timezone"
    }
  }

  /// Accepts both `color` and
  /// `rc.color`.
  pub fn lookup(
    raw: &str
  ) -> Option<Self> {
    let raw = raw.trim();
    let raw = raw
      .strip_prefix("rc.")
      .unwrap_or(raw);
    Self::ALL
      .into_iter()
      .find(|key| key.name() == raw)
  }
}

/// Tool behaviour from the rc file and
/// command-line overrides. Maintenance
/// intervals live in the store instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
  data_location:   String,
  default_command: String,
  color:           bool,
  confirmation:    bool,
  timezone:        Option<String>
}

impl Default for Config {
  fn default() -> Self {
    Self {
      data_location:   DEFAULT_DATA_LOCATION
        .to_string(),
      default_command: DEFAULT_COMMAND
        .to_string(),
      color:           true,
      confirmation:    true,
      timezone:        None
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    olirc_override
  ))]
  pub fn load(
    olirc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Self::default();

    match rc_path(olirc_override) {
      | Some(path) => {
        info!(olirc = %path.display(), "loading olirc");
        cfg.read_rc(&path, 0)?;
      }
      | None => {
        debug!(
          "no olirc in use; using \
           defaults"
        );
      }
    }

    Ok(cfg)
  }

  /// Command-line overrides must name
  /// a known key; a typo here is an
  /// error rather than a silent no-op.
  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) -> anyhow::Result<()>
  where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (raw_key, value) in overrides {
      let key = RcKey::lookup(&raw_key)
        .ok_or_else(|| {
          anyhow!(
            "unknown rc override: \
             {raw_key}"
          )
        })?;
      debug!(key = key.name(), value = %value, "applying override");
      self.set(key, &value).with_context(
        || {
          format!(
            "invalid override rc.{}",
            key.name()
          )
        }
      )?;
    }
    Ok(())
  }

  pub fn set(
    &mut self,
    key: RcKey,
    value: &str
  ) -> Result<(), ValidationError> {
    let value = value.trim();
    match key {
      | RcKey::DataLocation => {
        self.data_location =
          value.to_string();
      }
      | RcKey::DefaultCommand => {
        self.default_command =
          value.to_string();
      }
      | RcKey::Color => {
        self.color = parse_switch(value)?;
      }
      | RcKey::Confirmation => {
        self.confirmation =
          parse_switch(value)?;
      }
      | RcKey::Timezone => {
        if value.is_empty() {
          self.timezone = None;
        } else if value.parse::<Tz>().is_ok()
        {
          self.timezone =
            Some(value.to_string());
        } else {
          return Err(
            ValidationError::UnknownTimezone(
              value.to_string()
            )
          );
        }
      }
    }
    Ok(())
  }

  pub fn data_location(&self) -> &str {
    &self.data_location
  }

  pub fn default_command(
    &self
  ) -> &str {
    &self.default_command
  }

  pub fn color(&self) -> bool {
    self.color
  }

  pub fn confirmation(&self) -> bool {
    self.confirmation
  }

  pub fn timezone(
    &self
  ) -> Option<&str> {
    self.timezone.as_deref()
  }

  /// Current value of every key that
  /// has one, in declaration order.
  pub fn iter(
    &self
  ) -> impl Iterator<Item = (RcKey, String)>
  + '_ {
    let on_off = |v: bool| {
      String::from(if v {
        "on"
      } else {
        "off"
      })
    };
    RcKey::ALL.into_iter().filter_map(
      move |key| {
        let value = match key {
          | RcKey::DataLocation => {
            self.data_location.clone()
          }
          | RcKey::DefaultCommand => {
            self.default_command.clone()
          }
          | RcKey::Color => {
            on_off(self.color)
          }
          | RcKey::Confirmation => {
            on_off(self.confirmation)
          }
          | RcKey::Timezone => {
            self.timezone.clone()?
          }
        };
        Some((key, value))
      }
    )
  }

  #[cfg(test)]
  pub(crate) fn from_pairs(
    pairs: &[(&str, &str)]
  ) -> Self {
    let mut cfg = Self::default();
    cfg
      .apply_overrides(pairs.iter().map(
        |(k, v)| {
          (k.to_string(), v.to_string())
        }
      ))
      .expect("valid test config");
    cfg
  }

  #[tracing::instrument(skip(self))]
  fn read_rc(
    &mut self,
    path: &Path,
    depth: usize
  ) -> anyhow::Result<()> {
    if depth > MAX_INCLUDE_DEPTH {
      bail!(
        "{}: includes nested deeper \
         than {MAX_INCLUDE_DEPTH}",
        path.display()
      );
    }

    let text = fs::read_to_string(path)
      .with_context(|| {
        format!(
          "failed to read {}",
          path.display()
        )
      })?;
    let dir = path
      .parent()
      .unwrap_or(Path::new("."));

    for (idx, raw) in
      text.lines().enumerate()
    {
      let line_no = idx + 1;
      match parse_rc_line(raw) {
        | RcLine::Blank => {}
        | RcLine::Include(target) => {
          let target =
            dir.join(expand_tilde(target)?);
          if target.is_file() {
            debug!(include = %target.display(), line = line_no, "following include");
            self.read_rc(&target, depth + 1)?;
          } else {
            warn!(include = %target.display(), "include file does not exist; skipping");
          }
        }
        | RcLine::Assign(name, value) => {
          let Some(key) =
            RcKey::lookup(name)
          else {
            warn!(
              file = %path.display(),
              line = line_no,
              key = name,
              "ignoring unknown rc key"
            );
            continue;
          };
          self.set(key, value).with_context(
            || {
              format!(
                "{}:{line_no}: invalid \
                 value for {}",
                path.display(),
                key.name()
              )
            }
          )?;
          trace!(key = key.name(), value, "loaded rc key");
        }
        | RcLine::Malformed => {
          bail!(
            "{}:{line_no}: expected \
             key=value, got: {}",
            path.display(),
            raw.trim()
          );
        }
      }
    }

    Ok(())
  }
}

#[derive(Debug, PartialEq, Eq)]
enum RcLine<'a> {
  Blank,
  Include(&'a str),
  Assign(&'a str, &'a str),
  Malformed
}

fn parse_rc_line(raw: &str) -> RcLine<'_> {
  let line = raw
    .split_once('#')
    .map_or(raw, |(before, _)| before)
    .trim();
  if line.is_empty() {
    return RcLine::Blank;
  }

  if let Some(rest) =
    line.strip_prefix("include ")
  {
    let rest = rest.trim();
    return if rest.is_empty() {
      RcLine::Malformed
    } else {
      RcLine::Include(rest)
    };
  }

  match line.split_once('=') {
    | Some((key, value))
      if !key.trim().is_empty() =>
    {
      RcLine::Assign(
        key.trim(),
        value.trim()
      )
    }
    | _ => RcLine::Malformed
  }
}

/// `--olirc` wins, then `$OLIRC`, then
/// `~/.olirc` when it exists.
fn rc_path(
  explicit: Option<&Path>
) -> Option<PathBuf> {
  if let Some(path) = explicit {
    return Some(path.to_path_buf());
  }

  if let Ok(raw) =
    std::env::var(OLIRC_ENV_VAR)
  {
    let raw = raw.trim();
    return (!raw.is_empty()
      && raw != "/dev/null")
      .then(|| PathBuf::from(raw));
  }

  dirs::home_dir()
    .map(|home| home.join(".olirc"))
    .filter(|path| path.is_file())
}

/// `--data` wins over
/// `data.location`.
#[tracing::instrument(skip(
  cfg,
  override_dir
))]
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  match override_dir {
    | Some(dir) => Ok(dir.to_path_buf()),
    | None => {
      expand_tilde(cfg.data_location())
    }
  }
}

fn expand_tilde(
  raw: &str
) -> anyhow::Result<PathBuf> {
  let rest = match raw {
    | "~" => "",
    | _ => {
      match raw.strip_prefix("~/") {
        | Some(rest) => rest,
        | None => {
          return Ok(PathBuf::from(raw));
        }
      }
    }
  };
  let home = dirs::home_dir()
    .ok_or_else(|| {
      anyhow!(
        "cannot expand {raw}: home \
         directory unknown"
      )
    })?;
  Ok(home.join(rest))
}
