use std::collections::BTreeMap;
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
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::commands::{
  expand_command_abbrev,
  known_command_names
};
use crate::task::Category;
use crate::view::ViewPolicy;

/// Environment variable naming the rc file. `/dev/null` or an empty value
/// disables it.
pub const RC_ENV: &str = "INBOXRC";

const MAX_INCLUDE_DEPTH: usize = 8;

/// Raw `key = value` pairs in the order they were read; later entries win.
#[derive(Debug, Clone, Default)]
struct RcEntries {
  map:     BTreeMap<String, String>,
  sources: Vec<PathBuf>
}

impl RcEntries {
  fn read(
    &mut self,
    path: &Path,
    depth: usize
  ) -> anyhow::Result<()> {
    if depth > MAX_INCLUDE_DEPTH {
      bail!(
        "includes nested deeper than \
         {MAX_INCLUDE_DEPTH} at {}",
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
    self.sources.push(path.to_path_buf());
    let here = path
      .parent()
      .unwrap_or(Path::new("."));

    for (idx, raw) in
      text.lines().enumerate()
    {
      let line = raw
        .split_once('#')
        .map_or(raw, |(kept, _)| kept)
        .trim();
      if line.is_empty() {
        continue;
      }

      if let Some(target) =
        line.strip_prefix("include ")
      {
        let target = here.join(
          expand_tilde(Path::new(
            target.trim()
          ))
        );
        if target.is_file() {
          debug!(include = %target.display(), "following include");
          self.read(&target, depth + 1)?;
        } else {
          warn!(include = %target.display(), "include not found; skipping");
        }
        continue;
      }

      let Some((key, value)) =
        line.split_once('=')
      else {
        bail!(
          "{}:{}: expected `key = \
           value`, got `{line}`",
          path.display(),
          idx + 1
        );
      };
      let key = key.trim();
      if key.is_empty() {
        bail!(
          "{}:{}: missing key",
          path.display(),
          idx + 1
        );
      }
      trace!(key, value = value.trim(), "rc entry");
      self.map.insert(
        key.to_string(),
        value.trim().to_string()
      );
    }

    Ok(())
  }

  fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (key, value) in overrides {
      let key = key
        .strip_prefix("rc.")
        .map(str::to_string)
        .unwrap_or(key);
      debug!(key = %key, value = %value, "rc override");
      self.map.insert(key, value);
    }
  }
}

/// Validated inbox settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
  data_location:   PathBuf,
  default_command: &'static str,
  default_tab:     Category,
  color:           bool,
  allow:           Vec<String>,
  user_email:      Option<String>,
  policy:          ViewPolicy,
  sources:         Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    Self {
      data_location:   expand_tilde(
        Path::new("~/.inbox")
      ),
      default_command: "list",
      default_tab:     Category::Urgent,
      color:           true,
      allow:           Vec::new(),
      user_email:      None,
      policy:          ViewPolicy::default(),
      sources:         Vec::new()
    }
  }
}

impl Config {
  /// Reads the rc file (explicit path, then `$INBOXRC`, then
  /// `~/.inboxrc`), layers `overrides` on top, and validates every key.
  #[tracing::instrument(skip(
    rc_path, overrides
  ))]
  pub fn load<I>(
    rc_path: Option<&Path>,
    overrides: I
  ) -> anyhow::Result<Self>
  where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    let mut entries =
      RcEntries::default();
    match locate_rc(rc_path) {
      | Some(path) => {
        info!(rc = %path.display(), "loading inboxrc");
        entries.read(&path, 0)?;
      }
      | None => {
        info!("no inboxrc; using defaults")
      }
    }
    entries.apply_overrides(overrides);
    Self::from_entries(entries)
  }

  /// Defaults plus `overrides`, without reading any file.
  pub fn from_overrides<I>(
    overrides: I
  ) -> anyhow::Result<Self>
  where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    let mut entries =
      RcEntries::default();
    entries.apply_overrides(overrides);
    Self::from_entries(entries)
  }

  fn from_entries(
    entries: RcEntries
  ) -> anyhow::Result<Self> {
    let mut cfg = Self {
      sources: entries.sources,
      ..Self::default()
    };

    for (key, value) in &entries.map {
      let invalid = || {
        format!(
          "invalid {key} = {value}"
        )
      };
      match key.as_str() {
        | "data.location" => {
          if value.is_empty() {
            bail!("data.location is empty");
          }
          cfg.data_location =
            expand_tilde(Path::new(value));
        }
        | "default.command" => {
          let known =
            known_command_names();
          cfg.default_command =
            expand_command_abbrev(
              value, &known
            )
            .ok_or_else(|| {
              anyhow!(
                "unknown or ambiguous \
                 command"
              )
            })
            .with_context(invalid)?;
        }
        | "default.tab" => {
          cfg.default_tab = value
            .parse()
            .with_context(invalid)?;
        }
        | "color" => {
          cfg.color = parse_switch(value)
            .with_context(invalid)?;
        }
        | "auth.allow" => {
          cfg.allow = value
            .split(',')
            .map(str::trim)
            .filter(|email| {
              !email.is_empty()
            })
            .map(str::to_string)
            .collect();
        }
        | "user.email" => {
          cfg.user_email = Some(value)
            .filter(|email| {
              !email.is_empty()
            })
            .cloned();
        }
        | "view.default_category" => {
          cfg.policy.default_category =
            value
              .parse()
              .with_context(invalid)?;
        }
        | "view.low_confidence_threshold" => {
          cfg
            .policy
            .low_confidence_threshold =
            parse_threshold(value)
              .with_context(invalid)?;
        }
        | other => {
          warn!(key = other, "ignoring unknown config key")
        }
      }
    }

    Ok(cfg)
  }

  /// `--data` wins over `data.location`.
  pub fn data_dir(
    &self,
    flag: Option<&Path>
  ) -> PathBuf {
    flag
      .map(Path::to_path_buf)
      .unwrap_or_else(|| {
        self.data_location.clone()
      })
  }

  pub fn default_command(
    &self
  ) -> &'static str {
    self.default_command
  }

  pub fn default_tab(&self) -> Category {
    self.default_tab
  }

  pub fn color(&self) -> bool {
    self.color
  }

  /// `auth.allow`, as written.
  pub fn allow(&self) -> &[String] {
    &self.allow
  }

  pub fn user_email(
    &self
  ) -> Option<&str> {
    self.user_email.as_deref()
  }

  pub fn view_policy(
    &self
  ) -> ViewPolicy {
    self.policy
  }

  /// Rc files read, outermost first.
  pub fn sources(&self) -> &[PathBuf] {
    &self.sources
  }
}

fn locate_rc(
  flag: Option<&Path>
) -> Option<PathBuf> {
  if let Some(path) = flag {
    return Some(path.to_path_buf());
  }

  if let Ok(env) = std::env::var(RC_ENV)
  {
    return match env.trim() {
      | "" | "/dev/null" => None,
      | path => Some(expand_tilde(
        Path::new(path)
      ))
    };
  }

  dirs::home_dir()
    .map(|home| home.join(".inboxrc"))
    .filter(|path| path.is_file())
}

fn parse_switch(
  raw: &str
) -> anyhow::Result<bool> {
  match raw
    .to_ascii_lowercase()
    .as_str()
  {
    | "on" | "yes" | "true" | "1" => {
      Ok(true)
    }
    | "off" | "no" | "false" | "0" => {
      Ok(false)
    }
    | _ => {
      Err(anyhow!("expected on or off"))
    }
  }
}

fn parse_threshold(
  raw: &str
) -> anyhow::Result<f64> {
  let value: f64 = raw
    .parse()
    .map_err(|_| anyhow!("not a number"))?;
  if !(0.0..=1.0).contains(&value) {
    bail!("must be within 0..=1");
  }
  Ok(value)
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  if let Ok(rest) =
    path.strip_prefix("~")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}
