use std::collections::HashMap;
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

use crate::notice::DEFAULT_NOTICE_DELAY_MS;

const DEFAULTS: [(&str, &str); 4] = [
  ("data.location", "~/.todo"),
  ("default.command", "list"),
  ("color", "on"),
  ("timezone", "UTC")
];

/// Flat `key = value` settings: built-in defaults, then the rc file (and
/// its includes), then command line overrides.
#[derive(Debug, Clone)]
pub struct Config {
  map: HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

/// One meaningful line of an rc file.
#[derive(Debug, PartialEq, Eq)]
enum RcLine<'a> {
  Include(&'a str),
  Setting(&'a str, &'a str)
}

impl Default for Config {
  fn default() -> Self {
    let mut map: HashMap<String, String> =
      DEFAULTS
        .iter()
        .map(|(k, v)| {
          (k.to_string(), v.to_string())
        })
        .collect();
    map.insert(
      "notice.delay_ms".to_string(),
      DEFAULT_NOTICE_DELAY_MS
        .to_string()
    );

    Self {
      map,
      loaded_files: vec![]
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    todorc_override
  ))]
  pub fn load(
    todorc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    match locate_todorc(todorc_override)
    {
      | Some(path) => {
        info!(todorc = %path.display(), "loading todorc");
        cfg.read_rc(&path)?;
      }
      | None => {
        debug!("no todorc; defaults only")
      }
    }

    Ok(cfg)
  }

  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (raw_key, value) in overrides {
      let key = raw_key
        .strip_prefix("rc.")
        .unwrap_or(&raw_key)
        .to_string();
      debug!(key = %key, value = %value, "applying override");
      self.map.insert(key, value);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  /// `None` when unset; an error for a value that is neither a yes nor a
  /// no spelling.
  pub fn get_bool(
    &self,
    key: &str
  ) -> anyhow::Result<Option<bool>> {
    let Some(raw) = self.map.get(key)
    else {
      return Ok(None);
    };
    match raw
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "1" | "y" | "yes" | "on"
      | "true" => Ok(Some(true)),
      | "0" | "n" | "no" | "off"
      | "false" => Ok(Some(false)),
      | other => {
        bail!(
          "invalid {key} setting: \
           {other}"
        )
      }
    }
  }

  pub fn get_u64(
    &self,
    key: &str
  ) -> Option<u64> {
    let raw = self.map.get(key)?;
    raw
      .trim()
      .parse::<u64>()
      .inspect_err(|err| {
        warn!(key, value = %raw, error = %err, "ignoring non-numeric config value");
      })
      .ok()
  }

  /// Zone used to display timestamps; an unknown name falls back to UTC.
  pub fn timezone(&self) -> Tz {
    let Some(raw) =
      self.map.get("timezone")
    else {
      return Tz::UTC;
    };
    raw
      .trim()
      .parse::<Tz>()
      .unwrap_or_else(|err| {
        warn!(timezone = %raw, error = %err, "unknown timezone; using UTC");
        Tz::UTC
      })
  }

  pub fn notice_delay_ms(&self) -> u64 {
    self
      .get_u64("notice.delay_ms")
      .unwrap_or(
        DEFAULT_NOTICE_DELAY_MS
      )
  }

  #[tracing::instrument(skip(self))]
  fn read_rc(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    if self.loaded_files.contains(&path)
    {
      warn!(file = %path.display(), "rc file already loaded; skipping");
      return Ok(());
    }

    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;
    self
      .loaded_files
      .push(path.clone());

    for (idx, raw_line) in
      text.lines().enumerate()
    {
      let line_no = idx + 1;
      let parsed = parse_rc_line(
        raw_line
      )
      .with_context(|| {
        format!(
          "{}:{line_no}",
          path.display()
        )
      })?;

      match parsed {
        | None => {}
        | Some(RcLine::Setting(
          key,
          value
        )) => {
          trace!(key, value, line = line_no, "rc setting");
          self.map.insert(
            key.to_string(),
            value.to_string()
          );
        }
        | Some(RcLine::Include(
          target
        )) => {
          let include = include_path(
            &path, target
          );
          if include.exists() {
            self.read_rc(&include)?;
          } else {
            warn!(include = %include.display(), "include file does not exist; skipping");
          }
        }
      }
    }

    Ok(())
  }
}

fn parse_rc_line(
  raw: &str
) -> anyhow::Result<Option<RcLine<'_>>> {
  let line = raw
    .split_once('#')
    .map_or(raw, |(before, _)| before)
    .trim();

  if line.is_empty() {
    return Ok(None);
  }

  if let Some(target) =
    line.strip_prefix("include ")
  {
    let target = target.trim();
    if target.is_empty() {
      bail!(
        "include path cannot be empty"
      );
    }
    return Ok(Some(RcLine::Include(
      target
    )));
  }

  let (key, value) = line
    .split_once('=')
    .ok_or_else(|| {
      anyhow!(
        "expected key = value, got: \
         {raw}"
      )
    })?;
  Ok(Some(RcLine::Setting(
    key.trim(),
    value.trim()
  )))
}

/// Relative includes resolve against the including file's directory.
fn include_path(
  from: &Path,
  target: &str
) -> PathBuf {
  let expanded =
    expand_tilde(Path::new(target));
  if expanded.is_absolute() {
    return expanded;
  }
  from
    .parent()
    .unwrap_or_else(|| Path::new("."))
    .join(expanded)
}

#[tracing::instrument(skip(
  cfg,
  override_dir
))]
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let dir = match (
    override_dir,
    cfg.get("data.location")
  ) {
    | (Some(path), _) => {
      path.to_path_buf()
    }
    | (None, Some(location)) => {
      expand_tilde(Path::new(&location))
    }
    | (None, None) => {
      dirs::home_dir()
        .ok_or_else(|| {
          anyhow!(
            "cannot determine home \
             directory"
          )
        })?
        .join(".todo")
    }
  };

  if !dir.exists() {
    info!(dir = %dir.display(), "creating data directory");
    fs::create_dir_all(&dir)
      .with_context(|| {
        format!(
          "failed to create {}",
          dir.display()
        )
      })?;
  }

  Ok(dir)
}

/// `--todorc`, then `$TODORC` (`/dev/null` disables), then `~/.todorc`.
fn locate_todorc(
  override_path: Option<&Path>
) -> Option<PathBuf> {
  if let Some(path) = override_path {
    return Some(path.to_path_buf());
  }

  if let Ok(from_env) =
    std::env::var("TODORC")
  {
    return (from_env != "/dev/null")
      .then(|| PathBuf::from(from_env));
  }

  dirs::home_dir()
    .map(|home| home.join(".todorc"))
    .filter(|candidate| {
      candidate.exists()
    })
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}
