use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Capabilities the host provides: a string key-value store and the ambient
/// light/dark preference.
pub trait HostEnv {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()>;

    fn prefers_dark(&self) -> bool;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryEnv {
    entries: BTreeMap<String, String>,
    prefers_dark: bool,
    fail_writes: bool,
}

impl MemoryEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefers_dark(mut self, prefers_dark: bool) -> Self {
        self.prefers_dark = prefers_dark;
        self
    }

    pub fn with_entry(mut self, key: &str, value: &str) -> Self {
        self.entries.insert(key.to_string(), value.to_string());
        self
    }

    /// While set, every `set` call fails and leaves the stored entries untouched.
    pub fn fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }
}

impl HostEnv for MemoryEnv {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        if self.fail_writes {
            return Err(anyhow!("write rejected for key {key}: storage full"));
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn prefers_dark(&self) -> bool {
        self.prefers_dark
    }
}

/// Key-value store kept as one JSON object on disk.
#[derive(Debug)]
pub struct FileEnv {
    path: PathBuf,
    entries: BTreeMap<String, String>,
    prefers_dark: bool,
}

impl FileEnv {
    pub const FILE_NAME: &'static str = "store.json";

    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path, prefers_dark: bool) -> anyhow::Result<Self> {
        fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;
        let path = data_dir.join(Self::FILE_NAME);
        let entries = load_entries(&path);

        info!(
            file = %path.display(),
            keys = entries.len(),
            prefers_dark,
            "opened key-value store"
        );

        Ok(Self {
            path,
            entries,
            prefers_dark,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HostEnv for FileEnv {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    #[tracing::instrument(skip(self, value))]
    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        save_entries_atomic(&self.path, &self.entries)
            .with_context(|| format!("failed to save {}", self.path.display()))
    }

    fn prefers_dark(&self) -> bool {
        self.prefers_dark
    }
}

/// Ambient dark-mode signal for a terminal host. An explicit scheme wins;
/// otherwise the `COLORFGBG` convention ("fg;bg") is consulted.
pub fn ambient_prefers_dark(scheme: Option<&str>, colorfgbg: Option<&str>) -> bool {
    if let Some(scheme) = scheme {
        match scheme.trim().to_ascii_lowercase().as_str() {
            "dark" => return true,
            "light" => return false,
            other => warn!(scheme = %other, "unknown color.scheme; ignoring"),
        }
    }

    let Some(bg) = colorfgbg.and_then(|raw| raw.rsplit(';').next()) else {
        return false;
    };
    match bg.trim().parse::<u8>() {
        Ok(index) => index <= 6 || index == 8,
        Err(_) => false,
    }
}

fn load_entries(path: &Path) -> BTreeMap<String, String> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            debug!(file = %path.display(), error = %err, "no readable key-value file; starting empty");
            return BTreeMap::new();
        }
    };

    if raw.trim().is_empty() {
        return BTreeMap::new();
    }

    match serde_json::from_str::<BTreeMap<String, String>>(&raw) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(file = %path.display(), error = %err, "corrupt key-value file; starting empty");
            BTreeMap::new()
        }
    }
}

fn save_entries_atomic(path: &Path, entries: &BTreeMap<String, String>) -> anyhow::Result<()> {
    debug!(file = %path.display(), keys = entries.len(), "saving key-value file atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    let serialized = serde_json::to_string_pretty(entries)?;
    temp.write_all(serialized.as_bytes())?;
    writeln!(temp)?;
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
