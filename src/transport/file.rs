//! File transport
//!
//! Appends one canonical JSON line per event to `log_file`. With
//! `append: false` each event is written to its own new file named
//! `<log_file>-<UTC timestamp>.json`; existing files are never overwritten, and
//! a `-1`, `-2`, ... suffix is added when two events land on the same timestamp.

use chrono::Utc;
use serde::Deserialize;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::Transport;
use crate::config::TransportConfig;
use crate::error::{Error, Result};
use crate::event::RunEvent;

pub const KIND: &str = "file";

/// Settings accepted in the `transport` section for `type: file`
#[derive(Debug, Clone, Deserialize)]
pub struct FileSettings {
    pub log_file: String,
    #[serde(default = "default_append")]
    pub append: bool,
}

fn default_append() -> bool {
    true
}

#[derive(Debug)]
pub struct FileTransport {
    path: PathBuf,
    append: bool,
    // Serializes writers so concurrent emits never interleave lines
    lock: Mutex<()>,
}

impl FileTransport {
    pub fn new(path: PathBuf, append: bool) -> Self {
        Self {
            path,
            append,
            lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &TransportConfig) -> Result<Self> {
        let settings: FileSettings = config.settings_as().map_err(|e| Error::TransportConfig {
            kind: KIND.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::new(expand_path(&settings.log_file), settings.append))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the per-event file for `stamp`, with an optional collision counter
    fn numbered(&self, stamp: &str, counter: usize) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        if counter == 0 {
            name.push(format!("-{}.json", stamp));
        } else {
            name.push(format!("-{}-{}.json", stamp, counter));
        }
        self.path.with_file_name(name)
    }

    /// Create a fresh file for one event, never reusing an existing one
    fn create_event_file(&self, stamp: &str) -> Result<(PathBuf, File)> {
        let mut counter = 0;
        loop {
            let target = self.numbered(stamp, counter);
            match OpenOptions::new().write(true).create_new(true).open(&target) {
                Ok(file) => return Ok((target, file)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => counter += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Expand `~` and environment variables in a configured path
fn expand_path(raw: &str) -> PathBuf {
    let expanded = shellexpand::full(raw).unwrap_or_else(|_| raw.into());
    PathBuf::from(expanded.into_owned())
}

impl Transport for FileTransport {
    fn kind(&self) -> &str {
        KIND
    }

    fn emit(&self, event: &RunEvent) -> Result<()> {
        let json = event.to_canonical_json()?;
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut file = if self.append {
            OpenOptions::new().create(true).append(true).open(&self.path)?
        } else {
            let stamp = Utc::now().format("%Y%m%d-%H%M%S%.6f").to_string();
            let (target, file) = self.create_event_file(&stamp)?;
            log::debug!("Writing lineage event to {}", target.display());
            file
        };
        writeln!(file, "{}", json)?;

        Ok(())
    }
}
