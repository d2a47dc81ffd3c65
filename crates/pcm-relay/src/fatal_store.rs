//! File-backed persistence for the last-fatal record.
//!
//! The pipeline only needs two operations across reboots: read what killed
//! the previous boot, and write what is killing this one. A single small
//! TOML file with the atomic write pattern covers both; write failures are
//! logged and swallowed because the escalation path must never depend on
//! the disk.

use crate::{AppError, AppResult};

use std::io::Write;
use std::panic::Location;
use std::path::{Path, PathBuf};

use error_location::ErrorLocation;
use pcm_relay_core::{ErrorKind, FatalRecord, FatalStore};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const FILE_NAME: &str = "last_fatal.toml";

/// [`FatalStore`] over one TOML file in the data directory.
pub struct TomlFatalStore {
    path: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredFatal {
    kind: usize,
    name: String,
    count: u32,
}

impl TomlFatalStore {
    /// Opens the store in `dir`, creating the directory if needed.
    #[track_caller]
    pub fn open(dir: &Path) -> AppResult<Self> {
        if !dir.exists() {
            std::fs::create_dir_all(dir).map_err(|e| AppError::FatalStoreError {
                reason: format!("create {:?}: {}", dir, e),
                location: ErrorLocation::from(Location::caller()),
            })?;
        }
        Ok(Self {
            path: dir.join(FILE_NAME),
        })
    }
}

impl FatalStore for TomlFatalStore {
    fn load_last_fatal(&self) -> Option<FatalRecord> {
        let contents = std::fs::read_to_string(&self.path).ok()?;
        let stored: StoredFatal = match toml::from_str(&contents) {
            Ok(s) => s,
            Err(e) => {
                warn!(path = ?self.path, error = %e, "Unreadable fatal record, ignoring");
                return None;
            }
        };
        let kind = ErrorKind::from_index(stored.kind)?;
        Some(FatalRecord {
            kind,
            count: stored.count,
        })
    }

    fn store_last_fatal(&self, record: &FatalRecord) {
        let stored = StoredFatal {
            kind: record.kind.index(),
            name: record.kind.name().to_string(),
            count: record.count,
        };
        let contents = match toml::to_string_pretty(&stored) {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Failed to serialize fatal record");
                return;
            }
        };

        let temp_path = self.path.with_extension("toml.tmp");
        let result = std::fs::File::create(&temp_path)
            .and_then(|mut f| {
                f.write_all(contents.as_bytes())?;
                f.sync_all()
            })
            .and_then(|()| std::fs::rename(&temp_path, &self.path));

        match result {
            Ok(()) => debug!(path = ?self.path, kind = stored.name, "Fatal record persisted"),
            Err(e) => warn!(path = ?self.path, error = %e, "Failed to persist fatal record"),
        }
    }
}
