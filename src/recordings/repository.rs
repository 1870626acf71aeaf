//! Recording metadata persistence
//!
//! The canonical store is plain files: `<id>.<ext>` audio next to a
//! `<id>.json` metadata sidecar. The trait keeps the storage format
//! pluggable; the state container only ever talks to the trait.

use std::fs;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::RecorderConfig;
use crate::recordings::RecordingItem;
use crate::{Result, VoxmemoError};

/// Persistence contract for recordings. Calls may run on any thread; the
/// state container dispatches them off its reducer context.
pub trait RecordingRepository: Send + Sync {
    /// All recordings, newest first.
    fn load_all(&self) -> Result<Vec<RecordingItem>>;

    /// Write (or overwrite) the metadata sidecar for one item.
    fn save_info(&self, item: &RecordingItem) -> Result<()>;

    /// Remove the audio file and its sidecar.
    fn delete(&self, id: Uuid) -> Result<()>;
}

/// Filesystem-backed repository over the recordings directory.
pub struct FsRecordingRepository {
    config: RecorderConfig,
}

impl FsRecordingRepository {
    pub fn new(config: RecorderConfig) -> Self {
        Self { config }
    }

    fn read_sidecar(&self, id: Uuid) -> Option<RecordingItem> {
        let raw = fs::read_to_string(self.config.sidecar_path(id)).ok()?;
        match serde_json::from_str::<RecordingItem>(&raw) {
            Ok(item) if item.id == id => Some(item),
            Ok(_) => {
                warn!(%id, "sidecar id does not match its file name, ignoring");
                None
            }
            Err(e) => {
                warn!(%id, "unreadable sidecar: {}", e);
                None
            }
        }
    }
}

impl RecordingRepository for FsRecordingRepository {
    fn load_all(&self) -> Result<Vec<RecordingItem>> {
        let dir = &self.config.recordings_dir;
        let entries = fs::read_dir(dir).map_err(|e| {
            VoxmemoError::Repository(format!("cannot read {}: {e}", dir.display()))
        })?;

        let mut items = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| VoxmemoError::Repository(e.to_string()))?;
            let path = entry.path();

            if path.extension().and_then(|e| e.to_str())
                != Some(self.config.file_extension.as_str())
            {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Ok(id) = Uuid::parse_str(stem) else {
                debug!(file = %path.display(), "skipping non-recording file");
                continue;
            };

            let item = self.read_sidecar(id).unwrap_or_else(|| {
                // No sidecar yet: fall back to the audio file's mtime.
                let created_at = entry
                    .metadata()
                    .ok()
                    .and_then(|m| m.modified().ok())
                    .map(DateTime::<Utc>::from)
                    .unwrap_or_else(Utc::now);
                RecordingItem::from_parts(id, created_at)
            });
            items.push(item);
        }

        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    fn save_info(&self, item: &RecordingItem) -> Result<()> {
        fs::create_dir_all(&self.config.recordings_dir)
            .map_err(|e| VoxmemoError::Repository(e.to_string()))?;
        let json = serde_json::to_string_pretty(item)
            .map_err(|e| VoxmemoError::Repository(e.to_string()))?;
        fs::write(self.config.sidecar_path(item.id), json)
            .map_err(|e| VoxmemoError::Repository(e.to_string()))?;
        debug!(id = %item.id, "sidecar written");
        Ok(())
    }

    fn delete(&self, id: Uuid) -> Result<()> {
        let audio = self.config.audio_path(id);
        if audio.exists() {
            fs::remove_file(&audio).map_err(|e| {
                VoxmemoError::Repository(format!(
                    "unable to delete {}: {e}",
                    audio.display()
                ))
            })?;
        }
        let sidecar = self.config.sidecar_path(id);
        if sidecar.exists() {
            fs::remove_file(&sidecar).map_err(|e| {
                VoxmemoError::Repository(format!(
                    "unable to delete {}: {e}",
                    sidecar.display()
                ))
            })?;
        }
        debug!(%id, "recording deleted");
        Ok(())
    }
}
