//! Recorder configuration
//!
//! Maximum duration, recordings folder and file extension live here as an
//! explicit value threaded through constructors instead of globals.

use std::path::PathBuf;

use uuid::Uuid;

use crate::audio::bytes_per_second;

/// Configuration shared by the capture engine, the transcription
/// controller and the filesystem repository.
#[derive(Clone, Debug)]
pub struct RecorderConfig {
    /// Maximum recording duration in seconds; capture stops at this cap
    /// even if never stopped manually.
    pub max_duration_secs: u32,

    /// Cadence, in whole seconds, at which realtime sample windows are
    /// handed to the capture listener.
    pub realtime_cadence_secs: u32,

    /// Directory holding the audio files and their metadata sidecars.
    pub recordings_dir: PathBuf,

    /// Extension of the audio container files.
    pub file_extension: String,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            max_duration_secs: 60,
            realtime_cadence_secs: 3,
            recordings_dir: PathBuf::from("records"),
            file_extension: "wav".to_string(),
        }
    }
}

impl RecorderConfig {
    /// Point the configuration at a different recordings directory.
    pub fn with_recordings_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.recordings_dir = dir.into();
        self
    }

    /// Set the maximum recording duration.
    pub fn with_max_duration(mut self, secs: u32) -> Self {
        self.max_duration_secs = secs;
        self
    }

    /// Cap on the primary capture buffer in bytes.
    pub fn max_capture_bytes(&self) -> usize {
        self.max_duration_secs as usize * bytes_per_second()
    }

    /// Path of the audio file for a recording.
    pub fn audio_path(&self, id: Uuid) -> PathBuf {
        self.recordings_dir
            .join(format!("{}.{}", id, self.file_extension))
    }

    /// Path of the JSON metadata sidecar for a recording.
    pub fn sidecar_path(&self, id: Uuid) -> PathBuf {
        self.recordings_dir.join(format!("{}.json", id))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.max_duration_secs == 0 {
            return Err("max_duration_secs must be positive".to_string());
        }
        if self.realtime_cadence_secs == 0 {
            return Err("realtime_cadence_secs must be positive".to_string());
        }
        if self.file_extension.is_empty() {
            return Err("file_extension is required".to_string());
        }
        Ok(())
    }
}
