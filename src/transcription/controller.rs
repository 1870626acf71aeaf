//! Single-flight transcription job controller
//!
//! Wraps the opaque recognition engine and enforces at-most-one running
//! job. Further submissions are rejected, never queued; completions are
//! delivered through the listener keyed by the recording identifier the
//! job was started with.

use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::RecorderConfig;
use crate::recordings::RecordingItem;
use crate::transcription::engine::{
    SpeechEngine, TranscriptionListener, MSG_FILE_NOT_FOUND, MSG_PROCESSING,
    MSG_PROCESSING_DONE,
};
use crate::Result;

/// Why a submission was not admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitRejected {
    /// The item already carries a transcription.
    AlreadyTranscribed,
    /// Another job is running; requests are rejected, not queued.
    Busy,
}

impl fmt::Display for SubmitRejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitRejected::AlreadyTranscribed => write!(f, "Already transcribed"),
            SubmitRejected::Busy => write!(f, "In the process"),
        }
    }
}

pub struct TranscriptionJobController {
    config: RecorderConfig,
    engine: Arc<Mutex<Box<dyn SpeechEngine>>>,
    listener: Arc<dyn TranscriptionListener>,
    in_progress: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl TranscriptionJobController {
    pub fn new(
        config: RecorderConfig,
        engine: Box<dyn SpeechEngine>,
        listener: Arc<dyn TranscriptionListener>,
    ) -> Self {
        Self {
            config,
            engine: Arc::new(Mutex::new(engine)),
            listener,
            in_progress: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    /// Load the recognition model. Must complete before the first submit.
    pub fn load_model(
        &self,
        model_path: &Path,
        vocab_path: &Path,
        multilingual: bool,
    ) -> Result<()> {
        info!(model = %model_path.display(), multilingual, "loading recognition model");
        self.engine.lock().load_model(model_path, vocab_path, multilingual)
    }

    /// Check if a job is currently running.
    pub fn is_busy(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst)
    }

    /// Admit at most one job at a time. A `Busy` rejection leaves the
    /// running job untouched; an accepted item starts a worker thread that
    /// runs the engine against the item's audio file and posts the result
    /// keyed by the item's identifier.
    pub fn submit(
        &mut self,
        item: &RecordingItem,
    ) -> std::result::Result<(), SubmitRejected> {
        if item.is_transcribed() {
            debug!(id = %item.id, "rejecting submit: already transcribed");
            return Err(SubmitRejected::AlreadyTranscribed);
        }
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!(id = %item.id, "rejecting submit: job in progress");
            return Err(SubmitRejected::Busy);
        }

        // Reap the previous, already-finished worker.
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }

        let target_id = item.id;
        let audio_path = self.config.audio_path(target_id);
        let engine = Arc::clone(&self.engine);
        let listener = Arc::clone(&self.listener);
        let in_progress = Arc::clone(&self.in_progress);

        info!(id = %target_id, "transcription job started");
        self.worker = Some(thread::spawn(move || {
            listener.on_update(MSG_PROCESSING);
            if audio_path.exists() {
                match engine.lock().transcribe_file(&audio_path) {
                    Ok(text) => {
                        listener.on_update(MSG_PROCESSING_DONE);
                        listener.on_result(&text, target_id);
                    }
                    Err(e) => {
                        warn!(id = %target_id, "transcription failed: {}", e);
                        listener.on_update(&e.to_string());
                    }
                }
            } else {
                warn!(path = %audio_path.display(), "audio file missing");
                listener.on_update(MSG_FILE_NOT_FOUND);
            }
            in_progress.store(false, Ordering::SeqCst);
        }));

        Ok(())
    }
}

impl Drop for TranscriptionJobController {
    fn drop(&mut self) {
        // The engine is non-preemptible; all we can do is wait it out.
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}
