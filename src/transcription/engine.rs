//! Opaque speech-recognition engine contract.

use std::path::Path;

use uuid::Uuid;

use crate::Result;

pub const MSG_PROCESSING: &str = "Processing...";
pub const MSG_PROCESSING_DONE: &str = "Processing done";
pub const MSG_FILE_NOT_FOUND: &str = "Input file doesn't exist";

/// The recognition engine is treated as an opaque, non-preemptible box:
/// load a model once, then run it against one audio file at a time. The
/// numerics behind `transcribe_file` are none of this crate's business.
pub trait SpeechEngine: Send {
    fn load_model(
        &mut self,
        model_path: &Path,
        vocab_path: &Path,
        multilingual: bool,
    ) -> Result<()>;

    fn transcribe_file(&mut self, audio_path: &Path) -> Result<String>;
}

/// Receives transcription progress and results.
///
/// `on_result` carries the identifier of the recording the job was started
/// with, so receivers can validate a late completion against whatever is
/// selected by the time it arrives.
pub trait TranscriptionListener: Send + Sync {
    fn on_update(&self, message: &str);
    fn on_result(&self, text: &str, target_id: Uuid);
}
