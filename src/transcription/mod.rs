pub mod controller;
pub mod engine;

pub use controller::{SubmitRejected, TranscriptionJobController};
pub use engine::{
    SpeechEngine, TranscriptionListener, MSG_FILE_NOT_FOUND, MSG_PROCESSING,
    MSG_PROCESSING_DONE,
};
