pub mod audio;
pub mod config;
pub mod recordings;
pub mod state;
pub mod transcription;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum VoxmemoError {
    #[error("Audio device error: {0}")]
    AudioDevice(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Repository error: {0}")]
    Repository(String),

    #[error("Model load error: {0}")]
    ModelLoad(String),

    #[error("Transcription error: {0}")]
    Transcription(String),

    #[error("IO error: {0}")]
    IOError(String),

    #[error("Channel error: {0}")]
    Channel(String),
}

impl From<std::io::Error> for VoxmemoError {
    fn from(e: std::io::Error) -> Self {
        VoxmemoError::IOError(e.to_string())
    }
}

impl VoxmemoError {
    /// Whether this error is soft: surfaced as a dismissible message while
    /// the existing state stays intact. Everything else is fatal to its
    /// session or screen.
    pub fn is_soft(&self) -> bool {
        match self {
            VoxmemoError::Repository(_) => true,
            VoxmemoError::Transcription(_) => true,
            VoxmemoError::AudioDevice(_) => false,
            VoxmemoError::Encoding(_) => false,
            VoxmemoError::ModelLoad(_) => false,
            VoxmemoError::IOError(_) => false,
            VoxmemoError::Channel(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, VoxmemoError>;
