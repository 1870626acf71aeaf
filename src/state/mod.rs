pub mod container;

pub use container::{
    Intent, LibrarySnapshot, PlaybackHandle, StateContainer, StateHandle,
    TranscriptionGateway, UiState,
};
