pub mod repository;
pub mod types;

pub use repository::{FsRecordingRepository, RecordingRepository};
pub use types::{RecordingItem, DURATION_UNKNOWN};
