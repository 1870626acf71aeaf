pub mod buffer;
pub mod capture;
pub mod wav;

pub use buffer::RollingBuffer;
pub use capture::{AudioCaptureEngine, CaptureListener, ChunkSource};
pub use wav::{encode_wav, read_wav, write_wav_file};

/// Fixed capture format: 16 kHz, mono, 16-bit signed PCM. This is a
/// property of the pipeline, not configuration.
pub const SAMPLE_RATE: u32 = 16_000;
pub const CHANNELS: u16 = 1;
pub const BYTES_PER_SAMPLE: u16 = 2;

/// Bytes consumed per second of capture at the fixed format.
pub fn bytes_per_second() -> usize {
    SAMPLE_RATE as usize * CHANNELS as usize * BYTES_PER_SAMPLE as usize
}
