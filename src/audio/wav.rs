//! WAV container encoding
//!
//! Pure PCM-to-WAV encoding used by the capture worker, plus the read
//! helper the tests use to verify headers round-trip.

use std::fs;
use std::io::Cursor;
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::{Result, VoxmemoError};

/// Encode raw little-endian PCM bytes into a self-contained WAV file image.
///
/// Every header field (format tag, channel count, sample rate, bit depth,
/// byte rate, block align, payload length) is computed from the inputs.
/// Empty input produces a valid zero-payload container rather than failing.
pub fn encode_wav(
    pcm: &[u8],
    sample_rate: u32,
    channels: u16,
    bytes_per_sample: u16,
) -> Result<Vec<u8>> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: bytes_per_sample * 8,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    let mut writer = WavWriter::new(&mut cursor, spec)
        .map_err(|e| VoxmemoError::Encoding(e.to_string()))?;

    match bytes_per_sample {
        2 => {
            for frame in pcm.chunks_exact(2) {
                let sample = i16::from_le_bytes([frame[0], frame[1]]);
                writer
                    .write_sample(sample)
                    .map_err(|e| VoxmemoError::Encoding(e.to_string()))?;
            }
        }
        1 => {
            for &byte in pcm {
                writer
                    .write_sample(byte as i8)
                    .map_err(|e| VoxmemoError::Encoding(e.to_string()))?;
            }
        }
        other => {
            return Err(VoxmemoError::Encoding(format!(
                "unsupported sample width: {other} bytes"
            )))
        }
    }

    writer
        .finalize()
        .map_err(|e| VoxmemoError::Encoding(e.to_string()))?;

    Ok(cursor.into_inner())
}

/// Encode PCM bytes and write the container to `path`.
pub fn write_wav_file(
    path: &Path,
    pcm: &[u8],
    sample_rate: u32,
    channels: u16,
    bytes_per_sample: u16,
) -> Result<()> {
    let bytes = encode_wav(pcm, sample_rate, channels, bytes_per_sample)?;
    fs::write(path, bytes)?;
    Ok(())
}

/// Read a 16-bit WAV file back as samples plus its header spec.
pub fn read_wav(path: &Path) -> Result<(Vec<i16>, WavSpec)> {
    let reader =
        WavReader::open(path).map_err(|e| VoxmemoError::Encoding(e.to_string()))?;
    let spec = reader.spec();
    let samples = reader
        .into_samples::<i16>()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| VoxmemoError::Encoding(e.to_string()))?;
    Ok((samples, spec))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_round_trip() {
        let samples: Vec<i16> = vec![0, 1, -1, 32767, -32768, 100, -100, 7];
        let pcm: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();

        let bytes = encode_wav(&pcm, 16_000, 1, 2).unwrap();

        let reader = WavReader::new(Cursor::new(bytes)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.sample_rate, 16_000);
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(spec.sample_format, SampleFormat::Int);

        let decoded: Vec<i16> = reader.into_samples().map(|s| s.unwrap()).collect();
        assert_eq!(decoded, samples);
    }

    #[test]
    fn test_empty_input_yields_valid_container() {
        let bytes = encode_wav(&[], 16_000, 1, 2).unwrap();

        let reader = WavReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.spec().sample_rate, 16_000);
        assert_eq!(reader.len(), 0);
    }

    #[test]
    fn test_stereo_header_fields() {
        let pcm = vec![0u8; 16];
        let bytes = encode_wav(&pcm, 44_100, 2, 2).unwrap();

        let reader = WavReader::new(Cursor::new(bytes)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 44_100);
        // 16 bytes of stereo 16-bit PCM = 4 frames.
        assert_eq!(reader.duration(), 4);
    }

    #[test]
    fn test_unsupported_sample_width() {
        assert!(encode_wav(&[0u8; 12], 16_000, 1, 3).is_err());
    }

    #[test]
    fn test_file_round_trip() {
        let path = std::env::temp_dir().join(format!("voxmemo-wav-{}.wav", uuid::Uuid::new_v4()));
        let samples: Vec<i16> = (0..160).map(|i| (i * 100) as i16).collect();
        let pcm: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();

        write_wav_file(&path, &pcm, 16_000, 1, 2).unwrap();
        let (decoded, spec) = read_wav(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(decoded, samples);
        assert_eq!(spec.sample_rate, 16_000);
        assert_eq!(spec.channels, 1);
    }
}
