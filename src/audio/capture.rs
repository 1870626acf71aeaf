//! Audio capture engine
//!
//! One background worker thread per recording session pulls fixed-size
//! chunks of 16 kHz mono 16-bit PCM from a [`ChunkSource`], accumulates
//! them under a bounded duration cap, emits realtime sample windows at a
//! fixed cadence, and encodes the finished take as a WAV file named after
//! the session id. Cancellation is cooperative: a single flag checked once
//! per chunk, with a bounded join because the buffer itself is bounded.

use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::audio::wav::write_wav_file;
use crate::audio::{bytes_per_second, RollingBuffer, BYTES_PER_SAMPLE, CHANNELS, SAMPLE_RATE};
use crate::config::RecorderConfig;
use crate::recordings::RecordingItem;
use crate::Result;

pub const MSG_RECORDING: &str = "Recording...";
pub const MSG_RECORDING_DONE: &str = "Recording done";

/// Observer for capture progress and realtime sample windows.
///
/// Callbacks run on the capture worker thread; implementations must be
/// cheap and must not block.
pub trait CaptureListener: Send + Sync {
    /// Progress or failure message for the current session.
    fn on_update(&self, message: &str);

    /// A realtime window of samples normalized to [-1, 1].
    fn on_data_received(&self, samples: &[f32]);
}

/// Source of raw PCM chunks for one capture session.
///
/// `next_chunk` may return an empty chunk when nothing arrived within its
/// internal wait, so the caller can re-check cancellation; an error means
/// the device is gone and the session must abort.
pub trait ChunkSource {
    fn next_chunk(&mut self) -> Result<Vec<i16>>;
}

/// Opens a [`ChunkSource`] at the start of a session. The factory runs on
/// the worker thread itself, so sources that are not `Send` (platform audio
/// streams) stay confined to it.
pub type SourceFactory = dyn Fn() -> Result<Box<dyn ChunkSource>> + Send + Sync;

pub struct AudioCaptureEngine {
    config: RecorderConfig,
    listener: Arc<dyn CaptureListener>,
    open_source: Arc<SourceFactory>,
    in_progress: Arc<AtomicBool>,
    cancel: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    current: Option<RecordingItem>,
    finished_duration: Arc<Mutex<Option<i32>>>,
}

impl AudioCaptureEngine {
    /// Create an engine recording from the default input device.
    #[cfg(feature = "audio-io")]
    pub fn new(config: RecorderConfig, listener: Arc<dyn CaptureListener>) -> Self {
        Self::with_source(config, listener, Arc::new(device::MicChunkSource::open))
    }

    /// Create an engine with a custom chunk source (tests, alternate devices).
    pub fn with_source(
        config: RecorderConfig,
        listener: Arc<dyn CaptureListener>,
        open_source: Arc<SourceFactory>,
    ) -> Self {
        Self {
            config,
            listener,
            open_source,
            in_progress: Arc::new(AtomicBool::new(false)),
            cancel: Arc::new(AtomicBool::new(false)),
            worker: None,
            current: None,
            finished_duration: Arc::new(Mutex::new(None)),
        }
    }

    /// Start a capture session. Mints a fresh recording identifier, spawns
    /// exactly one worker thread and returns immediately. Returns `None`
    /// if a session is already in progress.
    pub fn start(&mut self) -> Option<Uuid> {
        if self.in_progress.load(Ordering::SeqCst) {
            warn!("recording is already in progress");
            return None;
        }
        // Reap a worker that ran to its cap on its own.
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }

        let item = RecordingItem::new();
        let path = self.config.audio_path(item.id);

        self.cancel.store(false, Ordering::SeqCst);
        self.in_progress.store(true, Ordering::SeqCst);
        *self.finished_duration.lock() = None;

        let config = self.config.clone();
        let listener = Arc::clone(&self.listener);
        let open_source = Arc::clone(&self.open_source);
        let cancel = Arc::clone(&self.cancel);
        let in_progress = Arc::clone(&self.in_progress);
        let finished_duration = Arc::clone(&self.finished_duration);

        info!(id = %item.id, "capture session started");
        self.worker = Some(thread::spawn(move || {
            match open_source() {
                Ok(source) => {
                    listener.on_update(MSG_RECORDING);
                    match capture_session(source, &cancel, listener.as_ref(), &config) {
                        Ok(pcm) => {
                            let secs = (pcm.len() / bytes_per_second()) as i32;
                            let written = fs::create_dir_all(&config.recordings_dir)
                                .map_err(Into::into)
                                .and_then(|_| {
                                    write_wav_file(
                                        &path,
                                        &pcm,
                                        SAMPLE_RATE,
                                        CHANNELS,
                                        BYTES_PER_SAMPLE,
                                    )
                                });
                            match written {
                                Ok(()) => {
                                    *finished_duration.lock() = Some(secs);
                                    info!(path = %path.display(), secs, "recorded file written");
                                    listener.on_update(MSG_RECORDING_DONE);
                                }
                                Err(e) => {
                                    warn!("failed to write recording: {}", e);
                                    listener.on_update(&e.to_string());
                                }
                            }
                        }
                        Err(e) => {
                            warn!("capture session aborted: {}", e);
                            listener.on_update(&e.to_string());
                        }
                    }
                }
                Err(e) => {
                    warn!("failed to open capture source: {}", e);
                    listener.on_update(&e.to_string());
                }
            }
            in_progress.store(false, Ordering::SeqCst);
        }));

        self.current = Some(item.clone());
        Some(item.id)
    }

    /// Stop the current session, blocking until the worker has exited, and
    /// return the finished item with its measured duration. Idempotent:
    /// with no active session this returns `None` without error.
    pub fn stop(&mut self) -> Option<RecordingItem> {
        self.cancel.store(true, Ordering::SeqCst);

        let handle = self.worker.take()?;
        if handle.join().is_err() {
            warn!("capture worker panicked");
        }
        self.in_progress.store(false, Ordering::SeqCst);

        let mut item = self.current.take()?;
        if let Some(secs) = self.finished_duration.lock().take() {
            item.duration_secs = secs;
        }
        info!(id = %item.id, "capture session finished");
        Some(item)
    }

    /// Check if a capture session is in progress.
    pub fn is_in_progress(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst)
    }
}

/// Core capture loop. Appends each chunk to the primary buffer (never past
/// the cap) and the rolling window; at every whole-second boundary reports
/// progress, and at every cadence multiple flushes the window to the
/// listener. Returns the accumulated PCM bytes, trimmed to what was
/// actually read.
fn capture_session(
    mut source: Box<dyn ChunkSource>,
    cancel: &AtomicBool,
    listener: &dyn CaptureListener,
    config: &RecorderConfig,
) -> Result<Vec<u8>> {
    let cap_bytes = config.max_capture_bytes();
    let bytes_per_sec = bytes_per_second();
    let cadence = config.realtime_cadence_secs.max(1) as usize;
    let window_samples = cadence * SAMPLE_RATE as usize;

    let mut primary: Vec<u8> = Vec::with_capacity(cap_bytes);
    let mut rolling = RollingBuffer::new(window_samples);
    let mut elapsed_secs = 0usize;

    while !cancel.load(Ordering::SeqCst) && primary.len() < cap_bytes {
        let chunk = source.next_chunk()?;
        if chunk.is_empty() {
            continue;
        }

        let room = (cap_bytes - primary.len()) / BYTES_PER_SAMPLE as usize;
        let take = chunk.len().min(room);
        for &sample in &chunk[..take] {
            primary.extend_from_slice(&sample.to_le_bytes());
        }
        rolling.push(&chunk[..take]);

        let secs_now = primary.len() / bytes_per_sec;
        if secs_now != elapsed_secs {
            elapsed_secs = secs_now;
            listener.on_update(&format!("{MSG_RECORDING} {elapsed_secs}s"));

            if elapsed_secs % cadence == 0 {
                let samples = rolling.drain_normalized();
                debug!(len = samples.len(), "realtime window emitted");
                listener.on_data_received(&samples);
            }
        }
    }

    Ok(primary)
}

#[cfg(feature = "audio-io")]
mod device {
    use super::*;
    use crate::VoxmemoError;
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use cpal::{SampleRate, Stream, StreamConfig};
    use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
    use std::time::Duration;
    use tracing::error;

    /// Microphone-backed chunk source. The cpal stream pushes i16 chunks
    /// into a bounded channel; the capture worker pulls them off with a
    /// timeout so the cancellation flag is checked at a steady rate.
    pub struct MicChunkSource {
        _stream: Stream,
        chunks: Receiver<Vec<i16>>,
    }

    impl MicChunkSource {
        pub fn open() -> Result<Box<dyn ChunkSource>> {
            let host = cpal::default_host();
            let device = host.default_input_device().ok_or_else(|| {
                VoxmemoError::AudioDevice("No input device available".into())
            })?;

            info!(
                "Using input device: {}",
                device.name().unwrap_or_else(|_| "Unknown".to_string())
            );

            let config = StreamConfig {
                channels: CHANNELS,
                sample_rate: SampleRate(SAMPLE_RATE),
                buffer_size: cpal::BufferSize::Default,
            };

            let (tx, rx) = bounded::<Vec<i16>>(64);
            let err_fn = |err| {
                error!("Audio input stream error: {}", err);
            };

            let stream = device
                .build_input_stream(
                    &config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        if let Err(e) = tx.try_send(data.to_vec()) {
                            debug!("Dropping audio chunk: {}", e);
                        }
                    },
                    err_fn,
                    None,
                )
                .map_err(|e| {
                    VoxmemoError::AudioDevice(format!("Failed to build input stream: {e}"))
                })?;

            stream.play().map_err(|e| {
                VoxmemoError::AudioDevice(format!("Failed to start input stream: {e}"))
            })?;

            Ok(Box::new(Self {
                _stream: stream,
                chunks: rx,
            }))
        }
    }

    impl ChunkSource for MicChunkSource {
        fn next_chunk(&mut self) -> Result<Vec<i16>> {
            match self.chunks.recv_timeout(Duration::from_millis(200)) {
                Ok(chunk) => Ok(chunk),
                Err(RecvTimeoutError::Timeout) => Ok(Vec::new()),
                Err(RecvTimeoutError::Disconnected) => Err(VoxmemoError::AudioDevice(
                    "input stream closed".into(),
                )),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VoxmemoError;
    use std::path::PathBuf;
    use std::time::Duration;

    #[derive(Default)]
    struct CollectingListener {
        updates: Mutex<Vec<String>>,
        windows: Mutex<Vec<Vec<f32>>>,
    }

    impl CaptureListener for CollectingListener {
        fn on_update(&self, message: &str) {
            self.updates.lock().push(message.to_string());
        }

        fn on_data_received(&self, samples: &[f32]) {
            self.windows.lock().push(samples.to_vec());
        }
    }

    /// Yields the same chunk forever; only the cap or the cancel flag stops it.
    struct ToneSource {
        chunk: Vec<i16>,
    }

    impl ChunkSource for ToneSource {
        fn next_chunk(&mut self) -> Result<Vec<i16>> {
            Ok(self.chunk.clone())
        }
    }

    /// Never produces data; the loop spins on empty chunks until cancelled.
    struct IdleSource;

    impl ChunkSource for IdleSource {
        fn next_chunk(&mut self) -> Result<Vec<i16>> {
            thread::sleep(Duration::from_millis(1));
            Ok(Vec::new())
        }
    }

    fn temp_config(max_duration_secs: u32) -> (RecorderConfig, PathBuf) {
        let dir = std::env::temp_dir().join(format!("voxmemo-capture-{}", Uuid::new_v4()));
        let config = RecorderConfig {
            max_duration_secs,
            realtime_cadence_secs: 3,
            recordings_dir: dir.clone(),
            file_extension: "wav".to_string(),
        };
        (config, dir)
    }

    fn wait_for_worker(engine: &AudioCaptureEngine) {
        for _ in 0..500 {
            if !engine.is_in_progress() {
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("capture worker did not finish in time");
    }

    #[test]
    fn test_capture_stops_exactly_at_cap() {
        let (config, dir) = temp_config(1);
        let listener = Arc::new(CollectingListener::default());
        // 0.25 s chunks.
        let factory: Arc<SourceFactory> = Arc::new(|| {
            Ok(Box::new(ToneSource {
                chunk: vec![1000; 4000],
            }) as Box<dyn ChunkSource>)
        });

        let mut engine = AudioCaptureEngine::with_source(config.clone(), listener, factory);
        let id = engine.start().expect("session should start");
        wait_for_worker(&engine);

        let item = engine.stop().expect("session should yield an item");
        assert_eq!(item.id, id);
        assert_eq!(item.duration_secs, 1);

        let (samples, spec) = crate::audio::read_wav(&config.audio_path(id)).unwrap();
        assert_eq!(samples.len(), SAMPLE_RATE as usize);
        assert_eq!(spec.sample_rate, SAMPLE_RATE);
        assert_eq!(spec.channels, CHANNELS);

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_realtime_windows_at_cadence() {
        let (config, _dir) = temp_config(7);
        let listener = CollectingListener::default();
        // 0.5 s chunks; the 7 s cap ends the loop.
        let source = Box::new(ToneSource {
            chunk: vec![-1000; 8000],
        });
        let cancel = AtomicBool::new(false);

        let pcm = capture_session(source, &cancel, &listener, &config).unwrap();
        assert_eq!(pcm.len(), config.max_capture_bytes());

        // Windows at the 3 s and 6 s boundaries, each one cadence long.
        let windows = listener.windows.lock();
        assert_eq!(windows.len(), 2);
        for window in windows.iter() {
            assert_eq!(window.len(), 3 * SAMPLE_RATE as usize);
            assert!(window.iter().all(|s| (-1.0..=1.0).contains(s)));
        }

        // Per-second progress updates were sent.
        let updates = listener.updates.lock();
        assert!(updates.iter().any(|m| m.contains("3s")));
        assert!(updates.iter().any(|m| m.contains("7s")));
    }

    #[test]
    fn test_stop_without_session_is_noop() {
        let (config, _dir) = temp_config(1);
        let listener = Arc::new(CollectingListener::default());
        let factory: Arc<SourceFactory> =
            Arc::new(|| Ok(Box::new(IdleSource) as Box<dyn ChunkSource>));

        let mut engine = AudioCaptureEngine::with_source(config, listener, factory);
        assert!(engine.stop().is_none());
        assert!(engine.stop().is_none());
        assert!(!engine.is_in_progress());
    }

    #[test]
    fn test_second_start_rejected_while_recording() {
        let (config, dir) = temp_config(60);
        let listener = Arc::new(CollectingListener::default());
        let factory: Arc<SourceFactory> =
            Arc::new(|| Ok(Box::new(IdleSource) as Box<dyn ChunkSource>));

        let mut engine = AudioCaptureEngine::with_source(config, listener, factory);
        let first = engine.start();
        assert!(first.is_some());
        assert!(engine.is_in_progress());
        assert!(engine.start().is_none());

        let item = engine.stop().expect("first session should finish");
        assert_eq!(Some(item.id), first);
        assert!(engine.stop().is_none());

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_device_open_failure_reports_and_writes_nothing() {
        let (config, dir) = temp_config(1);
        let listener = Arc::new(CollectingListener::default());
        let factory: Arc<SourceFactory> = Arc::new(|| {
            Err(VoxmemoError::AudioDevice("permission denied".into()))
        });

        let mut engine = AudioCaptureEngine::with_source(config.clone(), listener.clone(), factory);
        let id = engine.start().expect("start itself is non-blocking");
        wait_for_worker(&engine);

        let item = engine.stop().expect("session identifier survives failure");
        assert_eq!(item.id, id);
        assert_eq!(item.duration_secs, -1);
        assert!(!config.audio_path(id).exists());
        assert!(listener
            .updates
            .lock()
            .iter()
            .any(|m| m.contains("permission denied")));

        // The failure does not poison the engine.
        assert!(!engine.is_in_progress());
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_read_failure_aborts_session() {
        struct FailingSource;
        impl ChunkSource for FailingSource {
            fn next_chunk(&mut self) -> Result<Vec<i16>> {
                Err(VoxmemoError::AudioDevice("device unplugged".into()))
            }
        }

        let (config, _dir) = temp_config(1);
        let listener = CollectingListener::default();
        let cancel = AtomicBool::new(false);

        let result = capture_session(Box::new(FailingSource), &cancel, &listener, &config);
        assert!(result.is_err());
    }
}
