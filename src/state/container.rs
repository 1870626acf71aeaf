//! Single-writer state container
//!
//! Every intent, whatever thread it comes from (UI, capture completion,
//! transcription completion, playback timer), is funneled through one
//! channel into a dedicated reducer thread, so no two mutations ever
//! interleave. Each applied intent publishes exactly one immutable
//! snapshot to every subscriber and to a shared cell for ad-hoc reads.
//! Repository I/O never runs on the reducer thread: it is dispatched to a
//! short-lived worker whose outcome re-enters as a completion intent.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::recordings::{RecordingItem, RecordingRepository};
use crate::transcription::{
    SubmitRejected, TranscriptionJobController, TranscriptionListener,
};
use crate::{Result, VoxmemoError};

/// Controls whatever is playing the selected recording. Implementations
/// are external; the container only tells them when to start and stop.
pub trait PlaybackHandle: Send {
    fn play(&mut self, item: &RecordingItem);
    fn stop(&mut self);
}

/// Admission interface of the transcription controller.
pub trait TranscriptionGateway: Send {
    fn is_busy(&self) -> bool;
    fn submit(&mut self, item: &RecordingItem) -> std::result::Result<(), SubmitRejected>;
}

impl TranscriptionGateway for TranscriptionJobController {
    fn is_busy(&self) -> bool {
        TranscriptionJobController::is_busy(self)
    }

    fn submit(&mut self, item: &RecordingItem) -> std::result::Result<(), SubmitRejected> {
        TranscriptionJobController::submit(self, item)
    }
}

/// The content payload of [`UiState::Content`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibrarySnapshot {
    /// Newest first; stable unless reloaded.
    pub recordings: Vec<RecordingItem>,
    pub selected: Option<usize>,
    pub is_playing: bool,
    pub is_transcribing: bool,
    pub pending_delete: bool,
    /// Empty when no soft error is being shown.
    pub last_error: String,
}

impl LibrarySnapshot {
    fn new(recordings: Vec<RecordingItem>, selected: Option<usize>) -> Self {
        Self {
            recordings,
            selected,
            is_playing: false,
            is_transcribing: false,
            pending_delete: false,
            last_error: String::new(),
        }
    }

    pub fn selected_item(&self) -> Option<&RecordingItem> {
        self.selected.and_then(|i| self.recordings.get(i))
    }
}

/// Loading/content/error lifecycle of the library screen. `Error` is
/// reserved for a failed bulk load; everything after a successful load is
/// a soft error carried inside `Content`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiState {
    Initial,
    Loading,
    Content(LibrarySnapshot),
    Error,
}

impl UiState {
    pub fn content(&self) -> Option<&LibrarySnapshot> {
        match self {
            UiState::Content(snapshot) => Some(snapshot),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Intent {
    /// Reload the library, selecting `select` if it lands in range of the
    /// freshly loaded list.
    Load { select: Option<usize> },

    /// Select a recording; out-of-range requests are ignored. Selection
    /// always stops playback.
    Select(usize),

    /// Play/pause toggle state from the UI.
    PlayClicked(bool),

    /// The player finished the current item.
    PlaybackCompleted,

    /// A capture session finished; persist its metadata and reload.
    RecordingStopped(RecordingItem),

    /// Transcribe the current selection.
    Transcribe,

    /// A transcription job completed. Ignored unless `target_id` still
    /// matches the current selection.
    TranscriptionResult { text: String, target_id: Uuid },

    /// First phase of deletion: ask for confirmation.
    DeleteRequested,

    /// Second phase: delete the selection and reload.
    DeleteConfirmed,

    /// Abandon the pending deletion.
    DeleteDismissed,

    /// Clear the soft error message.
    ErrorDismissed,

    /// Repository completion for `Load`, re-entered from a worker.
    LoadCompleted {
        recordings: std::result::Result<Vec<RecordingItem>, String>,
        select: Option<usize>,
    },

    /// Repository completion for a metadata save.
    MetadataSaved {
        outcome: std::result::Result<(), String>,
        reload_select: usize,
    },

    /// Repository completion for a delete.
    RecordingDeleted {
        outcome: std::result::Result<(), String>,
        reload_select: usize,
    },

    /// Stop the reducer thread.
    Shutdown,
}

/// Cheap, cloneable handle for talking to a running container from any
/// thread.
#[derive(Clone)]
pub struct StateHandle {
    intent_tx: Sender<Intent>,
    current: Arc<RwLock<UiState>>,
    subscribers: Arc<Mutex<Vec<Sender<UiState>>>>,
}

impl StateHandle {
    /// Queue an intent for the reducer.
    pub fn send(&self, intent: Intent) -> Result<()> {
        self.intent_tx
            .send(intent)
            .map_err(|e| VoxmemoError::Channel(format!("state container is gone: {e}")))
    }

    /// Receive every snapshot published from now on.
    pub fn subscribe(&self) -> Receiver<UiState> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    /// The most recently published snapshot.
    pub fn current(&self) -> UiState {
        self.current.read().clone()
    }

    /// Ask the reducer thread to exit.
    pub fn shutdown(&self) {
        let _ = self.intent_tx.send(Intent::Shutdown);
    }
}

/// Transcription completions re-enter the container as intents; wiring the
/// handle straight into the controller closes that loop.
impl TranscriptionListener for StateHandle {
    fn on_update(&self, message: &str) {
        debug!("transcription update: {}", message);
    }

    fn on_result(&self, text: &str, target_id: Uuid) {
        let _ = self.send(Intent::TranscriptionResult {
            text: text.to_string(),
            target_id,
        });
    }
}

pub struct StateContainer {
    intent_rx: Receiver<Intent>,
    intent_tx: Sender<Intent>,
    current: Arc<RwLock<UiState>>,
    subscribers: Arc<Mutex<Vec<Sender<UiState>>>>,
    repository: Arc<dyn RecordingRepository>,
    player: Box<dyn PlaybackHandle>,
    transcriber: Box<dyn TranscriptionGateway>,
    state: UiState,
}

impl StateContainer {
    pub fn new(
        repository: Arc<dyn RecordingRepository>,
        player: Box<dyn PlaybackHandle>,
        transcriber: Box<dyn TranscriptionGateway>,
    ) -> (Self, StateHandle) {
        let (intent_tx, intent_rx) = unbounded();
        let current = Arc::new(RwLock::new(UiState::Initial));
        let subscribers = Arc::new(Mutex::new(Vec::new()));

        let handle = StateHandle {
            intent_tx: intent_tx.clone(),
            current: Arc::clone(&current),
            subscribers: Arc::clone(&subscribers),
        };

        let container = Self {
            intent_rx,
            intent_tx,
            current,
            subscribers,
            repository,
            player,
            transcriber,
            state: UiState::Initial,
        };

        (container, handle)
    }

    /// Consume the container and run the reducer on its own thread.
    pub fn spawn(mut self) -> JoinHandle<()> {
        thread::spawn(move || self.run())
    }

    fn run(&mut self) {
        info!("state container started");
        while let Ok(intent) = self.intent_rx.recv() {
            if matches!(intent, Intent::Shutdown) {
                break;
            }
            self.apply(intent);
            self.publish();
        }
        info!("state container stopped");
    }

    fn publish(&self) {
        *self.current.write() = self.state.clone();
        self.subscribers
            .lock()
            .retain(|tx| tx.send(self.state.clone()).is_ok());
    }

    fn apply(&mut self, intent: Intent) {
        match intent {
            Intent::Load { select } => self.on_load(select),
            Intent::LoadCompleted { recordings, select } => {
                self.on_load_completed(recordings, select)
            }
            Intent::Select(index) => self.on_select(index),
            Intent::PlayClicked(value) => self.on_play_clicked(value),
            Intent::PlaybackCompleted => self.on_playback_completed(),
            Intent::RecordingStopped(item) => self.persist_metadata(item, 0),
            Intent::Transcribe => self.on_transcribe(),
            Intent::TranscriptionResult { text, target_id } => {
                self.on_transcription_result(text, target_id)
            }
            Intent::DeleteRequested => self.on_delete_requested(),
            Intent::DeleteConfirmed => self.on_delete_confirmed(),
            Intent::DeleteDismissed => self.on_delete_dismissed(),
            Intent::ErrorDismissed => self.on_error_dismissed(),
            Intent::MetadataSaved {
                outcome,
                reload_select,
            } => self.on_metadata_saved(outcome, reload_select),
            Intent::RecordingDeleted {
                outcome,
                reload_select,
            } => self.on_recording_deleted(outcome, reload_select),
            Intent::Shutdown => {}
        }
    }

    fn on_load(&mut self, select: Option<usize>) {
        self.state = UiState::Loading;

        let repository = Arc::clone(&self.repository);
        let tx = self.intent_tx.clone();
        thread::spawn(move || {
            let recordings = repository.load_all().map_err(|e| e.to_string());
            let _ = tx.send(Intent::LoadCompleted { recordings, select });
        });
    }

    fn on_load_completed(
        &mut self,
        recordings: std::result::Result<Vec<RecordingItem>, String>,
        select: Option<usize>,
    ) {
        match recordings {
            Ok(recordings) => {
                let selected = select.filter(|i| *i < recordings.len());
                debug!(count = recordings.len(), ?selected, "library loaded");
                self.state = UiState::Content(LibrarySnapshot::new(recordings, selected));
            }
            Err(message) => {
                warn!("bulk load failed: {}", message);
                self.state = UiState::Error;
            }
        }
    }

    fn on_select(&mut self, index: usize) {
        let in_range =
            matches!(&self.state, UiState::Content(s) if index < s.recordings.len());
        if !in_range {
            debug!(index, "select out of range, ignoring");
            return;
        }
        self.player.stop();
        if let UiState::Content(snapshot) = &mut self.state {
            snapshot.selected = Some(index);
            snapshot.is_playing = false;
        }
    }

    fn on_play_clicked(&mut self, value: bool) {
        if let UiState::Content(snapshot) = &mut self.state {
            snapshot.is_playing = value && snapshot.selected.is_some();
        }
    }

    fn on_playback_completed(&mut self) {
        self.player.stop();

        let next = match &self.state {
            UiState::Content(snapshot) => snapshot
                .selected
                .map(|i| i + 1)
                .filter(|n| *n < snapshot.recordings.len())
                .map(|n| (n, snapshot.recordings[n].clone())),
            _ => None,
        };

        if let UiState::Content(snapshot) = &mut self.state {
            snapshot.is_playing = false;
        }

        if let Some((index, item)) = next {
            if let UiState::Content(snapshot) = &mut self.state {
                snapshot.selected = Some(index);
                snapshot.is_playing = true;
            }
            self.player.play(&item);
        }
    }

    fn on_transcribe(&mut self) {
        let item = match &self.state {
            UiState::Content(snapshot) => snapshot.selected_item().cloned(),
            _ => None,
        };
        let Some(item) = item else {
            debug!("transcribe with no selection, ignoring");
            return;
        };

        if item.is_transcribed() {
            self.soft_error(&SubmitRejected::AlreadyTranscribed.to_string());
            return;
        }
        if self.transcriber.is_busy() {
            self.soft_error(&SubmitRejected::Busy.to_string());
            return;
        }

        match self.transcriber.submit(&item) {
            Ok(()) => {
                info!(id = %item.id, "transcription submitted");
                if let UiState::Content(snapshot) = &mut self.state {
                    snapshot.is_transcribing = true;
                }
            }
            Err(rejected) => self.soft_error(&rejected.to_string()),
        }
    }

    fn on_transcription_result(&mut self, text: String, target_id: Uuid) {
        let current = match &self.state {
            UiState::Content(snapshot) => snapshot
                .selected
                .and_then(|i| snapshot.recordings.get(i).map(|item| (i, item.clone()))),
            _ => None,
        };
        let Some((index, item)) = current else {
            debug!(%target_id, "transcription result with no selection, ignoring");
            return;
        };

        // The selection may have moved, or the item may be gone, since the
        // job was admitted.
        if item.id != target_id {
            debug!(%target_id, "stale transcription result, ignoring");
            return;
        }

        self.persist_metadata(item.with_transcription(&text), index);
    }

    fn persist_metadata(&mut self, item: RecordingItem, reload_select: usize) {
        let repository = Arc::clone(&self.repository);
        let tx = self.intent_tx.clone();
        thread::spawn(move || {
            let outcome = repository.save_info(&item).map_err(|e| e.to_string());
            let _ = tx.send(Intent::MetadataSaved {
                outcome,
                reload_select,
            });
        });
    }

    fn on_metadata_saved(
        &mut self,
        outcome: std::result::Result<(), String>,
        reload_select: usize,
    ) {
        match outcome {
            Ok(()) => self.on_load(Some(reload_select)),
            Err(message) => {
                // Keep the in-memory content; just surface the failure.
                warn!("metadata save failed: {}", message);
                if let UiState::Content(snapshot) = &mut self.state {
                    snapshot.last_error = message;
                    snapshot.is_transcribing = false;
                }
            }
        }
    }

    fn on_delete_requested(&mut self) {
        if let UiState::Content(snapshot) = &mut self.state {
            if snapshot.selected_item().is_some() {
                snapshot.pending_delete = true;
            }
        }
    }

    fn on_delete_confirmed(&mut self) {
        let target = match &self.state {
            UiState::Content(snapshot) => snapshot
                .selected
                .and_then(|i| snapshot.recordings.get(i).map(|item| (i, item.id))),
            _ => None,
        };

        if let UiState::Content(snapshot) = &mut self.state {
            snapshot.pending_delete = false;
        }

        let Some((index, id)) = target else {
            return;
        };
        let reload_select = index.saturating_sub(1);

        let repository = Arc::clone(&self.repository);
        let tx = self.intent_tx.clone();
        thread::spawn(move || {
            let outcome = repository.delete(id).map_err(|e| e.to_string());
            let _ = tx.send(Intent::RecordingDeleted {
                outcome,
                reload_select,
            });
        });
    }

    fn on_delete_dismissed(&mut self) {
        if let UiState::Content(snapshot) = &mut self.state {
            snapshot.pending_delete = false;
        }
    }

    fn on_error_dismissed(&mut self) {
        if let UiState::Content(snapshot) = &mut self.state {
            snapshot.last_error.clear();
        }
    }

    fn on_recording_deleted(
        &mut self,
        outcome: std::result::Result<(), String>,
        reload_select: usize,
    ) {
        match outcome {
            Ok(()) => self.on_load(Some(reload_select)),
            Err(message) => self.soft_error(&message),
        }
    }

    /// Soft errors attach a dismissible message and settle the transient
    /// flags; everything else in the snapshot stays intact.
    fn soft_error(&mut self, message: &str) {
        warn!("soft error: {}", message);
        if let UiState::Content(snapshot) = &mut self.state {
            snapshot.is_playing = false;
            snapshot.is_transcribing = false;
            snapshot.last_error = message.to_string();
        }
    }
}
