//! Session lifecycle: state machine, thread spawning, and ordered shutdown.
//!
//! The controller owns the only writable handle to the recording state.
//! Producer and uploader get read-only views and poll them at their loop
//! and timeout boundaries; cancellation is cooperative throughout.

use crate::config::SessionConfig;
use crate::defaults;
use crate::error::Result;
use crate::pipeline::producer::StreamProducer;
use crate::pipeline::queue::ChunkQueue;
use crate::pipeline::types::UploadRecord;
use crate::pipeline::uploader::ChunkUploader;
use crate::source::ByteSource;
use crate::storage::StorageSink;
use crate::transcode::AudioTranscoder;
use crossbeam_channel::{Receiver, unbounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime};

/// Lifecycle of one recording session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    Idle,
    Recording,
    Stopping,
    Stopped,
}

impl RecordingState {
    fn as_u8(self) -> u8 {
        match self {
            RecordingState::Idle => 0,
            RecordingState::Recording => 1,
            RecordingState::Stopping => 2,
            RecordingState::Stopped => 3,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => RecordingState::Recording,
            2 => RecordingState::Stopping,
            3 => RecordingState::Stopped,
            _ => RecordingState::Idle,
        }
    }
}

/// Shared state cell. Writes stay inside this module; everyone else sees a
/// read-only [`StateView`].
#[derive(Clone)]
struct SessionState(Arc<AtomicU8>);

impl SessionState {
    fn new() -> Self {
        Self(Arc::new(AtomicU8::new(RecordingState::Idle.as_u8())))
    }

    fn set(&self, state: RecordingState) {
        self.0.store(state.as_u8(), Ordering::SeqCst);
    }

    fn get(&self) -> RecordingState {
        RecordingState::from_u8(self.0.load(Ordering::SeqCst))
    }

    fn view(&self) -> StateView {
        StateView(self.0.clone())
    }
}

/// Read-only view of the session state for the pipeline threads.
#[derive(Clone)]
pub struct StateView(Arc<AtomicU8>);

impl StateView {
    pub fn get(&self) -> RecordingState {
        RecordingState::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub fn is_recording(&self) -> bool {
        self.get() == RecordingState::Recording
    }
}

/// Summary of a finished session.
#[derive(Debug)]
pub struct SessionReport {
    /// One record per dequeued chunk, in sequence order.
    pub records: Vec<UploadRecord>,
    /// False when a pipeline thread missed its join window.
    pub clean_shutdown: bool,
    pub started_at: SystemTime,
    pub stopped_at: SystemTime,
}

impl SessionReport {
    pub fn uploaded(&self) -> usize {
        self.records.iter().filter(|r| r.succeeded()).count()
    }

    pub fn failed(&self) -> usize {
        self.records.len() - self.uploaded()
    }
}

/// Top-level coordinator for one recording session.
///
/// Consumed by `start`; a second session needs a new controller.
pub struct RecordingController {
    config: SessionConfig,
    join_window: Duration,
    quiet: bool,
}

impl RecordingController {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            join_window: Duration::from_secs(defaults::JOIN_WINDOW_SECS),
            quiet: false,
        }
    }

    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Overrides the shutdown join window (tests use a short one).
    pub fn with_join_window(mut self, window: Duration) -> Self {
        self.join_window = window;
        self
    }

    /// Validates the destination and spawns the producer and uploader.
    ///
    /// Storage misconfiguration aborts here, before any byte is captured.
    /// When the session has a total duration, a timer thread moves the
    /// state to `Stopping` once it elapses; `stop` still finalizes.
    pub fn start(
        self,
        source: Box<dyn ByteSource>,
        transcoder: Arc<dyn AudioTranscoder>,
        sink: Arc<dyn StorageSink>,
    ) -> Result<RecordingHandle> {
        sink.validate()?;

        let state = SessionState::new();
        let queue = Arc::new(ChunkQueue::with_capacity(defaults::QUEUE_CAPACITY));
        let (records_tx, records_rx) = unbounded();

        state.set(RecordingState::Recording);
        let started_at = SystemTime::now();

        let producer = StreamProducer::new(
            source,
            self.config.chunk_duration,
            queue.clone(),
            state.view(),
        )
        .quiet(self.quiet);
        let producer_handle = thread::spawn(move || producer.run());

        let uploader = ChunkUploader::new(
            queue.clone(),
            transcoder,
            sink,
            self.config.clone(),
            records_tx,
        )
        .quiet(self.quiet);
        let uploader_handle = thread::spawn(move || uploader.run());

        if let Some(total) = self.config.total_duration {
            spawn_duration_timer(state.clone(), total);
        }

        Ok(RecordingHandle {
            state,
            started_at,
            join_window: self.join_window,
            producer: Some(producer_handle),
            uploader: Some(uploader_handle),
            records_rx,
        })
    }
}

/// Handle to a running session. `stop` drives the shutdown sequence.
pub struct RecordingHandle {
    state: SessionState,
    started_at: SystemTime,
    join_window: Duration,
    producer: Option<JoinHandle<Result<()>>>,
    uploader: Option<JoinHandle<()>>,
    records_rx: Receiver<UploadRecord>,
}

impl RecordingHandle {
    pub fn state(&self) -> RecordingState {
        self.state.get()
    }

    pub fn is_recording(&self) -> bool {
        self.state.get() == RecordingState::Recording
    }

    /// Stops the session: signal both threads, wait out the drain, report.
    ///
    /// The producer exits first (it polls the state at every read and push),
    /// then the uploader finishes whatever is still queued. Each side gets a
    /// bounded join window; a straggler is reported, not waited on forever.
    pub fn stop(mut self) -> SessionReport {
        self.state.set(RecordingState::Stopping);

        let mut clean = true;

        if let Some(handle) = self.producer.take() {
            match join_within(handle, self.join_window) {
                JoinOutcome::Finished(Ok(())) => {}
                JoinOutcome::Finished(Err(e)) => {
                    eprintln!("aircap: producer stopped with error: {e}");
                }
                JoinOutcome::Panicked(msg) => {
                    eprintln!("aircap: producer panicked: {msg}");
                    clean = false;
                }
                JoinOutcome::TimedOut => {
                    eprintln!("aircap: producer did not stop within the join window, detaching");
                    clean = false;
                }
            }
        }

        if let Some(handle) = self.uploader.take() {
            match join_within(handle, self.join_window) {
                JoinOutcome::Finished(()) => {}
                JoinOutcome::Panicked(msg) => {
                    eprintln!("aircap: uploader panicked: {msg}");
                    clean = false;
                }
                JoinOutcome::TimedOut => {
                    eprintln!("aircap: uploader did not drain within the join window, detaching");
                    clean = false;
                }
            }
        }

        self.state.set(RecordingState::Stopped);

        let records: Vec<UploadRecord> = self.records_rx.try_iter().collect();
        SessionReport {
            records,
            clean_shutdown: clean,
            started_at: self.started_at,
            stopped_at: SystemTime::now(),
        }
    }
}

/// Detached watchdog that moves a recording session to `Stopping` when its
/// total duration elapses. Exits early if the session stops first.
fn spawn_duration_timer(state: SessionState, total: Duration) {
    thread::spawn(move || {
        let deadline = Instant::now() + total;
        while state.get() == RecordingState::Recording {
            if Instant::now() >= deadline {
                state.set(RecordingState::Stopping);
                break;
            }
            thread::sleep(Duration::from_millis(50));
        }
    });
}

/// How a pipeline thread ended relative to its join window.
enum JoinOutcome<T> {
    Finished(T),
    Panicked(String),
    TimedOut,
}

/// Joins a thread within `window`, polling for completion.
///
/// On timeout the handle is dropped, detaching the thread to die with the
/// process. A panicked thread is reported as such, not as a timeout.
fn join_within<T>(handle: JoinHandle<T>, window: Duration) -> JoinOutcome<T> {
    let deadline = Instant::now() + window;
    let poll_interval = Duration::from_millis(50);

    while !handle.is_finished() {
        if Instant::now() >= deadline {
            return JoinOutcome::TimedOut;
        }
        thread::sleep(poll_interval);
    }

    match handle.join() {
        Ok(value) => JoinOutcome::Finished(value),
        Err(panic_info) => {
            let msg = panic_info
                .downcast_ref::<&str>()
                .copied()
                .or_else(|| panic_info.downcast_ref::<String>().map(|s| s.as_str()))
                .unwrap_or("unknown panic");
            JoinOutcome::Panicked(msg.to_string())
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::storage::MemoryStorageSink;
    use crate::transcode::TranscodeError;
    use crate::error::AircapError;

    fn session_config() -> SessionConfig {
        SessionConfig {
            stream_url: "http://example.invalid/stream".to_string(),
            chunk_duration: Duration::from_millis(100),
            bucket: "test".to_string(),
            key_prefix: "chunks/".to_string(),
            total_duration: None,
        }
    }

    /// Source that plays back a fixed byte budget at full speed, then ends.
    struct ScriptedSource {
        remaining: usize,
    }

    impl crate::source::ByteSource for ScriptedSource {
        fn connect(&mut self) -> Result<()> {
            Ok(())
        }

        fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize> {
            if self.remaining == 0 {
                return Ok(0);
            }
            // Trickle so the time window, not the byte budget, shapes chunks.
            std::thread::sleep(Duration::from_millis(5));
            let n = buf.len().min(self.remaining).min(512);
            buf[..n].iter_mut().for_each(|b| *b = 0xAB);
            self.remaining -= n;
            Ok(n)
        }

        fn describe(&self) -> String {
            "scripted://".to_string()
        }
    }

    /// Source whose connect always fails.
    struct UnreachableSource;

    impl crate::source::ByteSource for UnreachableSource {
        fn connect(&mut self) -> Result<()> {
            Err(AircapError::StreamConnect {
                url: "scripted://".to_string(),
                message: "connection refused".to_string(),
            })
        }

        fn read_bytes(&mut self, _buf: &mut [u8]) -> Result<usize> {
            Ok(0)
        }

        fn describe(&self) -> String {
            "scripted://".to_string()
        }
    }

    /// Transcoder that wraps raw bytes unchanged, for pipeline tests.
    struct PassthroughTranscoder;

    impl AudioTranscoder for PassthroughTranscoder {
        fn decode(&self, bytes: &[u8]) -> std::result::Result<Vec<i16>, TranscodeError> {
            Ok(bytes.iter().map(|&b| b as i16).collect())
        }

        fn encode(&self, samples: &[i16]) -> std::result::Result<Vec<u8>, TranscodeError> {
            Ok(samples.iter().map(|&s| s as u8).collect())
        }
    }

    #[test]
    fn state_round_trips_through_atomic_encoding() {
        for state in [
            RecordingState::Idle,
            RecordingState::Recording,
            RecordingState::Stopping,
            RecordingState::Stopped,
        ] {
            assert_eq!(RecordingState::from_u8(state.as_u8()), state);
        }
    }

    #[test]
    fn state_view_tracks_controller_writes() {
        let state = SessionState::new();
        let view = state.view();

        assert_eq!(view.get(), RecordingState::Idle);
        state.set(RecordingState::Recording);
        assert!(view.is_recording());
        state.set(RecordingState::Stopping);
        assert!(!view.is_recording());
        assert_eq!(view.get(), RecordingState::Stopping);
    }

    #[test]
    fn start_fails_fast_on_invalid_storage() {
        struct BrokenSink;
        impl StorageSink for BrokenSink {
            fn validate(&self) -> std::result::Result<(), crate::storage::StorageError> {
                Err(crate::storage::StorageError::CredentialsMissing)
            }
            fn put(
                &self,
                _: &str,
                _: &[u8],
                _: &str,
                _: &std::collections::HashMap<String, String>,
            ) -> std::result::Result<(), crate::storage::StorageError> {
                Ok(())
            }
            fn describe(&self) -> String {
                "broken://".to_string()
            }
        }

        let controller = RecordingController::new(session_config()).quiet(true);
        let result = controller.start(
            Box::new(ScriptedSource { remaining: 0 }),
            Arc::new(PassthroughTranscoder),
            Arc::new(BrokenSink),
        );

        assert!(matches!(
            result,
            Err(AircapError::Storage(
                crate::storage::StorageError::CredentialsMissing
            ))
        ));
    }

    #[test]
    fn session_records_and_reaches_stopped() {
        let sink = Arc::new(MemoryStorageSink::new());
        let controller = RecordingController::new(session_config())
            .quiet(true)
            .with_join_window(Duration::from_secs(2));

        let handle = controller
            .start(
                Box::new(ScriptedSource { remaining: 200_000 }),
                Arc::new(PassthroughTranscoder),
                sink.clone(),
            )
            .unwrap();
        assert!(handle.is_recording());

        // Let a few 100ms windows close.
        thread::sleep(Duration::from_millis(450));
        let report = handle.stop();

        assert!(report.clean_shutdown);
        assert!(report.uploaded() >= 1, "expected at least one upload");
        assert_eq!(report.failed(), 0);

        // Sequence numbers are 1..=N with no gaps, and keys are unique.
        let mut keys = std::collections::HashSet::new();
        for (i, record) in report.records.iter().enumerate() {
            assert_eq!(record.sequence, i as u64 + 1);
            assert!(keys.insert(record.key.clone()));
        }
        assert_eq!(sink.keys().len(), report.uploaded());
    }

    #[test]
    fn connect_failure_ends_producer_but_session_still_stops_cleanly() {
        let controller = RecordingController::new(session_config())
            .quiet(true)
            .with_join_window(Duration::from_secs(2));

        let handle = controller
            .start(
                Box::new(UnreachableSource),
                Arc::new(PassthroughTranscoder),
                Arc::new(MemoryStorageSink::new()),
            )
            .unwrap();

        thread::sleep(Duration::from_millis(100));
        let report = handle.stop();

        assert!(report.clean_shutdown);
        assert!(report.records.is_empty());
    }

    #[test]
    fn total_duration_moves_session_out_of_recording() {
        // An endless source: only the duration timer can end this session.
        let mut config = session_config();
        config.total_duration = Some(Duration::from_millis(200));

        let controller = RecordingController::new(config)
            .quiet(true)
            .with_join_window(Duration::from_secs(2));
        let handle = controller
            .start(
                Box::new(ScriptedSource {
                    remaining: usize::MAX,
                }),
                Arc::new(PassthroughTranscoder),
                Arc::new(MemoryStorageSink::new()),
            )
            .unwrap();
        assert!(handle.is_recording());

        thread::sleep(Duration::from_millis(600));
        assert!(
            !handle.is_recording(),
            "duration elapsed but session is still Recording"
        );
        assert_eq!(handle.state(), RecordingState::Stopping);

        let report = handle.stop();
        assert!(report.clean_shutdown);
    }

    #[test]
    fn join_within_distinguishes_finish_panic_and_timeout() {
        let finished = thread::spawn(|| 7);
        assert!(matches!(
            join_within(finished, Duration::from_secs(1)),
            JoinOutcome::Finished(7)
        ));

        let panicked = thread::spawn(|| -> u8 { panic!("boom") });
        thread::sleep(Duration::from_millis(50));
        match join_within(panicked, Duration::from_secs(1)) {
            JoinOutcome::Panicked(msg) => assert_eq!(msg, "boom"),
            _ => panic!("expected Panicked"),
        }

        let slow = thread::spawn(|| thread::sleep(Duration::from_secs(5)));
        assert!(matches!(
            join_within(slow, Duration::from_millis(100)),
            JoinOutcome::TimedOut
        ));
    }

    #[test]
    fn stop_consumes_the_handle() {
        // Compile-time property: a stopped session cannot be restarted.
        // `stop(self)` takes ownership, so this is enforced by the borrow
        // checker; the test documents the terminal-state contract.
        let controller = RecordingController::new(session_config())
            .quiet(true)
            .with_join_window(Duration::from_millis(500));
        let handle = controller
            .start(
                Box::new(ScriptedSource { remaining: 0 }),
                Arc::new(PassthroughTranscoder),
                Arc::new(MemoryStorageSink::new()),
            )
            .unwrap();

        let report = handle.stop();
        assert_eq!(report.failed(), 0);
    }
}
