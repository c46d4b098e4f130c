//! Stream producer: reads the live source and feeds the hand-off queue.

use crate::clock::SystemClock;
use crate::controller::StateView;
use crate::defaults;
use crate::error::Result;
use crate::pipeline::boundary::{BoundaryConfig, ChunkBoundaryDetector};
use crate::pipeline::queue::ChunkQueue;
use crate::source::ByteSource;
use std::sync::Arc;
use std::time::Duration;

/// Owns the source connection and the boundary detector.
///
/// Runs until the session state leaves `Recording`, the stream ends, or a
/// read fails. Connectivity failures are fatal to the producer only; the
/// uploader keeps draining whatever was already queued.
pub struct StreamProducer {
    source: Box<dyn ByteSource>,
    detector: ChunkBoundaryDetector,
    queue: Arc<ChunkQueue>,
    state: StateView,
    push_wait: Duration,
    quiet: bool,
}

impl StreamProducer {
    pub fn new(
        source: Box<dyn ByteSource>,
        chunk_duration: Duration,
        queue: Arc<ChunkQueue>,
        state: StateView,
    ) -> Self {
        let config = BoundaryConfig {
            chunk_duration,
            min_chunk_bytes: defaults::MIN_CHUNK_BYTES,
        };
        Self {
            source,
            detector: ChunkBoundaryDetector::new(config, Arc::new(SystemClock)),
            queue,
            state,
            push_wait: Duration::from_millis(defaults::PUSH_WAIT_MS),
            quiet: false,
        }
    }

    /// Replaces the detector, letting tests inject a mock clock.
    pub fn with_detector(mut self, detector: ChunkBoundaryDetector) -> Self {
        self.detector = detector;
        self
    }

    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Blocking read loop. Returns `Err` only for connectivity failures.
    ///
    /// Closes the queue on every exit path; the uploader drains what is
    /// left and exits once the queue is both closed and empty.
    pub fn run(mut self) -> Result<()> {
        if let Err(e) = self.source.connect() {
            eprintln!("aircap: {e}");
            self.queue.close();
            return Err(e);
        }
        if !self.quiet {
            println!("Connected to stream: {}", self.source.describe());
        }

        let mut buf = vec![0u8; defaults::READ_BUFFER_BYTES];
        while self.state.is_recording() {
            let n = match self.source.read_bytes(&mut buf) {
                Ok(0) => {
                    if !self.quiet {
                        eprintln!("aircap: stream ended");
                    }
                    break;
                }
                Ok(n) => n,
                Err(e) => {
                    eprintln!("aircap: {e}");
                    break;
                }
            };

            if let Some(chunk) = self.detector.feed(&buf[..n])
                && !self.enqueue(chunk)
            {
                break;
            }
        }

        // Partial buffer below the chunk-ready condition is never flushed.
        let dropped = self.detector.discard();
        if dropped > 0 && !self.quiet {
            eprintln!("aircap: discarding {dropped} byte partial chunk at shutdown");
        }
        self.queue.close();
        Ok(())
    }

    /// Pushes one chunk, blocking in bounded waits (backpressure) while the
    /// session is still recording. Returns false when the session stopped
    /// before space opened up; the chunk is dropped at that point.
    fn enqueue(&self, chunk: crate::pipeline::types::RawChunk) -> bool {
        let mut pending = chunk;
        loop {
            match self.queue.push(pending, self.push_wait) {
                Ok(()) => return true,
                Err(returned) => {
                    if !self.state.is_recording() {
                        if !self.quiet {
                            eprintln!(
                                "aircap: dropping {} byte chunk, session stopped while queue full",
                                returned.len()
                            );
                        }
                        return false;
                    }
                    pending = returned;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use crate::controller::test_support::manual_state;
    use crate::error::AircapError;
    use std::sync::Mutex;
    use std::thread;

    /// Source driven by a script of read results.
    struct ScriptedSource {
        script: Mutex<Vec<ScriptStep>>,
        clock: Option<Arc<MockClock>>,
        advance_per_read: Duration,
    }

    enum ScriptStep {
        Bytes(Vec<u8>),
        Error(String),
        End,
    }

    impl ScriptedSource {
        fn new(steps: Vec<ScriptStep>) -> Self {
            Self {
                script: Mutex::new(steps),
                clock: None,
                advance_per_read: Duration::ZERO,
            }
        }

        /// Advances a mock clock on every read, simulating stream pacing.
        fn with_clock(mut self, clock: Arc<MockClock>, per_read: Duration) -> Self {
            self.clock = Some(clock);
            self.advance_per_read = per_read;
            self
        }
    }

    impl ByteSource for ScriptedSource {
        fn connect(&mut self) -> Result<()> {
            Ok(())
        }

        fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize> {
            if let Some(clock) = &self.clock {
                clock.advance(self.advance_per_read);
            }
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                return Ok(0);
            }
            match script.remove(0) {
                ScriptStep::Bytes(bytes) => {
                    let n = bytes.len().min(buf.len());
                    buf[..n].copy_from_slice(&bytes[..n]);
                    Ok(n)
                }
                ScriptStep::Error(message) => Err(AircapError::StreamRead { message }),
                ScriptStep::End => Ok(0),
            }
        }

        fn describe(&self) -> String {
            "scripted://".to_string()
        }
    }

    fn detector_with_clock(
        duration: Duration,
        clock: Arc<MockClock>,
    ) -> ChunkBoundaryDetector {
        ChunkBoundaryDetector::new(
            BoundaryConfig {
                chunk_duration: duration,
                min_chunk_bytes: defaults::MIN_CHUNK_BYTES,
            },
            clock,
        )
    }

    #[test]
    fn producer_slices_stream_into_queued_chunks() {
        let clock = Arc::new(MockClock::new());
        // 65 reads of 4000 bytes, 1 simulated second apiece.
        let steps: Vec<ScriptStep> = (0..65)
            .map(|_| ScriptStep::Bytes(vec![0xCD; 4000]))
            .chain(std::iter::once(ScriptStep::End))
            .collect();
        let source = ScriptedSource::new(steps)
            .with_clock(clock.clone(), Duration::from_secs(1));

        let queue = Arc::new(ChunkQueue::with_capacity(8));
        let (state, view) = manual_state();
        state.start_recording();

        let producer = StreamProducer::new(
            Box::new(source),
            Duration::from_secs(30),
            queue.clone(),
            view,
        )
        .with_detector(detector_with_clock(Duration::from_secs(30), clock))
        .quiet(true);

        producer.run().unwrap();

        // Two ~30s chunks; the ~5s tail was discarded at shutdown.
        assert!(queue.is_closed(), "producer closes the queue on exit");
        assert_eq!(queue.len(), 2);
        let first = queue.pop(Duration::from_millis(10)).unwrap();
        let second = queue.pop(Duration::from_millis(10)).unwrap();
        assert!(first.len() >= second.len());
        assert_eq!((first.len() + second.len()) % 4000, 0);
    }

    #[test]
    fn producer_exits_when_state_leaves_recording() {
        // Endless byte supply, but the state flips to Stopping mid-run.
        struct EndlessSource;
        impl ByteSource for EndlessSource {
            fn connect(&mut self) -> Result<()> {
                Ok(())
            }
            fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize> {
                thread::sleep(Duration::from_millis(1));
                buf[0] = 1;
                Ok(1)
            }
            fn describe(&self) -> String {
                "endless://".to_string()
            }
        }

        let queue = Arc::new(ChunkQueue::with_capacity(2));
        let (state, view) = manual_state();
        state.start_recording();

        let producer = StreamProducer::new(
            Box::new(EndlessSource),
            Duration::from_secs(3600),
            queue,
            view,
        )
        .quiet(true);

        let handle = thread::spawn(move || producer.run());
        thread::sleep(Duration::from_millis(50));
        state.request_stop();

        // The read loop polls the state each iteration, so this returns fast.
        let start = std::time::Instant::now();
        handle.join().unwrap().unwrap();
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn producer_respects_stop_under_backpressure() {
        let clock = Arc::new(MockClock::new());
        // Three windows' worth of data into a queue of capacity one; nobody
        // is draining, so the producer wedges on the second push.
        let steps: Vec<ScriptStep> = (0..90)
            .map(|_| ScriptStep::Bytes(vec![0xEE; 4000]))
            .collect();
        let source = ScriptedSource::new(steps)
            .with_clock(clock.clone(), Duration::from_secs(1));

        let queue = Arc::new(ChunkQueue::with_capacity(1));
        let (state, view) = manual_state();
        state.start_recording();

        let producer = StreamProducer::new(
            Box::new(source),
            Duration::from_secs(30),
            queue.clone(),
            view,
        )
        .with_detector(detector_with_clock(Duration::from_secs(30), clock))
        .quiet(true);

        let handle = thread::spawn(move || producer.run());
        thread::sleep(Duration::from_millis(300));
        state.request_stop();

        let start = std::time::Instant::now();
        handle.join().unwrap().unwrap();
        // Bounded push wait: the stop is observed within roughly one wait.
        assert!(start.elapsed() < Duration::from_secs(2));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn read_error_stops_producer_without_panicking() {
        let source = ScriptedSource::new(vec![
            ScriptStep::Bytes(vec![1; 100]),
            ScriptStep::Error("connection reset".to_string()),
        ]);

        let queue = Arc::new(ChunkQueue::with_capacity(2));
        let (state, view) = manual_state();
        state.start_recording();

        let producer =
            StreamProducer::new(Box::new(source), Duration::from_secs(30), queue.clone(), view)
                .quiet(true);

        // Read errors end the run but are not connectivity errors at connect
        // time, so run() itself reports Ok.
        producer.run().unwrap();
        assert!(queue.is_empty());
        assert!(queue.is_closed());
    }
}
