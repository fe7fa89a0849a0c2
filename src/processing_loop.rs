// SPDX-License-Identifier: GPL-3.0-only
//! Dedicated processing thread
//!
//! Frames are queued by the producer and consumed by a single thread that
//! owns the [`FramePipeline`], so `incorporate` calls are serialized without
//! any locking. The queue is bounded; a producer that outpaces the pipeline
//! blocks on [`ProcessingLoop::submit`].
//!
//! ```ignore
//! let mut processing = ProcessingLoop::start(pipeline, StatsSink::new(30));
//! while let Some(frame) = source.next_frame() {
//!     processing.submit(frame?)?;
//! }
//! let report = processing.finish()?;
//! ```

use crate::constants::FRAME_QUEUE_DEPTH;
use crate::errors::{PipelineError, PipelineResult};
use crate::pipeline::FramePipeline;
use crate::sink::DisplaySink;
use crate::source::Frame;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, SyncSender};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// How long the worker waits for a frame before re-checking the stop signal
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// What the processing thread hands back when it exits
pub struct LoopReport<S> {
    pub sink: S,
    pub processed: u64,
    /// Frames skipped after a recoverable error
    pub skipped: u64,
    /// Error that stopped the loop early, if any
    pub fatal: Option<PipelineError>,
}

/// Owner of the processing thread
pub struct ProcessingLoop<S: DisplaySink + 'static> {
    sender: Option<SyncSender<Frame>>,
    thread_handle: Option<JoinHandle<LoopReport<S>>>,
    stop_signal: Arc<AtomicBool>,
}

impl<S: DisplaySink + 'static> ProcessingLoop<S> {
    /// Move `pipeline` and `sink` onto a new thread and start consuming frames
    pub fn start(pipeline: FramePipeline, sink: S) -> Self {
        Self::with_stop_signal(pipeline, sink, Arc::new(AtomicBool::new(false)))
    }

    /// Like [`start`](Self::start), sharing an existing stop signal
    pub fn with_stop_signal(pipeline: FramePipeline, sink: S, stop_signal: Arc<AtomicBool>) -> Self {
        let (sender, receiver) = mpsc::sync_channel::<Frame>(FRAME_QUEUE_DEPTH);
        let stop = Arc::clone(&stop_signal);

        info!(
            backend = %pipeline.backend(),
            queue_depth = FRAME_QUEUE_DEPTH,
            "Starting processing loop"
        );

        let thread_handle = thread::spawn(move || {
            let mut pipeline = pipeline;
            let mut report = LoopReport {
                sink,
                processed: 0,
                skipped: 0,
                fatal: None,
            };

            loop {
                if stop.load(Ordering::SeqCst) {
                    debug!("Stop signal received");
                    break;
                }

                let frame = match receiver.recv_timeout(POLL_INTERVAL) {
                    Ok(frame) => frame,
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => {
                        debug!("Frame queue closed");
                        break;
                    }
                };

                let result = pipeline.incorporate_frame(&frame).and_then(|(output, stats)| {
                    let stride = frame.width * crate::constants::BYTES_PER_PIXEL as u32;
                    report
                        .sink
                        .present(&output, frame.width, frame.height, stride, &stats)
                });

                match result {
                    Ok(()) => report.processed += 1,
                    Err(e) if e.is_retryable() => {
                        warn!(error = %e, timestamp = ?frame.timestamp, "Skipping frame");
                        report.skipped += 1;
                    }
                    Err(e) => {
                        warn!(error = %e, "Processing loop stopping on error");
                        stop.store(true, Ordering::SeqCst);
                        report.fatal = Some(e);
                        break;
                    }
                }
            }

            info!(
                processed = report.processed,
                skipped = report.skipped,
                "Processing loop thread exiting"
            );
            report
        });

        Self {
            sender: Some(sender),
            thread_handle: Some(thread_handle),
            stop_signal,
        }
    }

    /// Clone of the stop signal, e.g. for a Ctrl-C handler
    pub fn stop_signal(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop_signal)
    }

    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Queue a frame, blocking while the queue is full
    ///
    /// Fails once the worker has exited or a stop was requested.
    pub fn submit(&self, frame: Frame) -> PipelineResult<()> {
        if self.stop_signal.load(Ordering::SeqCst) {
            return Err(PipelineError::Source("processing loop stopped".to_string()));
        }
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| PipelineError::Source("processing loop finished".to_string()))?;
        sender
            .send(frame)
            .map_err(|_| PipelineError::Source("processing thread has exited".to_string()))
    }

    /// Signal the worker to stop without waiting for it
    pub fn request_stop(&self) {
        debug!("Requesting processing loop stop");
        self.stop_signal.store(true, Ordering::SeqCst);
    }

    /// Close the queue, let the worker drain it, and collect its report
    pub fn finish(mut self) -> PipelineResult<LoopReport<S>> {
        self.sender = None;
        let handle = self
            .thread_handle
            .take()
            .ok_or_else(|| PipelineError::Source("processing loop already joined".to_string()))?;
        handle
            .join()
            .map_err(|e| PipelineError::Source(format!("processing thread panicked: {:?}", e)))
    }
}

impl<S: DisplaySink + 'static> Drop for ProcessingLoop<S> {
    fn drop(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            debug!("ProcessingLoop dropped, stopping thread");
            self.request_stop();
            self.sender = None;
            if let Err(e) = handle.join() {
                warn!("Processing thread panicked: {:?}", e);
            }
        }
    }
}
