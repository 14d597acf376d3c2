//! Background frame reader.
//!
//! A dedicated thread pulls frames from a [`FrameSource`] into a single
//! slot. Consumers only ever see the latest frame; older ones are dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::watch;

use crate::errors::{Result, TelloError};
use crate::video::{CaptureAddress, FrameSource, VideoFrame};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    Running,
    Stopped,
}

#[derive(Debug)]
struct CaptureThread {
    handle: thread::JoinHandle<()>,
    // disconnected once the thread has dropped its source
    exited: mpsc::Receiver<()>,
}

#[derive(Debug)]
pub struct FrameReader {
    slot: Arc<watch::Sender<Arc<VideoFrame>>>,
    running: Arc<AtomicBool>,
    thread: Mutex<Option<CaptureThread>>,
}

impl FrameReader {
    /// Opens `source` at `address` unless it is already open, reads the first
    /// frame and starts the capture thread.
    ///
    /// Fails if the source cannot be opened or yields no first frame, so a
    /// running reader always has a frame to hand out.
    pub fn start(mut source: Box<dyn FrameSource>, address: CaptureAddress) -> Result<Self> {
        info!("[Reader] START {address}");

        if !source.is_open() {
            source.open(&address)?;
        }
        if !source.is_open() {
            return Err(TelloError::CaptureFailed {
                msg: format!("could not open {address}"),
            });
        }

        let first = match source.read_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                return Err(TelloError::CaptureFailed {
                    msg: format!("no frame from {address}"),
                })
            }
            Err(err) => {
                return Err(TelloError::CaptureFailed {
                    msg: format!("first read from {address} failed: {err}"),
                })
            }
        };

        let (tx, _) = watch::channel(Arc::new(first));
        let slot = Arc::new(tx);
        let running = Arc::new(AtomicBool::new(true));

        let (exited_tx, exited) = mpsc::channel();
        let handle = thread::Builder::new().name("frame-reader".to_string()).spawn({
            let slot = slot.clone();
            let running = running.clone();
            move || {
                let _exited = exited_tx;
                pull_frames(source, &slot, &running);
            }
        })?;

        Ok(Self {
            slot,
            running,
            thread: Mutex::new(Some(CaptureThread { handle, exited })),
        })
    }

    /// The most recent frame. Never blocks.
    pub fn latest_frame(&self) -> Arc<VideoFrame> {
        self.slot.borrow().clone()
    }

    /// A receiver notified each time a new frame lands in the slot.
    pub fn subscribe(&self) -> watch::Receiver<Arc<VideoFrame>> {
        self.slot.subscribe()
    }

    pub fn state(&self) -> ReaderState {
        if self.running.load(Ordering::Acquire) {
            ReaderState::Running
        } else {
            ReaderState::Stopped
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == ReaderState::Running
    }

    /// Stops the capture thread. Once this returns the slot is never written
    /// again; a read already in progress is discarded.
    pub fn stop(&self) {
        let mut was_running = false;
        // taken under the slot's write lock, which every write also holds
        self.slot.send_if_modified(|_| {
            was_running = self.running.swap(false, Ordering::AcqRel);
            false
        });
        if was_running {
            info!("[Reader] STOP");
        }
    }

    /// Stops the reader and waits up to `grace` for the capture thread to
    /// finish its current read and release the source.
    ///
    /// Returns false if the thread is still blocked in a read; it exits on
    /// its own once that read returns.
    pub fn join(&self, grace: Duration) -> bool {
        self.stop();

        let mut thread = self.thread.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(capture) = thread.take() else {
            return true;
        };
        match capture.exited.recv_timeout(grace) {
            Err(RecvTimeoutError::Timeout) => {
                *thread = Some(capture);
                false
            }
            _ => {
                if capture.handle.join().is_err() {
                    warn!("[Reader] capture thread panicked");
                }
                debug!("[Reader] capture thread joined");
                true
            }
        }
    }
}

impl Drop for FrameReader {
    fn drop(&mut self) {
        self.stop();
    }
}

fn pull_frames(
    mut source: Box<dyn FrameSource>,
    slot: &watch::Sender<Arc<VideoFrame>>,
    running: &AtomicBool,
) {
    while running.load(Ordering::Acquire) {
        if !source.is_open() {
            warn!("[Reader] source closed, stopping");
            break;
        }

        let frame = match source.read_frame() {
            Ok(Some(frame)) => Arc::new(frame),
            Ok(None) => {
                warn!("[Reader] no frame grabbed, stopping");
                break;
            }
            Err(err) => {
                warn!("[Reader] capture failed ({err}), stopping");
                break;
            }
        };

        let written = slot.send_if_modified(|latest| {
            if !running.load(Ordering::Acquire) {
                return false;
            }
            *latest = frame;
            true
        });
        if !written {
            break;
        }
    }

    running.store(false, Ordering::Release);
    debug!("[Reader] capture thread exited");
}
