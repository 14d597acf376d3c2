#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::sleep;
use std::time::Duration;

use tello_link::{CaptureAddress, FrameSource, Result, TelloError, VideoFrame};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task;

/// A drone on loopback that records every command and answers some of them.
pub struct MockDrone {
    pub addr: SocketAddr,
    pub commands: mpsc::UnboundedReceiver<String>,
    task: task::JoinHandle<()>,
}

impl MockDrone {
    /// `reply` picks the answer to each command and how long to wait before
    /// sending it; `None` means stay silent.
    pub async fn spawn<F>(reply: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<(Duration, Vec<u8>)> + Send + 'static,
    {
        let sock = Arc::new(UdpSocket::bind("127.0.0.1:0").await?);
        let addr = sock.local_addr()?;
        let (tx, commands) = mpsc::unbounded_channel();

        let task = tokio::spawn(async move {
            let mut buf = vec![0; 1024];
            loop {
                let Ok((n, peer)) = sock.recv_from(&mut buf).await else {
                    continue;
                };
                let command = String::from_utf8_lossy(&buf[..n]).to_string();
                if let Some((delay, bytes)) = reply(&command) {
                    let sock = sock.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        let _ = sock.send_to(&bytes, peer).await;
                    });
                }
                let _ = tx.send(command);
            }
        });

        Ok(Self { addr, commands, task })
    }

    pub async fn ok_to_everything() -> anyhow::Result<Self> {
        Self::spawn(|_| Some((Duration::ZERO, b"ok".to_vec()))).await
    }

    pub async fn silent() -> anyhow::Result<Self> {
        Self::spawn(|_| None).await
    }

    /// The next command received, waiting at most a second.
    pub async fn next_command(&mut self) -> Option<String> {
        tokio::time::timeout(Duration::from_secs(1), self.commands.recv())
            .await
            .ok()
            .flatten()
    }
}

impl Drop for MockDrone {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// A drone answering from its own OS thread, so replies land in the socket
/// buffer even while the test's runtime is blocked.
pub struct ThreadDrone {
    pub addr: SocketAddr,
}

impl ThreadDrone {
    pub fn spawn<F>(reply: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<(Duration, Vec<u8>)> + Send + 'static,
    {
        let sock = std::net::UdpSocket::bind("127.0.0.1:0")?;
        let addr = sock.local_addr()?;

        std::thread::spawn(move || {
            let mut buf = [0; 1024];
            while let Ok((n, peer)) = sock.recv_from(&mut buf) {
                let command = String::from_utf8_lossy(&buf[..n]).to_string();
                if let Some((delay, bytes)) = reply(&command) {
                    sleep(delay);
                    let _ = sock.send_to(&bytes, peer);
                }
            }
        });

        Ok(Self { addr })
    }
}

/// An address nothing listens on.
pub fn dead_address() -> anyhow::Result<SocketAddr> {
    let sock = std::net::UdpSocket::bind("127.0.0.1:0")?;
    Ok(sock.local_addr()?)
}

/// An in-memory frame source. Frame `n` carries `n` as little-endian bytes.
pub struct ScriptedSource {
    pub opened: Arc<Mutex<Vec<CaptureAddress>>>,
    pub reads: Arc<AtomicUsize>,
    pub dropped: Arc<AtomicBool>,
    is_open: bool,
    fail_open: bool,
    grab: bool,
    limit: Option<u64>,
    delay: Duration,
    next: u64,
}

impl ScriptedSource {
    /// Produces frames forever, one every `delay`.
    pub fn endless(delay: Duration) -> Self {
        Self {
            opened: Arc::default(),
            reads: Arc::default(),
            dropped: Arc::default(),
            is_open: false,
            fail_open: false,
            grab: true,
            limit: None,
            delay,
            next: 0,
        }
    }

    /// Produces `count` frames, then fails.
    pub fn failing_after(count: u64, delay: Duration) -> Self {
        let mut source = Self::endless(delay);
        source.limit = Some(count);
        source
    }

    /// Opens but never grabs a frame.
    pub fn empty() -> Self {
        let mut source = Self::endless(Duration::ZERO);
        source.grab = false;
        source
    }

    pub fn unopenable() -> Self {
        let mut source = Self::endless(Duration::ZERO);
        source.fail_open = true;
        source
    }

    pub fn already_open(mut self) -> Self {
        self.is_open = true;
        self
    }
}

impl FrameSource for ScriptedSource {
    fn open(&mut self, address: &CaptureAddress) -> Result<()> {
        self.opened.lock().unwrap().push(address.clone());
        if self.fail_open {
            return Err(TelloError::CaptureFailed {
                msg: format!("cannot open {address}"),
            });
        }
        self.is_open = true;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.is_open
    }

    fn read_frame(&mut self) -> Result<Option<VideoFrame>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        sleep(self.delay);
        if !self.grab {
            return Ok(None);
        }
        if self.limit.is_some_and(|limit| self.next >= limit) {
            return Err(TelloError::CaptureFailed {
                msg: "end of script".to_string(),
            });
        }
        let frame = VideoFrame::new(self.next.to_le_bytes().to_vec(), 4, 2);
        self.next += 1;
        Ok(Some(frame))
    }
}

impl Drop for ScriptedSource {
    fn drop(&mut self) {
        self.dropped.store(true, Ordering::SeqCst);
    }
}

pub fn frame_number(frame: &VideoFrame) -> u64 {
    let mut bytes = [0; 8];
    bytes.copy_from_slice(&frame.data);
    u64::from_le_bytes(bytes)
}
