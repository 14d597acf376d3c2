use std::fmt;
use std::mem;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use bytebuffer::ByteBuffer;
use log::{debug, info};

use crate::errors::{Result, TelloError};

pub const VIDEO_WIDTH: u32 = 960;
pub const VIDEO_HEIGHT: u32 = 720;

pub const VIDEO_UDP_PORT: u16 = 11111;
const MAX_CHUNK_SIZE: usize = 1460;

const DEFAULT_STALL_TIMEOUT: Duration = Duration::from_secs(5);

/// A frame of video. For the drone's own stream this is one undecoded H.264
/// access unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl VideoFrame {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self { data, width, height }
    }
}

/// Where a [`FrameSource`] captures from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureAddress {
    /// A streaming URL such as `udp://192.168.10.1:11111`.
    Stream(String),
    /// A local capture device index.
    Device(u32),
}

impl CaptureAddress {
    pub fn udp(host: &str, port: u16) -> Self {
        CaptureAddress::Stream(format!("udp://{host}:{port}"))
    }

    /// The port of a `udp://host:port` stream address.
    pub fn udp_port(&self) -> Result<u16> {
        let invalid = || TelloError::InvalidAddress { msg: self.to_string() };
        match self {
            CaptureAddress::Stream(url) => {
                let host_port = url.strip_prefix("udp://").ok_or_else(invalid)?;
                let (_, port) = host_port.rsplit_once(':').ok_or_else(invalid)?;
                port.parse().map_err(|_| invalid())
            }
            CaptureAddress::Device(_) => Err(invalid()),
        }
    }

    /// The index of a local capture device, as capture backends take it.
    pub fn device_index(&self) -> Result<i32> {
        let invalid = || TelloError::InvalidAddress { msg: self.to_string() };
        match self {
            CaptureAddress::Device(index) => i32::try_from(*index).map_err(|_| invalid()),
            CaptureAddress::Stream(_) => Err(invalid()),
        }
    }
}

impl fmt::Display for CaptureAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureAddress::Stream(url) => write!(f, "{url}"),
            CaptureAddress::Device(index) => write!(f, "device #{index}"),
        }
    }
}

/// Something that yields successive frames, such as a network stream or a
/// local camera.
///
/// Reads block until a frame is available. `Ok(None)` means the capture
/// attempt grabbed nothing.
pub trait FrameSource: Send {
    fn open(&mut self, address: &CaptureAddress) -> Result<()>;

    fn is_open(&self) -> bool;

    fn read_frame(&mut self) -> Result<Option<VideoFrame>>;
}

/// The drone's raw video stream.
///
/// The drone sends each H.264 frame as a run of 1460 byte datagrams to port
/// 11111 on the client, ending with a shorter one.
pub struct UdpVideoSource {
    sock: Option<UdpSocket>,
    stall_timeout: Duration,
    buf: ByteBuffer,
}

impl UdpVideoSource {
    pub fn new() -> Self {
        Self::with_stall_timeout(DEFAULT_STALL_TIMEOUT)
    }

    /// A read waiting longer than `stall_timeout` for the next datagram fails.
    pub fn with_stall_timeout(stall_timeout: Duration) -> Self {
        Self {
            sock: None,
            stall_timeout,
            buf: ByteBuffer::new(),
        }
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.sock.as_ref().and_then(|s| s.local_addr().ok())
    }
}

impl Default for UdpVideoSource {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSource for UdpVideoSource {
    fn open(&mut self, address: &CaptureAddress) -> Result<()> {
        // the drone pushes to us, so listen on the stream port locally
        let local_address = format!("0.0.0.0:{}", address.udp_port()?);
        info!("[Video] START LISTENING at {local_address} for {address}");

        let sock = UdpSocket::bind(&local_address)?;
        sock.set_read_timeout(Some(self.stall_timeout))?;
        self.sock = Some(sock);
        self.buf = ByteBuffer::new();
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.sock.is_some()
    }

    fn read_frame(&mut self) -> Result<Option<VideoFrame>> {
        let sock = self.sock.as_ref().ok_or_else(|| TelloError::CaptureFailed {
            msg: "video stream not open".to_string(),
        })?;

        let mut chunk = [0; MAX_CHUNK_SIZE];
        loop {
            let n = sock.recv(&mut chunk)?;
            if n == 0 {
                continue;
            }

            self.buf.write_bytes(&chunk[..n]);

            if n < MAX_CHUNK_SIZE {
                let data = mem::replace(&mut self.buf, ByteBuffer::new()).into_vec();
                debug!("[Video] frame of {} bytes", data.len());
                return Ok(Some(VideoFrame::new(data, VIDEO_WIDTH, VIDEO_HEIGHT)));
            }
        }
    }
}
