use std::sync::{Mutex, PoisonError};

use log::{debug, info, warn};
use tokio::sync::OnceCell;
use tokio::task;
use tokio::time::Duration;

use crate::channel::CommandChannel;
use crate::command::{Command, Response};
use crate::errors::{Result, TelloError};
use crate::options::{Target, TelloOptions};
use crate::reader::FrameReader;
use crate::video::{CaptureAddress, FrameSource, UdpVideoSource};

/// How long `end` waits for the frame reader to release its source, a little
/// over the built-in video source's stall timeout.
const READER_JOIN_TIMEOUT: Duration = Duration::from_secs(6);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
    Ended,
}

// states
#[derive(Debug)]
pub struct Disconnected {
    options: TelloOptions,
}

pub struct Connected {
    link: Link,
    video_address: CaptureAddress,
    ack_timeout: Duration,
    frame_source: Mutex<Option<Box<dyn FrameSource>>>,
    reader: OnceCell<FrameReader>,
}

#[derive(Debug)]
pub struct Ended;

pub trait State {
    const STATE: ConnectionState;
}

impl State for Disconnected {
    const STATE: ConnectionState = ConnectionState::Disconnected;
}

impl State for Connected {
    const STATE: ConnectionState = ConnectionState::Connected;
}

impl State for Ended {
    const STATE: ConnectionState = ConnectionState::Ended;
}

/// What commands travel over: the drone's command channel, or nothing at all
/// for a local stand-in.
enum Link {
    Network(CommandChannel),
    Local,
}

impl Link {
    async fn send_acknowledged(&self, command: &str, wait: Duration) -> Result<Response> {
        match self {
            Link::Network(channel) => channel.send_acknowledged(command, wait).await,
            Link::Local => {
                debug!("[Tello] local target, not sending {command}");
                Ok(Response::NoResponse)
            }
        }
    }

    async fn send_without_response(&self, command: &str) -> Result<()> {
        match self {
            Link::Network(channel) => channel.send_without_response(command).await,
            Link::Local => {
                debug!("[Tello] local target, not sending {command}");
                Ok(())
            }
        }
    }

    fn close(&self) -> Result<()> {
        match self {
            Link::Network(channel) => channel.close(),
            Link::Local => Ok(()),
        }
    }
}

pub struct Tello<S = Disconnected> {
    state: S,
}

impl<S: State> Tello<S> {
    pub fn state(&self) -> ConnectionState {
        S::STATE
    }
}

impl Tello<Disconnected> {
    pub fn new() -> Self {
        Self::with_options(TelloOptions::default())
    }

    pub fn with_options(options: TelloOptions) -> Self {
        Self { state: Disconnected { options } }
    }

    /// Connects to the target.
    ///
    /// For a drone this opens the command channel, puts the drone in command
    /// mode, starts its video stream, takes off and climbs to the operating
    /// altitude. A local target touches no sockets.
    pub async fn connect(self) -> Result<Tello<Connected>> {
        let TelloOptions {
            target,
            ack_timeout,
            operating_altitude,
            frame_source,
        } = self.state.options;

        let (link, video_address) = match target {
            Target::Network(target) => {
                let drone_address = target.drone_address();
                info!("[Tello] CONNECT {} → {drone_address}", target.local_address);
                let channel = CommandChannel::open(&target.local_address, &drone_address).await?;
                (Link::Network(channel), target.video_address())
            }
            Target::Local(target) => {
                info!("[Tello] CONNECT local device #{}", target.device);
                (Link::Local, CaptureAddress::Device(target.device))
            }
        };
        let flying = matches!(link, Link::Network(_));

        let drone = Tello {
            state: Connected {
                link,
                video_address,
                ack_timeout,
                frame_source: Mutex::new(frame_source),
                reader: OnceCell::new(),
            },
        };

        if flying {
            for command in [Command::Command, Command::StreamOn, Command::TakeOff] {
                let response = drone.send(command).await?;
                if !response.is_ok() {
                    warn!("[Tello] {command} not acknowledged ({response})");
                }
            }
            drone.move_up(operating_altitude).await?;
        }

        info!("[Tello] CONNECTED");
        Ok(drone)
    }
}

impl Default for Tello<Disconnected> {
    fn default() -> Self {
        Self::new()
    }
}

impl Tello<Connected> {
    /// Sends a command and waits for the reply, up to the configured
    /// acknowledgment timeout.
    pub async fn send(&self, command: Command) -> Result<Response> {
        self.send_with_timeout(command, self.state.ack_timeout).await
    }

    pub async fn send_with_timeout(&self, command: Command, wait: Duration) -> Result<Response> {
        let response = self.state.link.send_acknowledged(&command.to_string(), wait).await?;
        debug!("[Tello] {command} → {response}");
        Ok(response)
    }

    pub async fn send_without_response(&self, command: Command) -> Result<()> {
        self.state.link.send_without_response(&command.to_string()).await
    }

    /// Asks the drone for its battery level; the reply is the percentage as
    /// text.
    pub async fn battery(&self) -> Result<Response> {
        self.send(Command::Battery).await
    }

    pub async fn move_up(&self, cm: u32) -> Result<()> {
        self.send_without_response(Command::Up(cm)).await
    }

    pub async fn move_down(&self, cm: u32) -> Result<()> {
        self.send_without_response(Command::Down(cm)).await
    }

    pub async fn move_left(&self, cm: u32) -> Result<()> {
        self.send_without_response(Command::Left(cm)).await
    }

    pub async fn move_right(&self, cm: u32) -> Result<()> {
        self.send_without_response(Command::Right(cm)).await
    }

    pub async fn move_forward(&self, cm: u32) -> Result<()> {
        self.send_without_response(Command::Forward(cm)).await
    }

    pub async fn move_back(&self, cm: u32) -> Result<()> {
        self.send_without_response(Command::Back(cm)).await
    }

    pub async fn turn_clockwise(&self, degrees: u32) -> Result<()> {
        self.send_without_response(Command::Clockwise(degrees)).await
    }

    pub async fn turn_counter_clockwise(&self, degrees: u32) -> Result<()> {
        self.send_without_response(Command::CounterClockwise(degrees)).await
    }

    /// Where video is captured from: the drone's `udp://<host>:11111` stream,
    /// or the local device.
    pub fn video_address(&self) -> &CaptureAddress {
        &self.state.video_address
    }

    /// The background frame reader, started on first use.
    pub async fn frame_reader(&self) -> Result<&FrameReader> {
        self.state
            .reader
            .get_or_try_init(|| async {
                let source = self.take_frame_source()?;
                let address = self.state.video_address.clone();
                // the first read blocks on the source
                task::spawn_blocking(move || FrameReader::start(source, address))
                    .await
                    .map_err(|e| TelloError::Generic {
                        msg: format!("frame reader failed to start - {e}"),
                    })?
            })
            .await
    }

    fn take_frame_source(&self) -> Result<Box<dyn FrameSource>> {
        let injected = self
            .state
            .frame_source
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match injected {
            Some(source) => Ok(source),
            None => default_frame_source(&self.state.video_address),
        }
    }

    /// Lands the drone, stops the frame reader and closes the command
    /// channel. Failures along the way are logged; the result is always
    /// ended.
    pub async fn end(self) -> Tello<Ended> {
        info!("[Tello] END");
        let Connected {
            link,
            ack_timeout,
            reader,
            ..
        } = self.state;

        if let Link::Network(channel) = &link {
            match channel.send_acknowledged(&Command::Land.to_string(), ack_timeout).await {
                Ok(response) if response.is_ok() => {}
                Ok(response) => warn!("[Tello] land not acknowledged ({response})"),
                Err(err) => warn!("[Tello] land failed: {err}"),
            }
        }

        if let Some(reader) = reader.into_inner() {
            // the source stays open until the capture thread exits
            match task::spawn_blocking(move || reader.join(READER_JOIN_TIMEOUT)).await {
                Ok(true) => {}
                Ok(false) => warn!("[Reader] capture thread still busy after {READER_JOIN_TIMEOUT:?}"),
                Err(err) => warn!("[Tello] stopping frame reader failed: {err}"),
            }
        }

        if let Err(err) = link.close() {
            warn!("[Tello] closing command channel failed: {err}");
        }

        info!("[Tello] ENDED");
        Tello { state: Ended }
    }
}

impl Tello<Ended> {
    /// Already ended; does nothing.
    pub async fn end(self) -> Self {
        debug!("[Tello] already ended");
        self
    }
}

fn default_frame_source(address: &CaptureAddress) -> Result<Box<dyn FrameSource>> {
    match address {
        CaptureAddress::Stream(_) => Ok(Box::new(UdpVideoSource::new())),
        CaptureAddress::Device(_) => local_camera(),
    }
}

#[cfg(feature = "camera")]
fn local_camera() -> Result<Box<dyn FrameSource>> {
    Ok(Box::new(crate::camera::CameraSource::new()))
}

#[cfg(not(feature = "camera"))]
fn local_camera() -> Result<Box<dyn FrameSource>> {
    Err(TelloError::NoCaptureDevice)
}
