mod errors;
mod command;
mod channel;
mod video;
mod reader;
mod options;
mod tello;
#[cfg(feature = "camera")]
mod camera;

pub use errors::{TelloError, Result};
pub use command::{Command, Response};
pub use channel::{CommandChannel, MAX_RESPONSE_SIZE};
pub use video::{CaptureAddress, FrameSource, UdpVideoSource, VideoFrame, VIDEO_HEIGHT, VIDEO_UDP_PORT, VIDEO_WIDTH};
pub use reader::{FrameReader, ReaderState};
pub use options::{LocalTarget, NetworkTarget, Target, TelloOptions, CONTROL_UDP_PORT, DEFAULT_ACK_TIMEOUT, DEFAULT_DRONE_HOST, DEFAULT_OPERATING_ALTITUDE};
pub use tello::{Connected, ConnectionState, Disconnected, Ended, State, Tello};
#[cfg(feature = "camera")]
pub use camera::CameraSource;
