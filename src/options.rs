use std::fmt;
use std::time::Duration;

use crate::video::{CaptureAddress, FrameSource, VIDEO_UDP_PORT};

pub const DEFAULT_DRONE_HOST: &str = "192.168.10.1";
pub const CONTROL_UDP_PORT: u16 = 8889;

/// How long an acknowledged command waits for its reply.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_millis(500);

/// Height in cm climbed after take off.
pub const DEFAULT_OPERATING_ALTITUDE: u32 = 100;

/// A real drone reached over UDP.
#[derive(Debug, Clone)]
pub struct NetworkTarget {
    pub local_address: String,
    pub drone_host: String,
    pub command_port: u16,
    pub video_port: u16,
}

impl NetworkTarget {
    pub fn drone_address(&self) -> String {
        format!("{}:{}", self.drone_host, self.command_port)
    }

    pub fn video_address(&self) -> CaptureAddress {
        CaptureAddress::udp(&self.drone_host, self.video_port)
    }
}

impl Default for NetworkTarget {
    fn default() -> Self {
        Self {
            local_address: format!("0.0.0.0:{CONTROL_UDP_PORT}"),
            drone_host: DEFAULT_DRONE_HOST.to_string(),
            command_port: CONTROL_UDP_PORT,
            video_port: VIDEO_UDP_PORT,
        }
    }
}

/// A local stand-in for the drone: no commands are sent and video comes from
/// a local capture device.
#[derive(Debug, Clone, Default)]
pub struct LocalTarget {
    pub device: u32,
}

#[derive(Debug, Clone)]
pub enum Target {
    Network(NetworkTarget),
    Local(LocalTarget),
}

impl Default for Target {
    fn default() -> Self {
        Target::Network(NetworkTarget::default())
    }
}

/// Tello drone connection and other usage options.
pub struct TelloOptions {
    pub(crate) target: Target,
    pub(crate) ack_timeout: Duration,
    pub(crate) operating_altitude: u32,
    pub(crate) frame_source: Option<Box<dyn FrameSource>>,
}

impl Default for TelloOptions {
    fn default() -> Self {
        Self {
            target: Target::default(),
            ack_timeout: DEFAULT_ACK_TIMEOUT,
            operating_altitude: DEFAULT_OPERATING_ALTITUDE,
            frame_source: None,
        }
    }
}

impl TelloOptions {
    pub fn with_target(&mut self, target: Target) -> &mut Self {
        self.target = target;
        self
    }

    /// Use a local capture device instead of a drone, eg for testing without
    /// flying.
    pub fn with_local_target(&mut self, device: u32) -> &mut Self {
        self.with_target(Target::Local(LocalTarget { device }))
    }

    pub fn with_ack_timeout(&mut self, ack_timeout: Duration) -> &mut Self {
        self.ack_timeout = ack_timeout;
        self
    }

    /// Height in cm to climb to after take off.
    pub fn with_operating_altitude(&mut self, cm: u32) -> &mut Self {
        self.operating_altitude = cm;
        self
    }

    /// Capture video from `source` rather than the built-in source for the
    /// target.
    pub fn with_frame_source(&mut self, source: Box<dyn FrameSource>) -> &mut Self {
        self.frame_source = Some(source);
        self
    }

    pub fn target(&self) -> &Target {
        &self.target
    }
}

impl fmt::Debug for TelloOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelloOptions")
            .field("target", &self.target)
            .field("ack_timeout", &self.ack_timeout)
            .field("operating_altitude", &self.operating_altitude)
            .field("frame_source", &self.frame_source.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_the_drone_access_point() {
        let options = TelloOptions::default();
        let Target::Network(target) = options.target() else {
            panic!("expected a network target");
        };
        assert_eq!(target.local_address, "0.0.0.0:8889");
        assert_eq!(target.drone_address(), "192.168.10.1:8889");
        assert_eq!(
            target.video_address(),
            CaptureAddress::Stream("udp://192.168.10.1:11111".to_string())
        );
        assert_eq!(options.ack_timeout, Duration::from_millis(500));
        assert_eq!(options.operating_altitude, 100);
    }

    #[test]
    fn local_target_selects_device() {
        let mut options = TelloOptions::default();
        options.with_local_target(2).with_ack_timeout(Duration::from_secs(1));
        assert!(matches!(options.target(), Target::Local(LocalTarget { device: 2 })));
        assert_eq!(options.ack_timeout, Duration::from_secs(1));
    }
}
