use std::fmt;

/// A command understood by the drone's SDK, rendered to its wire text by
/// `Display`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Enter SDK command mode.
    Command,
    StreamOn,
    StreamOff,
    TakeOff,
    Land,
    Up(u32),
    Down(u32),
    Left(u32),
    Right(u32),
    Forward(u32),
    Back(u32),
    Clockwise(u32),
    CounterClockwise(u32),
    Battery,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Command => write!(f, "command"),
            Command::StreamOn => write!(f, "streamon"),
            Command::StreamOff => write!(f, "streamoff"),
            Command::TakeOff => write!(f, "takeoff"),
            Command::Land => write!(f, "land"),
            Command::Up(cm) => write!(f, "up {cm}"),
            Command::Down(cm) => write!(f, "down {cm}"),
            Command::Left(cm) => write!(f, "left {cm}"),
            Command::Right(cm) => write!(f, "right {cm}"),
            Command::Forward(cm) => write!(f, "forward {cm}"),
            Command::Back(cm) => write!(f, "back {cm}"),
            Command::Clockwise(deg) => write!(f, "cw {deg}"),
            Command::CounterClockwise(deg) => write!(f, "ccw {deg}"),
            Command::Battery => write!(f, "battery?"),
        }
    }
}

/// The outcome of an acknowledged send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// The decoded text of the reply datagram, as received.
    Text(String),
    /// Nothing arrived before the timeout.
    NoResponse,
    /// A reply arrived but was not valid UTF-8.
    Undecodable(Vec<u8>),
}

impl Response {
    pub(crate) fn from_datagram(buf: Vec<u8>) -> Self {
        match String::from_utf8(buf) {
            Ok(s) => Response::Text(s),
            Err(e) => Response::Undecodable(e.into_bytes()),
        }
    }

    /// The reply text, if one was received and decoded.
    pub fn text(&self) -> Option<&str> {
        match self {
            Response::Text(s) => Some(s),
            _ => None,
        }
    }

    /// True if the drone replied `ok`, ignoring surrounding whitespace.
    pub fn is_ok(&self) -> bool {
        self.text().map(str::trim) == Some("ok")
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Response::NoResponse)
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Text(s) => write!(f, "{s}"),
            Response::NoResponse => write!(f, "none_response"),
            Response::Undecodable(b) => write!(f, "<{} undecodable bytes>", b.len()),
        }
    }
}
