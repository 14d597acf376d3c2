use thiserror::Error;

#[derive(Error, Debug)]
pub enum TelloError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("command channel is closed")]
    ChannelClosed,

    #[error("frame capture failed: {msg}")]
    CaptureFailed { msg: String },

    #[error("no local capture device available (build with the `camera` feature or inject a frame source)")]
    NoCaptureDevice,

    #[error("invalid capture address: {msg}")]
    InvalidAddress { msg: String },

    #[error("{msg}")]
    Generic { msg: String },
}

pub type Result<T, E = TelloError> = std::result::Result<T, E>;
