//! Local capture through OpenCV, used as the stand-in video source when no
//! drone is available.

use log::info;
use opencv::{core::Mat, prelude::*, videoio};

use crate::errors::{Result, TelloError};
use crate::video::{CaptureAddress, FrameSource, VideoFrame};

#[derive(Default)]
pub struct CameraSource {
    cap: Option<videoio::VideoCapture>,
}

impl CameraSource {
    pub fn new() -> Self {
        Self::default()
    }
}

fn capture_error(err: opencv::Error) -> TelloError {
    TelloError::CaptureFailed { msg: err.to_string() }
}

impl FrameSource for CameraSource {
    fn open(&mut self, address: &CaptureAddress) -> Result<()> {
        info!("[Video] OPEN camera {address}");
        let cap = match address {
            CaptureAddress::Device(_) => videoio::VideoCapture::new(address.device_index()?, videoio::CAP_ANY),
            CaptureAddress::Stream(url) => videoio::VideoCapture::from_file(url, videoio::CAP_ANY),
        }
        .map_err(capture_error)?;

        if !cap.is_opened().map_err(capture_error)? {
            return Err(TelloError::CaptureFailed {
                msg: format!("could not open {address}"),
            });
        }
        self.cap = Some(cap);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.cap
            .as_ref()
            .map(|cap| cap.is_opened().unwrap_or(false))
            .unwrap_or(false)
    }

    fn read_frame(&mut self) -> Result<Option<VideoFrame>> {
        let cap = self.cap.as_mut().ok_or_else(|| TelloError::CaptureFailed {
            msg: "camera not open".to_string(),
        })?;

        let mut mat = Mat::default();
        if !cap.read(&mut mat).map_err(capture_error)? || mat.empty() {
            return Ok(None);
        }

        let data = mat.data_bytes().map_err(capture_error)?.to_vec();
        Ok(Some(VideoFrame::new(data, mat.cols() as u32, mat.rows() as u32)))
    }
}
