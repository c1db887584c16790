//! Camera acquisition: device contract, frames and session lifecycle.

pub mod device;
pub mod frame;
pub mod synthetic;
#[cfg(feature = "v4l2")]
pub mod v4l2;

pub use device::{CaptureConfig, CaptureDevice, CaptureError, Facing};
pub use frame::{Frame, PixelFormat};
pub use synthetic::{DeviceProbe, SyntheticDevice};
#[cfg(feature = "v4l2")]
pub use v4l2::V4l2Device;

use tracing::{info, warn};

/// An acquired camera stream with a guarded shutdown.
///
/// `close` runs the device's `stop` at most once; every later call is a
/// no-op. Dropping an unclosed session closes it as a backstop, since a
/// leaked camera keeps its hardware light on.
pub struct CaptureSession {
    device: Box<dyn CaptureDevice>,
    closed: bool,
}

impl CaptureSession {
    /// Acquire the stream. A device that fails to open is stopped on the
    /// spot so it never holds hardware in a half-open state.
    pub fn open(
        mut device: Box<dyn CaptureDevice>,
        config: &CaptureConfig,
    ) -> Result<Self, CaptureError> {
        if let Err(err) = device.open(config) {
            device.stop();
            return Err(err);
        }
        info!(device = device.name(), "capture session open");
        Ok(CaptureSession {
            device,
            closed: false,
        })
    }

    /// Pull the next frame. Fails once the session is closed.
    pub fn frame(&mut self) -> Result<Frame, CaptureError> {
        if self.closed {
            return Err(CaptureError::Disconnected {
                detail: "capture session already closed".into(),
            });
        }
        self.device.next_frame()
    }

    /// Release the device. Safe to call repeatedly.
    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.device.stop();
            info!(device = self.device.name(), "capture session closed");
        }
    }

    /// Whether the stream has been released.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Label of the underlying device.
    pub fn device_name(&self) -> &str {
        self.device.name()
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if !self.closed {
            warn!(device = self.device.name(), "capture session dropped without close");
            self.close();
        }
    }
}
