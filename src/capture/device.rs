use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use super::frame::Frame;

/// Failures while acquiring a camera or pulling frames from it.
///
/// Every variant is fatal for the live scan; the distinctions exist so
/// the operator message can say what to do next (see [`hint`]).
///
/// [`hint`]: CaptureError::hint
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    /// The platform refused camera access for this application.
    #[error("camera permission denied: {detail}")]
    PermissionDenied { detail: String },
    /// The hosting context is barred from camera APIs entirely, e.g. a
    /// remote console served over an insecure transport. Kept separate
    /// from `PermissionDenied` because no amount of granting fixes it.
    #[error("camera blocked by insecure context: {detail}")]
    NoSecureContext { detail: String },
    /// No camera could be found, opened, or configured.
    #[error("no usable camera: {detail}")]
    DeviceUnavailable { detail: String },
    /// The device stayed silent past the configured deadline.
    #[error("no frame arrived within {waited_ms} ms")]
    Timeout { waited_ms: u64 },
    /// The stream ended mid-session.
    #[error("camera stream ended: {detail}")]
    Disconnected { detail: String },
}

impl CaptureError {
    /// Operator-facing remediation, shown alongside the error.
    pub fn hint(&self) -> &'static str {
        match self {
            CaptureError::PermissionDenied { .. } => {
                "grant camera access and retry, or switch to manual entry"
            }
            CaptureError::NoSecureContext { .. } => {
                "open the station console over a secure origin, or switch to manual entry"
            }
            CaptureError::DeviceUnavailable { .. } => {
                "check that a camera is connected and not held by another program"
            }
            CaptureError::Timeout { .. } => "check camera cabling and lighting, then retry",
            CaptureError::Disconnected { .. } => "reconnect the camera and start a new scan",
        }
    }
}

/// Which way the requested camera should face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Facing {
    /// Operator-facing camera.
    Front,
    /// World-facing camera, the default for scanning labels.
    #[default]
    Rear,
}

impl FromStr for Facing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "front" | "user" => Ok(Facing::Front),
            "rear" | "back" | "environment" => Ok(Facing::Rear),
            other => Err(format!("unknown camera facing `{other}`")),
        }
    }
}

/// Requested stream geometry; devices may negotiate something close.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Preferred camera orientation.
    pub facing: Facing,
    /// Requested frame width in pixels.
    pub width: u32,
    /// Requested frame height in pixels.
    pub height: u32,
    /// Requested frames per second.
    pub frame_rate: u32,
    /// Ceiling on device acquisition before reporting `Timeout`.
    pub open_timeout: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        CaptureConfig {
            facing: Facing::Rear,
            width: 1280,
            height: 720,
            frame_rate: 30,
            open_timeout: Duration::from_secs(5),
        }
    }
}

/// One camera, real or synthetic.
///
/// `next_frame` must not block materially past one frame interval;
/// a stalled source reports [`CaptureError::Timeout`] instead. `stop`
/// releases the hardware and must be safe to call repeatedly.
pub trait CaptureDevice: Send {
    /// Acquire the hardware and negotiate the stream format.
    fn open(&mut self, config: &CaptureConfig) -> Result<(), CaptureError>;
    /// Pull the next frame from the stream.
    fn next_frame(&mut self) -> Result<Frame, CaptureError>;
    /// Release the hardware. Idempotent.
    fn stop(&mut self);
    /// Stable device label for logs and operator messages.
    fn name(&self) -> &str;
}
