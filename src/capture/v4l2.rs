//! `/dev/video*` capture through the Video4Linux2 mmap streaming API.
//!
//! Compiled only with the `v4l2` feature. Everything above this module
//! talks to [`CaptureDevice`], so the scan loop behaves identically
//! against real hardware and the synthetic device.

use std::io;
use std::time::Instant;

use tracing::{debug, warn};
use v4l::buffer::Type;
use v4l::io::mmap::Stream as MmapStream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::video::capture::Parameters;
use v4l::{Device, FourCC};

use super::device::{CaptureConfig, CaptureDevice, CaptureError, Facing};
use super::frame::{Frame, PixelFormat};

const STREAM_BUFFERS: u32 = 4;
const MAX_PROBED_NODES: usize = 10;

/// One V4L2 camera bound to a `/dev/videoN` node.
pub struct V4l2Device {
    index: usize,
    label: String,
    stream: Option<MmapStream<'static>>,
    // Held open for the stream's whole life; dropped on stop.
    device: Option<Device>,
    frame_size: (u32, u32),
}

impl V4l2Device {
    pub fn new(index: usize) -> Self {
        V4l2Device {
            index,
            label: format!("/dev/video{index}"),
            stream: None,
            device: None,
            frame_size: (0, 0),
        }
    }

    /// Pick a node whose card name matches the requested facing, falling
    /// back to the first node that opens at all.
    pub fn for_facing(facing: Facing) -> Result<Self, CaptureError> {
        let keyword = match facing {
            Facing::Front => "front",
            Facing::Rear => "rear",
        };
        let mut first_open = None;
        for index in 0..MAX_PROBED_NODES {
            let Ok(device) = Device::new(index) else {
                continue;
            };
            let Ok(caps) = device.query_caps() else {
                continue;
            };
            debug!(index, card = %caps.card, "probed video node");
            if caps.card.to_ascii_lowercase().contains(keyword) {
                return Ok(V4l2Device::new(index));
            }
            first_open.get_or_insert(index);
        }
        match first_open {
            Some(index) => Ok(V4l2Device::new(index)),
            None => Err(CaptureError::DeviceUnavailable {
                detail: "no /dev/video node could be opened".into(),
            }),
        }
    }
}

impl CaptureDevice for V4l2Device {
    fn open(&mut self, config: &CaptureConfig) -> Result<(), CaptureError> {
        let device = Device::new(self.index).map_err(open_error)?;
        let mut format = device.format().map_err(open_error)?;
        format.width = config.width;
        format.height = config.height;
        format.fourcc = FourCC::new(b"YUYV");
        let format = device.set_format(&format).map_err(open_error)?;
        if format.fourcc != FourCC::new(b"YUYV") {
            return Err(CaptureError::DeviceUnavailable {
                detail: format!(
                    "{} cannot stream YUYV (driver offers {})",
                    self.label, format.fourcc
                ),
            });
        }
        if let Err(err) = device.set_params(&Parameters::with_fps(config.frame_rate)) {
            // Plenty of drivers reject interval tuning; the stream still runs.
            warn!(device = %self.label, error = %err, "frame rate request rejected");
        }
        let stream = MmapStream::with_buffers(&device, Type::VideoCapture, STREAM_BUFFERS)
            .map_err(open_error)?;
        self.frame_size = (format.width, format.height);
        self.device = Some(device);
        self.stream = Some(stream);
        debug!(
            device = %self.label,
            width = format.width,
            height = format.height,
            "v4l2 stream open"
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame, CaptureError> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(CaptureError::DeviceUnavailable {
                detail: format!("{} is not streaming", self.label),
            });
        };
        let started = Instant::now();
        let (buf, meta) = stream.next().map_err(|err| stream_error(err, started))?;

        let (width, height) = self.frame_size;
        let expected = (width * height * 2) as usize;
        // Some drivers report bytesused = 0 for mmap buffers.
        let used = if meta.bytesused == 0 {
            buf.len()
        } else {
            meta.bytesused as usize
        };
        if used < expected {
            return Err(CaptureError::Disconnected {
                detail: format!("{}: short frame, {used} of {expected} bytes", self.label),
            });
        }
        Ok(Frame::new(
            buf[..expected].to_vec(),
            width as usize,
            height as usize,
            PixelFormat::Yuyv,
            u64::from(meta.sequence),
        ))
    }

    fn stop(&mut self) {
        // Dropping the stream issues STREAMOFF and unmaps the buffers.
        self.stream = None;
        self.device = None;
    }

    fn name(&self) -> &str {
        &self.label
    }
}

fn open_error(err: io::Error) -> CaptureError {
    match err.kind() {
        io::ErrorKind::PermissionDenied => CaptureError::PermissionDenied {
            detail: err.to_string(),
        },
        io::ErrorKind::NotFound => CaptureError::DeviceUnavailable {
            detail: err.to_string(),
        },
        io::ErrorKind::ResourceBusy => CaptureError::DeviceUnavailable {
            detail: format!("device busy: {err}"),
        },
        _ => CaptureError::DeviceUnavailable {
            detail: err.to_string(),
        },
    }
}

fn stream_error(err: io::Error, started: Instant) -> CaptureError {
    match err.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => CaptureError::Timeout {
            waited_ms: started.elapsed().as_millis() as u64,
        },
        _ => CaptureError::Disconnected {
            detail: err.to_string(),
        },
    }
}
