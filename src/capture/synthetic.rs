//! Scripted stand-in for a camera, used by tests and the CLI demo.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::device::{CaptureConfig, CaptureDevice, CaptureError};
use super::frame::{Frame, PixelFormat};

/// Shared lifecycle counters, for asserting that a device was opened,
/// stopped and polled the expected number of times.
#[derive(Debug, Clone, Default)]
pub struct DeviceProbe {
    opens: Arc<AtomicUsize>,
    stops: Arc<AtomicUsize>,
    frames: Arc<AtomicUsize>,
}

impl DeviceProbe {
    /// Times `open` was called.
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Times `stop` was called.
    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// Times `next_frame` was called.
    pub fn frames(&self) -> usize {
        self.frames.load(Ordering::SeqCst)
    }
}

/// Deterministic capture device: replays a scripted sequence of frames
/// and faults, then serves blank frames forever.
pub struct SyntheticDevice {
    name: String,
    script: VecDeque<Result<Frame, CaptureError>>,
    open_failure: Option<CaptureError>,
    probe: DeviceProbe,
    opened: bool,
    blank_size: (usize, usize),
    next_sequence: u64,
}

impl SyntheticDevice {
    /// Empty-scripted device; serves blank frames until frames are queued.
    pub fn new(name: impl Into<String>) -> Self {
        SyntheticDevice {
            name: name.into(),
            script: VecDeque::new(),
            open_failure: None,
            probe: DeviceProbe::default(),
            opened: false,
            blank_size: (64, 64),
            next_sequence: 0,
        }
    }

    /// Queue a frame to be served by the next `next_frame` call.
    pub fn push_frame(&mut self, frame: Frame) {
        self.script.push_back(Ok(frame));
    }

    /// Queue a fault; the call that reaches it fails with this error.
    pub fn push_failure(&mut self, error: CaptureError) {
        self.script.push_back(Err(error));
    }

    /// Make every `open` attempt fail with this error.
    pub fn fail_open(&mut self, error: CaptureError) {
        self.open_failure = Some(error);
    }

    /// Handle to the lifecycle counters, valid after the device is
    /// boxed and handed away.
    pub fn probe(&self) -> DeviceProbe {
        self.probe.clone()
    }

    /// All-white frame at the negotiated size; decodes to nothing.
    fn blank_frame(&mut self) -> Frame {
        let (width, height) = self.blank_size;
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        Frame::new(vec![255; width * height], width, height, PixelFormat::Luma8, sequence)
    }
}

impl CaptureDevice for SyntheticDevice {
    fn open(&mut self, config: &CaptureConfig) -> Result<(), CaptureError> {
        self.probe.opens.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.open_failure {
            return Err(err.clone());
        }
        self.blank_size = (config.width as usize, config.height as usize);
        self.opened = true;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame, CaptureError> {
        self.probe.frames.fetch_add(1, Ordering::SeqCst);
        if !self.opened {
            return Err(CaptureError::DeviceUnavailable {
                detail: "synthetic device not opened".into(),
            });
        }
        match self.script.pop_front() {
            Some(entry) => entry,
            None => Ok(self.blank_frame()),
        }
    }

    fn stop(&mut self) {
        self.opened = false;
        self.probe.stops.fetch_add(1, Ordering::SeqCst);
    }

    fn name(&self) -> &str {
        &self.name
    }
}
