//! Scan loop controller: the state machine driving one scan attempt.
//!
//! The controller is caller-pumped. Each [`cycle`] pulls one frame and
//! runs one detection pass; taking `&mut self` makes overlapping cycles
//! impossible by construction. Outcomes are plain returned values, not
//! callbacks, so embedders route them however they like.
//!
//! [`cycle`]: ScanController::cycle

pub mod gate;

pub use gate::DecodeGate;

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::capture::{CaptureConfig, CaptureDevice, CaptureError, CaptureSession};
use crate::decode::{DecoderBackend, PlatformDetector};
use crate::models::DecodedSymbol;

/// Lifecycle of one scan attempt.
///
/// ```text
/// Idle -> Initializing -> Scanning -> Stopped
///                |            |
///                v            v
///              Error -----> ManualEntry -> Stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// Built but not yet started.
    Idle,
    /// Selecting a backend and opening capture.
    Initializing,
    /// Live loop running; `cycle` does work.
    Scanning,
    /// Typed-entry path open after a capture failure.
    ManualEntry,
    /// Terminal: decoded, cancelled, or submitted.
    Stopped,
    /// Terminal unless the operator switches to manual entry.
    Error,
}

/// Control-flow violations on the scan controller.
#[derive(Debug, Error)]
pub enum ScanError {
    /// `start` called outside `Idle`.
    #[error("scan already started (state {0:?})")]
    AlreadyStarted(ScanState),
    /// Capture failed underneath the controller.
    #[error(transparent)]
    Capture(#[from] CaptureError),
    /// Manual entry requested from a state other than `Error`.
    #[error("manual entry is only available after a capture failure")]
    ManualEntryUnavailable,
}

/// What one cooperative cycle produced.
#[derive(Debug, PartialEq)]
pub enum CycleOutcome {
    /// The controller is not scanning; nothing was done.
    NotScanning,
    /// Frame pulled and searched; no symbol this time.
    NoDetection,
    /// A symbol was decoded; capture is closed and the state is `Stopped`.
    Decoded(DecodedSymbol),
    /// The frame pull failed; capture is closed and the state is `Error`.
    Faulted(CaptureError),
}

/// Outcome of an operator-triggered still capture.
#[derive(Debug, PartialEq)]
pub enum StillOutcome {
    /// The controller is not scanning; nothing was done.
    NotScanning,
    /// Nothing decodable in the frozen frame; scanning continues.
    NothingFound,
    /// A symbol was decoded; capture is closed and the state is `Stopped`.
    Decoded(DecodedSymbol),
    /// The frame pull failed; capture is closed and the state is `Error`.
    Faulted(CaptureError),
}

/// Outcome of a manual entry submission.
#[derive(Debug, PartialEq)]
pub enum ManualOutcome {
    /// Manual entry is not open; nothing was done.
    NotInManualEntry,
    /// Blank input is rejected without a state change.
    EmptyInput,
    /// The typed code, tagged as manual; the controller stopped.
    Decoded(DecodedSymbol),
}

const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(33);

struct LiveScan {
    session: CaptureSession,
    backend: DecoderBackend,
}

/// Drives one scan attempt over a staged capture device.
///
/// A controller is single-shot: the device is consumed by the first
/// `start`, and terminal states never return to `Idle`. A new attempt
/// is a new controller.
pub struct ScanController {
    state: ScanState,
    device: Option<Box<dyn CaptureDevice>>,
    platform: Option<Box<dyn PlatformDetector>>,
    live: Option<LiveScan>,
    config: CaptureConfig,
    frame_interval: Duration,
    last_failure: Option<CaptureError>,
}

impl ScanController {
    /// Stage a device for one scan attempt. Nothing happens until `start`.
    pub fn new(device: Box<dyn CaptureDevice>, config: CaptureConfig) -> Self {
        ScanController {
            state: ScanState::Idle,
            device: Some(device),
            platform: None,
            live: None,
            config,
            frame_interval: DEFAULT_FRAME_INTERVAL,
            last_failure: None,
        }
    }

    /// Offer a platform detector; it is probed once at `start`.
    pub fn with_platform_detector(mut self, detector: Box<dyn PlatformDetector>) -> Self {
        self.platform = Some(detector);
        self
    }

    /// Override the pause between empty passes in [`run_for`].
    ///
    /// [`run_for`]: ScanController::run_for
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ScanState {
        self.state
    }

    /// The capture failure that put the controller into `Error`, kept so
    /// the operator message can say what actually went wrong.
    pub fn last_failure(&self) -> Option<&CaptureError> {
        self.last_failure.as_ref()
    }

    /// Select the backend and open capture. `Idle` only.
    pub fn start(&mut self) -> Result<(), ScanError> {
        if self.state != ScanState::Idle {
            return Err(ScanError::AlreadyStarted(self.state));
        }
        let Some(device) = self.device.take() else {
            return Err(ScanError::AlreadyStarted(self.state));
        };
        self.state = ScanState::Initializing;

        // Backend choice happens once, before the camera is touched.
        let backend = DecoderBackend::select(self.platform.take());
        match CaptureSession::open(device, &self.config) {
            Ok(session) => {
                info!(
                    device = session.device_name(),
                    backend = %backend.kind(),
                    "scan started"
                );
                self.live = Some(LiveScan { session, backend });
                self.state = ScanState::Scanning;
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, hint = err.hint(), "capture failed to open");
                self.last_failure = Some(err.clone());
                self.state = ScanState::Error;
                Err(ScanError::Capture(err))
            }
        }
    }

    /// One frame pull plus one detection pass.
    pub fn cycle(&mut self) -> CycleOutcome {
        if self.state != ScanState::Scanning {
            return CycleOutcome::NotScanning;
        }
        match self.pull_and_detect() {
            Ok(Some(symbol)) => {
                info!(source = %symbol.source, "symbol decoded");
                self.close_capture();
                self.state = ScanState::Stopped;
                CycleOutcome::Decoded(symbol)
            }
            Ok(None) => CycleOutcome::NoDetection,
            Err(err) => {
                self.fail(&err);
                CycleOutcome::Faulted(err)
            }
        }
    }

    /// Freeze the latest frame and run one dedicated decode on it.
    ///
    /// Unlike [`cycle`], a miss is surfaced to the operator as
    /// [`StillOutcome::NothingFound`]; the live loop keeps running.
    ///
    /// [`cycle`]: ScanController::cycle
    pub fn capture_still(&mut self) -> StillOutcome {
        if self.state != ScanState::Scanning {
            return StillOutcome::NotScanning;
        }
        match self.pull_and_detect() {
            Ok(Some(symbol)) => {
                info!(source = %symbol.source, "still capture decoded");
                self.close_capture();
                self.state = ScanState::Stopped;
                StillOutcome::Decoded(symbol)
            }
            Ok(None) => {
                debug!("still capture found nothing");
                StillOutcome::NothingFound
            }
            Err(err) => {
                self.fail(&err);
                StillOutcome::Faulted(err)
            }
        }
    }

    /// Stop without a result. The first call closes capture and returns
    /// true; once `Stopped`, further calls return false and do nothing.
    pub fn cancel(&mut self) -> bool {
        if self.state == ScanState::Stopped {
            return false;
        }
        self.close_capture();
        self.state = ScanState::Stopped;
        info!("scan cancelled");
        true
    }

    /// Open the typed-entry path. Only reachable from `Error`, after the
    /// operator saw why the camera is not an option.
    pub fn begin_manual_entry(&mut self) -> Result<(), ScanError> {
        if self.state != ScanState::Error {
            return Err(ScanError::ManualEntryUnavailable);
        }
        self.state = ScanState::ManualEntry;
        info!("manual entry open");
        Ok(())
    }

    /// Submit typed text. Non-blank input becomes a decode event exactly
    /// like a camera hit, and the controller stops.
    pub fn submit_manual(&mut self, text: &str) -> ManualOutcome {
        if self.state != ScanState::ManualEntry {
            return ManualOutcome::NotInManualEntry;
        }
        let text = text.trim();
        if text.is_empty() {
            debug!("manual entry rejected: empty input");
            return ManualOutcome::EmptyInput;
        }
        self.state = ScanState::Stopped;
        info!("manual entry submitted");
        ManualOutcome::Decoded(DecodedSymbol::manual(text))
    }

    /// Pump `cycle` up to `max_cycles` times, sleeping one frame interval
    /// between empty passes. Returns the outcome that ended the run.
    pub fn run_for(&mut self, max_cycles: usize) -> CycleOutcome {
        let mut last = CycleOutcome::NotScanning;
        for _ in 0..max_cycles {
            last = self.cycle();
            match last {
                CycleOutcome::NoDetection => std::thread::sleep(self.frame_interval),
                _ => break,
            }
        }
        last
    }

    fn pull_and_detect(&mut self) -> Result<Option<DecodedSymbol>, CaptureError> {
        let Some(live) = self.live.as_mut() else {
            return Err(CaptureError::Disconnected {
                detail: "no live capture".into(),
            });
        };
        let frame = live.session.frame()?;
        match live.backend.detect(&frame) {
            Ok(found) => Ok(found),
            Err(err) => {
                // Decoder hiccups do not kill the loop; next frame, next chance.
                warn!(error = %err, "detect failed on frame");
                Ok(None)
            }
        }
    }

    fn fail(&mut self, err: &CaptureError) {
        warn!(error = %err, hint = err.hint(), "frame pull failed");
        self.close_capture();
        self.last_failure = Some(err.clone());
        self.state = ScanState::Error;
    }

    fn close_capture(&mut self) {
        if let Some(mut live) = self.live.take() {
            live.session.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{DeviceProbe, SyntheticDevice};
    use crate::decode::DecodeError;
    use crate::models::SymbolSource;

    struct ScriptedDetector {
        replies: Vec<Vec<String>>,
    }

    impl ScriptedDetector {
        fn new(replies: Vec<Vec<String>>) -> Self {
            ScriptedDetector { replies }
        }
    }

    impl PlatformDetector for ScriptedDetector {
        fn probe(&mut self) -> Result<(), DecodeError> {
            Ok(())
        }

        fn detect(
            &mut self,
            _frame: &crate::capture::Frame,
        ) -> Result<Vec<String>, DecodeError> {
            if self.replies.is_empty() {
                Ok(Vec::new())
            } else {
                Ok(self.replies.remove(0))
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn controller_with(
        device: SyntheticDevice,
        replies: Vec<Vec<String>>,
    ) -> (ScanController, DeviceProbe) {
        let probe = device.probe();
        let controller = ScanController::new(Box::new(device), CaptureConfig::default())
            .with_platform_detector(Box::new(ScriptedDetector::new(replies)));
        (controller, probe)
    }

    #[test]
    fn test_happy_path_decodes_and_stops() {
        let (mut controller, probe) =
            controller_with(SyntheticDevice::new("cam0"), vec![vec![], vec!["TX1".into()]]);
        controller.start().unwrap();
        assert_eq!(controller.state(), ScanState::Scanning);

        assert_eq!(controller.cycle(), CycleOutcome::NoDetection);
        match controller.cycle() {
            CycleOutcome::Decoded(symbol) => {
                assert_eq!(symbol.text, "TX1");
                assert_eq!(symbol.source, SymbolSource::Native);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(controller.state(), ScanState::Stopped);
        assert_eq!(probe.stops(), 1);
        // The loop is over; further cycles are inert.
        assert_eq!(controller.cycle(), CycleOutcome::NotScanning);
    }

    #[test]
    fn test_start_is_single_shot() {
        let (mut controller, _probe) = controller_with(SyntheticDevice::new("cam0"), vec![]);
        controller.start().unwrap();
        assert!(matches!(
            controller.start(),
            Err(ScanError::AlreadyStarted(ScanState::Scanning))
        ));
    }

    #[test]
    fn test_open_failure_lands_in_error_with_cause() {
        let mut device = SyntheticDevice::new("cam0");
        device.fail_open(CaptureError::PermissionDenied {
            detail: "operator declined".into(),
        });
        let (mut controller, probe) = controller_with(device, vec![]);
        assert!(controller.start().is_err());
        assert_eq!(controller.state(), ScanState::Error);
        assert!(matches!(
            controller.last_failure(),
            Some(CaptureError::PermissionDenied { .. })
        ));
        // The half-open device was released.
        assert_eq!(probe.stops(), 1);
    }

    #[test]
    fn test_frame_fault_closes_capture() {
        let mut device = SyntheticDevice::new("cam0");
        device.push_failure(CaptureError::Disconnected {
            detail: "usb yanked".into(),
        });
        let (mut controller, probe) = controller_with(device, vec![]);
        controller.start().unwrap();
        assert!(matches!(controller.cycle(), CycleOutcome::Faulted(_)));
        assert_eq!(controller.state(), ScanState::Error);
        assert_eq!(probe.stops(), 1);
    }

    #[test]
    fn test_cancel_twice_stops_device_once() {
        let (mut controller, probe) = controller_with(SyntheticDevice::new("cam0"), vec![]);
        controller.start().unwrap();
        assert!(controller.cancel());
        assert!(!controller.cancel());
        assert_eq!(controller.state(), ScanState::Stopped);
        assert_eq!(probe.stops(), 1);
    }

    #[test]
    fn test_manual_entry_gated_on_error_state() {
        let (mut controller, _probe) = controller_with(SyntheticDevice::new("cam0"), vec![]);
        controller.start().unwrap();
        assert!(controller.begin_manual_entry().is_err());

        let mut device = SyntheticDevice::new("cam1");
        device.fail_open(CaptureError::NoSecureContext {
            detail: "http origin".into(),
        });
        let (mut controller, _probe) = controller_with(device, vec![]);
        let _ = controller.start();
        controller.begin_manual_entry().unwrap();
        assert_eq!(controller.submit_manual("   "), ManualOutcome::EmptyInput);
        assert_eq!(controller.state(), ScanState::ManualEntry);
        match controller.submit_manual(" LOT-2024-001 ") {
            ManualOutcome::Decoded(symbol) => {
                assert_eq!(symbol.text, "LOT-2024-001");
                assert_eq!(symbol.source, SymbolSource::ManualEntry);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(controller.state(), ScanState::Stopped);
    }

    #[test]
    fn test_still_miss_keeps_scanning() {
        let (mut controller, probe) =
            controller_with(SyntheticDevice::new("cam0"), vec![vec![], vec!["TX9".into()]]);
        controller.start().unwrap();
        assert_eq!(controller.capture_still(), StillOutcome::NothingFound);
        assert_eq!(controller.state(), ScanState::Scanning);
        assert_eq!(probe.stops(), 0);
        assert!(matches!(controller.capture_still(), StillOutcome::Decoded(_)));
        assert_eq!(controller.state(), ScanState::Stopped);
    }
}
