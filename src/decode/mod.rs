//! Decoder backends and the policy for choosing between them.
//!
//! Two mechanisms exist: an optional platform-provided detector
//! (vendor SDK, possibly accelerated) and the bundled software decoder.
//! The choice is made once per controller start and never revisited
//! mid-session; a platform that fails its probe stays benched until the
//! next start.

pub mod portable;

pub use portable::PortableDecoder;

use thiserror::Error;
use tracing::{info, warn};

use crate::capture::Frame;
use crate::models::{DecodedSymbol, SymbolSource};

/// Decoder faults. A live frame with nothing in it is not a fault; it
/// comes back as an empty result.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The detector cannot run at all in this environment.
    #[error("no detector available: {0}")]
    Unavailable(String),
    /// The detector ran and failed internally.
    #[error("detector backend failure: {0}")]
    Backend(String),
    /// The input image could not be interpreted.
    #[error("image rejected: {0}")]
    BadImage(String),
}

/// A detector supplied by the embedding platform.
///
/// `probe` runs exactly once, at backend selection. `detect` may report
/// several symbols per frame and must not hold onto the frame past the
/// call.
pub trait PlatformDetector: Send {
    /// Confirm the detector is usable before it is selected.
    fn probe(&mut self) -> Result<(), DecodeError>;
    /// Decode all symbols visible in one frame.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<String>, DecodeError>;
    /// Detector label for logs.
    fn name(&self) -> &str {
        "platform"
    }
}

/// The decode mechanism selected for one scan session.
pub enum DecoderBackend {
    /// Platform-provided detector that passed its probe.
    Native(Box<dyn PlatformDetector>),
    /// Bundled software decoder, always available.
    Portable(PortableDecoder),
}

impl DecoderBackend {
    /// Probe the platform detector once when one is offered; on absence
    /// or probe failure fall back to the bundled decoder for the rest of
    /// the session.
    pub fn select(platform: Option<Box<dyn PlatformDetector>>) -> Self {
        match platform {
            Some(mut detector) => match detector.probe() {
                Ok(()) => {
                    info!(detector = detector.name(), "platform detector selected");
                    DecoderBackend::Native(detector)
                }
                Err(err) => {
                    warn!(error = %err, "platform detector failed probe, using portable decoder");
                    DecoderBackend::Portable(PortableDecoder::new())
                }
            },
            None => DecoderBackend::Portable(PortableDecoder::new()),
        }
    }

    /// Which source tag symbols from this backend carry.
    pub fn kind(&self) -> SymbolSource {
        match self {
            DecoderBackend::Native(_) => SymbolSource::Native,
            DecoderBackend::Portable(_) => SymbolSource::Portable,
        }
    }

    /// One detection pass over a frame.
    ///
    /// At most one symbol comes back: when a platform detector reports
    /// several, the first in its reported order wins.
    pub fn detect(&mut self, frame: &Frame) -> Result<Option<DecodedSymbol>, DecodeError> {
        let source = self.kind();
        let text = match self {
            DecoderBackend::Native(detector) => detector.detect(frame)?.into_iter().next(),
            DecoderBackend::Portable(decoder) => decoder.detect(frame)?,
        };
        Ok(text.map(|text| DecodedSymbol::new(text, source)))
    }
}
