//! Bundled software decoder, for hosts without a platform detector.

use tracing::debug;

use super::DecodeError;
use crate::capture::Frame;

/// Software QR decode over a reusable luminance buffer.
///
/// One symbol per call: the live loop stops at the first hit anyway,
/// and skipping the remaining grids keeps the per-frame cost down.
#[derive(Debug, Default)]
pub struct PortableDecoder {
    luma: Vec<u8>,
}

impl PortableDecoder {
    /// Decoder with an empty scratch buffer.
    pub fn new() -> Self {
        PortableDecoder::default()
    }

    /// Decode at most one symbol from a live frame. An unreadable frame
    /// is an empty result, not an error; the loop just keeps pulling.
    pub fn detect(&mut self, frame: &Frame) -> Result<Option<String>, DecodeError> {
        frame.luma_into(&mut self.luma);
        Ok(decode_first(&self.luma, frame.width, frame.height))
    }

    /// Decode a still image (PNG/JPEG bytes) outside the live loop.
    pub fn decode_still(&mut self, bytes: &[u8]) -> Result<Option<String>, DecodeError> {
        let image =
            image::load_from_memory(bytes).map_err(|err| DecodeError::BadImage(err.to_string()))?;
        let gray = image.to_luma8();
        let (width, height) = (gray.width() as usize, gray.height() as usize);
        Ok(decode_first(gray.as_raw(), width, height))
    }
}

fn decode_first(luma: &[u8], width: usize, height: usize) -> Option<String> {
    let mut prepared =
        rqrr::PreparedImage::prepare_from_greyscale(width, height, |x, y| luma[y * width + x]);
    for grid in prepared.detect_grids() {
        match grid.decode() {
            Ok((_, content)) => return Some(content),
            Err(err) => debug!(error = %err, "grid found but failed to decode"),
        }
    }
    None
}
