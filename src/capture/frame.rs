use rayon::prelude::*;

/// Pixel layouts a capture device may hand over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 8-bit RGB, 3 bytes per pixel.
    Rgb8,
    /// Single luminance plane, 1 byte per pixel.
    Luma8,
    /// Packed YUV 4:2:2, 2 bytes per pixel, luma at even offsets.
    Yuyv,
}

impl PixelFormat {
    /// Storage cost of one pixel in this layout.
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Rgb8 => 3,
            PixelFormat::Luma8 => 1,
            PixelFormat::Yuyv => 2,
        }
    }
}

/// Luminance coefficients: Y = (76*R + 150*G + 29*B) >> 8
const COEF_R: i32 = 76;
const COEF_G: i32 = 150;
const COEF_B: i32 = 29;

/// Frames at or above this pixel count get row-parallel conversion.
const PARALLEL_PIXELS: usize = 1 << 20;

/// One frame as pulled from a capture device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Raw pixel bytes in `format` layout.
    pub data: Vec<u8>,
    /// Width in pixels.
    pub width: usize,
    /// Height in pixels.
    pub height: usize,
    /// Layout of `data`.
    pub format: PixelFormat,
    /// Driver-assigned frame counter, for drop diagnostics.
    pub sequence: u64,
}

impl Frame {
    /// Wrap raw pixel data pulled from a device.
    pub fn new(
        data: Vec<u8>,
        width: usize,
        height: usize,
        format: PixelFormat,
        sequence: u64,
    ) -> Self {
        Frame {
            data,
            width,
            height,
            format,
            sequence,
        }
    }

    /// Total pixels in the frame.
    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    /// Extract the luminance plane into a caller-owned buffer, so the
    /// decode path can reuse one allocation across frames.
    pub fn luma_into(&self, out: &mut Vec<u8>) {
        let pixels = self.pixel_count();
        assert!(
            self.data.len() >= pixels * self.format.bytes_per_pixel(),
            "frame data shorter than {}x{} {:?}",
            self.width,
            self.height,
            self.format
        );
        out.clear();
        out.resize(pixels, 0);

        match self.format {
            PixelFormat::Luma8 => out.copy_from_slice(&self.data[..pixels]),
            PixelFormat::Yuyv => {
                for (dst, pair) in out.iter_mut().zip(self.data.chunks_exact(2)) {
                    *dst = pair[0];
                }
            }
            PixelFormat::Rgb8 => {
                if pixels >= PARALLEL_PIXELS {
                    out.par_chunks_mut(self.width)
                        .enumerate()
                        .for_each(|(y, row)| rgb_row_to_luma(&self.data[y * self.width * 3..], row));
                } else {
                    for (y, row) in out.chunks_mut(self.width).enumerate() {
                        rgb_row_to_luma(&self.data[y * self.width * 3..], row);
                    }
                }
            }
        }
    }

    /// Luminance plane as a fresh allocation.
    pub fn to_luma(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.luma_into(&mut out);
        out
    }
}

fn rgb_row_to_luma(rgb: &[u8], row: &mut [u8]) {
    for (x, dst) in row.iter_mut().enumerate() {
        let idx = x * 3;
        let r = rgb[idx] as i32;
        let g = rgb[idx + 1] as i32;
        let b = rgb[idx + 2] as i32;
        *dst = ((COEF_R * r + COEF_G * g + COEF_B * b) >> 8).min(255) as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_luma_extremes() {
        let frame = Frame::new(vec![255, 255, 255, 0, 0, 0], 2, 1, PixelFormat::Rgb8, 0);
        let luma = frame.to_luma();
        assert!(luma[0] >= 254);
        assert_eq!(luma[1], 0);
    }

    #[test]
    fn test_rgb_green_dominates_blue() {
        let green = Frame::new(vec![0, 255, 0], 1, 1, PixelFormat::Rgb8, 0);
        let blue = Frame::new(vec![0, 0, 255], 1, 1, PixelFormat::Rgb8, 0);
        assert!(green.to_luma()[0] > blue.to_luma()[0]);
    }

    #[test]
    fn test_yuyv_takes_even_bytes() {
        // Two pixels: Y0 U Y1 V
        let frame = Frame::new(vec![10, 200, 20, 201], 2, 1, PixelFormat::Yuyv, 0);
        assert_eq!(frame.to_luma(), vec![10, 20]);
    }

    #[test]
    fn test_luma_passthrough_reuses_buffer() {
        let frame = Frame::new(vec![1, 2, 3, 4], 2, 2, PixelFormat::Luma8, 7);
        let mut buf = vec![0u8; 1];
        frame.luma_into(&mut buf);
        assert_eq!(buf, vec![1, 2, 3, 4]);
        assert_eq!(frame.sequence, 7);
    }
}
