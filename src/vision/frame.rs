//! Camera frame model

use bytes::Bytes;
use chrono::{DateTime, Utc};

use super::color::Rgb;

/// Bytes per RGBA pixel
pub const BYTES_PER_PIXEL: usize = 4;

/// Errors raised when building a frame from raw capture data
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("Frame dimensions must be non-zero (got {width}x{height})")]
    ZeroDimension { width: u32, height: u32 },

    #[error("Pixel buffer is {actual} bytes, expected {expected} for {width}x{height} RGBA")]
    BufferSizeMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

/// An immutable RGBA snapshot of the camera image
#[derive(Debug, Clone)]
pub struct Frame {
    /// Capture sequence number, increasing per frame source
    pub seq: u64,
    pub width: u32,
    pub height: u32,
    pub captured_at: DateTime<Utc>,
    pixels: Bytes,
}

impl Frame {
    pub fn from_rgba(
        seq: u64,
        width: u32,
        height: u32,
        pixels: impl Into<Bytes>,
    ) -> Result<Self, FrameError> {
        if width == 0 || height == 0 {
            return Err(FrameError::ZeroDimension { width, height });
        }

        let pixels = pixels.into();
        let expected = width as usize * height as usize * BYTES_PER_PIXEL;
        if pixels.len() != expected {
            return Err(FrameError::BufferSizeMismatch {
                width,
                height,
                expected,
                actual: pixels.len(),
            });
        }

        Ok(Self {
            seq,
            width,
            height,
            captured_at: Utc::now(),
            pixels,
        })
    }

    /// Color at (x, y); `None` outside the frame
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        Some(Rgb::new(
            self.pixels[idx],
            self.pixels[idx + 1],
            self.pixels[idx + 2],
        ))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    /// Average color in a square patch, skipping anything outside the frame
    pub fn average_color(&self, cx: u32, cy: u32, radius: u32) -> Option<Rgb> {
        let x0 = cx.saturating_sub(radius);
        let y0 = cy.saturating_sub(radius);
        let x1 = cx.saturating_add(radius).min(self.width.saturating_sub(1));
        let y1 = cy.saturating_add(radius).min(self.height.saturating_sub(1));

        let (mut r, mut g, mut b, mut n) = (0u64, 0u64, 0u64, 0u64);
        for y in y0..=y1 {
            for x in x0..=x1 {
                if let Some(p) = self.pixel(x, y) {
                    r += p.r as u64;
                    g += p.g as u64;
                    b += p.b as u64;
                    n += 1;
                }
            }
        }

        if n == 0 {
            return None;
        }
        Some(Rgb::new((r / n) as u8, (g / n) as u8, (b / n) as u8))
    }
}

/// Mutable RGBA canvas used to compose synthetic frames
#[derive(Debug, Clone)]
pub struct FrameBuilder {
    width: u32,
    height: u32,
    buf: Vec<u8>,
}

impl FrameBuilder {
    pub fn new(width: u32, height: u32, background: Rgb) -> Self {
        let mut buf = Vec::with_capacity(width as usize * height as usize * BYTES_PER_PIXEL);
        for _ in 0..(width as usize * height as usize) {
            buf.extend_from_slice(&[background.r, background.g, background.b, 255]);
        }
        Self { width, height, buf }
    }

    /// Paint an axis-aligned square centered on (cx, cy), clipped to the canvas
    pub fn square(mut self, cx: i32, cy: i32, half: i32, color: Rgb) -> Self {
        let x0 = (cx - half).max(0);
        let y0 = (cy - half).max(0);
        let x1 = (cx + half).min(self.width as i32 - 1);
        let y1 = (cy + half).min(self.height as i32 - 1);
        for y in y0..=y1 {
            for x in x0..=x1 {
                let idx = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
                self.buf[idx] = color.r;
                self.buf[idx + 1] = color.g;
                self.buf[idx + 2] = color.b;
            }
        }
        self
    }

    pub fn build(self, seq: u64) -> Result<Frame, FrameError> {
        Frame::from_rgba(seq, self.width, self.height, self.buf)
    }
}
