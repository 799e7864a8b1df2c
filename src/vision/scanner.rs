//! Strided frame scanning for one target color

use super::cluster::MIN_MATCHES;
use super::color::ColorMatcher;
use super::frame::Frame;
use super::Position;

/// Default sampling stride in pixels (both axes)
pub const DEFAULT_STRIDE: u32 = 6;

/// Radius of the local search window around the previous position
pub const DEFAULT_WINDOW_RADIUS: f32 = 100.0;

/// Weight multiplier for matches found inside the local window
pub const DEFAULT_PROXIMITY_BONUS: f32 = 1.5;

/// A weighted sample that matched the target color
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorMatch {
    pub x: f32,
    pub y: f32,
    /// In (0, 1], higher = closer color match
    pub weight: f32,
}

/// Which pass produced a scan result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPass {
    /// Windowed search around the previous position
    Local,
    /// Whole-frame search
    Full,
}

#[derive(Debug, Clone)]
pub struct ScanResult {
    pub matches: Vec<ColorMatch>,
    pub pass: ScanPass,
    /// Number of pixels sampled across all passes
    pub sampled: usize,
}

/// Walks a sampled grid of a frame and collects weighted color matches
#[derive(Debug, Clone, Copy)]
pub struct FrameScanner {
    stride: u32,
    window_radius: f32,
    proximity_bonus: f32,
    /// Fewer local matches than this cannot form a detection
    min_local_matches: usize,
}

impl Default for FrameScanner {
    fn default() -> Self {
        Self::new(
            DEFAULT_STRIDE,
            DEFAULT_WINDOW_RADIUS,
            DEFAULT_PROXIMITY_BONUS,
            MIN_MATCHES,
        )
    }
}

impl FrameScanner {
    pub fn new(
        stride: u32,
        window_radius: f32,
        proximity_bonus: f32,
        min_local_matches: usize,
    ) -> Self {
        Self {
            stride: stride.max(1),
            window_radius: window_radius.max(0.0),
            proximity_bonus: proximity_bonus.max(1.0),
            min_local_matches: min_local_matches.max(1),
        }
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    /// Scan for `matcher`'s color, trying the window around `previous` first.
    /// The whole frame is scanned when the window holds too few matches to
    /// be located, so stray specks near the old position cannot pin the track.
    pub fn scan(
        &self,
        frame: &Frame,
        matcher: &ColorMatcher,
        previous: Option<Position>,
    ) -> ScanResult {
        let mut sampled = 0;

        if let Some(prev) = previous {
            let x0 = (prev.x - self.window_radius).max(0.0) as u32;
            let y0 = (prev.y - self.window_radius).max(0.0) as u32;
            let x1 = ((prev.x + self.window_radius).max(0.0) as u32).min(frame.width);
            let y1 = ((prev.y + self.window_radius).max(0.0) as u32).min(frame.height);

            let mut matches = Vec::new();
            sampled += self.scan_region(frame, matcher, (x0, y0, x1, y1), |w| {
                // Relative boost; capped so weights stay within (0, 1]
                (w * self.proximity_bonus).min(1.0)
            }, &mut matches);

            if matches.len() >= self.min_local_matches {
                return ScanResult {
                    matches,
                    pass: ScanPass::Local,
                    sampled,
                };
            }
        }

        let mut matches = Vec::new();
        sampled += self.scan_region(
            frame,
            matcher,
            (0, 0, frame.width, frame.height),
            |w| w,
            &mut matches,
        );

        ScanResult {
            matches,
            pass: ScanPass::Full,
            sampled,
        }
    }

    /// Sample the half-open region `[x0, x1) x [y0, y1)` on the stride grid
    fn scan_region(
        &self,
        frame: &Frame,
        matcher: &ColorMatcher,
        (x0, y0, x1, y1): (u32, u32, u32, u32),
        adjust: impl Fn(f32) -> f32,
        out: &mut Vec<ColorMatch>,
    ) -> usize {
        // Align to the global grid so local and full passes sample the same pixels
        let align = |v: u32| v.div_ceil(self.stride) * self.stride;
        let mut sampled = 0;

        let mut y = align(y0);
        while y < y1 {
            let mut x = align(x0);
            while x < x1 {
                if let Some(pixel) = frame.pixel(x, y) {
                    sampled += 1;
                    if let Some(weight) = matcher.weight(pixel) {
                        out.push(ColorMatch {
                            x: x as f32,
                            y: y as f32,
                            weight: adjust(weight),
                        });
                    }
                }
                x += self.stride;
            }
            y += self.stride;
        }

        sampled
    }
}
