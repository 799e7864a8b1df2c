//! Per-pixel color classification against a player's reference color

use serde::{Deserialize, Serialize};

/// Channel weights for the perceptual distance (green counts most)
const RED_WEIGHT: f32 = 0.3;
const GREEN_WEIGHT: f32 = 0.4;
const BLUE_WEIGHT: f32 = 0.3;

/// Pixels darker than this (sum of channels) are treated as background
pub const DARK_PIXEL_SUM: u16 = 80;

/// Targets brighter than this (sum of channels) keep dark pixels eligible
pub const BRIGHT_TARGET_SUM: u16 = 350;

/// Default match threshold for the weighted distance
pub const DEFAULT_MATCH_THRESHOLD: f32 = 55.0;

/// An RGB color triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Sum of the three channels
    pub fn brightness(&self) -> u16 {
        self.r as u16 + self.g as u16 + self.b as u16
    }

    /// Pure white, as seen on ceilings and blown-out backgrounds
    pub fn is_pure_white(&self) -> bool {
        self.r == 255 && self.g == 255 && self.b == 255
    }

    /// Pure green, as seen on foliage and chroma backdrops
    pub fn is_pure_green(&self) -> bool {
        self.r == 0 && self.g == 255 && self.b == 0
    }

    /// Whether a target color counts as white for the background filter
    pub fn is_whitish(&self) -> bool {
        self.r >= 240 && self.g >= 240 && self.b >= 240
    }

    /// Whether a target color counts as green for the background filter
    pub fn is_greenish(&self) -> bool {
        self.g >= 200 && self.r <= 60 && self.b <= 60
    }

    /// Channel-weighted Euclidean distance to another color
    pub fn weighted_distance(&self, other: &Rgb) -> f32 {
        let dr = self.r as f32 - other.r as f32;
        let dg = self.g as f32 - other.g as f32;
        let db = self.b as f32 - other.b as f32;
        (RED_WEIGHT * dr * dr + GREEN_WEIGHT * dg * dg + BLUE_WEIGHT * db * db).sqrt()
    }

    /// Parse a `#rrggbb` hex string
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        Some(Self { r, g, b })
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Classifies pixels against one target color
#[derive(Debug, Clone, Copy)]
pub struct ColorMatcher {
    target: Rgb,
    threshold: f32,
    bright_target: bool,
    allow_white: bool,
    allow_green: bool,
}

impl ColorMatcher {
    pub fn new(target: Rgb, threshold: f32) -> Self {
        Self {
            target,
            threshold: threshold.max(f32::EPSILON),
            bright_target: target.brightness() > BRIGHT_TARGET_SUM,
            allow_white: target.is_whitish(),
            allow_green: target.is_greenish(),
        }
    }

    /// Returns the match weight in (0, 1], or `None` if the pixel is rejected
    pub fn weight(&self, pixel: Rgb) -> Option<f32> {
        if !self.bright_target && pixel.brightness() < DARK_PIXEL_SUM {
            return None;
        }
        if pixel.is_pure_white() && !self.allow_white {
            return None;
        }
        if pixel.is_pure_green() && !self.allow_green {
            return None;
        }

        let distance = pixel.weighted_distance(&self.target);
        if distance >= self.threshold {
            return None;
        }

        Some(1.0 - distance / self.threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgb = Rgb::new(220, 30, 40);

    #[test]
    fn exact_color_has_full_weight() {
        let matcher = ColorMatcher::new(RED, 50.0);
        assert_eq!(matcher.weight(RED), Some(1.0));
    }

    #[test]
    fn distance_at_threshold_is_rejected() {
        // dR = 100 gives sqrt(0.3 * 10000) ~= 54.77
        let matcher = ColorMatcher::new(Rgb::new(100, 100, 100), 54.0);
        assert!(matcher.weight(Rgb::new(200, 100, 100)).is_none());

        let exact = Rgb::new(0, 0, 0).weighted_distance(&Rgb::new(0, 50, 0));
        let matcher = ColorMatcher::new(Rgb::new(150, 50, 150), exact);
        assert!(matcher.weight(Rgb::new(150, 100, 150)).is_none());
    }

    #[test]
    fn weight_falls_off_linearly() {
        let matcher = ColorMatcher::new(RED, 50.0);
        let pixel = Rgb::new(220, 55, 40);
        let expected = 1.0 - RED.weighted_distance(&pixel) / 50.0;
        let weight = matcher.weight(pixel).unwrap();
        assert!((weight - expected).abs() < 1e-6);
        assert!(weight > 0.0 && weight < 1.0);
    }

    #[test]
    fn green_channel_weighs_more() {
        let base = Rgb::new(100, 100, 100);
        let red_off = base.weighted_distance(&Rgb::new(120, 100, 100));
        let green_off = base.weighted_distance(&Rgb::new(100, 120, 100));
        assert!(green_off > red_off);
    }

    #[test]
    fn dark_pixels_rejected_for_normal_targets() {
        let target = Rgb::new(40, 20, 30);
        let matcher = ColorMatcher::new(target, 60.0);
        assert!(matcher.weight(Rgb::new(35, 20, 20)).is_none());
    }

    #[test]
    fn dark_pixels_allowed_for_bright_targets() {
        let target = Rgb::new(250, 250, 0);
        let matcher = ColorMatcher::new(target, 400.0);
        assert!(matcher.weight(Rgb::new(30, 30, 10)).is_some());
    }

    #[test]
    fn pure_white_and_green_rejected_for_other_targets() {
        let matcher = ColorMatcher::new(Rgb::new(250, 250, 250), 500.0);
        assert!(matcher.weight(Rgb::new(255, 255, 255)).is_some());
        assert!(matcher.weight(Rgb::new(0, 255, 0)).is_none());

        let matcher = ColorMatcher::new(Rgb::new(20, 230, 30), 500.0);
        assert!(matcher.weight(Rgb::new(0, 255, 0)).is_some());
        assert!(matcher.weight(Rgb::new(255, 255, 255)).is_none());

        let matcher = ColorMatcher::new(Rgb::new(240, 240, 200), 500.0);
        assert!(matcher.weight(Rgb::new(255, 255, 255)).is_none());
    }

    #[test]
    fn hex_parsing() {
        assert_eq!(Rgb::from_hex("#ff0080"), Some(Rgb::new(255, 0, 128)));
        assert_eq!(Rgb::from_hex("00ff00"), Some(Rgb::new(0, 255, 0)));
        assert_eq!(Rgb::from_hex("#fff"), None);
        assert_eq!(Rgb::new(1, 2, 255).to_hex(), "#0102ff");
    }
}
