//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::game::motion::DEFAULT_SURVIVAL_AWARD;
use crate::game::phase::Difficulty;
use crate::game::round::RoundConfig;
use crate::tracking::{TrackerConfig, VisionConfig};

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed UI origins for CORS (comma-separated, `*` for any)
    pub client_origin: String,

    /// Expected capture size
    pub frame_width: u32,
    pub frame_height: u32,
    /// Tracking ticks per second
    pub tracking_fps: u32,
    /// Phase countdown cadence
    pub timer_tick_ms: u64,
    /// Timer ticks between UI snapshots
    pub snapshot_interval_ticks: u32,
    /// Max frame uploads per second
    pub frame_ingest_rate: u32,

    /// Green light duration
    pub move_duration_ms: u64,
    /// Red light duration
    pub freeze_duration_ms: u64,
    pub survival_award: u32,
    pub max_rounds: u32,
    pub default_difficulty: Difficulty,

    /// Color distance threshold for blob matching
    pub color_threshold: f32,
    /// Pixel sampling stride
    pub scan_stride: u32,
    /// Exponential smoothing factor
    pub smoothing_alpha: f32,
    /// Largest accepted per-frame jump in pixels
    pub max_jump_px: f32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Some(port) = lookup("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string())
        };

        let move_secs: f32 = parse_or(&lookup, "MOVE_DURATION_SECS", 5.0)?;
        let freeze_secs: f32 = parse_or(&lookup, "FREEZE_DURATION_SECS", 3.0)?;

        let config = Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            client_origin: lookup("CLIENT_ORIGIN").unwrap_or_else(|| "*".to_string()),

            frame_width: parse_or(&lookup, "FRAME_WIDTH", 640)?,
            frame_height: parse_or(&lookup, "FRAME_HEIGHT", 480)?,
            tracking_fps: parse_or(&lookup, "TRACKING_FPS", 30)?,
            timer_tick_ms: parse_or(&lookup, "TIMER_TICK_MS", 100)?,
            snapshot_interval_ticks: parse_or(&lookup, "SNAPSHOT_INTERVAL_TICKS", 1)?,
            frame_ingest_rate: parse_or(&lookup, "FRAME_INGEST_RATE", 60)?,

            move_duration_ms: secs_to_ms("MOVE_DURATION_SECS", move_secs)?,
            freeze_duration_ms: secs_to_ms("FREEZE_DURATION_SECS", freeze_secs)?,
            survival_award: parse_or(&lookup, "SURVIVAL_AWARD", DEFAULT_SURVIVAL_AWARD)?,
            max_rounds: parse_or(&lookup, "MAX_ROUNDS", 20)?,
            default_difficulty: parse_or(&lookup, "DIFFICULTY", Difficulty::Medium)?,

            color_threshold: parse_or(&lookup, "COLOR_THRESHOLD", 55.0)?,
            scan_stride: parse_or(&lookup, "SCAN_STRIDE", 6)?,
            smoothing_alpha: parse_or(&lookup, "SMOOTHING_ALPHA", 0.22)?,
            max_jump_px: parse_or(&lookup, "MAX_JUMP_PX", 120.0)?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.frame_width == 0 || self.frame_height == 0 {
            return Err(ConfigError::invalid("FRAME_WIDTH/FRAME_HEIGHT", "must be non-zero"));
        }
        if self.tracking_fps == 0 || self.tracking_fps > 120 {
            return Err(ConfigError::invalid("TRACKING_FPS", "must be in 1..=120"));
        }
        if self.timer_tick_ms == 0 {
            return Err(ConfigError::invalid("TIMER_TICK_MS", "must be non-zero"));
        }
        if self.frame_ingest_rate == 0 {
            return Err(ConfigError::invalid("FRAME_INGEST_RATE", "must be non-zero"));
        }
        if self.max_rounds == 0 {
            return Err(ConfigError::invalid("MAX_ROUNDS", "must be non-zero"));
        }
        if !(1..=16).contains(&self.scan_stride) {
            return Err(ConfigError::invalid("SCAN_STRIDE", "must be in 1..=16"));
        }
        if !(self.smoothing_alpha > 0.0 && self.smoothing_alpha <= 1.0) {
            return Err(ConfigError::invalid("SMOOTHING_ALPHA", "must be in (0, 1]"));
        }
        if !(self.color_threshold > 0.0) || !(self.max_jump_px > 0.0) {
            return Err(ConfigError::invalid(
                "COLOR_THRESHOLD/MAX_JUMP_PX",
                "must be positive",
            ));
        }
        Ok(())
    }

    pub fn timer_tick(&self) -> Duration {
        Duration::from_millis(self.timer_tick_ms)
    }

    pub fn tracking_period(&self) -> Duration {
        Duration::from_micros(1_000_000 / self.tracking_fps as u64)
    }

    pub fn round_config(&self) -> RoundConfig {
        RoundConfig {
            move_duration_ms: self.move_duration_ms,
            freeze_duration_ms: self.freeze_duration_ms,
            survival_award: self.survival_award,
            max_rounds: self.max_rounds,
            default_difficulty: self.default_difficulty,
        }
    }

    pub fn vision_config(&self) -> VisionConfig {
        VisionConfig {
            color_threshold: self.color_threshold,
            stride: self.scan_stride,
            ..VisionConfig::default()
        }
    }

    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            alpha: self.smoothing_alpha,
            max_jump: self.max_jump_px,
            ..TrackerConfig::default()
        }
    }
}

fn parse_or<T, F>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::invalid(key, format!("cannot parse '{}'", raw))),
        None => Ok(default),
    }
}

fn secs_to_ms(key: &'static str, secs: f32) -> Result<u64, ConfigError> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(ConfigError::invalid(key, "must be a positive number of seconds"));
    }
    Ok((secs * 1000.0).round() as u64)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("Invalid server address format")]
    InvalidAddress,
}

impl ConfigError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_env() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.server_addr.port(), 8080);
        assert_eq!(config.timer_tick_ms, 100);
        assert_eq!(config.move_duration_ms, 5_000);
        assert_eq!(config.freeze_duration_ms, 3_000);
        assert_eq!(config.default_difficulty, Difficulty::Medium);
        assert_eq!(config.tracking_period(), Duration::from_micros(33_333));
    }

    #[test]
    fn port_overrides_server_addr() {
        let config = Config::from_lookup(lookup(&[
            ("PORT", "9000"),
            ("SERVER_ADDR", "127.0.0.1:1"),
        ]))
        .unwrap();
        assert_eq!(config.server_addr.port(), 9000);
    }

    #[test]
    fn parses_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("FREEZE_DURATION_SECS", "2.5"),
            ("DIFFICULTY", "hard"),
            ("SCAN_STRIDE", "8"),
        ]))
        .unwrap();
        assert_eq!(config.freeze_duration_ms, 2_500);
        assert_eq!(config.default_difficulty, Difficulty::Hard);
        assert_eq!(config.vision_config().stride, 8);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            Config::from_lookup(lookup(&[("TRACKING_FPS", "fast")])),
            Err(ConfigError::Invalid { key: "TRACKING_FPS", .. })
        ));
        assert!(Config::from_lookup(lookup(&[("SCAN_STRIDE", "0")])).is_err());
        assert!(Config::from_lookup(lookup(&[("SMOOTHING_ALPHA", "1.5")])).is_err());
        assert!(Config::from_lookup(lookup(&[("MOVE_DURATION_SECS", "-1")])).is_err());
        assert!(matches!(
            Config::from_lookup(lookup(&[("SERVER_ADDR", "nowhere")])),
            Err(ConfigError::InvalidAddress)
        ));
    }
}
