//! Frame source abstraction over the camera capture client

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::vision::{Frame, FrameError};

/// Readiness of the capture device as reported by the capture client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CaptureStatus {
    /// No frame or status received yet (awaiting camera permission)
    Pending,
    /// Frames are flowing
    Ready,
    /// Permission denied or device error
    Unavailable { reason: String },
}

impl CaptureStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, CaptureStatus::Ready)
    }
}

/// A source of timestamped color frames
pub trait FrameSource: Send + Sync {
    /// Current readiness
    fn status(&self) -> CaptureStatus;

    /// Most recent frame, if the source is ready
    fn latest(&self) -> Option<Frame>;
}

struct Slot {
    status: CaptureStatus,
    frame: Option<Frame>,
}

/// Frame source fed by pushes from the capture client
pub struct SharedFrameSource {
    expected_width: u32,
    expected_height: u32,
    next_seq: AtomicU64,
    slot: Mutex<Slot>,
}

impl SharedFrameSource {
    pub fn new(expected_width: u32, expected_height: u32) -> Self {
        Self {
            expected_width,
            expected_height,
            next_seq: AtomicU64::new(1),
            slot: Mutex::new(Slot {
                status: CaptureStatus::Pending,
                frame: None,
            }),
        }
    }

    pub fn expected_size(&self) -> (u32, u32) {
        (self.expected_width, self.expected_height)
    }

    /// Store a raw RGBA frame as the latest image; marks the source ready
    pub fn push_rgba(&self, width: u32, height: u32, pixels: Bytes) -> Result<u64, FrameError> {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let frame = Frame::from_rgba(seq, width, height, pixels)?;
        self.push(frame);
        Ok(seq)
    }

    pub fn push(&self, frame: Frame) {
        if frame.width != self.expected_width || frame.height != self.expected_height {
            warn!(
                width = frame.width,
                height = frame.height,
                expected_width = self.expected_width,
                expected_height = self.expected_height,
                "Frame size differs from configured capture size"
            );
        }

        let mut slot = self.slot.lock();
        if !slot.status.is_ready() {
            info!("Capture source ready");
        }
        slot.status = CaptureStatus::Ready;
        slot.frame = Some(frame);
    }

    /// Record a capture failure; the last frame is dropped
    pub fn mark_unavailable(&self, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(reason = %reason, "Capture source unavailable");
        let mut slot = self.slot.lock();
        slot.status = CaptureStatus::Unavailable { reason };
        slot.frame = None;
    }

    /// Back to awaiting permission, e.g. when the capture client reconnects
    pub fn mark_pending(&self) {
        let mut slot = self.slot.lock();
        slot.status = CaptureStatus::Pending;
        slot.frame = None;
    }
}

impl FrameSource for SharedFrameSource {
    fn status(&self) -> CaptureStatus {
        self.slot.lock().status.clone()
    }

    fn latest(&self) -> Option<Frame> {
        let slot = self.slot.lock();
        if slot.status.is_ready() {
            slot.frame.clone()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_pending_without_frames() {
        let source = SharedFrameSource::new(4, 4);
        assert_eq!(source.status(), CaptureStatus::Pending);
        assert!(source.latest().is_none());
    }

    #[test]
    fn push_makes_ready_and_assigns_increasing_seq() {
        let source = SharedFrameSource::new(2, 2);
        let a = source.push_rgba(2, 2, Bytes::from(vec![0u8; 16])).unwrap();
        let b = source.push_rgba(2, 2, Bytes::from(vec![0u8; 16])).unwrap();
        assert!(b > a);
        assert!(source.status().is_ready());
        assert_eq!(source.latest().map(|f| f.seq), Some(b));
    }

    #[test]
    fn bad_buffer_leaves_state_untouched() {
        let source = SharedFrameSource::new(2, 2);
        assert!(source.push_rgba(2, 2, Bytes::from(vec![0u8; 3])).is_err());
        assert_eq!(source.status(), CaptureStatus::Pending);
    }

    #[test]
    fn unavailable_hides_frames() {
        let source = SharedFrameSource::new(2, 2);
        source.push_rgba(2, 2, Bytes::from(vec![0u8; 16])).unwrap();
        source.mark_unavailable("permission denied");
        assert!(source.latest().is_none());
        assert_eq!(
            source.status(),
            CaptureStatus::Unavailable {
                reason: "permission denied".to_string()
            }
        );
    }
}
