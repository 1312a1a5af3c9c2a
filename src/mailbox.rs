//! Single-slot frame mailbox
//!
//! Hands frames from the export callback thread to the main loop. Holds at
//! most one frame; a new frame replaces one that was not collected in time.

use crate::types::Frame;
use parking_lot::{Condvar, Mutex};
use std::time::Duration;

/// Most-recent-wins handoff between one producer and one consumer
#[derive(Debug, Default)]
pub struct FrameMailbox {
    slot: Mutex<Option<Frame>>,
    ready: Condvar,
}

impl FrameMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a frame and wake the consumer.
    ///
    /// Returns the frame it replaced, if the consumer had not taken it yet.
    /// The caller owns that frame's buffer and must give it back.
    pub fn put(&self, frame: Frame) -> Option<Frame> {
        let stale = self.slot.lock().replace(frame);
        self.ready.notify_one();
        stale
    }

    /// Take the frame if one is waiting
    pub fn try_take(&self) -> Option<Frame> {
        self.slot.lock().take()
    }

    /// Wait up to `timeout` for a frame, then take it and clear the slot
    pub fn take_timeout(&self, timeout: Duration) -> Option<Frame> {
        let mut slot = self.slot.lock();
        if slot.is_none() {
            self.ready
                .wait_while_for(&mut slot, |slot| slot.is_none(), timeout);
        }
        slot.take()
    }

    pub fn is_empty(&self) -> bool {
        self.slot.lock().is_none()
    }
}
