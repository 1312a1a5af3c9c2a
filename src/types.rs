//! Common types used throughout imagefilter

use serde::{Deserialize, Serialize};
use std::ops::{Deref, DerefMut};

/// Bytes per pixel of the packed 24-bit frames exchanged between chains
pub const BYTES_PER_PIXEL: usize = 3;

/// Image metadata attached to every exported/imported buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FrameMetadata {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Bytes appended to each row beyond `width * BYTES_PER_PIXEL`
    #[serde(default)]
    pub padding: u32,
}

impl FrameMetadata {
    pub const fn new(width: u32, height: u32, padding: u32) -> Self {
        Self {
            width,
            height,
            padding,
        }
    }

    /// Row stride in bytes
    pub fn stride(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL + self.padding as usize
    }

    /// Total frame size in bytes, padding included
    pub fn frame_size(&self) -> usize {
        self.stride() * self.height as usize
    }

    /// Like [`frame_size`](Self::frame_size), `None` if it overflows `usize`
    pub fn checked_frame_size(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(BYTES_PER_PIXEL)?
            .checked_add(self.padding as usize)?
            .checked_mul(self.height as usize)
    }

    /// Byte offset of pixel `(x, y)`
    pub fn pixel_offset(&self, x: usize, y: usize) -> usize {
        y * self.stride() + x * BYTES_PER_PIXEL
    }
}

impl std::fmt::Display for FrameMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}+{}", self.width, self.height, self.padding)
    }
}

/// A buffer lent by an import chain's pool.
///
/// The handle is moved back into the chain through either
/// [`Chain::release_buffer`](crate::sdk::Chain::release_buffer) or
/// [`Chain::push_import_buffer`](crate::sdk::Chain::push_import_buffer), so a
/// buffer cannot be returned twice.
#[derive(Debug)]
pub struct ImportBuffer {
    slot: usize,
    data: Box<[u8]>,
}

impl ImportBuffer {
    /// Wrap pool memory identified by `slot`
    pub fn new(slot: usize, data: Box<[u8]>) -> Self {
        Self { slot, data }
    }

    /// A zero-capacity buffer, handed out when the pool has nothing free
    pub fn empty() -> Self {
        Self {
            slot: usize::MAX,
            data: Box::default(),
        }
    }

    /// Pool slot this buffer belongs to
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Capacity in bytes
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Give the memory back to the pool that owns it
    pub fn into_inner(self) -> (usize, Box<[u8]>) {
        (self.slot, self.data)
    }
}

impl Deref for ImportBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl DerefMut for ImportBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

/// A filled import buffer together with the metadata describing its contents
#[derive(Debug)]
pub struct Frame {
    pub buffer: ImportBuffer,
    pub metadata: FrameMetadata,
}

impl Frame {
    pub fn new(buffer: ImportBuffer, metadata: FrameMetadata) -> Self {
        Self { buffer, metadata }
    }

    /// Read pixel `(x, y)`
    pub fn pixel(&self, x: usize, y: usize) -> [u8; BYTES_PER_PIXEL] {
        let offset = self.metadata.pixel_offset(x, y);
        [
            self.buffer[offset],
            self.buffer[offset + 1],
            self.buffer[offset + 2],
        ]
    }
}

/// Statistics for monitoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    /// Frames delivered by the export chain
    pub frames_exported: u64,
    /// Frames copied into an import buffer and handed to the main loop
    pub frames_forwarded: u64,
    /// Frames dropped (no buffer, buffer too small, or overwritten in the mailbox)
    pub frames_dropped: u64,
    /// Frames that received the crosshair
    pub frames_overlaid: u64,
    /// Frames pushed into the import chain
    pub frames_pushed: u64,
}
