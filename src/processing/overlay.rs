//! Crosshair overlay for packed 24-bit frames

use crate::error::{Error, Result};
use crate::types::{FrameMetadata, BYTES_PER_PIXEL};

/// Pure blue in the chain's byte order
pub const BLUE: [u8; BYTES_PER_PIXEL] = [0, 0, 255];

/// A centered crosshair made of one vertical and one horizontal bar.
///
/// With the defaults, the vertical bar covers rows `h/2-100 .. h/2+100` and
/// columns `w/2-2 .. w/2+2`; the horizontal bar is the same shape rotated.
/// A bar of thickness `t` starts `t/2` pixels before the center line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crosshair {
    /// Distance from the center to the end of each bar, in pixels
    pub arm: u32,
    /// Bar thickness, in pixels
    pub thickness: u32,
    /// Color written to every covered pixel
    pub color: [u8; BYTES_PER_PIXEL],
}

impl Default for Crosshair {
    fn default() -> Self {
        Self {
            arm: 100,
            thickness: 4,
            color: BLUE,
        }
    }
}

impl Crosshair {
    pub fn with_arm(mut self, arm: u32) -> Self {
        self.arm = arm;
        self
    }

    pub fn with_thickness(mut self, thickness: u32) -> Self {
        self.thickness = thickness;
        self
    }

    pub fn with_color(mut self, color: [u8; BYTES_PER_PIXEL]) -> Self {
        self.color = color;
        self
    }

    /// Whether both bars fit along an axis of `len` pixels
    fn fits(&self, len: u32) -> bool {
        let len = u64::from(len);
        let center = len / 2;
        let arm = u64::from(self.arm);
        let thickness = u64::from(self.thickness);
        let start = thickness / 2;
        center >= arm && center + arm <= len && center >= start && center - start + thickness <= len
    }

    /// Check that the crosshair fits the frame described by `metadata` and
    /// that `len` bytes hold the whole frame
    pub fn check(&self, len: usize, metadata: &FrameMetadata) -> Result<()> {
        if self.arm == 0 || self.thickness == 0 {
            return Err(Error::Config(format!(
                "crosshair arm ({}) and thickness ({}) must be non-zero",
                self.arm, self.thickness
            )));
        }
        if !self.fits(metadata.width) || !self.fits(metadata.height) {
            return Err(Error::FrameTooSmall(format!(
                "{} cannot hold a crosshair with arm {} and thickness {}",
                metadata, self.arm, self.thickness
            )));
        }
        match metadata.checked_frame_size() {
            Some(size) if len >= size => Ok(()),
            Some(size) => Err(Error::FrameTooSmall(format!(
                "buffer holds {} bytes, {} needs {}",
                len, metadata, size
            ))),
            None => Err(Error::FrameTooSmall(format!(
                "{} does not fit in memory",
                metadata
            ))),
        }
    }

    /// Paint the crosshair into `buf` in place.
    ///
    /// Nothing is written when the frame is too small or the buffer is short.
    pub fn draw(&self, buf: &mut [u8], metadata: &FrameMetadata) -> Result<()> {
        self.check(buf.len(), metadata)?;

        let cx = (metadata.width / 2) as usize;
        let cy = (metadata.height / 2) as usize;
        let arm = self.arm as usize;
        let thickness = self.thickness as usize;
        let (x0, y0) = (cx - thickness / 2, cy - thickness / 2);

        // vertical bar
        self.fill(buf, metadata, x0..x0 + thickness, cy - arm..cy + arm);
        // horizontal bar
        self.fill(buf, metadata, cx - arm..cx + arm, y0..y0 + thickness);
        Ok(())
    }

    fn fill(
        &self,
        buf: &mut [u8],
        metadata: &FrameMetadata,
        cols: std::ops::Range<usize>,
        rows: std::ops::Range<usize>,
    ) {
        let stride = metadata.stride();
        for y in rows {
            let row = &mut buf[y * stride..];
            let span = &mut row[cols.start * BYTES_PER_PIXEL..cols.end * BYTES_PER_PIXEL];
            for px in span.chunks_exact_mut(BYTES_PER_PIXEL) {
                px.copy_from_slice(&self.color);
            }
        }
    }

    /// Whether pixel `(x, y)` is covered by the crosshair for this frame size
    pub fn covers(&self, metadata: &FrameMetadata, x: usize, y: usize) -> bool {
        let cx = (metadata.width / 2) as usize;
        let cy = (metadata.height / 2) as usize;
        let arm = self.arm as usize;
        let thickness = self.thickness as usize;
        let x0 = cx.saturating_sub(thickness / 2);
        let y0 = cy.saturating_sub(thickness / 2);

        let in_vertical = (x0..x0 + thickness).contains(&x)
            && (cy.saturating_sub(arm)..cy + arm).contains(&y);
        let in_horizontal = (cx.saturating_sub(arm)..cx + arm).contains(&x)
            && (y0..y0 + thickness).contains(&y);
        in_vertical || in_horizontal
    }
}
