//! Frame processing module
//!
//! In-place operations applied to imported frames before they are pushed
//! back into the import chain:
//! - Crosshair overlay

pub mod overlay;

pub use overlay::Crosshair;

use crate::error::Result;
use crate::types::Frame;

/// Apply the default processing to a frame
pub fn process_frame(frame: &mut Frame, crosshair: &Crosshair) -> Result<()> {
    crosshair.draw(&mut frame.buffer, &frame.metadata)
}
