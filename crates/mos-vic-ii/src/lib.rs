//! MOS 6567/6569 (VIC-II) video chip.
//!
//! Renders into an indexed-color framebuffer (palette index 0-15, not
//! ARGB32) so this crate stays decoupled from any particular palette or
//! pixel format; `emu-c64` owns the RGB conversion.

mod memory;
mod sprite;
mod vic;

pub use memory::VicMemory;
pub use sprite::Sprite;
pub use vic::{Variant, VicII, VicSnapshot};
