//! MOS 6526 Complex Interface Adapter (CIA).
//!
//! The C64 has two: CIA1 at $DC00 drives the keyboard matrix and
//! joysticks and feeds the CPU's IRQ line; CIA2 at $DD00 drives the IEC
//! serial bus and VIC-II bank select and feeds NMI instead. Both are the
//! same chip — only the wiring differs, which is `emu-c64`'s concern.

mod cia;
mod tod;

pub use cia::{Cia, CiaSnapshot, ICR_ALARM, ICR_FLAG, ICR_IR, ICR_SP, ICR_TA, ICR_TB};
pub use tod::{Tod, TodSnapshot};
