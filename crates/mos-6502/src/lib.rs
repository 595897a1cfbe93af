//! Cycle-accurate NMOS 6510 interpreter.
//!
//! The 6510 is the 6502 core used in the C64, with an added 6-bit I/O
//! port at $00/$01 (the memory side of that port lives in `emu-c64`; this
//! crate only interprets instructions and drives the bus).

mod cpu;
mod flags;
mod registers;

pub use cpu::{Mos6502, Mos6502Snapshot};
pub use flags::Status;
pub use registers::Registers;
