//! A cycle-accurate Commodore 64: CPU, VIC-II, two CIAs, memory banking,
//! and the scheduler that ties them together into a runnable system.

mod bus;
mod c64;
mod cartridge;
mod command;
mod config;
mod error;
mod input;
mod joystick;
mod keyboard;
mod memory;
mod message;
mod palette;
mod prg;
mod sid;
mod snapshot;

pub use bus::{BreakpointKind, BusSnapshot, C64Bus};
pub use c64::{RunOutcome, C64};
pub use cartridge::Cartridge;
pub use command::{Command, CommandQueue, CommandResponse};
pub use config::{C64Config, C64Model};
pub use error::LoaderError;
pub use input::{C64Key, InputEvent, InputQueue};
pub use joystick::{JoystickPort, JoystickState};
pub use keyboard::KeyboardMatrix;
pub use memory::{C64Memory, MemorySnapshot};
pub use message::{Message, MessageQueue};
pub use palette::{to_argb32, PALETTE};
pub use prg::load_prg;
pub use sid::Sid;
pub use snapshot::Snapshot;
