//! C64 configuration: model selection, ROM images, and the handful of
//! knobs a host sets once at construction time rather than through the
//! command channel.

use mos_vic_ii::Variant as VicVariant;

use crate::bus::BreakpointKind;
use crate::cartridge::Cartridge;

/// C64 model variant — determines VIC-II timing and CPU clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum C64Model {
    /// PAL C64 (6569 VIC-II, 985,248 Hz CPU).
    C64Pal,
    /// NTSC C64 (6567 VIC-II, 1,022,727 Hz CPU).
    C64Ntsc,
}

impl C64Model {
    #[must_use]
    pub const fn vic_variant(self) -> VicVariant {
        match self {
            Self::C64Pal => VicVariant::Pal,
            Self::C64Ntsc => VicVariant::Ntsc,
        }
    }

    /// CPU clock in Hz, used for CIA TOD frequency division and wall-clock
    /// pacing.
    #[must_use]
    pub const fn clock_hz(self) -> u32 {
        match self {
            Self::C64Pal => 985_248,
            Self::C64Ntsc => 1_022_727,
        }
    }

    /// Nominal frame duration for wall-clock pacing.
    #[must_use]
    pub const fn frame_nanos(self) -> u64 {
        match self {
            Self::C64Pal => 20_000_000,
            Self::C64Ntsc => 16_667_000,
        }
    }
}

/// Configuration for constructing a C64 instance.
pub struct C64Config {
    /// Model variant.
    pub model: C64Model,
    /// Kernal ROM (8,192 bytes).
    pub kernal_rom: Vec<u8>,
    /// BASIC ROM (8,192 bytes).
    pub basic_rom: Vec<u8>,
    /// Character ROM (4,096 bytes).
    pub char_rom: Vec<u8>,
    /// Cartridge to attach to the expansion port at construction time, if
    /// any. Use [`crate::c64::C64::attach_cartridge`] to swap one in
    /// later.
    pub cartridge: Option<Cartridge>,
    /// Breakpoints to install before the machine's first cycle.
    pub initial_breakpoints: Vec<(u16, BreakpointKind)>,
    /// Frame interval at which the scheduler takes an automatic snapshot
    /// (`None` disables it). A snapshot at frame 0 never fires; the first
    /// one lands after `interval` frames have completed.
    pub auto_snapshot_interval_frames: Option<u64>,
}

impl C64Config {
    /// A minimal configuration with no cartridge, no breakpoints, and
    /// auto-snapshotting disabled.
    #[must_use]
    pub fn new(model: C64Model, kernal_rom: Vec<u8>, basic_rom: Vec<u8>, char_rom: Vec<u8>) -> Self {
        Self {
            model,
            kernal_rom,
            basic_rom,
            char_rom,
            cartridge: None,
            initial_breakpoints: Vec::new(),
            auto_snapshot_interval_frames: None,
        }
    }
}
