//! Per-sprite DMA and rendering state for one of the VIC-II's 8 sprite
//! units.

/// One sprite's DMA/render state.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sprite {
    /// Pointer byte fetched from the last 8 bytes of screen memory
    /// (`$3F8 + n`), times 64 gives the sprite data base address.
    pub data_pointer: u8,
    /// Data counter: byte offset (0-62) into the current sprite's 63-byte
    /// shape, advanced 3 bytes per display line while DMA is active.
    pub mc: u8,
    /// Latched `mc` value at the start of a display line.
    pub mcbase: u8,
    /// Whether this sprite's 2-cycles-per-line DMA is currently running
    /// (turned on when the raster reaches the sprite's Y and it's
    /// enabled; turned off after 21 rows or when disabled).
    pub dma_active: bool,
    /// Whether this sprite is expected to paint on the *current* display
    /// line (distinct from `dma_active`, which can start a line early).
    pub display_active: bool,
    /// Y-expansion row toggle: only load/advance `mc` on alternating
    /// lines when Y-expanded.
    pub expansion_toggle: bool,
    /// Shift register loaded from the 3 fetched data bytes, 24 bits,
    /// MSB-first.
    pub shift: u32,
    /// Number of pixels remaining to shift out this line (accounts for
    /// X-expansion).
    pub pixels_remaining: u8,
}

impl Sprite {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            data_pointer: 0,
            mc: 0,
            mcbase: 0,
            dma_active: false,
            display_active: false,
            expansion_toggle: true,
            shift: 0,
            pixels_remaining: 0,
        }
    }
}
