/// The view of system memory the VIC-II reads through during its own DMA
/// cycles: a fixed 16 KiB bank selected externally (by CIA2 port A bits
/// 0-1), with the character ROM shadowed in at `$1000-$1FFF` of banks 0
/// and 2 regardless of what the CPU currently has banked in at `$D000`.
///
/// Implementors must never let this path observe or disturb CPU-visible
/// I/O chip state (ICR clears, etc.) — it is always a `peek`.
pub trait VicMemory {
    /// Reads `addr` (0..=0x3FFF) within the given 16 KiB `bank` (0-3).
    fn vic_peek(&self, bank: u8, addr: u16) -> u8;

    /// Reads one nibble of colour RAM (`offset` 0..=999), which sits
    /// outside the bank-switched 16 KiB window at a fixed location and
    /// is wired directly to the VIC regardless of `CIA2` bank select.
    fn color_ram_peek(&self, offset: u16) -> u8;
}
