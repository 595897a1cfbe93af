//! Cartridge port state.
//!
//! On-disk container formats (CRT and friends) are out of scope; this
//! module only models what the bus banking logic and the bank-config
//! table in [`crate::memory`] need: the GAME/EXROM lines and the ROML/
//! ROMH images they expose at $8000 and $A000/$E000.

/// A cartridge attached to the expansion port.
///
/// `game`/`exrom` are the active-low lines as the hardware exposes them:
/// `false` means the line is asserted. With no cartridge attached both
/// read `true` (deasserted), which is the "no cartridge" row of the
/// bank-config table.
#[derive(Debug, Clone)]
pub struct Cartridge {
    pub game: bool,
    pub exrom: bool,
    /// 8 KiB ROM image visible at $8000-$9FFF when banked in.
    pub roml: Vec<u8>,
    /// 8 KiB ROM image visible at $A000-$BFFF (GAME=1) or $E000-$FFFF
    /// (ultimax, GAME=0) when banked in.
    pub romh: Vec<u8>,
}

impl Cartridge {
    /// A plain 16K cartridge (`GAME=0, EXROM=0`): both ROML and ROMH
    /// banked in, no bankswitching.
    #[must_use]
    pub fn cartridge_16k(roml: Vec<u8>, romh: Vec<u8>) -> Self {
        Self {
            game: false,
            exrom: false,
            roml,
            romh,
        }
    }

    /// An 8K cartridge (`GAME=1, EXROM=0`): only ROML banked in.
    #[must_use]
    pub fn cartridge_8k(roml: Vec<u8>) -> Self {
        Self {
            game: true,
            exrom: false,
            roml,
            romh: Vec::new(),
        }
    }

    #[must_use]
    pub fn read_roml(&self, offset: u16) -> u8 {
        self.roml.get(offset as usize).copied().unwrap_or(0xFF)
    }

    #[must_use]
    pub fn read_romh(&self, offset: u16) -> u8 {
        self.romh.get(offset as usize).copied().unwrap_or(0xFF)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cartridge_16k_exposes_both_lines() {
        let cart = Cartridge::cartridge_16k(vec![1; 8192], vec![2; 8192]);
        assert!(!cart.game);
        assert!(!cart.exrom);
        assert_eq!(cart.read_roml(0), 1);
        assert_eq!(cart.read_romh(0), 2);
    }

    #[test]
    fn cartridge_8k_has_no_romh() {
        let cart = Cartridge::cartridge_8k(vec![9; 8192]);
        assert!(cart.game);
        assert_eq!(cart.read_romh(0), 0xFF);
    }
}
