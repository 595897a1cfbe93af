//! C64 bus: memory and I/O routing.
//!
//! Implements `emu_core::Bus` for the C64. Routes CPU addresses through
//! the memory banking logic and I/O chip mapping. The C64 is fully
//! memory-mapped — there is no separate I/O address space, so the 6510
//! `io_read`/`io_write` methods are unused.

use emu_core::{Bus, ReadResult};
use mos_cia_6526::{Cia, CiaSnapshot};
use mos_vic_ii::{VicII, VicMemory, VicSnapshot};

use crate::joystick::JoystickState;
use crate::keyboard::KeyboardMatrix;
use crate::memory::{C64Memory, MemorySnapshot};
use crate::sid::Sid;

/// Per-address breakpoint tag consulted by the CPU before fetching the
/// next opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakpointKind {
    Hard,
    Soft,
}

/// The C64 bus, owning every chip by value.
pub struct C64Bus {
    pub memory: C64Memory,
    pub vic: VicII,
    pub sid: Sid,
    pub cia1: Cia,
    pub cia2: Cia,
    pub keyboard: KeyboardMatrix,
    pub joystick1: JoystickState,
    pub joystick2: JoystickState,
    breakpoints: std::collections::HashMap<u16, BreakpointKind>,
}

impl C64Bus {
    #[must_use]
    pub fn new(memory: C64Memory, vic: VicII, clock_hz: u32) -> Self {
        Self {
            memory,
            vic,
            sid: Sid::new(),
            cia1: Cia::new(clock_hz),
            cia2: Cia::new(clock_hz),
            keyboard: KeyboardMatrix::new(),
            joystick1: JoystickState::new(),
            joystick2: JoystickState::new(),
            breakpoints: std::collections::HashMap::new(),
        }
    }

    /// Update the VIC-II bank from CIA2 port A bits 0-1 (inverted).
    pub fn update_vic_bank(&mut self) {
        let pa = self.cia2.port_a_output();
        let bank = (!pa) & 0x03;
        self.vic.set_bank(bank);
    }

    /// Refresh the keyboard/joystick shadows CIA1/CIA2 read through their
    /// `external_a`/`external_b` pins, ahead of a port read.
    fn sync_input_shadows(&mut self) {
        let col_mask = self.cia1.port_a_output() & self.joystick2.mask();
        self.cia1.external_b = self.keyboard.scan(col_mask) & self.joystick2.mask();
        self.cia1.external_a = self.joystick2.mask();
        self.cia2.external_a = 0xC0 | (self.joystick1.mask() & 0x3F);
    }

    /// Hard reset: reset every chip's internal state but leave RAM, ROM
    /// images, the attached cartridge, and breakpoints untouched — those
    /// aren't part of what a real RES line clears.
    pub fn reset(&mut self) {
        self.memory.reset();
        self.vic.reset();
        self.sid = Sid::new();
        self.cia1.reset();
        self.cia2.reset();
        self.keyboard.release_all();
        self.joystick1 = JoystickState::new();
        self.joystick2 = JoystickState::new();
        self.update_vic_bank();
    }

    /// Full internal state, for snapshotting.
    #[must_use]
    pub fn snapshot(&self) -> BusSnapshot {
        BusSnapshot {
            memory: self.memory.snapshot(),
            vic: self.vic.snapshot(),
            sid: self.sid.snapshot(),
            cia1: self.cia1.snapshot(),
            cia2: self.cia2.snapshot(),
        }
    }

    pub fn restore(&mut self, s: &BusSnapshot) {
        self.memory.restore(&s.memory);
        self.vic.restore(&s.vic);
        self.sid.restore(s.sid);
        self.cia1.restore(&s.cia1);
        self.cia2.restore(&s.cia2);
    }

    pub fn set_breakpoint(&mut self, addr: u16, kind: BreakpointKind) {
        self.breakpoints.insert(addr, kind);
    }

    pub fn clear_breakpoint(&mut self, addr: u16) {
        self.breakpoints.remove(&addr);
    }

    /// Consult and consume a breakpoint tag for `addr`: HARD leaves the
    /// tag in place and the caller should suspend; SOFT is cleared
    /// before continuing.
    pub fn check_breakpoint(&mut self, addr: u16) -> Option<BreakpointKind> {
        match self.breakpoints.get(&addr).copied() {
            Some(BreakpointKind::Hard) => Some(BreakpointKind::Hard),
            Some(BreakpointKind::Soft) => {
                self.breakpoints.remove(&addr);
                Some(BreakpointKind::Soft)
            }
            None => None,
        }
    }

    fn io_read(&mut self, addr16: u16) -> u8 {
        match addr16 {
            0xD000..=0xD3FF => self.vic.read_and_clear((addr16 & 0x3F) as u8),
            0xD400..=0xD7FF => self.sid.read((addr16 & 0x1F) as u8),
            0xD800..=0xDBFF => self.memory.colour_ram_read(addr16 - 0xD800),
            0xDC00..=0xDCFF => {
                let reg = (addr16 & 0x0F) as u8;
                self.sync_input_shadows();
                self.cia1.read(reg)
            }
            0xDD00..=0xDDFF => {
                let reg = (addr16 & 0x0F) as u8;
                self.sync_input_shadows();
                self.cia2.read(reg)
            }
            0xDE00..=0xDFFF => 0xFF,
            _ => 0xFF,
        }
    }

    fn io_write_at(&mut self, addr16: u16, value: u8) {
        match addr16 {
            0xD000..=0xD3FF => self.vic.write((addr16 & 0x3F) as u8, value),
            0xD400..=0xD7FF => self.sid.write((addr16 & 0x1F) as u8, value),
            0xD800..=0xDBFF => self.memory.colour_ram_write(addr16 - 0xD800, value),
            0xDC00..=0xDCFF => self.cia1.write((addr16 & 0x0F) as u8, value),
            0xDD00..=0xDDFF => {
                self.cia2.write((addr16 & 0x0F) as u8, value);
                if (addr16 & 0x0F) == 0x00 || (addr16 & 0x0F) == 0x02 {
                    self.update_vic_bank();
                }
            }
            0xDE00..=0xDFFF => {}
            _ => {}
        }
    }
}

/// Plain-data copy of every chip's live state, for snapshot save/restore.
/// The keyboard matrix, joystick shadows, and breakpoint table are
/// deliberately excluded — they're host-owned input/debug state, not
/// part of the simulated machine.
pub struct BusSnapshot {
    pub memory: MemorySnapshot,
    pub vic: VicSnapshot,
    pub sid: [u8; 29],
    pub cia1: CiaSnapshot,
    pub cia2: CiaSnapshot,
}

impl Bus for C64Bus {
    fn read(&mut self, addr: u32) -> ReadResult {
        let addr16 = addr as u16;

        let data = if (0xD000..=0xDFFF).contains(&addr16) && self.memory.is_io_visible() {
            self.io_read(addr16)
        } else {
            self.memory.cpu_read(addr16)
        };
        self.memory.set_bus_floating(data);
        ReadResult::new(data)
    }

    fn write(&mut self, addr: u32, value: u8) -> u8 {
        let addr16 = addr as u16;

        self.memory.cpu_write(addr16, value);

        if (0xD000..=0xDFFF).contains(&addr16) && self.memory.is_io_visible() {
            self.io_write_at(addr16, value);
        }
        self.memory.set_bus_floating(value);

        0
    }

    fn peek(&self, addr: u32) -> u8 {
        let addr16 = addr as u16;
        if (0xD000..=0xDFFF).contains(&addr16) && self.memory.is_io_visible() {
            match addr16 {
                0xD000..=0xD3FF => self.vic.peek((addr16 & 0x3F) as u8),
                0xD400..=0xD7FF => self.sid.read((addr16 & 0x1F) as u8),
                0xD800..=0xDBFF => self.memory.colour_ram_read(addr16 - 0xD800),
                0xDC00..=0xDCFF => self.cia1.peek((addr16 & 0x0F) as u8),
                0xDD00..=0xDDFF => self.cia2.peek((addr16 & 0x0F) as u8),
                _ => 0xFF,
            }
        } else {
            self.memory.peek(addr16)
        }
    }

    fn io_read(&mut self, _addr: u32) -> ReadResult {
        ReadResult::new(0xFF)
    }

    fn io_write(&mut self, _addr: u32, _value: u8) -> u8 {
        0
    }
}

/// Wire [`C64Memory`] as the VIC's memory port directly, for call sites
/// that need an `&impl VicMemory` without going through the full bus
/// (the scheduler's `vic.tick` call happens before the CPU's cycle, so
/// it borrows `memory` without the rest of the bus).
impl VicMemory for C64Bus {
    fn vic_peek(&self, bank: u8, addr: u16) -> u8 {
        self.memory.vic_peek(bank, addr)
    }

    fn color_ram_peek(&self, offset: u16) -> u8 {
        self.memory.color_ram_peek(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mos_vic_ii::Variant;

    fn make_bus() -> C64Bus {
        let kernal = vec![0xEE; 8192];
        let basic = vec![0xBB; 8192];
        let chargen = vec![0xCC; 4096];
        let memory = C64Memory::new(&kernal, &basic, &chargen).expect("valid ROM sizes");
        C64Bus::new(memory, VicII::new(Variant::Pal), 985_248)
    }

    #[test]
    fn ram_read_write() {
        let mut bus = make_bus();
        bus.write(0x8000, 0xAB);
        assert_eq!(bus.read(0x8000).data, 0xAB);
    }

    #[test]
    fn vic_register_access() {
        let mut bus = make_bus();
        bus.write(0xD020, 0x06);
        assert_eq!(bus.read(0xD020).data, 0x06);
    }

    #[test]
    fn colour_ram_access() {
        let mut bus = make_bus();
        bus.write(0xD800, 0x05);
        assert_eq!(bus.read(0xD800).data, 0x05);
    }

    #[test]
    fn cia1_register_access() {
        let mut bus = make_bus();
        bus.write(0xDC02, 0xFF);
        assert_eq!(bus.read(0xDC02).data, 0xFF);
    }

    #[test]
    fn cia2_bank_updates_vic() {
        let mut bus = make_bus();
        bus.write(0xDD02, 0x03);
        bus.write(0xDD00, 0x01);
        assert_eq!(bus.vic.bank(), 2);
    }

    #[test]
    fn io_expansion_returns_ff() {
        let mut bus = make_bus();
        assert_eq!(bus.read(0xDE00).data, 0xFF);
    }

    #[test]
    fn breakpoint_soft_clears_after_check() {
        let mut bus = make_bus();
        bus.set_breakpoint(0x1000, BreakpointKind::Soft);
        assert_eq!(bus.check_breakpoint(0x1000), Some(BreakpointKind::Soft));
        assert_eq!(bus.check_breakpoint(0x1000), None);
    }

    #[test]
    fn breakpoint_hard_persists() {
        let mut bus = make_bus();
        bus.set_breakpoint(0x1000, BreakpointKind::Hard);
        assert_eq!(bus.check_breakpoint(0x1000), Some(BreakpointKind::Hard));
        assert_eq!(bus.check_breakpoint(0x1000), Some(BreakpointKind::Hard));
    }
}
