//! Top-level C64 system: the master scheduler tying every chip together.
//!
//! # Tick loop
//!
//! Each master cycle ticks, in order: VIC-II (beam advance, rendering,
//! badline detection), CIA1 (unless idle-sleeping), CIA2 (unless
//! idle-sleeping), then the CPU (unless VIC-II is holding RDY low for a
//! badline or sprite DMA slot). IRQ/NMI lines are latched from VIC-II and
//! CIA1 (IRQ) and CIA2 (NMI) right before the CPU tick so a poll inside
//! that tick sees this cycle's state.

use std::time::{Duration, Instant};

use emu_core::{Bus, Cpu, Observable, Value};
use mos_6502::Mos6502;
use mos_vic_ii::VicII;

use crate::bus::{BreakpointKind, C64Bus};
use crate::cartridge::Cartridge;
use crate::command::{Command, CommandQueue, CommandResponse};
use crate::config::{C64Config, C64Model};
use crate::error::LoaderError;
use crate::input::{C64Key, InputQueue};
use crate::joystick::{JoystickPort, JoystickState};
use crate::memory::C64Memory;
use crate::message::{Message, MessageQueue};
use crate::palette;
use crate::snapshot::Snapshot;

/// What stopped the scheduler's inner loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Ran to completion (a full frame, or one CPU instruction for `step`).
    Ok,
    /// The suspend counter was nonzero, or a breakpoint fired.
    Suspended,
    /// The CPU executed a JAM opcode.
    Jammed,
}

/// The C64 system: CPU, bus, and the scheduler state around them.
pub struct C64 {
    cpu: Mos6502,
    bus: C64Bus,
    model: C64Model,

    /// Master clock: counts CPU cycles since construction or last reset.
    master_clock: u64,
    frame_count: u64,

    input_queue: InputQueue,
    commands: CommandQueue,
    responses: std::collections::VecDeque<CommandResponse>,
    messages: MessageQueue,

    suspend_count: u32,
    warp: bool,
    always_warp: bool,
    warp_load: bool,

    auto_snapshot_interval_frames: Option<u64>,
    last_auto_snapshot: Option<Vec<u8>>,
}

impl C64 {
    /// Build a C64 from a configuration: validates ROM sizes, wires up
    /// the default CIA port directions for keyboard scanning and VIC bank
    /// selection, attaches a cartridge if one was configured, and loads
    /// the CPU's PC from the reset vector.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::RomSize`] if any ROM image is the wrong size.
    pub fn new(config: C64Config) -> Result<Self, LoaderError> {
        let memory = C64Memory::new(&config.kernal_rom, &config.basic_rom, &config.char_rom)?;
        let mut bus = C64Bus::new(memory, VicII::new(config.model.vic_variant()), config.model.clock_hz());

        if let Some(cartridge) = config.cartridge {
            bus.memory.attach_cartridge(cartridge);
        }

        // CIA1: port A drives the keyboard column select (output), port B
        // reads the row result (input).
        bus.cia1.write(0x02, 0xFF);
        bus.cia1.write(0x03, 0x00);
        bus.cia1.write(0x00, 0xFF);

        // CIA2: port A bits 0-1 select the VIC bank (output), default bank 0.
        bus.cia2.write(0x02, 0x03);
        bus.cia2.write(0x00, 0x03);
        bus.update_vic_bank();

        for (addr, kind) in config.initial_breakpoints {
            bus.set_breakpoint(addr, kind);
        }

        let mut cpu = Mos6502::new();
        cpu.reset(&mut bus);

        Ok(Self {
            cpu,
            bus,
            model: config.model,
            master_clock: 0,
            frame_count: 0,
            input_queue: InputQueue::new(),
            commands: CommandQueue::new(),
            responses: std::collections::VecDeque::new(),
            messages: MessageQueue::default(),
            suspend_count: 0,
            warp: false,
            always_warp: false,
            warp_load: false,
            auto_snapshot_interval_frames: config.auto_snapshot_interval_frames,
            last_auto_snapshot: None,
        })
    }

    /// Hard reset. The reset vector is re-read from the (unmodified)
    /// Kernal ROM, so this is idempotent: resetting twice in a row leaves
    /// the same CPU and chip state both times.
    pub fn reset(&mut self) {
        self.bus.reset();
        self.cpu.reset(&mut self.bus);
        self.messages.push(Message::Reset);
    }

    // -- scheduling ---------------------------------------------------

    /// Advance by exactly one master cycle. Does not process commands,
    /// check breakpoints, or report messages — callers that need those
    /// should go through [`Self::run_frame`] or [`Self::step`].
    fn tick_one_cycle(&mut self) {
        self.master_clock += 1;

        let cpu_stall = {
            let bus = &mut self.bus;
            bus.vic.tick(&bus.memory)
        };

        if self.bus.cia1.next_wake(self.master_clock).map_or(true, |w| w <= self.master_clock) {
            self.bus.cia1.tick(true, true);
        }
        if self.bus.cia2.next_wake(self.master_clock).map_or(true, |w| w <= self.master_clock) {
            self.bus.cia2.tick(true, true);
        }

        self.cpu.set_irq_line(self.bus.vic.irq_active() || self.bus.cia1.irq_active());
        self.cpu.set_nmi_line(self.bus.cia2.irq_active());

        if !cpu_stall {
            self.cpu.tick(&mut self.bus);
        }
    }

    /// One master cycle plus the bookkeeping around an instruction
    /// boundary: breakpoint check and command-channel drain, both of
    /// which only make sense when the CPU is between instructions.
    fn drive_one_cycle(&mut self) -> RunOutcome {
        self.tick_one_cycle();

        if self.cpu.is_halted() {
            self.messages.push(Message::CpuJam {
                pc: self.cpu.pc() as u16,
            });
            return RunOutcome::Jammed;
        }

        if self.cpu.is_instruction_complete() {
            let pc = self.cpu.pc() as u16;
            if let Some(kind) = self.bus.check_breakpoint(pc) {
                self.messages.push(Message::Breakpoint {
                    addr: pc,
                    hard: matches!(kind, BreakpointKind::Hard),
                });
                return RunOutcome::Suspended;
            }
            self.process_commands();
        }

        RunOutcome::Ok
    }

    /// Run until the VIC-II completes a frame, a breakpoint fires, the
    /// CPU jams, or the suspend counter is nonzero.
    pub fn run_frame(&mut self) -> RunOutcome {
        loop {
            if self.suspend_count > 0 {
                return RunOutcome::Suspended;
            }
            match self.drive_one_cycle() {
                RunOutcome::Ok => {}
                other => return other,
            }
            if self.bus.vic.take_frame_ready() {
                self.frame_count += 1;
                self.messages.push(Message::Frame { frame: self.frame_count });
                self.input_queue.process(self.frame_count, &mut self.bus.keyboard);
                self.maybe_auto_snapshot();
                return RunOutcome::Ok;
            }
        }
    }

    /// Run a frame, then sleep for whatever's left of the model's nominal
    /// frame duration — unless warp (any of the three flags) is active.
    /// If the frame itself overran the budget, no attempt is made to
    /// catch up; frames are simply dropped against wall-clock time.
    pub fn run_frame_paced(&mut self) -> RunOutcome {
        let start = Instant::now();
        let outcome = self.run_frame();
        if matches!(outcome, RunOutcome::Ok) && !self.warp && !self.always_warp && !self.warp_load {
            let budget = Duration::from_nanos(self.model.frame_nanos());
            let elapsed = start.elapsed();
            if elapsed < budget {
                std::thread::sleep(budget - elapsed);
            }
        }
        outcome
    }

    /// Run exactly one CPU instruction (a variable number of master
    /// cycles), or stop early on a breakpoint or jam.
    pub fn step(&mut self) -> RunOutcome {
        loop {
            match self.drive_one_cycle() {
                RunOutcome::Ok => {
                    if self.cpu.is_instruction_complete() {
                        return RunOutcome::Ok;
                    }
                }
                other => return other,
            }
        }
    }

    fn maybe_auto_snapshot(&mut self) {
        let Some(interval) = self.auto_snapshot_interval_frames else {
            return;
        };
        if interval == 0 || self.frame_count % interval != 0 {
            return;
        }
        self.last_auto_snapshot = Some(self.snapshot().to_bytes());
        self.messages.push(Message::AutoSnapshot { frame: self.frame_count });
    }

    /// The most recent auto-snapshot taken, if the interval has elapsed
    /// at least once since construction or the last call to this method.
    pub fn take_last_auto_snapshot(&mut self) -> Option<Vec<u8>> {
        self.last_auto_snapshot.take()
    }

    // -- suspend / resume ----------------------------------------------

    pub fn suspend(&mut self) {
        self.suspend_count += 1;
    }

    pub fn resume(&mut self) {
        self.suspend_count = self.suspend_count.saturating_sub(1);
    }

    #[must_use]
    pub const fn is_suspended(&self) -> bool {
        self.suspend_count > 0
    }

    pub fn set_warp(&mut self, warp: bool) {
        self.warp = warp;
    }

    pub fn set_always_warp(&mut self, always_warp: bool) {
        self.always_warp = always_warp;
    }

    /// Nothing in this crate sets this automatically — it exists for a
    /// future IEC/drive port to assert while the serial bus is busy.
    /// Until then it behaves exactly like [`Self::set_warp`].
    pub fn set_warp_load(&mut self, warp_load: bool) {
        self.warp_load = warp_load;
    }

    // -- commands / messages --------------------------------------------

    pub fn push_command(&mut self, command: Command) {
        self.commands.push(command);
    }

    /// Drain every response produced since the last call, in command
    /// arrival order.
    pub fn take_responses(&mut self) -> Vec<CommandResponse> {
        self.responses.drain(..).collect()
    }

    /// Drain every message reported since the last call, in arrival order.
    pub fn drain_messages(&mut self) -> Vec<Message> {
        self.messages.drain()
    }

    fn process_commands(&mut self) {
        while let Some(command) = self.commands.pop() {
            let response = self.handle_command(command);
            self.responses.push_back(response);
        }
    }

    fn handle_command(&mut self, command: Command) -> CommandResponse {
        match command {
            Command::Suspend => {
                self.suspend();
                CommandResponse::Ack
            }
            Command::Resume => {
                self.resume();
                CommandResponse::Ack
            }
            Command::Query(path) => self
                .query(&path)
                .map_or_else(|| CommandResponse::Error(format!("unknown path: {path}")), CommandResponse::Value),
            Command::Poke { addr, value } => {
                self.bus.write(u32::from(addr), value);
                CommandResponse::Ack
            }
            Command::Peek { addr } => CommandResponse::Byte(self.bus.peek(u32::from(addr))),
            Command::SetBreakpoint { addr, kind } => {
                self.bus.set_breakpoint(addr, kind);
                CommandResponse::Ack
            }
            Command::ClearBreakpoint { addr } => {
                self.bus.clear_breakpoint(addr);
                CommandResponse::Ack
            }
            Command::TakeSnapshot => CommandResponse::Snapshot(self.snapshot().to_bytes()),
            Command::RestoreSnapshot(bytes) => match Snapshot::from_bytes(&bytes) {
                Ok(s) => {
                    self.restore(&s);
                    CommandResponse::Ack
                }
                Err(e) => CommandResponse::Error(e.to_string()),
            },
            Command::Reset => {
                self.reset();
                CommandResponse::Ack
            }
            Command::PressKey(key) => {
                self.press_key(key);
                CommandResponse::Ack
            }
            Command::ReleaseKey(key) => {
                self.release_key(key);
                CommandResponse::Ack
            }
            Command::Step => {
                self.step();
                CommandResponse::Ack
            }
        }
    }

    // -- snapshotting ----------------------------------------------------

    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            cycle: self.master_clock,
            frame: self.frame_count,
            cpu: self.cpu.snapshot(),
            bus: self.bus.snapshot(),
        }
    }

    pub fn restore(&mut self, snapshot: &Snapshot) {
        self.master_clock = snapshot.cycle;
        self.frame_count = snapshot.frame;
        self.cpu.restore(&snapshot.cpu);
        self.bus.restore(&snapshot.bus);
    }

    /// Suspend, restore a previously-taken snapshot, and resume — the
    /// `safe` entry point atomic operations like this one are meant to
    /// use.
    ///
    /// # Errors
    ///
    /// Returns a [`LoaderError`] if `bytes` isn't a well-formed snapshot.
    pub fn restore_safe(&mut self, bytes: &[u8]) -> Result<(), LoaderError> {
        self.suspend();
        let result = Snapshot::from_bytes(bytes).map(|s| self.restore(&s));
        self.resume();
        result
    }

    // -- input -------------------------------------------------------

    pub fn press_key(&mut self, key: C64Key) {
        let (row, col) = key.matrix();
        self.bus.keyboard.set_key(col, row, true);
    }

    pub fn release_key(&mut self, key: C64Key) {
        let (row, col) = key.matrix();
        self.bus.keyboard.set_key(col, row, false);
    }

    pub fn release_all_keys(&mut self) {
        self.bus.keyboard.release_all();
    }

    pub fn set_joystick(&mut self, port: JoystickPort, state: JoystickState) {
        match port {
            JoystickPort::Port1 => self.bus.joystick1 = state,
            JoystickPort::Port2 => self.bus.joystick2 = state,
        }
    }

    pub fn input_queue(&mut self) -> &mut InputQueue {
        &mut self.input_queue
    }

    // -- loading -----------------------------------------------------

    /// Load a PRG file into RAM.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::PrgTooShort`] if `data` is too short to
    /// contain a valid PRG header.
    pub fn load_prg(&mut self, data: &[u8]) -> Result<u16, LoaderError> {
        crate::prg::load_prg(&mut self.bus.memory, data)
    }

    /// Attach a cartridge, suspending the scheduler for the duration.
    pub fn attach_cartridge(&mut self, cartridge: Cartridge) {
        self.suspend();
        self.bus.memory.attach_cartridge(cartridge);
        self.messages.push(Message::CartridgeAttached);
        self.resume();
    }

    pub fn detach_cartridge(&mut self) {
        self.suspend();
        self.bus.memory.detach_cartridge();
        self.resume();
    }

    // -- output -------------------------------------------------------

    /// The live indexed-colour (0-15) framebuffer.
    #[must_use]
    pub fn framebuffer(&self) -> &[u8] {
        self.bus.vic.framebuffer()
    }

    /// The framebuffer converted to ARGB32 pixels.
    #[must_use]
    pub fn framebuffer_argb32(&self) -> Vec<u32> {
        palette::to_argb32(self.bus.vic.framebuffer())
    }

    #[must_use]
    pub fn framebuffer_width(&self) -> u32 {
        self.bus.vic.framebuffer_width()
    }

    #[must_use]
    pub fn framebuffer_height(&self) -> u32 {
        self.bus.vic.framebuffer_height()
    }

    /// Drain `n` audio samples from the SID.
    pub fn sample_audio(&mut self, n: usize) -> Vec<i16> {
        self.bus.sid.sample_audio(n)
    }

    // -- accessors -----------------------------------------------------

    #[must_use]
    pub const fn cpu(&self) -> &Mos6502 {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Mos6502 {
        &mut self.cpu
    }

    #[must_use]
    pub const fn bus(&self) -> &C64Bus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut C64Bus {
        &mut self.bus
    }

    #[must_use]
    pub const fn master_clock(&self) -> u64 {
        self.master_clock
    }

    #[must_use]
    pub const fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn set_auto_snapshot_interval_frames(&mut self, interval: Option<u64>) {
        self.auto_snapshot_interval_frames = interval;
    }
}

impl Observable for C64 {
    fn query(&self, path: &str) -> Option<Value> {
        if let Some(rest) = path.strip_prefix("vic.") {
            match rest {
                "line" => Some(self.bus.vic.raster_line().into()),
                "cycle" => Some(self.bus.vic.raster_cycle().into()),
                "bank" => Some(self.bus.vic.bank().into()),
                "is_badline" => Some(self.bus.vic.is_badline().into()),
                _ => None,
            }
        } else if let Some(rest) = path.strip_prefix("cia1.") {
            cia_query(&self.bus.cia1, rest)
        } else if let Some(rest) = path.strip_prefix("cia2.") {
            cia_query(&self.bus.cia2, rest)
        } else if let Some(rest) = path.strip_prefix("memory.") {
            parse_addr(rest).map(|addr| Value::U8(self.bus.memory.peek(addr)))
        } else {
            match path {
                "master_clock" => Some(self.master_clock.into()),
                "frame_count" => Some(self.frame_count.into()),
                "suspended" => Some(self.is_suspended().into()),
                "cpu.pc" => Some((self.cpu.pc() as u16).into()),
                "cpu.a" => Some(self.cpu.registers().a.into()),
                "cpu.x" => Some(self.cpu.registers().x.into()),
                "cpu.y" => Some(self.cpu.registers().y.into()),
                "cpu.s" => Some(self.cpu.registers().s.into()),
                "cpu.p" => Some(self.cpu.registers().p.to_byte().into()),
                "cpu.halted" => Some(self.cpu.is_halted().into()),
                _ => None,
            }
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "cpu.pc",
            "cpu.a",
            "cpu.x",
            "cpu.y",
            "cpu.s",
            "cpu.p",
            "cpu.halted",
            "vic.line",
            "vic.cycle",
            "vic.bank",
            "vic.is_badline",
            "cia1.timer_a",
            "cia1.timer_b",
            "cia1.icr_status",
            "cia1.icr_mask",
            "cia1.cra",
            "cia1.crb",
            "cia2.timer_a",
            "cia2.timer_b",
            "cia2.icr_status",
            "cia2.icr_mask",
            "cia2.cra",
            "cia2.crb",
            "memory.<address>",
            "master_clock",
            "frame_count",
            "suspended",
        ]
    }
}

fn cia_query(cia: &mos_cia_6526::Cia, path: &str) -> Option<Value> {
    match path {
        "timer_a" => Some(cia.timer_a().into()),
        "timer_b" => Some(cia.timer_b().into()),
        "icr_status" => Some(cia.icr_status().into()),
        "icr_mask" => Some(cia.icr_mask().into()),
        "cra" => Some(cia.cra().into()),
        "crb" => Some(cia.crb().into()),
        _ => None,
    }
}

fn parse_addr(rest: &str) -> Option<u16> {
    if let Some(hex) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
        u16::from_str_radix(hex, 16).ok()
    } else if let Some(hex) = rest.strip_prefix('$') {
        u16::from_str_radix(hex, 16).ok()
    } else {
        rest.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_config() -> C64Config {
        let mut kernal = vec![0xEA; 8192]; // NOP sled
        kernal[0x1FFC] = 0x00;
        kernal[0x1FFD] = 0xE0; // reset vector -> $E000
        let basic = vec![0; 8192];
        let chargen = vec![0; 4096];
        C64Config::new(C64Model::C64Pal, kernal, basic, chargen)
    }

    fn make_c64() -> C64 {
        C64::new(make_config()).expect("valid ROM sizes")
    }

    #[test]
    fn construction_reads_reset_vector() {
        let c64 = make_c64();
        assert_eq!(c64.cpu().pc(), 0xE000);
    }

    #[test]
    fn master_clock_advances() {
        let mut c64 = make_c64();
        assert_eq!(c64.master_clock(), 0);
        c64.tick_one_cycle();
        assert_eq!(c64.master_clock(), 1);
    }

    #[test]
    fn run_frame_advances_frame_count() {
        let mut c64 = make_c64();
        let outcome = c64.run_frame();
        assert_eq!(outcome, RunOutcome::Ok);
        assert_eq!(c64.frame_count(), 1);
    }

    #[test]
    fn framebuffer_matches_vic_dimensions() {
        let c64 = make_c64();
        assert_eq!(c64.framebuffer().len(), (c64.framebuffer_width() * c64.framebuffer_height()) as usize);
    }

    #[test]
    fn observable_cpu_pc() {
        let c64 = make_c64();
        assert_eq!(c64.query("cpu.pc"), Some(Value::U16(0xE000)));
    }

    #[test]
    fn observable_memory_peek() {
        let mut c64 = make_c64();
        c64.bus_mut().memory.ram_write(0x8000, 0xAB);
        assert_eq!(c64.query("memory.0x8000"), Some(Value::U8(0xAB)));
    }

    #[test]
    fn poke_command_writes_through_bus() {
        let mut c64 = make_c64();
        c64.push_command(Command::Poke { addr: 0x8000, value: 0x42 });
        // Commands are only drained at an instruction boundary; run one
        // instruction to reach one.
        c64.step();
        assert_eq!(c64.bus().memory.ram_read(0x8000), 0x42);
        let responses = c64.take_responses();
        assert_eq!(responses, vec![CommandResponse::Ack]);
    }

    #[test]
    fn suspend_blocks_run_frame() {
        let mut c64 = make_c64();
        c64.suspend();
        assert_eq!(c64.run_frame(), RunOutcome::Suspended);
        assert_eq!(c64.frame_count(), 0);
    }

    #[test]
    fn breakpoint_suspends_at_instruction_boundary() {
        let mut c64 = make_c64();
        c64.bus_mut().set_breakpoint(0xE000, BreakpointKind::Hard);
        let outcome = c64.run_frame();
        assert_eq!(outcome, RunOutcome::Suspended);
        let messages = c64.drain_messages();
        assert!(messages.iter().any(|m| matches!(m, Message::Breakpoint { addr: 0xE000, hard: true })));
    }

    #[test]
    fn reset_is_idempotent() {
        let mut c64 = make_c64();
        c64.reset();
        let pc_after_first = c64.cpu().pc();
        c64.reset();
        assert_eq!(c64.cpu().pc(), pc_after_first);
    }

    #[test]
    fn snapshot_round_trip_preserves_cycle_count() {
        let mut c64 = make_c64();
        for _ in 0..100 {
            c64.tick_one_cycle();
        }
        let snap = c64.snapshot();
        let bytes = snap.to_bytes();

        let mut other = make_c64();
        let restored = Snapshot::from_bytes(&bytes).expect("valid snapshot");
        other.restore(&restored);

        assert_eq!(other.master_clock(), c64.master_clock());
        assert_eq!(other.cpu().pc(), c64.cpu().pc());
    }
}
