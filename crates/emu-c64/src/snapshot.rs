//! Binary save-state format.
//!
//! A snapshot is a versioned magic header followed by a sequence of
//! component blocks in a canonical order: clock, CPU, memory, VIC-II,
//! CIA1, CIA2, SID. Each block is `tag (4 bytes) | length (u32 LE) |
//! payload | sentinel (u32 LE)` so a truncated or corrupt block is
//! detected without needing to parse the whole file first.
//!
//! This is a hand-rolled binary format, not `serde` — the teacher's own
//! `emu-c64/Cargo.toml` only pulls `serde`/`serde_json`/`base64` in behind
//! its GUI/MCP feature, which this headless core doesn't carry (see
//! `DESIGN.md`).

use mos_6502::{Mos6502Snapshot, Registers, Status};
use mos_cia_6526::{CiaSnapshot, TodSnapshot};
use mos_vic_ii::{Sprite, VicSnapshot};

use crate::bus::BusSnapshot;
use crate::error::LoaderError;
use crate::memory::MemorySnapshot;

const MAGIC: u32 = 0x4336_3453; // b"C64S" read as a big-endian u32.
const MAJOR: u8 = 1;
const MINOR: u8 = 0;
const SUB: u8 = 0;
const SENTINEL: u32 = 0xA5A5_5A5A;

struct Writer(Vec<u8>);

impl Writer {
    fn new() -> Self {
        Self(Vec::new())
    }

    fn u8(&mut self, v: u8) {
        self.0.push(v);
    }

    fn bool(&mut self, v: bool) {
        self.0.push(u8::from(v));
    }

    fn u16(&mut self, v: u16) {
        self.0.extend_from_slice(&v.to_le_bytes());
    }

    fn u32(&mut self, v: u32) {
        self.0.extend_from_slice(&v.to_le_bytes());
    }

    fn u64(&mut self, v: u64) {
        self.0.extend_from_slice(&v.to_le_bytes());
    }

    fn bytes(&mut self, v: &[u8]) {
        self.0.extend_from_slice(v);
    }

    fn option_u8(&mut self, v: Option<u8>) {
        self.bool(v.is_some());
        self.u8(v.unwrap_or(0));
    }
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], LoaderError> {
        let end = self.pos + n;
        let slice = self.data.get(self.pos..end).ok_or(LoaderError::SnapshotTruncated)?;
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, LoaderError> {
        Ok(self.take(1)?[0])
    }

    fn bool(&mut self) -> Result<bool, LoaderError> {
        Ok(self.u8()? != 0)
    }

    fn u16(&mut self) -> Result<u16, LoaderError> {
        Ok(u16::from_le_bytes(self.take(2)?.try_into().expect("len checked")))
    }

    fn u32(&mut self) -> Result<u32, LoaderError> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().expect("len checked")))
    }

    fn u64(&mut self) -> Result<u64, LoaderError> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().expect("len checked")))
    }

    fn option_u8(&mut self) -> Result<Option<u8>, LoaderError> {
        let present = self.bool()?;
        let value = self.u8()?;
        Ok(present.then_some(value))
    }
}

fn write_block(out: &mut Vec<u8>, tag: &[u8; 4], payload: &[u8]) {
    out.extend_from_slice(tag);
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    out.extend_from_slice(&SENTINEL.to_le_bytes());
}

fn read_block(r: &mut Reader, expected_tag: &[u8; 4], name: &'static str) -> Result<Vec<u8>, LoaderError> {
    let tag = r.take(4)?;
    if tag != expected_tag {
        return Err(LoaderError::SnapshotBlock { name });
    }
    let len = r.u32()? as usize;
    let payload = r.take(len)?.to_vec();
    let sentinel = r.u32()?;
    if sentinel != SENTINEL {
        return Err(LoaderError::SnapshotBlock { name });
    }
    Ok(payload)
}

fn write_registers(w: &mut Writer, regs: &Registers) {
    w.u8(regs.a);
    w.u8(regs.x);
    w.u8(regs.y);
    w.u8(regs.s);
    w.u16(regs.pc);
    w.u8(regs.p.0);
}

fn read_registers(r: &mut Reader) -> Result<Registers, LoaderError> {
    Ok(Registers {
        a: r.u8()?,
        x: r.u8()?,
        y: r.u8()?,
        s: r.u8()?,
        pc: r.u16()?,
        p: Status::from_byte(r.u8()?),
    })
}

fn write_cpu(cpu: &Mos6502Snapshot) -> Vec<u8> {
    let mut w = Writer::new();
    write_registers(&mut w, &cpu.regs);
    w.u8(cpu.state_tag());
    w.u8(cpu.opcode);
    w.u8(cpu.cycle);
    w.u16(cpu.addr);
    w.u8(cpu.data);
    w.u8(cpu.pointer);
    w.bool(cpu.rdy);
    w.bool(cpu.irq_line);
    w.bool(cpu.nmi_line);
    w.bool(cpu.nmi_prev_line);
    w.bool(cpu.nmi_edge_latch);
    w.bool(cpu.nmi_poll_result);
    w.bool(cpu.irq_poll_result);
    w.bool(cpu.polled_this_instruction);
    w.u64(cpu.total_cycles);
    w.0
}

fn read_cpu(data: &[u8]) -> Result<Mos6502Snapshot, LoaderError> {
    let mut r = Reader::new(data);
    let regs = read_registers(&mut r)?;
    Ok(Mos6502Snapshot::from_raw_parts(
        regs,
        r.u8()?,
        r.u8()?,
        r.u8()?,
        r.u16()?,
        r.u8()?,
        r.u8()?,
        r.bool()?,
        r.bool()?,
        r.bool()?,
        r.bool()?,
        r.bool()?,
        r.bool()?,
        r.bool()?,
        r.bool()?,
        r.u64()?,
    ))
}

fn write_memory(mem: &MemorySnapshot) -> Vec<u8> {
    let mut w = Writer::new();
    w.bytes(mem.ram.as_slice());
    w.bytes(&mem.colour_ram);
    w.u8(mem.port_ddr);
    w.u8(mem.port_data);
    w.u8(mem.bus_floating);
    w.0
}

fn read_memory(data: &[u8]) -> Result<MemorySnapshot, LoaderError> {
    let mut r = Reader::new(data);
    let ram_slice = r.take(0x10000)?;
    let mut ram = Box::new([0u8; 0x10000]);
    ram.copy_from_slice(ram_slice);
    let mut colour_ram = [0u8; 1024];
    colour_ram.copy_from_slice(r.take(1024)?);
    Ok(MemorySnapshot {
        ram,
        colour_ram,
        port_ddr: r.u8()?,
        port_data: r.u8()?,
        bus_floating: r.u8()?,
    })
}

fn write_vic(vic: &VicSnapshot) -> Vec<u8> {
    let mut w = Writer::new();
    w.bytes(&vic.regs);
    w.u16(vic.raster_line);
    w.u8(vic.raster_cycle);
    w.u16(vic.raster_compare);
    w.u8(vic.irq_status);
    w.u8(vic.irq_enable);
    w.bool(vic.den_latch);
    w.bool(vic.is_badline);
    w.u16(vic.vc);
    w.u16(vic.vc_base);
    w.u8(vic.rc);
    for &(char_code, color) in &vic.matrix {
        w.u8(char_code);
        w.u8(color);
    }
    w.u8(vic.bank);
    for s in &vic.sprites {
        w.u8(s.data_pointer);
        w.u8(s.mc);
        w.u8(s.mcbase);
        w.bool(s.dma_active);
        w.bool(s.display_active);
        w.bool(s.expansion_toggle);
        w.u32(s.shift);
        w.u8(s.pixels_remaining);
    }
    w.u8(vic.sprite_collision);
    w.u8(vic.bg_collision);
    w.u8(vic.light_pen_x);
    w.u8(vic.light_pen_y);
    w.0
}

fn read_vic(data: &[u8]) -> Result<VicSnapshot, LoaderError> {
    let mut r = Reader::new(data);
    let mut regs = [0u8; 0x2F];
    regs.copy_from_slice(r.take(0x2F)?);
    let raster_line = r.u16()?;
    let raster_cycle = r.u8()?;
    let raster_compare = r.u16()?;
    let irq_status = r.u8()?;
    let irq_enable = r.u8()?;
    let den_latch = r.bool()?;
    let is_badline = r.bool()?;
    let vc = r.u16()?;
    let vc_base = r.u16()?;
    let rc = r.u8()?;
    let mut matrix = [(0u8, 0u8); 40];
    for cell in &mut matrix {
        *cell = (r.u8()?, r.u8()?);
    }
    let bank = r.u8()?;
    let mut sprites = [Sprite::new(); 8];
    for s in &mut sprites {
        s.data_pointer = r.u8()?;
        s.mc = r.u8()?;
        s.mcbase = r.u8()?;
        s.dma_active = r.bool()?;
        s.display_active = r.bool()?;
        s.expansion_toggle = r.bool()?;
        s.shift = r.u32()?;
        s.pixels_remaining = r.u8()?;
    }
    let sprite_collision = r.u8()?;
    let bg_collision = r.u8()?;
    let light_pen_x = r.u8()?;
    let light_pen_y = r.u8()?;
    Ok(VicSnapshot {
        regs,
        raster_line,
        raster_cycle,
        raster_compare,
        irq_status,
        irq_enable,
        den_latch,
        is_badline,
        vc,
        vc_base,
        rc,
        matrix,
        bank,
        sprites,
        sprite_collision,
        bg_collision,
        light_pen_x,
        light_pen_y,
    })
}

fn write_tod(w: &mut Writer, tod: &TodSnapshot) {
    w.u8(tod.tenths);
    w.u8(tod.seconds);
    w.u8(tod.minutes);
    w.u8(tod.hours);
    w.u8(tod.alarm_tenths);
    w.u8(tod.alarm_seconds);
    w.u8(tod.alarm_minutes);
    w.u8(tod.alarm_hours);
    match tod.latched {
        Some(digits) => {
            w.bool(true);
            w.bytes(&digits);
        }
        None => {
            w.bool(false);
            w.bytes(&[0; 4]);
        }
    }
    w.bool(tod.halted);
    w.bool(tod.fifty_hz);
    w.u32(tod.mains_counter);
    w.u8(tod.pulse_counter);
}

fn read_tod(r: &mut Reader) -> Result<TodSnapshot, LoaderError> {
    let tenths = r.u8()?;
    let seconds = r.u8()?;
    let minutes = r.u8()?;
    let hours = r.u8()?;
    let alarm_tenths = r.u8()?;
    let alarm_seconds = r.u8()?;
    let alarm_minutes = r.u8()?;
    let alarm_hours = r.u8()?;
    let latched_present = r.bool()?;
    let digits_bytes = r.take(4)?;
    let mut digits = [0u8; 4];
    digits.copy_from_slice(digits_bytes);
    let latched = latched_present.then_some(digits);
    Ok(TodSnapshot {
        tenths,
        seconds,
        minutes,
        hours,
        alarm_tenths,
        alarm_seconds,
        alarm_minutes,
        alarm_hours,
        latched,
        halted: r.bool()?,
        fifty_hz: r.bool()?,
        mains_counter: r.u32()?,
        pulse_counter: r.u8()?,
    })
}

fn write_cia(cia: &CiaSnapshot) -> Vec<u8> {
    let mut w = Writer::new();
    w.u8(cia.port_a);
    w.u8(cia.port_b);
    w.u8(cia.ddr_a);
    w.u8(cia.ddr_b);
    w.u8(cia.external_a);
    w.u8(cia.external_b);
    w.u16(cia.timer_a);
    w.u16(cia.timer_a_latch);
    w.bool(cia.timer_a_running);
    w.bool(cia.timer_a_oneshot);
    w.bool(cia.timer_a_force_load);
    w.bool(cia.timer_a_input_cnt);
    w.bool(cia.timer_a_pb_toggle);
    w.u16(cia.timer_b);
    w.u16(cia.timer_b_latch);
    w.bool(cia.timer_b_running);
    w.bool(cia.timer_b_oneshot);
    w.bool(cia.timer_b_force_load);
    w.u8(cia.timer_b_source);
    w.bool(cia.timer_b_pb_toggle);
    w.u8(cia.icr_status);
    w.u8(cia.icr_mask);
    w.bool(cia.irq_out);
    w.u8(cia.cra);
    w.u8(cia.crb);
    write_tod(&mut w, &cia.tod);
    w.u8(cia.sdr);
    w.option_u8(cia.sdr_pending);
    w.u8(cia.sdr_bits_remaining);
    w.u8(cia.sdr_in_bits);
    w.bool(cia.cnt_prev);
    w.bool(cia.flag_prev);
    w.0
}

fn read_cia(data: &[u8]) -> Result<CiaSnapshot, LoaderError> {
    let mut r = Reader::new(data);
    Ok(CiaSnapshot {
        port_a: r.u8()?,
        port_b: r.u8()?,
        ddr_a: r.u8()?,
        ddr_b: r.u8()?,
        external_a: r.u8()?,
        external_b: r.u8()?,
        timer_a: r.u16()?,
        timer_a_latch: r.u16()?,
        timer_a_running: r.bool()?,
        timer_a_oneshot: r.bool()?,
        timer_a_force_load: r.bool()?,
        timer_a_input_cnt: r.bool()?,
        timer_a_pb_toggle: r.bool()?,
        timer_b: r.u16()?,
        timer_b_latch: r.u16()?,
        timer_b_running: r.bool()?,
        timer_b_oneshot: r.bool()?,
        timer_b_force_load: r.bool()?,
        timer_b_source: r.u8()?,
        timer_b_pb_toggle: r.bool()?,
        icr_status: r.u8()?,
        icr_mask: r.u8()?,
        irq_out: r.bool()?,
        cra: r.u8()?,
        crb: r.u8()?,
        tod: read_tod(&mut r)?,
        sdr: r.u8()?,
        sdr_pending: r.option_u8()?,
        sdr_bits_remaining: r.u8()?,
        sdr_in_bits: r.u8()?,
        cnt_prev: r.bool()?,
        flag_prev: r.bool()?,
    })
}

/// The full tuple of component states making up one point-in-time
/// snapshot, plus the cycle/frame counters the scheduler owns and no
/// single chip does.
pub struct Snapshot {
    pub cycle: u64,
    pub frame: u64,
    pub cpu: Mos6502Snapshot,
    pub bus: BusSnapshot,
}

impl Snapshot {
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&MAGIC.to_be_bytes());
        out.push(MAJOR);
        out.push(MINOR);
        out.push(SUB);

        let mut clock = Writer::new();
        clock.u64(self.cycle);
        clock.u64(self.frame);
        write_block(&mut out, b"CLK0", &clock.0);

        write_block(&mut out, b"CPU0", &write_cpu(&self.cpu));
        write_block(&mut out, b"MEM0", &write_memory(&self.bus.memory));
        write_block(&mut out, b"VIC0", &write_vic(&self.bus.vic));
        write_block(&mut out, b"CIA1", &write_cia(&self.bus.cia1));
        write_block(&mut out, b"CIA2", &write_cia(&self.bus.cia2));
        write_block(&mut out, b"SID0", &self.bus.sid);

        out
    }

    /// # Errors
    ///
    /// Returns a [`LoaderError`] variant if the magic, version, or any
    /// block's length/sentinel doesn't match what [`Self::to_bytes`]
    /// produces.
    pub fn from_bytes(data: &[u8]) -> Result<Self, LoaderError> {
        let mut r = Reader::new(data);
        let magic = r.u32()?;
        // MAGIC was written big-endian above; u32() reads little-endian,
        // so compare against the byte-swapped constant.
        if magic != MAGIC.to_be() {
            return Err(LoaderError::SnapshotMagic {
                expected: MAGIC,
                actual: magic.to_be(),
            });
        }
        let major = r.u8()?;
        let _minor = r.u8()?;
        let _sub = r.u8()?;
        if major != MAJOR {
            return Err(LoaderError::SnapshotVersion {
                expected: MAJOR,
                actual: major,
            });
        }

        let clock_bytes = read_block(&mut r, b"CLK0", "CLK0")?;
        let mut clock_r = Reader::new(&clock_bytes);
        let cycle = clock_r.u64()?;
        let frame = clock_r.u64()?;

        let cpu = read_cpu(&read_block(&mut r, b"CPU0", "CPU0")?)?;
        let memory = read_memory(&read_block(&mut r, b"MEM0", "MEM0")?)?;
        let vic = read_vic(&read_block(&mut r, b"VIC0", "VIC0")?)?;
        let cia1 = read_cia(&read_block(&mut r, b"CIA1", "CIA1")?)?;
        let cia2 = read_cia(&read_block(&mut r, b"CIA2", "CIA2")?)?;
        let sid_bytes = read_block(&mut r, b"SID0", "SID0")?;
        let mut sid = [0u8; 29];
        sid.copy_from_slice(&sid_bytes);

        Ok(Self {
            cycle,
            frame,
            cpu,
            bus: BusSnapshot {
                memory,
                vic,
                sid,
                cia1,
                cia2,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_cpu() -> Mos6502Snapshot {
        Mos6502Snapshot::from_raw_parts(
            Registers::new(),
            1,
            0xA9,
            2,
            0x1234,
            0x42,
            0x00,
            true,
            false,
            true,
            false,
            false,
            false,
            false,
            false,
            1_000_000,
        )
    }

    fn sample_bus() -> BusSnapshot {
        use mos_cia_6526::Cia;
        use mos_vic_ii::{Variant, VicII};

        let vic = VicII::new(Variant::Pal);
        let cia1 = Cia::new(985_248);
        let cia2 = Cia::new(985_248);
        BusSnapshot {
            memory: MemorySnapshot {
                ram: Box::new([0x55; 0x10000]),
                colour_ram: [0x0A; 1024],
                port_ddr: 0x2F,
                port_data: 0x37,
                bus_floating: 0xFF,
            },
            vic: vic.snapshot(),
            sid: [0u8; 29],
            cia1: cia1.snapshot(),
            cia2: cia2.snapshot(),
        }
    }

    #[test]
    fn round_trips_bitwise() {
        let snap = Snapshot {
            cycle: 2_500_000,
            frame: 42,
            cpu: sample_cpu(),
            bus: sample_bus(),
        };
        let bytes = snap.to_bytes();
        let restored = Snapshot::from_bytes(&bytes).expect("valid snapshot");

        assert_eq!(restored.cycle, snap.cycle);
        assert_eq!(restored.frame, snap.frame);
        assert_eq!(restored.cpu, snap.cpu);
        assert_eq!(restored.bus.memory.ram, snap.bus.memory.ram);
        assert_eq!(restored.bus.sid, snap.bus.sid);
        assert_eq!(restored.to_bytes(), bytes);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = Snapshot {
            cycle: 0,
            frame: 0,
            cpu: sample_cpu(),
            bus: sample_bus(),
        }
        .to_bytes();
        bytes[0] = 0x00;
        assert!(matches!(
            Snapshot::from_bytes(&bytes),
            Err(LoaderError::SnapshotMagic { .. })
        ));
    }

    #[test]
    fn rejects_truncated_snapshot() {
        let bytes = Snapshot {
            cycle: 0,
            frame: 0,
            cpu: sample_cpu(),
            bus: sample_bus(),
        }
        .to_bytes();
        let truncated = &bytes[..bytes.len() - 100];
        assert!(Snapshot::from_bytes(truncated).is_err());
    }
}
