//! Klaus Dormann's 6502 functional test harness.
//!
//! The functional test exercises every documented 6502 opcode and traps
//! (branches to itself) on completion: `$3469` is the published success
//! address, any other trap address is a failure. The binary is not
//! vendored here — ignored by default.

use emu_core::{Bus, Cpu, ReadResult};
use mos_6502::Mos6502;

struct TestBus {
    ram: [u8; 65536],
}

impl TestBus {
    fn new() -> Self {
        Self { ram: [0; 65536] }
    }

    fn load(&mut self, addr: u16, data: &[u8]) {
        for (i, &b) in data.iter().enumerate() {
            self.ram[(addr as usize + i) & 0xFFFF] = b;
        }
    }
}

impl Bus for TestBus {
    fn read(&mut self, addr: u32) -> ReadResult {
        ReadResult::new(self.ram[(addr & 0xFFFF) as usize])
    }

    fn write(&mut self, addr: u32, value: u8) -> u8 {
        self.ram[(addr & 0xFFFF) as usize] = value;
        0
    }

    fn peek(&self, addr: u32) -> u8 {
        self.ram[(addr & 0xFFFF) as usize]
    }

    fn io_read(&mut self, _addr: u32) -> ReadResult {
        ReadResult::new(0xFF)
    }

    fn io_write(&mut self, _addr: u32, _value: u8) -> u8 {
        0
    }
}

/// Success trap address for the published `6502_functional_test.bin`,
/// assembled with load address `$0000` and entry point `$0400`.
const SUCCESS_TRAP: u16 = 0x3469;

/// Run the test to its trap, returning whether it trapped at the success
/// address.
fn run_dormann(binary: &[u8]) -> bool {
    let mut bus = TestBus::new();
    bus.load(0x0000, binary);

    let mut cpu = Mos6502::new();
    cpu.regs.pc = 0x0400;

    let mut prev_pc = 0xFFFFu16;
    let mut same_pc_count = 0u32;
    let mut instructions = 0u64;

    loop {
        let start_pc = cpu.pc() as u16;

        if start_pc == prev_pc {
            same_pc_count += 1;
            if same_pc_count > 2 {
                eprintln!("trapped at ${start_pc:04X} after {instructions} instructions");
                return start_pc == SUCCESS_TRAP;
            }
        } else {
            same_pc_count = 0;
            prev_pc = start_pc;
        }

        cpu.tick(&mut bus);
        while !cpu.is_instruction_complete() {
            cpu.tick(&mut bus);
        }
        instructions += 1;

        if instructions > 100_000_000 {
            eprintln!("exceeded 100M instructions without trapping");
            return false;
        }
    }
}

#[test]
#[ignore = "requires tests/data/6502_functional_test.bin — run with --ignored"]
fn dormann_functional() {
    let binary = std::fs::read("tests/data/6502_functional_test.bin")
        .expect("tests/data/6502_functional_test.bin not found");
    assert!(run_dormann(&binary), "Klaus Dormann 6502 functional test failed");
}
