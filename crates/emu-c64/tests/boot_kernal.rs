//! End-to-end boot scenario: cold-boot with real ROMs and look for the
//! Kernal's "READY." prompt in screen memory.
//!
//! Requires real C64 ROM dumps, which this workspace does not vendor —
//! ignored by default.

use emu_c64::{C64, C64Config, C64Model};
use std::fs;

const READY_PETSCII: [u8; 6] = [
    18, // R
    5,  // E
    1,  // A
    4,  // D
    25, // Y
    46, // .
];

#[test]
#[ignore = "requires real ROM dumps at roms/ — run with --ignored"]
fn boots_to_ready_prompt() {
    let kernal = fs::read("../../roms/kernal.rom").expect("kernal.rom not found at roms/kernal.rom");
    let basic = fs::read("../../roms/basic.rom").expect("basic.rom not found at roms/basic.rom");
    let chargen =
        fs::read("../../roms/chargen.rom").expect("chargen.rom not found at roms/chargen.rom");

    let mut c64 = C64::new(C64Config::new(C64Model::C64Pal, kernal, basic, chargen))
        .expect("ROM images are the right size");

    let max_frames = 200;
    let mut found_ready = false;

    for frame in 0..max_frames {
        c64.run_frame();

        if find_ready_in_screen(&c64) {
            println!("READY. found at frame {frame}");
            found_ready = true;
            break;
        }
    }

    assert!(found_ready, "did not reach READY. within {max_frames} frames");
}

fn find_ready_in_screen(c64: &C64) -> bool {
    let screen_start = 0x0400u16;
    let screen_end = 0x07E8u16;

    for addr in screen_start..screen_end {
        if addr + READY_PETSCII.len() as u16 > screen_end {
            break;
        }

        let matches = READY_PETSCII
            .iter()
            .enumerate()
            .all(|(i, &expected)| c64.bus().memory.peek(addr + i as u16) == expected);

        if matches {
            return true;
        }
    }

    false
}
