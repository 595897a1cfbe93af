//! Headless C64 runner: load ROM images and an optional PRG, run a fixed
//! number of frames, and dump the resulting framebuffer or a snapshot.
//!
//! This binary has no windowing or remote-control surface; it exists for
//! scripted/CI use (golden-frame screenshots, snapshot generation) where
//! a real display server isn't available.

use std::path::PathBuf;
use std::process;

use emu_c64::{C64Config, C64Model, C64};

struct CliArgs {
    kernal_path: PathBuf,
    basic_path: PathBuf,
    chargen_path: PathBuf,
    prg_path: Option<PathBuf>,
    model: C64Model,
    frames: u64,
    ppm_out: Option<PathBuf>,
    snapshot_out: Option<PathBuf>,
}

fn parse_args() -> Result<CliArgs, String> {
    let args: Vec<String> = std::env::args().collect();
    let mut kernal_path = None;
    let mut basic_path = None;
    let mut chargen_path = None;
    let mut prg_path = None;
    let mut model = C64Model::C64Pal;
    let mut frames = 60;
    let mut ppm_out = None;
    let mut snapshot_out = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--kernal" => {
                i += 1;
                kernal_path = Some(PathBuf::from(args.get(i).ok_or("--kernal needs a path")?));
            }
            "--basic" => {
                i += 1;
                basic_path = Some(PathBuf::from(args.get(i).ok_or("--basic needs a path")?));
            }
            "--chargen" => {
                i += 1;
                chargen_path = Some(PathBuf::from(args.get(i).ok_or("--chargen needs a path")?));
            }
            "--prg" => {
                i += 1;
                prg_path = Some(PathBuf::from(args.get(i).ok_or("--prg needs a path")?));
            }
            "--ntsc" => model = C64Model::C64Ntsc,
            "--frames" => {
                i += 1;
                frames = args.get(i).ok_or("--frames needs a number")?.parse().map_err(|_| "bad --frames value")?;
            }
            "--ppm-out" => {
                i += 1;
                ppm_out = Some(PathBuf::from(args.get(i).ok_or("--ppm-out needs a path")?));
            }
            "--snapshot-out" => {
                i += 1;
                snapshot_out = Some(PathBuf::from(args.get(i).ok_or("--snapshot-out needs a path")?));
            }
            other => return Err(format!("unrecognized argument: {other}")),
        }
        i += 1;
    }

    Ok(CliArgs {
        kernal_path: kernal_path.ok_or("--kernal is required")?,
        basic_path: basic_path.ok_or("--basic is required")?,
        chargen_path: chargen_path.ok_or("--chargen is required")?,
        prg_path,
        model,
        frames,
        ppm_out,
        snapshot_out,
    })
}

/// Write the framebuffer as a binary PPM (P6): trivial to inspect with
/// any image viewer without pulling in an image-encoding dependency.
fn write_ppm(path: &std::path::Path, width: u32, height: u32, argb: &[u32]) -> std::io::Result<()> {
    use std::io::Write;
    let mut out = Vec::with_capacity(argb.len() * 3 + 32);
    write!(out, "P6\n{width} {height}\n255\n")?;
    for &pixel in argb {
        let [_, r, g, b] = pixel.to_be_bytes();
        out.extend_from_slice(&[r, g, b]);
    }
    std::fs::write(path, out)
}

fn run(args: CliArgs) -> Result<(), String> {
    let kernal = std::fs::read(&args.kernal_path).map_err(|e| format!("reading kernal ROM: {e}"))?;
    let basic = std::fs::read(&args.basic_path).map_err(|e| format!("reading basic ROM: {e}"))?;
    let chargen = std::fs::read(&args.chargen_path).map_err(|e| format!("reading char ROM: {e}"))?;

    let config = C64Config::new(args.model, kernal, basic, chargen);
    let mut c64 = C64::new(config).map_err(|e| format!("building machine: {e}"))?;

    if let Some(prg_path) = &args.prg_path {
        let data = std::fs::read(prg_path).map_err(|e| format!("reading PRG: {e}"))?;
        c64.load_prg(&data).map_err(|e| format!("loading PRG: {e}"))?;
    }

    for frame in 0..args.frames {
        if !matches!(c64.run_frame(), emu_c64::RunOutcome::Ok) {
            log::warn!("machine stopped early at frame {frame}");
            break;
        }
    }

    if let Some(ppm_path) = &args.ppm_out {
        let width = c64.framebuffer_width();
        let height = c64.framebuffer_height();
        let argb = c64.framebuffer_argb32();
        write_ppm(ppm_path, width, height, &argb).map_err(|e| format!("writing PPM: {e}"))?;
    }

    if let Some(snapshot_path) = &args.snapshot_out {
        std::fs::write(snapshot_path, c64.snapshot().to_bytes()).map_err(|e| format!("writing snapshot: {e}"))?;
    }

    Ok(())
}

fn main() {
    env_logger::init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {e}");
            eprintln!(
                "usage: emu-c64 --kernal <path> --basic <path> --chargen <path> [--prg <path>] [--ntsc] [--frames N] [--ppm-out <path>] [--snapshot-out <path>]"
            );
            process::exit(2);
        }
    };

    if let Err(e) = run(args) {
        eprintln!("error: {e}");
        process::exit(1);
    }
}
