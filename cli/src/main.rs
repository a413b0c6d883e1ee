//! Headless runner: loads a raw binary image into a `Machine`, wires it to
//! `Null*` backends, and runs the active CPU until it halts.
//!
//! Everything pixel/audio-device-facing (a real window, a real sound card)
//! is someone else's problem; this binary exists to exercise the core end
//! to end from a shell.

use std::path::PathBuf;
use std::process::ExitCode;

use confluence_core::backend::{AudioBackend, DisplayMode, VideoBackend};
use confluence_core::machine::{CpuMode, Machine};
use confluence_core::synth::ChipMode;

struct NullAudioBackend;

impl AudioBackend for NullAudioBackend {
    fn start(&mut self) {}
    fn stop(&mut self) {}
    fn close(&mut self) {}
    fn sample_rate(&self) -> u32 {
        44_100
    }
}

struct NullVideoBackend;

impl VideoBackend for NullVideoBackend {
    fn start(&mut self) {}
    fn stop(&mut self) {}
    fn set_display_config(&mut self, _mode: DisplayMode) {}
    fn update_frame(&mut self, _front_buffer_bytes: &[u8]) {}
}

struct Args {
    cpu_mode: CpuMode,
    path: PathBuf,
    load_addr: u32,
    entry: Option<u32>,
    chip: Option<ChipMode>,
}

fn default_load_addr(mode: CpuMode) -> u32 {
    match mode {
        CpuMode::M6502 => 0x0600,
        CpuMode::Z80 => 0x0000,
        CpuMode::Ie32 | CpuMode::M68020 => 0x0010_00,
    }
}

fn parse_hex(s: &str) -> Option<u32> {
    u32::from_str_radix(s.trim_start_matches("0x"), 16).ok()
}

fn parse_args() -> Result<Args, String> {
    let mut cpu_mode = None;
    let mut path = None;
    let mut load_addr = None;
    let mut entry = None;
    let mut chip = None;

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-ie32" => cpu_mode = Some(CpuMode::Ie32),
            "-m68k" => cpu_mode = Some(CpuMode::M68020),
            "-z80" => cpu_mode = Some(CpuMode::Z80),
            "-m6502" => cpu_mode = Some(CpuMode::M6502),
            "--load-addr" => {
                let v = iter.next().ok_or("--load-addr requires a value")?;
                load_addr = Some(parse_hex(&v).ok_or_else(|| format!("bad hex value: {v}"))?);
            }
            "--entry" => {
                let v = iter.next().ok_or("--entry requires a value")?;
                entry = Some(parse_hex(&v).ok_or_else(|| format!("bad hex value: {v}"))?);
            }
            "-psg" => chip = Some(ChipMode::Psg { enhanced: false }),
            "-psg+" => chip = Some(ChipMode::Psg { enhanced: true }),
            "-pokey" => chip = Some(ChipMode::Pokey { enhanced: false }),
            "-pokey+" => chip = Some(ChipMode::Pokey { enhanced: true }),
            "-sid" | "-sid-ntsc" => {
                chip = Some(ChipMode::Sid {
                    enhanced: false,
                    pal: false,
                })
            }
            "-sid+" => {
                chip = Some(ChipMode::Sid {
                    enhanced: true,
                    pal: false,
                })
            }
            "-sid-pal" => {
                chip = Some(ChipMode::Sid {
                    enhanced: false,
                    pal: true,
                })
            }
            other if !other.starts_with('-') => path = Some(PathBuf::from(other)),
            other => return Err(format!("unrecognized flag: {other}")),
        }
    }

    let cpu_mode = cpu_mode.ok_or("one of -ie32/-m68k/-z80/-m6502 is required")?;
    let path = path.ok_or("a binary path is required")?;
    let load_addr = load_addr.unwrap_or_else(|| default_load_addr(cpu_mode));

    Ok(Args {
        cpu_mode,
        path,
        load_addr,
        entry,
        chip,
    })
}

/// Caps the run to guard against runaway loops in a headless demo run;
/// a real frontend would instead pace to the video/audio backends.
const MAX_STEPS: u64 = 50_000_000;

fn run(args: Args) -> Result<(), String> {
    let data = std::fs::read(&args.path).map_err(|e| format!("{}: {e}", args.path.display()))?;

    let mut machine = Machine::new(args.cpu_mode);
    machine.load_image(args.load_addr, &data);
    machine.set_entry(args.entry.unwrap_or(args.load_addr));

    if let Some(mode) = args.chip {
        machine
            .synth
            .write()
            .expect("sound chip lock poisoned")
            .set_chip_mode(mode);
    }

    let mut audio = NullAudioBackend;
    let mut video = NullVideoBackend;
    audio.start();
    video.start();

    machine.set_running(true);
    let mut steps = 0u64;
    while machine.is_running() && !machine.cpu_sleeping() && steps < MAX_STEPS {
        machine.step_cpu();
        if steps % 4 == 0 {
            let sample = machine.generate_sample();
            let _ = sample;
        }
        if steps % 800 == 0 {
            machine.step_video_scanline();
        }
        steps += 1;
    }

    audio.stop();
    audio.close();
    video.stop();

    log::info!("ran {steps} bus cycles on {:?}", machine.cpu_mode());
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {e}");
            eprintln!(
                "usage: confluence (-ie32|-m68k|-z80|-m6502) [--load-addr HEX] [--entry HEX] \
                 [-psg|-psg+|-pokey|-pokey+|-sid|-sid+|-sid-pal|-sid-ntsc] <path>"
            );
            return ExitCode::FAILURE;
        }
    };

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
