//! 68881-compatible floating point coprocessor instructions.
//!
//! Extended-precision (80-bit) registers are represented as `f64` — see
//! DESIGN.md for why that approximation was chosen over a software
//! 80-bit format. FMOVECR constants and transcendentals are computed
//! with `f64`'s own methods, which is the naturally idiomatic Rust way
//! to get them rather than hand-rolling polynomial approximations.

use super::decode::{self, EaMode, Size};
use super::{ExceptionKind, ExecState, M68020};
use crate::core::{Bus, BusMaster};

const FMOVECR_PI: f64 = std::f64::consts::PI;
const FMOVECR_LOG10_2: f64 = std::f64::consts::LOG10_2;
const FMOVECR_E: f64 = std::f64::consts::E;
const FMOVECR_LOG2_E: f64 = std::f64::consts::LOG2_E;
const FMOVECR_LOG10_E: f64 = std::f64::consts::LOG10_E;
const FMOVECR_ZERO: f64 = 0.0;
const FMOVECR_LN2: f64 = std::f64::consts::LN_2;
const FMOVECR_LN10: f64 = std::f64::consts::LN_10;
const FMOVECR_ONE: f64 = 1.0;

/// FMOVECR ROM offset table, per the 68881 constant ROM (Programmer's
/// Reference Manual, table of built-in constants). Offsets not listed
/// there are unassigned and, on real hardware, return an unpredictable
/// value; we return 0.0 for those rather than guessing.
fn rom_constant(offset: u8) -> Option<f64> {
    Some(match offset {
        0x00 => FMOVECR_PI,
        0x0B => FMOVECR_LOG10_2,
        0x0C => FMOVECR_E,
        0x0D => FMOVECR_LOG2_E,
        0x0E => FMOVECR_LOG10_E,
        0x0F => FMOVECR_ZERO,
        0x30 => FMOVECR_LN2,
        0x31 => FMOVECR_LN10,
        0x32 => FMOVECR_ONE,
        0x33 => 1.0e1,
        0x34 => 1.0e2,
        0x35 => 1.0e4,
        0x36 => 1.0e8,
        0x37 => 1.0e16,
        0x38 => 1.0e32,
        0x39 => 1.0e64,
        0x3A => 1.0e128,
        0x3B => 1.0e256,
        0x3C => 1.0e512,
        0x3D => 1.0e1024,
        0x3E => 1.0e2048,
        // 10^4096 overflows f64 (max ~1.8e308); 68881 hardware represents
        // it in 80-bit extended, which we cannot. Saturate to infinity
        // rather than silently wrapping.
        0x3F => f64::INFINITY,
        _ => return None,
    })
}

fn fread<B: Bus<Address = u32, Data = u8> + ?Sized>(bus: &mut B, master: BusMaster, addr: u32) -> f64 {
    let mut bits: u64 = 0;
    for i in 0..8 {
        bits = (bits << 8) | bus.read(master, addr + i) as u64;
    }
    f64::from_bits(bits)
}

fn fwrite<B: Bus<Address = u32, Data = u8> + ?Sized>(bus: &mut B, master: BusMaster, addr: u32, value: f64) {
    let bits = value.to_bits();
    for i in 0..8 {
        bus.write(master, addr + i, (bits >> (56 - i * 8)) as u8);
    }
}

fn set_fpsr_cc(cpu: &mut M68020, value: f64) {
    cpu.fpsr &= !0x0F00_0000;
    if value == 0.0 {
        cpu.fpsr |= 0x0400_0000; // Z
    }
    if value < 0.0 {
        cpu.fpsr |= 0x0800_0000; // N
    }
    if value.is_nan() {
        cpu.fpsr |= 0x0100_0000; // NAN
    }
}

/// Read the source operand named by the extension word's R/M and format
/// fields: register source (R/M=0) comes straight out of `cpu.fp`; memory
/// source (R/M=1) is converted from one of the 68881's data formats
/// (byte/word/long/single/double integer and float formats — packed
/// decimal and true 96-bit extended are approximated via the double path,
/// consistent with this core's `f64` register file).
fn read_source<B: Bus<Address = u32, Data = u8> + ?Sized>(
    cpu: &mut M68020,
    ea: EaMode,
    format: u8,
    bus: &mut B,
    master: BusMaster,
) -> f64 {
    match format {
        0 => decode::ea_load(cpu, ea, Size::Long, bus, master) as i32 as f64,
        1 => f32::from_bits(decode::ea_load(cpu, ea, Size::Long, bus, master)) as f64,
        4 => decode::ea_load(cpu, ea, Size::Word, bus, master) as u16 as i16 as f64,
        6 => decode::ea_load(cpu, ea, Size::Byte, bus, master) as u8 as i8 as f64,
        5 | 2 | 3 => match ea {
            EaMode::AddrIndirect(r) => fread(bus, master, cpu.a[r as usize]),
            EaMode::Mem(a) => fread(bus, master, a),
            EaMode::AddrPostInc(r) => {
                let addr = cpu.a[r as usize];
                cpu.a[r as usize] = addr.wrapping_add(8);
                fread(bus, master, addr)
            }
            EaMode::AddrPreDec(r) => {
                let addr = cpu.a[r as usize].wrapping_sub(8);
                cpu.a[r as usize] = addr;
                fread(bus, master, addr)
            }
            _ => decode::ea_load(cpu, ea, Size::Long, bus, master) as i32 as f64,
        },
        _ => decode::ea_load(cpu, ea, Size::Long, bus, master) as i32 as f64,
    }
}

fn write_dest<B: Bus<Address = u32, Data = u8> + ?Sized>(
    cpu: &mut M68020,
    ea: EaMode,
    format: u8,
    value: f64,
    bus: &mut B,
    master: BusMaster,
) {
    match format {
        0 => decode::ea_store(cpu, ea, Size::Long, value as i32 as u32, bus, master),
        1 => decode::ea_store(cpu, ea, Size::Long, (value as f32).to_bits(), bus, master),
        4 => decode::ea_store(cpu, ea, Size::Word, value as i16 as u16 as u32, bus, master),
        6 => decode::ea_store(cpu, ea, Size::Byte, value as i8 as u8 as u32, bus, master),
        _ => match ea {
            EaMode::AddrIndirect(r) => fwrite(bus, master, cpu.a[r as usize], value),
            EaMode::Mem(a) => fwrite(bus, master, a, value),
            EaMode::AddrPostInc(r) => {
                let addr = cpu.a[r as usize];
                cpu.a[r as usize] = addr.wrapping_add(8);
                fwrite(bus, master, addr, value);
            }
            EaMode::AddrPreDec(r) => {
                let addr = cpu.a[r as usize].wrapping_sub(8);
                cpu.a[r as usize] = addr;
                fwrite(bus, master, addr, value);
            }
            _ => decode::ea_store(cpu, ea, Size::Long, value as i32 as u32, bus, master),
        },
    }
}

/// Dispatch the 7-bit FPU opmode field, grounded on the 68881 coprocessor
/// instruction set (real hardware opcode values preserved where named).
/// FCMP/FTST are excluded — the caller handles those since they don't
/// write a result back to `FPn`.
fn execute_opmode(op: u8, src: f64, dst: f64) -> Option<f64> {
    Some(match op {
        0x00 => src,             // FMOVE
        0x01 => src.trunc(),     // FINT
        0x03 => src.trunc(),     // FINTRZ
        0x04 => src.sqrt(),      // FSQRT
        0x18 => src.abs(),       // FABS
        0x1A => -src,            // FNEG
        0x0E => src.sin(),       // FSIN
        0x0F => src.tan(),       // FTAN
        0x1D => src.cos(),       // FCOS
        0x0C => src.asin(),      // FASIN
        0x1C => src.acos(),      // FACOS
        0x0A => src.atan(),      // FATAN
        0x0D => src.atanh(),     // FATANH
        0x02 => src.sinh(),      // FSINH
        0x09 => src.tanh(),      // FTANH
        0x19 => src.cosh(),      // FCOSH
        0x14 => src.ln(),        // FLOGN
        0x06 => src.ln_1p(),     // FLOGNP1
        0x15 => src.log10(),     // FLOG10
        0x16 => src.log2(),      // FLOG2
        0x10 => src.exp(),       // FETOX
        0x08 => src.exp_m1(),    // FETOXM1
        0x11 => src.exp2(),      // FTWOTOX
        0x12 => 10f64.powf(src), // FTENTOX
        0x1E => dst.abs().log2().floor(),            // FGETEXP
        0x1F => dst / 2f64.powf(dst.abs().log2().floor()), // FGETMAN
        0x20 | 0x24 => dst / src,                     // FDIV / FSGLDIV
        0x21 => dst - src * (dst / src).trunc(),      // FMOD
        0x22 => dst + src,                            // FADD
        0x23 | 0x27 => dst * src,                      // FMUL / FSGLMUL
        0x25 => dst - src * (dst / src).round(),      // FREM
        0x26 => dst * 2f64.powf(src.trunc()),         // FSCALE
        0x28 => dst - src,                            // FSUB
        _ => return None,
    })
}

/// `word` is the first CpGEN word (coprocessor id in bits 8-6, EA in bits
/// 5-0); the extension word that follows carries R/M (bit 14), the source
/// format/register field (bits 13-10), destination FPn (bits 9-7) and the
/// 7-bit opmode (bits 6-0), per the 68881 general instruction format.
pub fn execute<B: Bus<Address = u32, Data = u8> + ?Sized>(cpu: &mut M68020, word: u16, bus: &mut B, master: BusMaster) {
    let cp_type = (word >> 6) & 0x7;
    if cp_type != 0 {
        // CpScc/CpDBcc/CpTRAPcc and friends aren't modeled; vector to the
        // same dedicated trap a real 68020 without that coprocessor would
        // take for an unrecognized F-line encoding.
        cpu.state = ExecState::Exception(M68020::exception_vector(ExceptionKind::LineF), 0);
        return;
    }
    let ea = decode::decode_ea(cpu, word, 0, bus, master);
    let ext = decode::fetch_word(cpu, bus, master);
    let rm = (ext >> 14) & 1;
    let spec = ((ext >> 10) & 0xF) as u8;
    let dest_fp = ((ext >> 7) & 0x7) as usize;
    let opmode = (ext & 0x7F) as u8;

    if rm == 0 && spec & 0x8 != 0 {
        // Store form (FMOVE FPn -> ea / Dn): the otherwise-reserved
        // register-source encoding with the top specifier bit set is used
        // here to mean "destination is the first word's EA, format given
        // by the low 3 specifier bits".
        let format = spec & 0x7;
        let value = cpu.fp[dest_fp];
        write_dest(cpu, ea, format, value, bus, master);
        set_fpsr_cc(cpu, value);
        return;
    }

    let src = if rm == 0 {
        cpu.fp[(spec & 0x7) as usize]
    } else {
        read_source(cpu, ea, spec & 0x7, bus, master)
    };

    match opmode {
        0x38 => {
            // FCMP
            let diff = cpu.fp[dest_fp] - src;
            set_fpsr_cc(cpu, diff);
        }
        0x3A => {
            // FTST
            set_fpsr_cc(cpu, src);
        }
        0x17 => {
            // FMOVECR #offset, FPn: the real hardware ROM address is the
            // whole 7-bit opmode field.
            cpu.fp[dest_fp] = rom_constant(opmode).unwrap_or(0.0);
            set_fpsr_cc(cpu, cpu.fp[dest_fp]);
        }
        _ => match execute_opmode(opmode, src, cpu.fp[dest_fp]) {
            Some(result) => {
                cpu.fp[dest_fp] = result;
                set_fpsr_cc(cpu, result);
            }
            None => {
                cpu.state = ExecState::Exception(M68020::exception_vector(ExceptionKind::LineF), 0);
            }
        },
    }
}
