//! Fixed-function 2D blit engine: COPY/FILL/LINE/MASKED_COPY/ALPHA,
//! executing synchronously on the triggering CPU's `BLT_CTRL` write.
//!
//! Grounded on the "register file + trigger-on-last-write + synchronous
//! execution" shape of a hardware blitter device: registers stage a
//! command, writing the control register's trigger bit runs it to
//! completion before the write returns.

use crate::backend::DisplayMode;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlitOp {
    Copy,
    Fill,
    Line,
    MaskedCopy,
    Alpha,
}

impl BlitOp {
    pub fn from_bits(bits: u32) -> Self {
        match bits & 0x7 {
            0 => Self::Copy,
            1 => Self::Fill,
            2 => Self::Line,
            3 => Self::MaskedCopy,
            _ => Self::Alpha,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct BlitRegs {
    pub src: u32,
    pub dst: u32,
    pub width: u32,
    pub height: u32,
    pub src_stride: u32,
    pub dst_stride: u32,
    pub color: u32,
    pub mask_addr: u32,
}

pub const STATUS_MISALIGNED: u32 = 1 << 0;
pub const STATUS_DONE: u32 = 1 << 1;

/// Base of the VRAM window in the unified address space (spec.md §3).
pub const VRAM_BASE: u32 = 0x0010_0000;

/// Address space the blitter reads/writes through: the VRAM window and
/// general RAM alike, so COPY/MASKED_COPY/ALPHA work whichever side of
/// the map source or destination land on.
pub trait BlitMemory {
    fn blit_read_u8(&mut self, addr: u32) -> u8;
    fn blit_write_u8(&mut self, addr: u32, value: u8);
    /// True if `addr` falls inside the VRAM window (used for the default
    /// stride rule and the misalignment check).
    fn is_vram_addr(&self, addr: u32) -> bool;

    fn blit_read_u32(&mut self, addr: u32) -> u32 {
        u32::from_le_bytes([
            self.blit_read_u8(addr),
            self.blit_read_u8(addr.wrapping_add(1)),
            self.blit_read_u8(addr.wrapping_add(2)),
            self.blit_read_u8(addr.wrapping_add(3)),
        ])
    }

    fn blit_write_u32(&mut self, addr: u32, value: u32) {
        for (i, byte) in value.to_le_bytes().into_iter().enumerate() {
            self.blit_write_u8(addr.wrapping_add(i as u32), byte);
        }
    }
}

fn default_stride(mem: &impl BlitMemory, addr: u32, width: u32, mode: DisplayMode) -> u32 {
    if mem.is_vram_addr(addr) {
        mode.dimensions().0 * 4
    } else {
        width * 4
    }
}

/// Runs one blit command to completion. Returns the resulting
/// `BLT_STATUS` bits (misalignment + done, ORed onto whatever the caller
/// already had set).
pub fn execute(op: BlitOp, regs: &BlitRegs, mode: DisplayMode, mem: &mut impl BlitMemory) -> u32 {
    let mut status = STATUS_DONE;

    match op {
        BlitOp::Fill => {
            let stride = if regs.dst_stride != 0 {
                regs.dst_stride
            } else {
                default_stride(mem, regs.dst, regs.width, mode)
            };
            if mem.is_vram_addr(regs.dst) && regs.dst % 4 != 0 {
                status |= STATUS_MISALIGNED;
            }
            for row in 0..regs.height {
                let row_base = regs.dst.wrapping_add(row * stride);
                for col in 0..regs.width {
                    mem.blit_write_u32(row_base.wrapping_add(col * 4), regs.color);
                }
            }
        }
        BlitOp::Copy => {
            let src_stride = if regs.src_stride != 0 {
                regs.src_stride
            } else {
                default_stride(mem, regs.src, regs.width, mode)
            };
            let dst_stride = if regs.dst_stride != 0 {
                regs.dst_stride
            } else {
                default_stride(mem, regs.dst, regs.width, mode)
            };
            if (mem.is_vram_addr(regs.src) && regs.src % 4 != 0)
                || (mem.is_vram_addr(regs.dst) && regs.dst % 4 != 0)
            {
                status |= STATUS_MISALIGNED;
            }
            for row in 0..regs.height {
                let src_row = regs.src.wrapping_add(row * src_stride);
                let dst_row = regs.dst.wrapping_add(row * dst_stride);
                for col in 0..regs.width {
                    let px = mem.blit_read_u32(src_row.wrapping_add(col * 4));
                    mem.blit_write_u32(dst_row.wrapping_add(col * 4), px);
                }
            }
        }
        BlitOp::MaskedCopy => {
            let src_stride = if regs.src_stride != 0 {
                regs.src_stride
            } else {
                default_stride(mem, regs.src, regs.width, mode)
            };
            let dst_stride = if regs.dst_stride != 0 {
                regs.dst_stride
            } else {
                default_stride(mem, regs.dst, regs.width, mode)
            };
            let mask_pitch = regs.width.div_ceil(8);
            for row in 0..regs.height {
                let src_row = regs.src.wrapping_add(row * src_stride);
                let dst_row = regs.dst.wrapping_add(row * dst_stride);
                let mask_row = regs.mask_addr.wrapping_add(row * mask_pitch);
                for col in 0..regs.width {
                    let mask_byte = mem.blit_read_u8(mask_row.wrapping_add(col / 8));
                    let bit = (mask_byte >> (col % 8)) & 1;
                    if bit == 1 {
                        let px = mem.blit_read_u32(src_row.wrapping_add(col * 4));
                        mem.blit_write_u32(dst_row.wrapping_add(col * 4), px);
                    }
                }
            }
        }
        BlitOp::Alpha => {
            let src_stride = if regs.src_stride != 0 {
                regs.src_stride
            } else {
                default_stride(mem, regs.src, regs.width, mode)
            };
            let dst_stride = if regs.dst_stride != 0 {
                regs.dst_stride
            } else {
                default_stride(mem, regs.dst, regs.width, mode)
            };
            for row in 0..regs.height {
                let src_row = regs.src.wrapping_add(row * src_stride);
                let dst_row = regs.dst.wrapping_add(row * dst_stride);
                for col in 0..regs.width {
                    let src_px = mem.blit_read_u32(src_row.wrapping_add(col * 4));
                    let dst_addr = dst_row.wrapping_add(col * 4);
                    let dst_px = mem.blit_read_u32(dst_addr);
                    mem.blit_write_u32(dst_addr, alpha_blend(src_px, dst_px));
                }
            }
        }
        BlitOp::Line => {
            let (x0, y0) = ((regs.src & 0xFFFF) as i32, (regs.src >> 16) as i32);
            let (x1, y1) = ((regs.dst & 0xFFFF) as i32, (regs.dst >> 16) as i32);
            draw_line(x0, y0, x1, y1, regs.color, mode, mem);
        }
    }

    status
}

fn alpha_blend(src: u32, dst: u32) -> u32 {
    let [sr, sg, sb, sa] = src.to_le_bytes();
    let [dr, dg, db, _] = dst.to_le_bytes();
    let a = sa as u32;
    let blend = |s: u8, d: u8| -> u8 { (((s as u32 * a) + (d as u32 * (255 - a))) / 255) as u8 };
    u32::from_le_bytes([blend(sr, dr), blend(sg, dg), blend(sb, db), 255])
}

fn draw_line(
    mut x0: i32,
    mut y0: i32,
    x1: i32,
    y1: i32,
    color: u32,
    mode: DisplayMode,
    mem: &mut impl BlitMemory,
) {
    let (width, height) = mode.dimensions();
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let stride = width * 4;

    loop {
        if x0 >= 0 && y0 >= 0 && (x0 as u32) < width && (y0 as u32) < height {
            let addr = VRAM_BASE + (y0 as u32 * stride) + (x0 as u32 * 4);
            mem.blit_write_u32(addr, color);
        }
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}
