//! Central `Machine` context: the 32 MB bus, the active CPU core, the
//! synthesizer, the video engine, and the timer, wired together the way
//! spec.md §9's "thread a `Machine` context through explicitly" design
//! note calls for (replacing package-level globals with one owned struct).

use std::sync::{Arc, RwLock};

use crate::core::bus::InterruptState;
use crate::core::{Bus, BusMaster, BusMasterComponent};
use crate::cpu::adapter::Cpu16Adapter;
use crate::cpu::{Cpu, Ie32, M6502, M68020, Z80};
use crate::synth::SoundChip;
use crate::timer::Timer;
use crate::video::blitter::{self, BlitMemory, BlitOp};
use crate::video::VideoEngine;

use crate::backend::DisplayMode;

/// 32 MB flat address space, per spec.md §3.
pub const ADDRESS_SPACE_SIZE: usize = 32 * 1024 * 1024;
pub const IO_BASE: u32 = 0x0F_0000;
pub const IO_END: u32 = 0x0F_FFFF;
pub const VRAM_BASE: u32 = 0x10_0000;
pub const VRAM_END: u32 = 0x4F_FFFF;

const REG_TIMER_PERIOD: u32 = 0x0000;
const REG_TIMER_CTRL: u32 = 0x0004;
const REG_VIDEO_MODE: u32 = 0x0008;
const REG_VIDEO_CTRL: u32 = 0x000C;
const REG_VIDEO_STATUS: u32 = 0x0010;
const REG_COPPER_CTRL: u32 = 0x0014;
const REG_COPPER_PTR: u32 = 0x0018;
const REG_BLT_CTRL: u32 = 0x001C;
const REG_BLT_SRC: u32 = 0x0020;
const REG_BLT_DST: u32 = 0x0024;
const REG_BLT_WIDTH: u32 = 0x0028;
const REG_BLT_HEIGHT: u32 = 0x002C;
const REG_BLT_SRC_STRIDE: u32 = 0x0030;
const REG_BLT_DST_STRIDE: u32 = 0x0034;
const REG_BLT_COLOR: u32 = 0x0038;
const REG_BLT_MASK_ADDR: u32 = 0x003C;
const REG_BLT_STATUS: u32 = 0x0040;
const REG_RASTER_CTRL: u32 = 0x0044;
const REG_RASTER_Y: u32 = 0x0048;
const REG_RASTER_HEIGHT: u32 = 0x004C;
const REG_RASTER_COLOR: u32 = 0x0050;
const CORE_REGS_LEN: usize = 0x54;

const SYNTH_CHANNEL_BASE: u32 = 0x1000;
const SYNTH_CHANNEL_STRIDE: u32 = 0x100;
const SYNTH_GLOBAL_BASE: u32 = 0x2000;
const PSG_SHADOW_BASE: u32 = 0x3000;
const POKEY_SHADOW_BASE: u32 = 0x4000;
const SID_SHADOW_BASE: u32 = 0x5000;
const TED_SHADOW_BASE: u32 = 0x6000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CpuMode {
    Ie32,
    M6502,
    Z80,
    M68020,
}

/// Tagged sum over the four heterogeneous CPU cores (spec.md §9: avoid
/// virtual-inheritance-style dispatch in favor of an enum).
pub enum CpuCore {
    Ie32(Ie32),
    M6502(M6502),
    Z80(Z80),
    M68020(M68020),
}

impl CpuCore {
    fn new(mode: CpuMode) -> Self {
        match mode {
            CpuMode::Ie32 => CpuCore::Ie32(Ie32::new()),
            CpuMode::M6502 => CpuCore::M6502(M6502::new()),
            CpuMode::Z80 => CpuCore::Z80(Z80::new()),
            CpuMode::M68020 => CpuCore::M68020(M68020::new()),
        }
    }

    fn reset(&mut self) {
        match self {
            CpuCore::Ie32(c) => c.reset(),
            CpuCore::M6502(c) => c.reset(),
            CpuCore::Z80(c) => c.reset(),
            CpuCore::M68020(c) => c.reset(),
        }
    }

    fn is_sleeping(&self) -> bool {
        match self {
            CpuCore::Ie32(c) => c.is_sleeping(),
            CpuCore::M6502(c) => c.is_sleeping(),
            CpuCore::Z80(c) => c.is_sleeping(),
            CpuCore::M68020(c) => c.is_sleeping(),
        }
    }

    fn signal_interrupt(&mut self, int: InterruptState) {
        match self {
            CpuCore::Ie32(c) => c.signal_interrupt(int),
            CpuCore::M6502(c) => c.signal_interrupt(int),
            CpuCore::Z80(c) => c.signal_interrupt(int),
            CpuCore::M68020(c) => c.signal_interrupt(int),
        }
    }
}

/// Everything the core owns: RAM, I/O registers, the active CPU, the
/// synthesizer (behind a reader/writer lock per spec.md §5), the video
/// engine, and the timer.
pub struct Machine {
    mem: Vec<u8>,
    core_regs: [u8; CORE_REGS_LEN],
    core_regs_prev: [u32; CORE_REGS_LEN / 4],

    cpu_mode: CpuMode,
    cpu: CpuCore,
    running: Arc<std::sync::atomic::AtomicBool>,

    /// Raw byte staging for the 32-bit-wide (often float-bits) per-channel
    /// and global synth registers, mirroring `core_regs`'s byte-accumulate
    /// approach so 8-bit CPUs can build up a register one byte at a time.
    channel_reg_bytes: [[u8; 0x100]; 4],
    synth_global_bytes: [u8; 0x100],

    pub synth: Arc<RwLock<SoundChip>>,
    pub video: VideoEngine,
    pub timer: Timer,
}

impl Machine {
    pub fn new(cpu_mode: CpuMode) -> Self {
        let mut m = Self {
            mem: vec![0; ADDRESS_SPACE_SIZE],
            core_regs: [0; CORE_REGS_LEN],
            core_regs_prev: [0; CORE_REGS_LEN / 4],
            cpu_mode,
            cpu: CpuCore::new(cpu_mode),
            running: Arc::new(std::sync::atomic::AtomicBool::new(false)),
            channel_reg_bytes: [[0; SYNTH_CHANNEL_STRIDE as usize]; 4],
            synth_global_bytes: [0; 0x100],
            synth: Arc::new(RwLock::new(SoundChip::new(44_100))),
            video: VideoEngine::new(),
            timer: Timer::new(),
        };
        m.cpu.reset();
        m
    }

    pub fn cpu_mode(&self) -> CpuMode {
        self.cpu_mode
    }

    /// Switch the active CPU core, resetting it (spec.md §3 lifecycle:
    /// "CPU cores created at load time, reset on RESET and on switching
    /// CPU mode").
    pub fn set_cpu_mode(&mut self, mode: CpuMode) {
        self.cpu_mode = mode;
        self.cpu = CpuCore::new(mode);
        self.cpu.reset();
    }

    pub fn reset_cpu(&mut self) {
        self.cpu.reset();
    }

    /// Override the active core's program counter, e.g. after loading a
    /// raw binary at a non-default entry address.
    pub fn set_entry(&mut self, addr: u32) {
        match &mut self.cpu {
            CpuCore::Ie32(c) => c.pc = addr,
            CpuCore::M6502(c) => c.pc = addr as u16,
            CpuCore::Z80(c) => c.pc = addr as u16,
            CpuCore::M68020(c) => c.pc = addr,
        }
    }

    pub fn load_image(&mut self, addr: u32, data: &[u8]) {
        for (i, byte) in data.iter().enumerate() {
            self.write_raw(addr.wrapping_add(i as u32), *byte);
        }
    }

    pub fn running_flag(&self) -> Arc<std::sync::atomic::AtomicBool> {
        self.running.clone()
    }

    pub fn set_running(&self, running: bool) {
        self.running
            .store(running, std::sync::atomic::Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(std::sync::atomic::Ordering::Acquire)
    }

    /// Run one bus cycle of the active CPU. Returns true at an
    /// instruction boundary, matching `BusMasterComponent::tick_with_bus`.
    pub fn step_cpu(&mut self) -> bool {
        let mut cpu = std::mem::replace(&mut self.cpu, CpuCore::Ie32(Ie32::new()));
        let boundary = match &mut cpu {
            CpuCore::Ie32(c) => c.tick_with_bus(self, BusMaster::Cpu(0)),
            CpuCore::M68020(c) => c.tick_with_bus(self, BusMaster::Cpu(0)),
            CpuCore::M6502(c) => {
                let mut adapter = Cpu16Adapter::new(self);
                c.tick_with_bus(&mut adapter, BusMaster::Cpu(0))
            }
            CpuCore::Z80(c) => {
                let mut adapter = Cpu16Adapter::new(self);
                c.tick_with_bus(&mut adapter, BusMaster::Cpu(0))
            }
        };
        self.cpu = cpu;
        boundary
    }

    pub fn deliver_interrupt(&mut self, int: InterruptState) {
        self.cpu.signal_interrupt(int);
    }

    pub fn cpu_sleeping(&self) -> bool {
        self.cpu.is_sleeping()
    }

    /// Advance the audio/timer side by one output sample: ticks the
    /// timer, pulls one mixed sample, delivers a timer interrupt on
    /// zero-crossing. Returns the sample for the audio backend.
    pub fn generate_sample(&mut self) -> f32 {
        if self.timer.tick() {
            self.deliver_interrupt(InterruptState {
                nmi: false,
                irq: true,
                ipl: 1,
            });
        }
        let mut synth = self.synth.write().expect("sound chip lock poisoned");
        synth.next_sample()
    }

    /// Advance the video frame loop by one scanline.
    pub fn step_video_scanline(&mut self) {
        let core_regs = self.core_regs;
        let mut read_word = |addr: u32| {
            u32::from_le_bytes([
                Self::raw_read(&self.mem, &core_regs, addr),
                Self::raw_read(&self.mem, &core_regs, addr.wrapping_add(1)),
                Self::raw_read(&self.mem, &core_regs, addr.wrapping_add(2)),
                Self::raw_read(&self.mem, &core_regs, addr.wrapping_add(3)),
            ])
        };
        // MOVE targets are applied after stepping, since they may touch
        // `self.video` itself (borrow checker: can't hold `&mut self.video`
        // across a closure that also needs `&self.mem`).
        let mut pending_writes: Vec<(u32, u32)> = Vec::new();
        {
            let mut write_reg = |addr: u32, value: u32| pending_writes.push((addr, value));
            self.video.step_scanline(&mut read_word, &mut write_reg);
        }
        for (addr, value) in pending_writes {
            self.write_u32(addr, value);
        }
    }

    fn raw_read(mem: &[u8], core_regs: &[u8; CORE_REGS_LEN], addr: u32) -> u8 {
        if (IO_BASE..=IO_END).contains(&addr) {
            let offset = addr - IO_BASE;
            if (offset as usize) < CORE_REGS_LEN {
                return core_regs[offset as usize];
            }
            return 0;
        }
        mem.get(addr as usize).copied().unwrap_or(0)
    }

    fn write_raw(&mut self, addr: u32, value: u8) {
        self.write(BusMaster::Cpu(0), addr, value);
    }

    fn write_u32(&mut self, addr: u32, value: u32) {
        for (i, byte) in value.to_le_bytes().into_iter().enumerate() {
            self.write_raw(addr.wrapping_add(i as u32), byte);
        }
    }

    fn read_core_reg_word(&self, aligned_offset: u32) -> u32 {
        let idx = (aligned_offset / 4) as usize;
        let base = idx * 4;
        u32::from_le_bytes(self.core_regs[base..base + 4].try_into().unwrap())
    }

    /// Applies whatever side effect a core-register write has (timer
    /// enable, video mode change, copper trigger, blitter trigger,
    /// raster trigger), edge-triggered against the previous word value
    /// so a 4-byte little-endian store only fires once.
    fn apply_core_register_side_effect(&mut self, aligned_offset: u32) {
        let idx = (aligned_offset / 4) as usize;
        let new_value = self.read_core_reg_word(aligned_offset);
        let old_value = self.core_regs_prev[idx];
        self.core_regs_prev[idx] = new_value;

        match aligned_offset {
            REG_TIMER_PERIOD => self.timer.set_period(new_value),
            REG_TIMER_CTRL => self.timer.set_enabled(new_value & 1 != 0),
            REG_VIDEO_MODE => self.video.set_mode(DisplayMode::from_mode_register(new_value)),
            REG_VIDEO_CTRL => self.video.enabled = new_value & 1 != 0,
            REG_COPPER_CTRL => {
                self.video.copper.set_enabled(new_value & 1 != 0);
                if new_value & 0b10 != 0 {
                    let base = self.read_core_reg_word(REG_COPPER_PTR);
                    self.video.copper.set_base(base);
                }
            }
            REG_COPPER_PTR => {
                self.video.copper.set_base(new_value);
            }
            REG_BLT_CTRL => {
                let rising = old_value & 1 == 0 && new_value & 1 != 0;
                if rising {
                    self.run_blit(new_value);
                }
            }
            REG_RASTER_CTRL => {
                let rising = old_value & 1 == 0 && new_value & 1 != 0;
                if rising {
                    self.video.raster_y = self.read_core_reg_word(REG_RASTER_Y);
                    self.video.raster_height = self.read_core_reg_word(REG_RASTER_HEIGHT);
                    self.video.raster_color = self.read_core_reg_word(REG_RASTER_COLOR);
                    self.video.raster_fill();
                }
            }
            _ => {}
        }
    }

    fn run_blit(&mut self, ctrl_value: u32) {
        let op = BlitOp::from_bits(ctrl_value >> 1);
        let regs = blitter::BlitRegs {
            src: self.read_core_reg_word(REG_BLT_SRC),
            dst: self.read_core_reg_word(REG_BLT_DST),
            width: self.read_core_reg_word(REG_BLT_WIDTH),
            height: self.read_core_reg_word(REG_BLT_HEIGHT),
            src_stride: self.read_core_reg_word(REG_BLT_SRC_STRIDE),
            dst_stride: self.read_core_reg_word(REG_BLT_DST_STRIDE),
            color: self.read_core_reg_word(REG_BLT_COLOR),
            mask_addr: self.read_core_reg_word(REG_BLT_MASK_ADDR),
        };
        let mode = self.video.mode;
        let status = {
            let mut shim = BlitShim { machine: self };
            blitter::execute(op, &regs, mode, &mut shim)
        };
        let base = (REG_BLT_STATUS / 4) as usize * 4;
        self.core_regs[base..base + 4].copy_from_slice(&status.to_le_bytes());
        self.core_regs_prev[(REG_BLT_STATUS / 4) as usize] = status;
    }

    fn write_io(&mut self, offset: u32, value: u8) {
        match offset {
            o if (o as usize) < CORE_REGS_LEN => {
                self.core_regs[o as usize] = value;
                self.apply_core_register_side_effect(o & !3);
            }
            o if (SYNTH_CHANNEL_BASE..SYNTH_GLOBAL_BASE).contains(&o) => {
                self.write_synth_channel(o - SYNTH_CHANNEL_BASE, value);
            }
            o if (SYNTH_GLOBAL_BASE..SYNTH_GLOBAL_BASE + 0x100).contains(&o) => {
                self.write_synth_global(o - SYNTH_GLOBAL_BASE, value);
            }
            o if (PSG_SHADOW_BASE..POKEY_SHADOW_BASE).contains(&o) => {
                let mut synth = self.synth.write().expect("sound chip lock poisoned");
                if let Some(psg) = synth.psg_mut() {
                    psg.write((o - PSG_SHADOW_BASE) as u8, value);
                }
            }
            o if (POKEY_SHADOW_BASE..SID_SHADOW_BASE).contains(&o) => {
                let mut synth = self.synth.write().expect("sound chip lock poisoned");
                if let Some(pokey) = synth.pokey_mut() {
                    pokey.write((o - POKEY_SHADOW_BASE) as u8, value);
                }
            }
            o if (SID_SHADOW_BASE..TED_SHADOW_BASE).contains(&o) => {
                let mut synth = self.synth.write().expect("sound chip lock poisoned");
                if let Some(sid) = synth.sid_mut() {
                    sid.write((o - SID_SHADOW_BASE) as u8, value);
                }
            }
            o if (TED_SHADOW_BASE..TED_SHADOW_BASE + 0x100).contains(&o) => {
                let mut synth = self.synth.write().expect("sound chip lock poisoned");
                if let Some(ted) = synth.ted_mut() {
                    ted.write((o - TED_SHADOW_BASE) as u8, value);
                }
            }
            _ => {}
        }
    }

    fn reg_f32(bytes: &[u8], aligned: u32) -> f32 {
        let base = aligned as usize;
        f32::from_le_bits(u32::from_le_bytes(bytes[base..base + 4].try_into().unwrap()))
    }

    fn reg_u32(bytes: &[u8], aligned: u32) -> u32 {
        let base = aligned as usize;
        u32::from_le_bytes(bytes[base..base + 4].try_into().unwrap())
    }

    /// Per-channel register offsets, per SPEC_FULL.md §3's concrete map.
    fn write_synth_channel(&mut self, rel: u32, value: u8) {
        let channel = (rel / SYNTH_CHANNEL_STRIDE) as usize;
        if channel >= 4 {
            return;
        }
        let reg_off = rel % SYNTH_CHANNEL_STRIDE;
        self.channel_reg_bytes[channel][reg_off as usize] = value;
        let bytes = &self.channel_reg_bytes[channel];
        let aligned = reg_off & !3;

        let mut synth = self.synth.write().expect("sound chip lock poisoned");
        let sample_rate = 44_100u32;
        let ch = &mut synth.channels[channel];
        match aligned {
            0x00 => {
                ch.waveform = match Self::reg_u32(bytes, 0x00) {
                    0 => crate::synth::Waveform::Square,
                    1 => crate::synth::Waveform::Triangle,
                    2 => crate::synth::Waveform::Sine,
                    3 => crate::synth::Waveform::Saw,
                    _ => crate::synth::Waveform::Noise,
                }
            }
            0x04 => ch.set_frequency(Self::reg_f32(bytes, 0x04), sample_rate),
            0x08 => ch.volume = Self::reg_f32(bytes, 0x08),
            0x0C => ch.enable = Self::reg_u32(bytes, 0x0C) & 1 != 0,
            0x10 => ch.set_gate(Self::reg_u32(bytes, 0x10) & 1 != 0),
            0x14 => {
                let duty = Self::reg_f32(bytes, 0x14).clamp(0.0, 1.0);
                ch.pulse_width = (duty * 65535.0) as u16;
            }
            0x30 => {
                let idx = Self::reg_u32(bytes, 0x30);
                ch.ring_src = if idx == 0xFFFF_FFFF { None } else { Some(idx as usize) };
            }
            0x34 => {
                let idx = Self::reg_u32(bytes, 0x34);
                ch.sync_src = if idx == 0xFFFF_FFFF { None } else { Some(idx as usize) };
            }
            0x38 => ch.attack_rate = Self::reg_f32(bytes, 0x38),
            0x3C => ch.decay_rate = Self::reg_f32(bytes, 0x3C),
            0x40 => ch.sustain_level = Self::reg_f32(bytes, 0x40),
            0x44 => ch.release_rate = Self::reg_f32(bytes, 0x44),
            _ => {}
        }
    }

    fn write_synth_global(&mut self, rel: u32, value: u8) {
        self.synth_global_bytes[rel as usize] = value;
        let bytes = self.synth_global_bytes;
        let aligned = rel & !3;

        let mut synth = self.synth.write().expect("sound chip lock poisoned");
        match aligned {
            0x00 => {
                synth.filter_type = match Self::reg_u32(&bytes, 0x00) {
                    1 => crate::synth::soundchip::FilterType::Low,
                    2 => crate::synth::soundchip::FilterType::Band,
                    3 => crate::synth::soundchip::FilterType::High,
                    _ => crate::synth::soundchip::FilterType::Off,
                }
            }
            0x04 => synth.filter_cutoff = Self::reg_f32(&bytes, 0x04).clamp(0.0, 1.0),
            0x08 => synth.filter_resonance = Self::reg_f32(&bytes, 0x08).clamp(0.0, 1.0),
            0x0C => {
                let idx = Self::reg_u32(&bytes, 0x0C);
                synth.filter_mod_src = if idx == 0xFFFF_FFFF { None } else { Some(idx as usize) };
            }
            0x10 => synth.filter_mod_amount = Self::reg_f32(&bytes, 0x10),
            0x14 => synth.overdrive_level = Self::reg_f32(&bytes, 0x14),
            0x18 => synth.reverb_mix = (Self::reg_u32(&bytes, 0x18) & 0xFF) as f32 / 255.0,
            0x1C => synth.enable = Self::reg_u32(&bytes, 0x1C) & 1 != 0,
            _ => {}
        }
    }
}

/// Bridges `Machine`'s unified address space to the blitter's
/// VRAM-aware memory trait, so `run_blit` can borrow `self` mutably
/// just once.
struct BlitShim<'a> {
    machine: &'a mut Machine,
}

impl<'a> BlitMemory for BlitShim<'a> {
    fn blit_read_u8(&mut self, addr: u32) -> u8 {
        self.machine.read(BusMaster::DmaVram, addr)
    }

    fn blit_write_u8(&mut self, addr: u32, value: u8) {
        self.machine.write(BusMaster::DmaVram, addr, value);
    }

    fn is_vram_addr(&self, addr: u32) -> bool {
        (VRAM_BASE..=VRAM_END).contains(&addr)
    }
}

impl Bus for Machine {
    type Address = u32;
    type Data = u8;

    fn read(&mut self, _master: BusMaster, addr: u32) -> u8 {
        if (VRAM_BASE..=VRAM_END).contains(&addr) {
            return self.video.framebuffer.read_byte(addr - VRAM_BASE);
        }
        if (IO_BASE..=IO_END).contains(&addr) {
            let offset = addr - IO_BASE;
            if (REG_VIDEO_STATUS..REG_VIDEO_STATUS + 4).contains(&offset) {
                return self.video.status.bits().to_le_bytes()[(offset - REG_VIDEO_STATUS) as usize];
            }
            if (offset as usize) < CORE_REGS_LEN {
                return self.core_regs[offset as usize];
            }
            if (PSG_SHADOW_BASE..POKEY_SHADOW_BASE).contains(&offset) {
                let synth = self.synth.read().expect("sound chip lock poisoned");
                return synth
                    .psg_ref()
                    .map(|p| p.read((offset - PSG_SHADOW_BASE) as u8))
                    .unwrap_or(0);
            }
            if (POKEY_SHADOW_BASE..SID_SHADOW_BASE).contains(&offset) {
                let mut synth = self.synth.write().expect("sound chip lock poisoned");
                return synth
                    .pokey_mut()
                    .map(|p| p.read((offset - POKEY_SHADOW_BASE) as u8))
                    .unwrap_or(0);
            }
            if (SID_SHADOW_BASE..TED_SHADOW_BASE).contains(&offset) {
                let synth = self.synth.read().expect("sound chip lock poisoned");
                return synth
                    .sid_ref()
                    .map(|s| s.read((offset - SID_SHADOW_BASE) as u8))
                    .unwrap_or(0);
            }
            if (TED_SHADOW_BASE..TED_SHADOW_BASE + 0x100).contains(&offset) {
                let synth = self.synth.read().expect("sound chip lock poisoned");
                return synth
                    .ted_ref()
                    .map(|t| t.read((offset - TED_SHADOW_BASE) as u8))
                    .unwrap_or(0);
            }
            return 0;
        }
        self.mem.get(addr as usize).copied().unwrap_or(0)
    }

    fn write(&mut self, _master: BusMaster, addr: u32, data: u8) {
        if (VRAM_BASE..=VRAM_END).contains(&addr) {
            self.video.framebuffer.write_byte(addr - VRAM_BASE, data);
            return;
        }
        if (IO_BASE..=IO_END).contains(&addr) {
            self.write_io(addr - IO_BASE, data);
            return;
        }
        if let Some(slot) = self.mem.get_mut(addr as usize) {
            *slot = data;
        }
    }

    fn is_halted_for(&self, _master: BusMaster) -> bool {
        false
    }

    fn check_interrupts(&self, _target: BusMaster) -> InterruptState {
        InterruptState {
            nmi: false,
            irq: self.timer.pending(),
            ipl: if self.timer.pending() { 1 } else { 0 },
        }
    }
}
