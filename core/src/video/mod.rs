//! Memory-mapped video subsystem: double-buffered framebuffer, copper
//! list executor, and blitter, driven by the video frame loop.

pub mod blitter;
pub mod copper;
pub mod framebuffer;
pub mod raster;

pub use blitter::{BlitMemory, BlitOp, BlitRegs};
pub use copper::Copper;
pub use framebuffer::Framebuffer;

use crate::backend::DisplayMode;
use std::sync::atomic::{AtomicBool, Ordering};

/// Lock-free status bits, readable without taking any lock (spec.md §5).
#[derive(Default)]
pub struct VideoStatus {
    has_content: AtomicBool,
    in_vblank: AtomicBool,
}

impl VideoStatus {
    pub fn has_content(&self) -> bool {
        self.has_content.load(Ordering::Acquire)
    }

    pub fn set_has_content(&self, value: bool) {
        self.has_content.store(value, Ordering::Release);
    }

    pub fn in_vblank(&self) -> bool {
        self.in_vblank.load(Ordering::Acquire)
    }

    pub fn bits(&self) -> u32 {
        (self.has_content() as u32) | ((self.in_vblank() as u32) << 1)
    }
}

pub struct VideoEngine {
    pub framebuffer: Framebuffer,
    pub copper: Copper,
    pub mode: DisplayMode,
    pub enabled: bool,
    pub status: VideoStatus,
    pub blit_regs: BlitRegs,
    pub blit_status: u32,
    pub raster_y: u32,
    pub raster_height: u32,
    pub raster_color: u32,
    current_scanline: u32,
}

impl VideoEngine {
    pub fn new() -> Self {
        let mode = DisplayMode::W640H480;
        let (w, h) = mode.dimensions();
        Self {
            framebuffer: Framebuffer::new(w, h),
            copper: Copper::new(),
            mode,
            enabled: false,
            status: VideoStatus::default(),
            blit_regs: BlitRegs::default(),
            blit_status: 0,
            raster_y: 0,
            raster_height: 0,
            raster_color: 0,
            current_scanline: 0,
        }
    }

    pub fn set_mode(&mut self, mode: DisplayMode) {
        if mode != self.mode {
            self.mode = mode;
            let (w, h) = mode.dimensions();
            self.framebuffer.resize(w, h);
        }
    }

    /// Run one scanline of the frame loop: steps the copper, and at
    /// scanline 0 clears `inVBlank`; at the last scanline, presents and
    /// sets `inVBlank` again.
    pub fn step_scanline(
        &mut self,
        read_word: &mut dyn FnMut(u32) -> u32,
        write_reg: &mut dyn FnMut(u32, u32),
    ) {
        if !self.enabled {
            return;
        }
        let (_, height) = self.mode.dimensions();
        if self.current_scanline == 0 {
            self.status.set_in_vblank(false);
            self.copper.on_frame_start();
        }
        self.copper
            .step_scanline(self.current_scanline, 0, read_word, write_reg);

        self.current_scanline += 1;
        if self.current_scanline >= height {
            self.current_scanline = 0;
            self.status.set_has_content(true);
            self.framebuffer.present();
            self.status.set_in_vblank(true);
        }
    }

    pub fn raster_fill(&mut self) {
        raster::fill_band(
            &mut self.framebuffer,
            self.raster_y,
            self.raster_height,
            self.raster_color,
        );
    }
}

impl VideoStatus {
    fn set_in_vblank(&self, value: bool) {
        self.in_vblank.store(value, Ordering::Release);
    }
}

impl Default for VideoEngine {
    fn default() -> Self {
        Self::new()
    }
}
