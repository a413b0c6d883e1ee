//! Adapts the 16-bit-address 6502/Z80 cores onto the unified 32-bit machine
//! bus: addresses zero-extend into the low 64KB, and
//! Z80 port I/O (`IN`/`OUT`) is redirected into the `0x0F0000-0x0FFFFF` MMIO
//! window, which is exactly 64KB — a one-to-one fit for the Z80's port space.
use crate::core::{Bus, BusMaster, bus::InterruptState};

/// Base address of the MMIO window that 16-bit I/O ports are redirected into.
pub const IO_WINDOW_BASE: u32 = 0x0F_0000;

/// Wraps a `Bus<Address = u32, Data = u8>` (the machine) so a 6502 or Z80
/// core, which only knows `Address = u16`, can drive it directly.
pub struct Cpu16Adapter<'a, M: ?Sized> {
    pub inner: &'a mut M,
}

impl<'a, M: ?Sized> Cpu16Adapter<'a, M> {
    pub fn new(inner: &'a mut M) -> Self {
        Self { inner }
    }
}

impl<'a, M> Bus for Cpu16Adapter<'a, M>
where
    M: Bus<Address = u32, Data = u8> + ?Sized,
{
    type Address = u16;
    type Data = u8;

    fn read(&mut self, master: BusMaster, addr: u16) -> u8 {
        self.inner.read(master, addr as u32)
    }

    fn write(&mut self, master: BusMaster, addr: u16, data: u8) {
        self.inner.write(master, addr as u32, data);
    }

    fn io_read(&mut self, master: BusMaster, addr: u16) -> u8 {
        self.inner.read(master, IO_WINDOW_BASE + addr as u32)
    }

    fn io_write(&mut self, master: BusMaster, addr: u16, data: u8) {
        self.inner.write(master, IO_WINDOW_BASE + addr as u32, data);
    }

    fn is_halted_for(&self, master: BusMaster) -> bool {
        self.inner.is_halted_for(master)
    }

    fn check_interrupts(&self, target: BusMaster) -> InterruptState {
        self.inner.check_interrupts(target)
    }
}
