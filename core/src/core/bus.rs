/// Identifies who is accessing the bus (for multi-CPU/DMA arbitration).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BusMaster {
    /// The single active CPU core (IE32, 6502, Z80, or 68020 — only one
    /// runs at a time in normal operation; chip-player engines get their
    /// own index when coexisting for playback).
    Cpu(usize),
    /// The copper or blitter reading/writing through the normal memory map.
    Dma,
    /// The blitter reading VRAM directly, bypassing any banking overlay
    /// (used for masked-copy/alpha reads
    /// of the destination pixel before blending).
    DmaVram,
}

/// Generic bus interface supporting halt/arbitration and interrupt queries.
///
/// `Address`/`Data` let the same trait serve the 32-bit-address IE32/68020
/// cores (`Address = u32`) and the 16-bit-address 6502/Z80 cores
/// (`Address = u16`, adapted onto the unified map by [`crate::cpu::adapter::Cpu16Adapter`]).
pub trait Bus {
    type Address: Copy + Into<u64>;
    type Data;

    fn read(&mut self, master: BusMaster, addr: Self::Address) -> Self::Data;
    fn write(&mut self, master: BusMaster, addr: Self::Address, data: Self::Data);

    /// Read from I/O port address space (separate from memory on Z80).
    /// Default maps to memory read; override for CPUs with separate I/O.
    fn io_read(&mut self, master: BusMaster, addr: Self::Address) -> Self::Data {
        self.read(master, addr)
    }

    /// Write to I/O port address space (separate from memory on Z80).
    /// Default maps to memory write; override for CPUs with separate I/O.
    fn io_write(&mut self, master: BusMaster, addr: Self::Address, data: Self::Data) {
        self.write(master, addr, data)
    }

    /// Check if the bus is halted for this master (blitter DMA in progress, etc).
    /// Returns true if the master must pause before the next bus cycle.
    fn is_halted_for(&self, master: BusMaster) -> bool;

    /// Generic interrupt query. CPUs pick what they need from the result.
    fn check_interrupts(&self, target: BusMaster) -> InterruptState;
}

/// Interrupt lines visible to a CPU core. Each core reads only the fields
/// its ISA defines: 6502/Z80 use `nmi`/`irq`; IE32 uses `irq` only (gated
/// by `SEI`/`CLI`); 68020 uses `ipl` (0 = no request, 1-7 = autovector level,
/// matching the hardware IPL2-IPL0 encoding).
#[derive(Default, Clone, Copy, Debug)]
pub struct InterruptState {
    pub nmi: bool,
    pub irq: bool,
    pub ipl: u8,
}
