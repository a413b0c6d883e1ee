//! Motorola 68020 + 68881 FPU core.
//!
//! Big-endian, 32-bit address/data registers, a 256-entry exception vector
//! table, and an attached 68881-compatible FPU with eight extended-precision
//! registers (represented here as `f64` — see DESIGN.md for the rationale).
//! Instructions are variable-length like the real 68020: the first word is
//! latched by the fetch state machine and `decode::execute_one` pulls any
//! extension words (displacements, immediates, brief/full index words, bit
//! field control words) directly off the bus as it decodes. The decoder
//! covers the integer instruction set's real opcode map (data movement,
//! ALU, shift/rotate, bit field, BCD, `CAS`/`CAS2`, multiply/divide, branch
//! and subroutine linkage) plus the 68881 coprocessor extension-word
//! encoding for the FPU; `MOVEC` and cache control instructions are not
//! modeled since there is no MMU/cache hierarchy on this core.

mod decode;
mod fpu;

use crate::core::{
    Bus, BusMaster,
    bus::InterruptState,
    component::{BusMasterComponent, Component},
};
use crate::cpu::{
    Cpu,
    state::{CpuStateTrait, M68020State},
};

pub use decode::EaMode;

/// SR bit for supervisor mode.
pub const SR_S: u16 = 0x2000;
/// SR trace bit.
pub const SR_T: u16 = 0x8000;

pub struct M68020 {
    pub d: [u32; 8],
    pub a: [u32; 8],
    pub pc: u32,
    pub sr: u16,
    pub usp: u32,
    pub ssp: u32,
    pub vbr: u32,

    pub fp: [f64; 8],
    pub fpcr: u32,
    pub fpsr: u32,
    pub fpiar: u32,

    pub(crate) state: ExecState,
    pub(crate) ir: [u8; 10],
    pub(crate) ir_len: u8,
    pub(crate) stopped: bool,
}

#[derive(Clone, Debug)]
pub(crate) enum ExecState {
    Fetch(u8),
    Execute,
    Exception(u8, u8), // (vector, cycle)
}

impl Default for M68020 {
    fn default() -> Self {
        Self::new()
    }
}

impl M68020 {
    pub fn new() -> Self {
        Self {
            d: [0; 8],
            a: [0; 8],
            pc: 0,
            sr: SR_S,
            usp: 0,
            ssp: 0,
            vbr: 0,
            fp: [0.0; 8],
            fpcr: 0,
            fpsr: 0,
            fpiar: 0,
            state: ExecState::Fetch(0),
            ir: [0; 10],
            ir_len: 10,
            stopped: false,
        }
    }

    fn supervisor(&self) -> bool {
        self.sr & SR_S != 0
    }

    fn sp(&self) -> u32 {
        self.a[7]
    }

    fn set_sp(&mut self, value: u32) {
        self.a[7] = value;
    }

    pub(crate) fn exception_vector(kind: ExceptionKind) -> u8 {
        match kind {
            ExceptionKind::Reset => 0,
            ExceptionKind::Illegal => 4,
            ExceptionKind::ZeroDivide => 5,
            ExceptionKind::Chk => 6,
            ExceptionKind::Trapv => 7,
            ExceptionKind::LineA => 10,
            ExceptionKind::LineF => 11,
            ExceptionKind::IrqAutovector(level) => 24 + level,
            ExceptionKind::Trap(n) => 32 + n,
        }
    }
}

pub(crate) enum ExceptionKind {
    Reset,
    Illegal,
    ZeroDivide,
    Chk,
    Trapv,
    LineA,
    LineF,
    IrqAutovector(u8),
    Trap(u8),
}

impl M68020 {
    pub fn execute_cycle<B: Bus<Address = u32, Data = u8> + ?Sized>(
        &mut self,
        bus: &mut B,
        master: BusMaster,
    ) {
        match self.state.clone() {
            ExecState::Fetch(byte) => {
                if byte == 0 {
                    let ints = bus.check_interrupts(master);
                    if !self.stopped && ints.ipl > 0 {
                        self.state = ExecState::Exception(
                            Self::exception_vector(ExceptionKind::IrqAutovector(ints.ipl)),
                            0,
                        );
                        return;
                    }
                    if self.stopped {
                        if ints.ipl > 0 {
                            self.stopped = false;
                        }
                        return;
                    }
                }
                // Big-endian fetch, two bytes per word slot.
                self.ir[byte as usize] = bus.read(master, self.pc.wrapping_add(byte as u32));
                if byte + 1 == 2 {
                    // Minimum one-word instruction decoded; extension words
                    // are pulled lazily by the decoder as `ir_len` grows.
                    self.ir_len = 2;
                    self.pc = self.pc.wrapping_add(2);
                    self.state = ExecState::Execute;
                } else {
                    self.state = ExecState::Fetch(byte + 1);
                }
            }
            ExecState::Execute => {
                // `execute_one` may itself raise an exception (e.g. an
                // illegal/Line-A opcode, CHK, zero-divide); only fall back
                // to fetching the next instruction if it left the state
                // machine untouched.
                decode::execute_one(self, bus, master);
                if matches!(self.state, ExecState::Execute) {
                    self.state = ExecState::Fetch(0);
                }
            }
            ExecState::Exception(vector, cycle) => {
                self.run_exception(vector, cycle, bus, master);
            }
        }
    }

    fn run_exception<B: Bus<Address = u32, Data = u8> + ?Sized>(
        &mut self,
        vector: u8,
        cycle: u8,
        bus: &mut B,
        master: BusMaster,
    ) {
        match cycle {
            0 => {
                let sp = self.sp().wrapping_sub(4);
                self.set_sp(sp);
                bus.write(master, sp, (self.pc >> 24) as u8);
                bus.write(master, sp + 1, (self.pc >> 16) as u8);
                bus.write(master, sp + 2, (self.pc >> 8) as u8);
                bus.write(master, sp + 3, self.pc as u8);
                let sp = self.sp().wrapping_sub(2);
                self.set_sp(sp);
                bus.write(master, sp, (self.sr >> 8) as u8);
                bus.write(master, sp + 1, self.sr as u8);
                self.sr |= SR_S;
                self.state = ExecState::Exception(vector, 1);
            }
            _ => {
                let vaddr = self.vbr.wrapping_add(vector as u32 * 4);
                let b0 = bus.read(master, vaddr) as u32;
                let b1 = bus.read(master, vaddr + 1) as u32;
                let b2 = bus.read(master, vaddr + 2) as u32;
                let b3 = bus.read(master, vaddr + 3) as u32;
                self.pc = (b0 << 24) | (b1 << 16) | (b2 << 8) | b3;
                self.state = ExecState::Fetch(0);
            }
        }
    }
}

impl Component for M68020 {
    fn tick(&mut self) -> bool {
        false
    }
}

impl BusMasterComponent for M68020 {
    type Bus = dyn Bus<Address = u32, Data = u8>;

    fn tick_with_bus(&mut self, bus: &mut Self::Bus, master: BusMaster) -> bool {
        self.execute_cycle(bus, master);
        matches!(self.state, ExecState::Fetch(0))
    }
}

impl Cpu for M68020 {
    fn reset(&mut self) {
        self.d = [0; 8];
        self.a = [0; 8];
        self.sr = SR_S;
        self.vbr = 0;
        self.stopped = false;
        self.state = ExecState::Fetch(0);
    }

    fn signal_interrupt(&mut self, int: InterruptState) {
        if int.ipl > 0 {
            self.stopped = false;
        }
    }

    fn is_sleeping(&self) -> bool {
        self.stopped
    }
}

impl CpuStateTrait for M68020 {
    type Snapshot = M68020State;

    fn snapshot(&self) -> M68020State {
        M68020State {
            d: self.d,
            a: self.a,
            pc: self.pc,
            sr: self.sr,
            usp: if self.supervisor() { self.usp } else { self.a[7] },
            ssp: if self.supervisor() { self.a[7] } else { self.ssp },
            vbr: self.vbr,
            fp: self.fp,
            fpcr: self.fpcr,
            fpsr: self.fpsr,
            fpiar: self.fpiar,
        }
    }
}
