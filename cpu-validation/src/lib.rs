//! Shared harness for the 6502/Z80 `SingleStepTests` JSON vector format:
//! a flat 64KB tracing bus (records every read/write/port access in
//! order) plus the per-core JSON test-case shapes.

use std::collections::VecDeque;

use confluence_core::core::bus::InterruptState;
use confluence_core::core::{Bus, BusMaster};
use serde::{Deserialize, Serialize};

// --- TracingBus: flat 64KB memory with cycle-by-cycle recording ---

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BusOp {
    Read,
    Write,
    Internal,
}

#[derive(Clone, Debug)]
pub struct BusCycle {
    pub addr: u16,
    pub data: u8,
    pub op: BusOp,
}

pub struct TracingBus {
    pub memory: [u8; 0x10000],
    pub cycles: Vec<BusCycle>,
    /// Pre-seeded `(addr, data, 'r'|'w')` port responses for Z80 `IN`/`OUT`
    /// vectors, consumed in order as the instruction executes.
    pub port_queue: Vec<(u16, u8, char)>,
}

impl TracingBus {
    pub fn new() -> Self {
        Self {
            memory: [0; 0x10000],
            cycles: Vec::new(),
            port_queue: Vec::new(),
        }
    }

    pub fn load(&mut self, addr: u16, data: &[u8]) {
        let start = addr as usize;
        self.memory[start..start + data.len()].copy_from_slice(data);
    }

    pub fn clear_cycles(&mut self) {
        self.cycles.clear();
    }

    fn take_port_response(&mut self, addr: u16, dir: char) -> Option<u8> {
        let pos = self
            .port_queue
            .iter()
            .position(|&(a, _, d)| a == addr && d == dir)?;
        Some(self.port_queue.remove(pos).1)
    }
}

impl Default for TracingBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus for TracingBus {
    type Address = u16;
    type Data = u8;

    fn read(&mut self, _master: BusMaster, addr: u16) -> u8 {
        let data = self.memory[addr as usize];
        self.cycles.push(BusCycle {
            addr,
            data,
            op: BusOp::Read,
        });
        data
    }

    fn write(&mut self, _master: BusMaster, addr: u16, data: u8) {
        self.memory[addr as usize] = data;
        self.cycles.push(BusCycle {
            addr,
            data,
            op: BusOp::Write,
        });
    }

    fn io_read(&mut self, _master: BusMaster, addr: u16) -> u8 {
        let data = self.take_port_response(addr, 'r').unwrap_or(0);
        self.cycles.push(BusCycle {
            addr,
            data,
            op: BusOp::Read,
        });
        data
    }

    fn io_write(&mut self, _master: BusMaster, addr: u16, data: u8) {
        self.cycles.push(BusCycle {
            addr,
            data,
            op: BusOp::Write,
        });
    }

    fn is_halted_for(&self, _master: BusMaster) -> bool {
        false
    }

    fn check_interrupts(&self, _target: BusMaster) -> InterruptState {
        InterruptState::default()
    }
}

// --- M6502 JSON test vector types (SingleStepTests/65x02 format) ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct M6502TestCase {
    pub name: String,
    pub initial: M6502CpuState,
    #[serde(rename = "final")]
    pub final_state: M6502CpuState,
    pub cycles: Vec<(u16, u8, String)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct M6502CpuState {
    pub pc: u16,
    pub s: u8,
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub p: u8,
    pub ram: Vec<(u16, u8)>,
}

// --- Z80 JSON test vector types (raddad772/jsmoo / SingleStepTests z80 format) ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Z80TestCase {
    pub name: String,
    pub initial: Z80CpuState,
    #[serde(rename = "final")]
    pub final_state: Z80CpuState,
    pub cycles: Vec<(u16, u8, String)>,
    #[serde(default)]
    pub ports: Vec<(u16, u8, String)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Z80CpuState {
    pub pc: u16,
    pub sp: u16,
    pub a: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub f: u8,
    pub h: u8,
    pub l: u8,
    pub i: u8,
    pub r: u8,
    pub ix: u16,
    pub iy: u16,
    pub iff1: u8,
    pub iff2: u8,
    pub im: u8,
    pub ei: u8,
    pub p: u8,
    pub q: u8,
    pub wz: u16,
    pub af_prime: u16,
    pub bc_prime: u16,
    pub de_prime: u16,
    pub hl_prime: u16,
    pub ram: Vec<(u16, u8)>,
}
