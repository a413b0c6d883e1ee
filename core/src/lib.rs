pub mod backend;
pub mod core;
pub mod cpu;
pub mod error;
pub mod machine;
pub mod synth;
pub mod timer;
pub mod video;

pub mod prelude {
    pub use crate::backend::{AudioBackend, VideoBackend};
    pub use crate::core::{Bus, BusMaster, BusMasterComponent, Component, bus::InterruptState};
    pub use crate::cpu::Cpu;
    pub use crate::error::LoadError;
    pub use crate::machine::{CpuMode, Machine};
}
