pub mod bus;
pub mod component;

pub use bus::{Bus, BusMaster, InterruptState};
pub use component::{BusMasterComponent, Component};
