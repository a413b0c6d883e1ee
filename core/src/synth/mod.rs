//! Four-channel programmable synthesizer plus the bundled chip emulations.

pub mod channel;
pub mod chips;
pub mod soundchip;

pub use channel::{Channel, Waveform};
pub use soundchip::{ChipMode, SoundChip};
