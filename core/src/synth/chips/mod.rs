//! Native sound-chip emulations selectable as the synthesizer's playback
//! engine: a generic PSG (AY-3-8910/YM2149 family), the Atari POKEY, the
//! MOS 6581/8580 SID, and the Commodore TED. Each chip owns its native
//! register set and runs at its native clock, resampling into the shared
//! 44.1kHz output stream; an optional "+" enhanced mode adds oversampling,
//! a smoothing biquad, and soft saturation on top of the bit-exact core.

pub mod pokey;
pub mod psg;
pub mod sid;
pub mod ted;
