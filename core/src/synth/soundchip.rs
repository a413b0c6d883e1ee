//! Mixes the four synthesizer channels (plus any active native chip
//! emulation) through a global state-variable filter, soft-clip overdrive,
//! and Schroeder reverb, then hands finished samples to the audio backend.
//!
//! The per-stage constants below (SVF cutoff mapping, overdrive drive
//! scaling, comb decay ratios, reverb wet scale) are pinned exactly so the
//! engine's output is reproducible and testable, not tuned by ear.

use super::channel::Channel;
use super::chips::{psg::Psg, sid::Sid, ted::Ted};
use crate::synth::chips::pokey::Pokey;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChipMode {
    None,
    Psg { enhanced: bool },
    Pokey { enhanced: bool },
    Sid { enhanced: bool, pal: bool },
    Ted { enhanced: bool },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterType {
    Off,
    Low,
    Band,
    High,
}

/// Global state-variable filter (Chamberlin topology), driven by the
/// cutoff/resonance mapping from the mixing pipeline below.
struct StateVariableFilter {
    low: f32,
    band: f32,
}

impl StateVariableFilter {
    fn new() -> Self {
        Self { low: 0.0, band: 0.0 }
    }

    /// `f` is the already-computed cutoff coefficient in `[0, 0.95]`
    /// radians-normalized; `q` is the resonance term (`resonance * 4`).
    fn process(&mut self, input: f32, f: f32, q: f32) -> (f32, f32, f32) {
        let high = input - self.low - q * self.band;
        self.band += f * high;
        self.low += f * self.band;
        (
            self.low.clamp(-1.0, 1.0),
            self.band.clamp(-1.0, 1.0),
            high.clamp(-1.0, 1.0),
        )
    }
}

/// 4-comb / 2-allpass Schroeder reverb. Comb decays are fixed ratios of a
/// `mix`-derived base, matching a real plate's roughly-parallel-prime
/// delay lengths (at 44.1kHz) rather than a single shared feedback value.
struct Reverb {
    combs: [Vec<f32>; 4],
    comb_pos: [usize; 4],
    comb_feedback: [f32; 4],
    allpass: [Vec<f32>; 2],
    allpass_pos: [usize; 2],
}

const COMB_LENGTHS: [usize; 4] = [1557, 1617, 1491, 1422];
const ALLPASS_LENGTHS: [usize; 2] = [225, 556];
const ALLPASS_FEEDBACK: f32 = 0.5;
const COMB_DECAY_RATIOS: [f32; 4] = [0.97, 0.95, 0.93, 0.91];

impl Reverb {
    fn new() -> Self {
        Self {
            combs: COMB_LENGTHS.map(|n| vec![0.0; n]),
            comb_pos: [0; 4],
            comb_feedback: [0.0; 4],
            allpass: ALLPASS_LENGTHS.map(|n| vec![0.0; n]),
            allpass_pos: [0; 2],
        }
    }

    fn set_mix(&mut self, mix: f32) {
        let base = 0.1 + mix * 0.89;
        for (fb, ratio) in self.comb_feedback.iter_mut().zip(COMB_DECAY_RATIOS) {
            *fb = ratio * base;
        }
    }

    fn process(&mut self, input: f32, mix: f32) -> f32 {
        let mut wet = 0.0;
        for i in 0..4 {
            let buf = &mut self.combs[i];
            let pos = self.comb_pos[i];
            let delayed = buf[pos];
            buf[pos] = input + delayed * self.comb_feedback[i];
            self.comb_pos[i] = (pos + 1) % buf.len();
            wet += delayed;
        }
        for i in 0..2 {
            let buf = &mut self.allpass[i];
            let pos = self.allpass_pos[i];
            let delayed = buf[pos];
            let input_ap = wet;
            wet = -input_ap + delayed;
            buf[pos] = input_ap + delayed * ALLPASS_FEEDBACK;
            self.allpass_pos[i] = (pos + 1) % buf.len();
        }
        wet *= 0.3;
        input * (1.0 - mix) + wet * mix
    }
}

const POKEY_MASTER_CLOCK_HZ: u32 = 1_789_773;

pub struct SoundChip {
    pub channels: [Channel; 4],
    filter: StateVariableFilter,
    reverb: Reverb,

    pub filter_type: FilterType,
    /// Public cutoff in `[0, 1]`; mapped to 0-20kHz at the synthesis tap.
    pub filter_cutoff: f32,
    pub filter_resonance: f32,
    pub filter_mod_src: Option<usize>,
    pub filter_mod_amount: f32,
    pub overdrive_level: f32,
    pub reverb_mix: f32,
    pub enable: bool,

    sample_rate: u32,
    last_raw: [f32; 4],

    pub chip_mode: ChipMode,
    psg: Option<Psg>,
    pokey: Option<Pokey>,
    sid: Option<Sid>,
    ted: Option<Ted>,
}

impl SoundChip {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            channels: std::array::from_fn(|_| Channel::new()),
            filter: StateVariableFilter::new(),
            reverb: Reverb::new(),
            filter_type: FilterType::Off,
            filter_cutoff: 0.5,
            filter_resonance: 0.0,
            filter_mod_src: None,
            filter_mod_amount: 0.0,
            overdrive_level: 0.0,
            reverb_mix: 0.0,
            enable: true,
            sample_rate,
            last_raw: [0.0; 4],
            chip_mode: ChipMode::None,
            psg: None,
            pokey: None,
            sid: None,
            ted: None,
        }
    }

    pub fn set_chip_mode(&mut self, mode: ChipMode) {
        self.chip_mode = mode;
        self.psg = None;
        self.pokey = None;
        self.sid = None;
        self.ted = None;
        match mode {
            ChipMode::None => {}
            ChipMode::Psg { enhanced } => self.psg = Some(Psg::new(self.sample_rate, enhanced)),
            ChipMode::Pokey { .. } => self.pokey = Some(Pokey::new(self.sample_rate)),
            ChipMode::Sid { enhanced, pal } => {
                self.sid = Some(Sid::new(self.sample_rate, enhanced, pal))
            }
            ChipMode::Ted { enhanced } => self.ted = Some(Ted::new(self.sample_rate, enhanced)),
        }
    }

    pub fn pokey_mut(&mut self) -> Option<&mut Pokey> {
        self.pokey.as_mut()
    }

    pub fn sid_mut(&mut self) -> Option<&mut Sid> {
        self.sid.as_mut()
    }

    pub fn psg_mut(&mut self) -> Option<&mut Psg> {
        self.psg.as_mut()
    }

    pub fn ted_mut(&mut self) -> Option<&mut Ted> {
        self.ted.as_mut()
    }

    pub fn pokey_ref(&self) -> Option<&Pokey> {
        self.pokey.as_ref()
    }

    pub fn sid_ref(&self) -> Option<&Sid> {
        self.sid.as_ref()
    }

    pub fn psg_ref(&self) -> Option<&Psg> {
        self.psg.as_ref()
    }

    pub fn ted_ref(&self) -> Option<&Ted> {
        self.ted.as_ref()
    }

    /// Produce one mixed sample (mono, pre-backend). The four channels
    /// always run; an active chip emulation is summed in alongside them
    /// rather than replacing them, matching hardware setups where the
    /// synth and a plugged-in chip player share the same output stage.
    pub fn next_sample(&mut self) -> f32 {
        if !self.enable {
            return 0.0;
        }

        let mut new_raw = [0.0f32; 4];
        let mut mixed = 0.0;
        for i in 0..4 {
            let sync_phase = self.channels[i].sync_src.map(|s| self.channels[s].phase());
            let ring_raw = self.channels[i].ring_src.map(|s| self.last_raw[s]);
            let raw = self.channels[i].tick(sync_phase, ring_raw);
            new_raw[i] = raw;
            if self.channels[i].enable {
                mixed += raw * self.channels[i].volume * self.channels[i].envelope_level() * 0.25;
            }
        }
        self.last_raw = new_raw;

        if let Some(psg) = &mut self.psg {
            psg.tick();
            mixed += psg.output();
        }
        if let Some(pokey) = &mut self.pokey {
            // POKEY's tick() advances one master-clock cycle; run enough
            // of them to cover one output sample period before draining.
            let cycles_per_sample = (POKEY_MASTER_CLOCK_HZ / self.sample_rate).max(1);
            for _ in 0..cycles_per_sample {
                pokey.tick();
            }
            let drained = pokey.drain_audio();
            if let Some(&last) = drained.last() {
                mixed += last;
            }
        }
        if let Some(sid) = &mut self.sid {
            mixed += sid.tick();
        }
        if let Some(ted) = &mut self.ted {
            mixed += ted.tick();
        }

        let filtered = if self.filter_type == FilterType::Off {
            mixed
        } else {
            let mod_raw = self.filter_mod_src.map(|s| self.last_raw[s]).unwrap_or(0.0);
            let effective_hz =
                (self.filter_cutoff + mod_raw * self.filter_mod_amount * 2.0) * 20_000.0;
            let f = (std::f32::consts::TAU * effective_hz / self.sample_rate as f32)
                .clamp(0.0, 0.95);
            let q = self.filter_resonance * 4.0;
            let (low, band, high) = self.filter.process(mixed, f, q);
            match self.filter_type {
                FilterType::Low => low,
                FilterType::Band => band,
                FilterType::High => high,
                FilterType::Off => mixed,
            }
        };

        let driven = (filtered * self.overdrive_level * 2.0).tanh();
        self.reverb.set_mix(self.reverb_mix);
        self.reverb.process(driven, self.reverb_mix).clamp(-1.0, 1.0)
    }
}
