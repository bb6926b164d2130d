//! Alternative capture source: software-radio I/Q input.
//!
//! Consumes 8-bit interleaved I/Q (the RTL-SDR wire format), shifts the
//! keyed carrier down to the audio tone frequency with a complex mixer, and
//! boxcar-decimates to the audio sample rate. The decode pipeline is unaware
//! of the source; it still receives plain PCM.

use std::f64::consts::PI;

#[derive(Debug, Clone)]
pub struct SdrConfig {
    /// I/Q sample rate of the source stream.
    pub input_rate: u32,
    /// Audio-rate output fed to the decode pipeline.
    pub audio_rate: u32,
    /// Mixer shift: the received carrier offset minus the desired audio
    /// tone. Input energy at `shift_hz + f` lands at `f` after mixing.
    pub shift_hz: f64,
}

pub struct IqDownconverter {
    config: SdrConfig,
    decimation: usize,
}

impl IqDownconverter {
    /// Build a down-converter. The input rate must be an integer multiple of
    /// the audio rate.
    pub fn new(config: SdrConfig) -> Option<Self> {
        if config.audio_rate == 0 || config.input_rate % config.audio_rate != 0 {
            return None;
        }
        let decimation = (config.input_rate / config.audio_rate) as usize;
        Some(Self { config, decimation })
    }

    /// Convert an interleaved 8-bit I/Q buffer into audio-rate mono PCM.
    ///
    /// Complex samples are mixed by `-shift_hz`, low-passed with a boxcar
    /// over each decimation window, and the real part is emitted.
    pub fn downconvert(&self, iq: &[u8]) -> Vec<f32> {
        let pairs = iq.len() / 2;
        let omega = -2.0 * PI * self.config.shift_hz / self.config.input_rate as f64;

        let mut pcm = Vec::with_capacity(pairs / self.decimation);
        let mut acc = 0.0f64;
        let mut held = 0usize;

        for n in 0..pairs {
            let i = (iq[2 * n] as f64 - 127.5) / 127.5;
            let q = (iq[2 * n + 1] as f64 - 127.5) / 127.5;

            let phase = omega * n as f64;
            let (sin, cos) = phase.sin_cos();
            // Real part of (i + jq) * e^{j phase}.
            acc += i * cos - q * sin;
            held += 1;

            if held == self.decimation {
                pcm.push((acc / self.decimation as f64) as f32);
                acc = 0.0;
                held = 0;
            }
        }
        pcm
    }
}
