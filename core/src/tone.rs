//! Timing-array rendering: Morse units to a PCM sine tone.

use std::f64::consts::PI;

use crate::TONE_AMPLITUDE;

/// Duration of one Morse timing unit in seconds (PARIS standard: a 50-unit
/// word, so unit = 1.2 / WPM).
pub fn unit_duration(wpm: u32) -> f64 {
    1.2 / wpm as f64
}

/// Number of PCM samples in one timing unit.
pub fn samples_per_unit(sample_rate: u32, wpm: u32) -> usize {
    (sample_rate as f64 * unit_duration(wpm)) as usize
}

/// Render a timing array (`+1` tone / `-1` silence per unit) into mono f32
/// PCM at the given sample rate.
///
/// The sample index runs monotonically across the whole message rather than
/// resetting per unit, so consecutive tone units join with continuous phase.
/// That keeps unit boundaries click-free and the spectral energy tight around
/// the tone frequency for the Goertzel detector on the receive side.
pub fn render_timing(timing: &[i8], sample_rate: u32, tone_freq: f64, wpm: u32) -> Vec<f32> {
    let spu = samples_per_unit(sample_rate, wpm);
    let omega = 2.0 * PI * tone_freq / sample_rate as f64;

    let mut pcm = Vec::with_capacity(timing.len() * spu);
    let mut sample_idx = 0u64;

    for &unit in timing {
        for _ in 0..spu {
            if unit > 0 {
                pcm.push((TONE_AMPLITUDE * (omega * sample_idx as f64).sin()) as f32);
            } else {
                pcm.push(0.0);
            }
            sample_idx += 1;
        }
    }
    pcm
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SAMPLE_RATE, TONE_FREQ_HZ, WPM};

    #[test]
    fn test_unit_duration_paris() {
        assert!((unit_duration(20) - 0.06).abs() < 1e-12);
        assert!((unit_duration(12) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_samples_per_unit_defaults() {
        // 60 ms at 44.1 kHz: exactly three 882-sample detector blocks.
        assert_eq!(samples_per_unit(SAMPLE_RATE, WPM), 2646);
    }

    #[test]
    fn test_render_length() {
        let timing = vec![1i8, -1, 1];
        let pcm = render_timing(&timing, SAMPLE_RATE, TONE_FREQ_HZ, WPM);
        assert_eq!(pcm.len(), 3 * 2646);
    }

    #[test]
    fn test_silence_units_are_zero() {
        let pcm = render_timing(&[-1, -1], SAMPLE_RATE, TONE_FREQ_HZ, WPM);
        assert!(pcm.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_amplitude_bound() {
        let pcm = render_timing(&[1, 1, 1], SAMPLE_RATE, TONE_FREQ_HZ, WPM);
        let peak = pcm.iter().fold(0.0f32, |acc, &s| acc.max(s.abs()));
        assert!(peak <= 0.8 + 1e-6);
        assert!(peak > 0.75);
    }

    #[test]
    fn test_phase_continuity_across_on_units() {
        // Adjacent on-units must not introduce a sample-to-sample jump larger
        // than the sine's per-sample slope bound.
        let pcm = render_timing(&[1, 1], SAMPLE_RATE, TONE_FREQ_HZ, WPM);
        let omega = 2.0 * std::f64::consts::PI * TONE_FREQ_HZ / SAMPLE_RATE as f64;
        let max_step = (0.8 * omega) as f32 * 1.01;
        let boundary = samples_per_unit(SAMPLE_RATE, WPM);
        let jump = (pcm[boundary] - pcm[boundary - 1]).abs();
        assert!(jump <= max_step, "jump {jump} exceeds slope bound {max_step}");
    }
}
