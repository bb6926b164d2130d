//! Single-frequency tone detection using the Goertzel algorithm.
//!
//! The detector walks the capture in fixed-size blocks, evaluates the tone
//! bin's power per block with the O(N) Goertzel recurrence, and converts the
//! power sequence into a boolean tone-on stream through a two-threshold
//! hysteresis gate.

/// Per-block tone detector for a fixed frequency.
///
/// The auto threshold (`threshold <= 0`) assumes the capture is sparsely
/// active: with more silence than tone, the median block power sits in the
/// noise floor and `3 x median` lands between noise and tone. A capture that
/// is mostly tone will over-threshold and come back all-false; pass an
/// explicit threshold for continuous-tone input.
pub struct GoertzelDetector {
    block_size: usize,
    threshold: f64,
    coeff: f64,
}

impl GoertzelDetector {
    /// Build a detector for `tone_freq` at `sample_rate`, analyzing
    /// `block_size` samples per block. `threshold <= 0` selects the
    /// median-based auto threshold.
    pub fn new(sample_rate: f64, tone_freq: f64, block_size: usize, threshold: f64) -> Self {
        // Integer bin index for bin-centered detection.
        let k = (block_size as f64 * tone_freq / sample_rate).round();
        let coeff = 2.0 * (2.0 * std::f64::consts::PI * k / block_size as f64).cos();
        Self {
            block_size,
            threshold,
            coeff,
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Goertzel power of one block: s1^2 + s2^2 - coeff * s1 * s2.
    fn power(&self, samples: &[f32]) -> f64 {
        let mut s1 = 0.0f64;
        let mut s2 = 0.0f64;
        for &sample in samples {
            let s0 = sample as f64 + self.coeff * s1 - s2;
            s2 = s1;
            s1 = s0;
        }
        s1 * s1 + s2 * s2 - self.coeff * s1 * s2
    }

    /// Process a PCM buffer into one tone-present boolean per block.
    ///
    /// Only `floor(len / block_size)` whole blocks are analyzed; trailing
    /// samples are discarded.
    pub fn detect(&self, pcm: &[f32]) -> Vec<bool> {
        if pcm.is_empty() || self.block_size == 0 {
            return Vec::new();
        }
        let num_blocks = pcm.len() / self.block_size;
        if num_blocks == 0 {
            return Vec::new();
        }

        let powers: Vec<f64> = (0..num_blocks)
            .map(|i| self.power(&pcm[i * self.block_size..(i + 1) * self.block_size]))
            .collect();

        let mut thresh_on = self.threshold;
        if thresh_on <= 0.0 {
            let mut sorted = powers.clone();
            sorted.sort_by(|a, b| a.partial_cmp(b).expect("block powers are finite"));
            let median = sorted[sorted.len() / 2];
            // Floor keeps digital silence (median exactly 0) all-false.
            thresh_on = (crate::AUTO_THRESHOLD_FACTOR * median).max(f64::MIN_POSITIVE);
        }
        let thresh_off = thresh_on * crate::HYSTERESIS_RATIO;

        // Hysteresis gate: a block must reach the on-threshold to switch the
        // tone on and fall below the off-threshold to switch it off. The 30%
        // margin suppresses mid-dash flicker from near-threshold blocks,
        // which would otherwise split runs and break timing classification.
        let mut result = Vec::with_capacity(num_blocks);
        let mut state = false;
        for &power in &powers {
            if state {
                if power < thresh_off {
                    state = false;
                }
            } else if power >= thresh_on {
                state = true;
            }
            result.push(state);
        }
        result
    }
}
