//! Morse demodulation: per-block tone bits to decoded text.
//!
//! The boolean stream is run-length encoded and each run is classified
//! against unit-multiple thresholds. Ideal element ratios are 1:3:3:7
//! (dot : dash : inter-character gap : word gap); placing the dot/dash and
//! intra/inter-character boundaries at 2 units and the word-gap boundary at
//! 5 units puts each decision at the midpoint, tolerating +-50% timing drift.

use std::collections::HashMap;

use crate::morse::MorseEncoder;

/// Characters the demodulator can resolve: the Base43 alphabet (letters,
/// digits, `$ + / . : - ?`). Space is implicit via word gaps.
const TABLE_PUNCTUATION: [char; 7] = ['$', '+', '/', '.', ':', '-', '?'];

pub struct MorseDemodulator {
    blocks_per_unit: usize,
    reverse_table: HashMap<&'static str, char>,
}

impl MorseDemodulator {
    /// Build a demodulator for a given timing resolution (detector blocks per
    /// Morse unit).
    ///
    /// The reverse table is built by querying the forward encoder so the
    /// pattern set lives in one place.
    pub fn new(blocks_per_unit: usize) -> Self {
        let mut reverse_table = HashMap::new();
        let chars = ('A'..='Z').chain('0'..='9').chain(TABLE_PUNCTUATION);
        for c in chars {
            if let Some(pattern) = MorseEncoder::lookup(c) {
                reverse_table.insert(pattern, c);
            }
        }
        Self {
            blocks_per_unit,
            reverse_table,
        }
    }

    /// Decode a tone-bit stream into text. Unknown patterns come out as `?`
    /// so a downstream deframe failure still surfaces the partial text.
    pub fn decode(&self, tones: &[bool]) -> String {
        if tones.is_empty() {
            return String::new();
        }

        // Run-length encode: maximal constant segments as (on, blocks).
        let mut runs: Vec<(bool, usize)> = Vec::new();
        let mut current = tones[0];
        let mut count = 1usize;
        for &tone in &tones[1..] {
            if tone == current {
                count += 1;
            } else {
                runs.push((current, count));
                current = tone;
                count = 1;
            }
        }
        runs.push((current, count));

        let dot_dash = 2 * self.blocks_per_unit;
        let word_gap = 5 * self.blocks_per_unit;

        let mut result = String::new();
        let mut pattern = String::new();

        for (on, length) in runs {
            if on {
                pattern.push(if length < dot_dash { '.' } else { '-' });
            } else if length < dot_dash {
                // Intra-character gap: elements keep accumulating.
            } else if length < word_gap {
                self.flush(&mut pattern, &mut result);
            } else {
                self.flush(&mut pattern, &mut result);
                // Word gap. Suppressed at the start of output so leading
                // capture silence does not fabricate a space.
                if !result.is_empty() {
                    result.push(' ');
                }
            }
        }
        self.flush(&mut pattern, &mut result);

        result
    }

    /// Resolve the accumulated pattern and append it to the output.
    fn flush(&self, pattern: &mut String, result: &mut String) {
        if pattern.is_empty() {
            return;
        }
        match self.reverse_table.get(pattern.as_str()) {
            Some(&c) => result.push(c),
            None => result.push('?'),
        }
        pattern.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BPU: usize = 3;

    fn demod() -> MorseDemodulator {
        MorseDemodulator::new(BPU)
    }

    /// Expand a timing array (one entry per unit) to a block stream.
    fn blocks_from_timing(timing: &[i8]) -> Vec<bool> {
        timing
            .iter()
            .flat_map(|&t| std::iter::repeat(t > 0).take(BPU))
            .collect()
    }

    #[test]
    fn test_empty_stream() {
        assert_eq!(demod().decode(&[]), "");
    }

    #[test]
    fn test_all_silence_yields_empty_text() {
        assert_eq!(demod().decode(&[false; 50]), "");
    }

    #[test]
    fn test_single_character() {
        let tones = blocks_from_timing(&MorseEncoder::encode("K"));
        assert_eq!(demod().decode(&tones), "K");
    }

    #[test]
    fn test_words_and_gaps() {
        let tones = blocks_from_timing(&MorseEncoder::encode("KKK A"));
        assert_eq!(demod().decode(&tones), "KKK A");
    }

    #[test]
    fn test_full_alphabet_round_trip() {
        let text = "ABCDEFGHIJKLMNOPQRSTUVWXYZ 0123456789 $+-./:?";
        let tones = blocks_from_timing(&MorseEncoder::encode(text));
        assert_eq!(demod().decode(&tones), text);
    }

    #[test]
    fn test_unknown_pattern_emits_question_mark() {
        // Seven dots separated by intra-character gaps: not a valid
        // character.
        let mut tones = Vec::new();
        for i in 0..7 {
            if i > 0 {
                tones.extend(vec![false; BPU]);
            }
            tones.extend(vec![true; BPU]);
        }
        assert_eq!(demod().decode(&tones), "?");
    }

    #[test]
    fn test_leading_and_trailing_silence() {
        let mut tones = vec![false; 40];
        tones.extend(blocks_from_timing(&MorseEncoder::encode("KKK")));
        tones.extend(vec![false; 40]);
        // Leading gap produces no space; the trailing one does, after text.
        assert_eq!(demod().decode(&tones), "KKK ");
    }

    #[test]
    fn test_timing_drift_tolerance() {
        // Dots stretched to 1.4 units and dashes squeezed to 2.5 still
        // classify correctly against the 2-unit boundary.
        let dot = (BPU as f64 * 1.4).round() as usize; // 4 blocks
        let dash = (BPU as f64 * 2.5).round() as usize; // 8 blocks
        let gap = BPU; // intra-character
        let mut tones = Vec::new();
        // K = "-.-"
        tones.extend(vec![true; dash]);
        tones.extend(vec![false; gap]);
        tones.extend(vec![true; dot]);
        tones.extend(vec![false; gap]);
        tones.extend(vec![true; dash]);
        assert_eq!(demod().decode(&tones), "K");
    }

    #[test]
    fn test_reverse_table_tracks_forward_encoder() {
        let demod = demod();
        for c in ('A'..='Z').chain('0'..='9').chain(TABLE_PUNCTUATION) {
            let pattern = MorseEncoder::lookup(c).unwrap();
            assert_eq!(demod.reverse_table.get(pattern), Some(&c));
        }
    }
}
