//! International Morse code table and timing-array encoder.
//!
//! Timing follows the PARIS standard: one unit = 1.2 / WPM seconds. A dot is
//! 1 unit on, a dash 3 units on, elements are separated by 1 unit off,
//! characters by 3 units off, and words by 7 units off.

/// Tone on for one unit.
pub const UNIT_ON: i8 = 1;
/// Silence for one unit.
pub const UNIT_OFF: i8 = -1;

pub struct MorseEncoder;

impl MorseEncoder {
    /// ITU pattern for a character, or `None` if the character has no Morse
    /// encoding. Lookup is case-insensitive.
    pub fn lookup(c: char) -> Option<&'static str> {
        match c.to_ascii_uppercase() {
            'A' => Some(".-"),
            'B' => Some("-..."),
            'C' => Some("-.-."),
            'D' => Some("-.."),
            'E' => Some("."),
            'F' => Some("..-."),
            'G' => Some("--."),
            'H' => Some("...."),
            'I' => Some(".."),
            'J' => Some(".---"),
            'K' => Some("-.-"),
            'L' => Some(".-.."),
            'M' => Some("--"),
            'N' => Some("-."),
            'O' => Some("---"),
            'P' => Some(".--."),
            'Q' => Some("--.-"),
            'R' => Some(".-."),
            'S' => Some("..."),
            'T' => Some("-"),
            'U' => Some("..-"),
            'V' => Some("...-"),
            'W' => Some(".--"),
            'X' => Some("-..-"),
            'Y' => Some("-.--"),
            'Z' => Some("--.."),
            '0' => Some("-----"),
            '1' => Some(".----"),
            '2' => Some("..---"),
            '3' => Some("...--"),
            '4' => Some("....-"),
            '5' => Some("....."),
            '6' => Some("-...."),
            '7' => Some("--..."),
            '8' => Some("---.."),
            '9' => Some("----."),
            '.' => Some(".-.-.-"),
            ',' => Some("--..--"),
            '?' => Some("..--.."),
            '\'' => Some(".----."),
            '!' => Some("-.-.--"),
            '/' => Some("-..-."),
            '(' => Some("-.--."),
            ')' => Some("-.--.-"),
            '&' => Some(".-..."),
            ':' => Some("---..."),
            ';' => Some("-.-.-."),
            '=' => Some("-...-"),
            '+' => Some(".-.-."),
            '-' => Some("-....-"),
            '_' => Some("..--.-"),
            '"' => Some(".-..-."),
            '$' => Some("...-..-"),
            '@' => Some(".--.-."),
            _ => None,
        }
    }

    /// Encode text into a timing array of `+1` (tone) / `-1` (silence) units.
    ///
    /// Characters without a Morse pattern are skipped. Spaces produce a 7-unit
    /// word gap. The array carries no leading or trailing silence.
    pub fn encode(text: &str) -> Vec<i8> {
        let mut timing = Vec::new();
        let mut pending_gap = 0usize;

        for ch in text.chars() {
            if ch == ' ' {
                if !timing.is_empty() {
                    pending_gap = 7;
                }
                continue;
            }
            let Some(pattern) = Self::lookup(ch) else {
                continue;
            };

            for _ in 0..pending_gap {
                timing.push(UNIT_OFF);
            }
            pending_gap = 3;

            for (i, element) in pattern.chars().enumerate() {
                if i > 0 {
                    timing.push(UNIT_OFF);
                }
                match element {
                    '.' => timing.push(UNIT_ON),
                    '-' => timing.extend_from_slice(&[UNIT_ON, UNIT_ON, UNIT_ON]),
                    _ => unreachable!("patterns contain only dots and dashes"),
                }
            }
        }

        timing
    }
}
