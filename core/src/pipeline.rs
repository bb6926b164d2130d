//! Staged encode and decode pipelines.
//!
//! Transmit: hex -> validate -> bytes -> Base43 -> frame(+CRC) -> timing.
//! Receive: PCM -> Goertzel bits -> Morse text -> deframe -> Base43 -> hex
//! -> validate. The decoder short-circuits at the first failing stage but
//! keeps every artifact computed so far for diagnostics.

use log::{debug, info};

use crate::base43::Base43;
use crate::checksum::Checksum;
use crate::deframer::Deframer;
use crate::demod::MorseDemodulator;
use crate::goertzel::GoertzelDetector;
use crate::morse::MorseEncoder;
use crate::tone::unit_duration;
use crate::transaction::Transaction;

/// Progress marker for the decode pipeline, strictly increasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum DecodeStage {
    #[default]
    None,
    Goertzel,
    MorseDecode,
    Deframe,
    Base43Decode,
    Validate,
    Complete,
}

/// Result of a decode run: the furthest stage reached plus every
/// intermediate artifact produced up to that point.
#[derive(Debug, Clone, Default)]
pub struct DecodeResult {
    pub stage_reached: DecodeStage,
    pub success: bool,

    pub tone_bits: Vec<bool>,
    pub morse_text: String,
    pub base43_payload: String,
    pub raw_bytes: Vec<u8>,
    pub hex_string: String,

    pub error: String,
}

/// Full receive pipeline: PCM capture to validated transaction hex.
///
/// Immutable after construction and reusable across captures.
pub struct DecodePipeline {
    detector: GoertzelDetector,
    demodulator: MorseDemodulator,
}

impl DecodePipeline {
    /// Construct a pipeline for the given audio parameters. `threshold <= 0`
    /// selects the detector's auto threshold.
    pub fn new(sample_rate: u32, tone_freq: f64, wpm: u32, block_size: usize, threshold: f64) -> Self {
        let blocks_per_unit =
            (unit_duration(wpm) * sample_rate as f64 / block_size as f64).round() as usize;
        Self {
            detector: GoertzelDetector::new(sample_rate as f64, tone_freq, block_size, threshold),
            demodulator: MorseDemodulator::new(blocks_per_unit),
        }
    }

    /// Run the staged decoder over a PCM capture.
    pub fn decode(&self, pcm: &[f32]) -> DecodeResult {
        let mut result = DecodeResult::default();

        result.stage_reached = DecodeStage::Goertzel;
        result.tone_bits = self.detector.detect(pcm);
        if result.tone_bits.is_empty() {
            result.error = "Goertzel: no blocks to analyze".to_string();
            return result;
        }

        result.stage_reached = DecodeStage::MorseDecode;
        result.morse_text = self.demodulator.decode(&result.tone_bits);
        if result.morse_text.is_empty() {
            result.error = "Morse decode: no text recovered".to_string();
            return result;
        }
        debug!("morse text: {}", result.morse_text);

        result.stage_reached = DecodeStage::Deframe;
        let deframed = Deframer::deframe(&result.morse_text);
        if !deframed.valid {
            result.base43_payload = deframed.payload;
            result.error = format!("Deframe: {}", deframed.error);
            return result;
        }
        result.base43_payload = deframed.payload;

        result.stage_reached = DecodeStage::Base43Decode;
        result.raw_bytes = Base43::decode(&result.base43_payload);
        if result.raw_bytes.is_empty() {
            result.error = "Base43 decode: invalid encoding".to_string();
            return result;
        }

        result.stage_reached = DecodeStage::Validate;
        result.hex_string = Transaction::bytes_to_hex(&result.raw_bytes);
        if !Transaction::validate(&result.hex_string) {
            result.error = "Transaction validation failed".to_string();
            return result;
        }

        result.stage_reached = DecodeStage::Complete;
        result.success = true;
        result
    }
}

/// Encode a raw transaction hex into a framed Morse timing array.
///
/// Returns an empty array if the transaction fails validation — the empty
/// array is the sole failure signal on the transmit side.
pub fn encode_tx(raw_tx_hex: &str) -> Vec<i8> {
    if !Transaction::validate(raw_tx_hex) {
        return Vec::new();
    }

    // Validation implies the hex decodes.
    let raw_bytes = Transaction::hex_to_bytes(raw_tx_hex).expect("validated hex decodes");
    let payload = Base43::encode(&raw_bytes);
    let framed = Checksum::frame(&payload);
    info!("framed payload: {} chars", framed.len());

    MorseEncoder::encode(&framed)
}
