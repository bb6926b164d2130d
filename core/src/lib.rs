//! CW (Morse) audio codec for relaying raw Bitcoin transactions
//!
//! Transmit: hex -> Base43 -> framed text with CRC-32 -> Morse timing -> PCM tone.
//! Receive: PCM -> Goertzel tone bits -> Morse text -> deframe -> Base43 -> hex.

pub mod base43;
pub mod checksum;
pub mod deframer;
pub mod demod;
pub mod error;
pub mod goertzel;
pub mod morse;
pub mod pipeline;
pub mod tone;
pub mod transaction;

pub use base43::Base43;
pub use checksum::Checksum;
pub use deframer::{DeframeResult, Deframer};
pub use demod::MorseDemodulator;
pub use error::{CodecError, Result};
pub use goertzel::GoertzelDetector;
pub use morse::MorseEncoder;
pub use pipeline::{encode_tx, DecodePipeline, DecodeResult, DecodeStage};
pub use tone::{render_timing, samples_per_unit, unit_duration};
pub use transaction::Transaction;

// Audio configuration defaults
pub const SAMPLE_RATE: u32 = 44_100;
pub const TONE_FREQ_HZ: f64 = 750.0;
pub const WPM: u32 = 20;
pub const TONE_AMPLITUDE: f64 = 0.8;

// Goertzel detector defaults
pub const GOERTZEL_BLOCK_SIZE: usize = 882; // ~20 ms at 44.1 kHz
pub const AUTO_THRESHOLD_FACTOR: f64 = 3.0; // on-threshold = 3 x median block power
pub const HYSTERESIS_RATIO: f64 = 0.7; // off-threshold = 0.7 x on-threshold

// Frame envelope
pub const FRAME_PREFIX: &str = "KKK ";
pub const FRAME_SUFFIX: &str = " AR";
pub const FRAME_CRC_LEN: usize = 4;
pub const FRAME_MIN_LEN: usize = FRAME_PREFIX.len() + FRAME_CRC_LEN + FRAME_SUFFIX.len();
