//! Frame envelope parsing: locate the payload between the `KKK ` preamble
//! and the ` AR` prosign, then verify its CRC.

use crate::checksum::Checksum;
use crate::{FRAME_CRC_LEN, FRAME_PREFIX, FRAME_SUFFIX};

/// Outcome of a deframe attempt. On a CRC mismatch the payload is still
/// returned for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeframeResult {
    pub valid: bool,
    pub payload: String,
    pub error: String,
}

impl DeframeResult {
    fn failure(payload: &str, error: String) -> Self {
        Self {
            valid: false,
            payload: payload.to_string(),
            error,
        }
    }
}

pub struct Deframer;

impl Deframer {
    /// Strip the envelope from decoded Morse text and verify the embedded
    /// CRC-32.
    ///
    /// Outer spaces are ignored first: captured audio almost always carries
    /// word gaps from leading/trailing silence, which decode to spaces around
    /// the frame.
    pub fn deframe(text: &str) -> DeframeResult {
        let text = text.trim_matches(' ');

        if text.len() < FRAME_PREFIX.len() + FRAME_SUFFIX.len() {
            return DeframeResult::failure("", "frame too short".to_string());
        }
        if !text.starts_with(FRAME_PREFIX) {
            return DeframeResult::failure("", "missing KKK preamble".to_string());
        }
        if !text.ends_with(FRAME_SUFFIX) {
            return DeframeResult::failure("", "missing AR prosign".to_string());
        }

        let body = &text[FRAME_PREFIX.len()..text.len() - FRAME_SUFFIX.len()];
        if body.len() < FRAME_CRC_LEN {
            return DeframeResult::failure("", "body too short for CRC".to_string());
        }

        let (payload, received_crc) = body.split_at(body.len() - FRAME_CRC_LEN);
        let expected_crc = Checksum::encode_crc(Checksum::crc32(payload));

        if received_crc != expected_crc {
            return DeframeResult::failure(
                payload,
                format!("CRC mismatch: expected {expected_crc}, got {received_crc}"),
            );
        }

        DeframeResult {
            valid: true,
            payload: payload.to_string(),
            error: String::new(),
        }
    }
}
