//! End-to-end pipeline tests: rendered audio back through the full decoder.

use btccw_core::{
    encode_tx, render_timing, Base43, Checksum, DecodePipeline, DecodeStage, Deframer,
    MorseDemodulator, MorseEncoder, Transaction, GOERTZEL_BLOCK_SIZE, SAMPLE_RATE, TONE_FREQ_HZ,
    WPM,
};

/// Explicit detector threshold for rendered captures: well under the
/// ~(0.8 * N / 2)^2 power of a full tone block, well over silence.
const RENDER_THRESHOLD: f64 = 20_000.0;

fn pipeline_with(threshold: f64) -> DecodePipeline {
    DecodePipeline::new(SAMPLE_RATE, TONE_FREQ_HZ, WPM, GOERTZEL_BLOCK_SIZE, threshold)
}

fn render(timing: &[i8]) -> Vec<f32> {
    render_timing(timing, SAMPLE_RATE, TONE_FREQ_HZ, WPM)
}

/// A structurally valid, signed P2PKH-style transaction: one input with a
/// plausible sig+pubkey scriptSig, one output.
fn signed_tx_hex() -> String {
    let mut tx = Vec::new();
    tx.extend_from_slice(&2u32.to_le_bytes()); // version
    tx.push(1); // input count
    tx.extend_from_slice(&[0x3C; 32]); // prev txid
    tx.extend_from_slice(&1u32.to_le_bytes()); // prev vout
    let mut script_sig = vec![0x47]; // push 71-byte DER signature
    script_sig.extend(std::iter::repeat(0x30).take(71));
    script_sig.push(0x21); // push 33-byte compressed pubkey
    script_sig.extend(std::iter::repeat(0x02).take(33));
    tx.push(script_sig.len() as u8);
    tx.extend_from_slice(&script_sig);
    tx.extend_from_slice(&0xFFFF_FFFFu32.to_le_bytes()); // sequence
    tx.push(1); // output count
    tx.extend_from_slice(&123_456u64.to_le_bytes()); // value
    let script_pubkey = [
        0x76, 0xA9, 0x14, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 0x88, 0xAC,
    ];
    tx.push(script_pubkey.len() as u8);
    tx.extend_from_slice(&script_pubkey);
    tx.extend_from_slice(&0u32.to_le_bytes()); // locktime
    Transaction::bytes_to_hex(&tx)
}

#[test]
fn test_encode_tx_is_deterministic() {
    let hex = signed_tx_hex();
    let first = encode_tx(&hex);
    let second = encode_tx(&hex);
    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[test]
fn test_timing_array_contains_only_unit_values() {
    let timing = encode_tx(&signed_tx_hex());
    assert!(timing.iter().all(|&t| t == 1 || t == -1));
}

#[test]
fn test_empty_pcm_fails_at_goertzel() {
    let result = pipeline_with(0.0).decode(&[]);
    assert_eq!(result.stage_reached, DecodeStage::Goertzel);
    assert!(!result.success);
    assert_eq!(result.error, "Goertzel: no blocks to analyze");
}

#[test]
fn test_one_second_of_silence_fails_at_morse_decode() {
    let pcm = vec![0.0f32; SAMPLE_RATE as usize];
    let result = pipeline_with(0.0).decode(&pcm);
    assert_eq!(result.stage_reached, DecodeStage::MorseDecode);
    assert!(!result.success);
    assert_eq!(result.error, "Morse decode: no text recovered");
    assert!(result.tone_bits.iter().all(|&b| !b));
    assert!(result.morse_text.is_empty());
}

#[test]
fn test_handcrafted_short_frame_fails_at_deframe() {
    // "KKK A AR" bypasses Base43 entirely: the demodulator recovers the
    // text but its 1-character body cannot hold a CRC.
    let pcm = render(&MorseEncoder::encode("KKK A AR"));
    let result = pipeline_with(RENDER_THRESHOLD).decode(&pcm);
    assert_eq!(result.morse_text, "KKK A AR");
    assert_eq!(result.stage_reached, DecodeStage::Deframe);
    assert!(!result.success);
    assert_eq!(result.error, "Deframe: body too short for CRC");
}

#[test]
fn test_noiseless_round_trip() {
    let hex = signed_tx_hex();
    let timing = encode_tx(&hex);
    assert!(!timing.is_empty());

    let pcm = render(&timing);
    let result = pipeline_with(RENDER_THRESHOLD).decode(&pcm);

    assert!(result.success, "decode failed: {}", result.error);
    assert_eq!(result.stage_reached, DecodeStage::Complete);
    assert!(result.hex_string.eq_ignore_ascii_case(&hex));
    assert!(result.error.is_empty());
}

#[test]
fn test_round_trip_with_capture_silence() {
    // Captured audio carries dead air on both sides of the transmission.
    let hex = signed_tx_hex();
    let mut pcm = vec![0.0f32; SAMPLE_RATE as usize / 2];
    pcm.extend(render(&encode_tx(&hex)));
    pcm.extend(vec![0.0f32; SAMPLE_RATE as usize / 2]);

    let result = pipeline_with(RENDER_THRESHOLD).decode(&pcm);
    assert!(result.success, "decode failed: {}", result.error);
    assert!(result.hex_string.eq_ignore_ascii_case(&hex));
}

#[test]
fn test_corrupted_crc_fails_at_deframe() {
    // Re-render the frame with one CRC character flipped.
    let raw = Transaction::hex_to_bytes(&signed_tx_hex()).unwrap();
    let framed = Checksum::frame(&Base43::encode(&raw));

    let crc_pos = framed.len() - 4; // last CRC character (just before " AR")
    let original = framed.as_bytes()[crc_pos] as char;
    let replacement = if original == 'A' { 'B' } else { 'A' };
    let mut corrupted = framed.clone();
    corrupted.replace_range(crc_pos..crc_pos + 1, &replacement.to_string());

    let pcm = render(&MorseEncoder::encode(&corrupted));
    let result = pipeline_with(RENDER_THRESHOLD).decode(&pcm);

    assert!(!result.success);
    assert_eq!(result.stage_reached, DecodeStage::Deframe);
    assert!(result.error.starts_with("Deframe: CRC mismatch"));
    // The payload is still surfaced for diagnostics.
    assert_eq!(result.base43_payload, Base43::encode(&raw));
}

#[test]
fn test_corrupted_payload_fails_at_deframe() {
    let raw = Transaction::hex_to_bytes(&signed_tx_hex()).unwrap();
    let payload = Base43::encode(&raw);
    let framed = Checksum::frame(&payload);

    // Flip one payload character, mid-frame.
    let pos = 4 + payload.len() / 2;
    let original = framed.as_bytes()[pos] as char;
    let replacement = if original == '7' { '8' } else { '7' };
    let mut corrupted = framed.clone();
    corrupted.replace_range(pos..pos + 1, &replacement.to_string());

    let pcm = render(&MorseEncoder::encode(&corrupted));
    let result = pipeline_with(RENDER_THRESHOLD).decode(&pcm);

    assert!(!result.success);
    assert_eq!(result.stage_reached, DecodeStage::Deframe);
    assert!(result.error.starts_with("Deframe: CRC mismatch"));
}

#[test]
fn test_unknown_pattern_fails_cleanly_downstream() {
    // Seven dots with intra-character gaps is not a valid character; the
    // demodulator substitutes '?' and the deframer rejects the text.
    let bpu = 3;
    let mut tones = Vec::new();
    for i in 0..7 {
        if i > 0 {
            tones.extend(vec![false; bpu]);
        }
        tones.extend(vec![true; bpu]);
    }
    let text = MorseDemodulator::new(bpu).decode(&tones);
    assert_eq!(text, "?");

    let deframed = Deframer::deframe(&text);
    assert!(!deframed.valid);
    assert_eq!(deframed.error, "frame too short");
}

#[test]
fn test_valid_base43_non_transaction_fails_at_validate() {
    // A well-framed payload that decodes to bytes but not to a transaction.
    let framed = Checksum::frame(&Base43::encode(b"\x99\x88\x77"));
    let pcm = render(&MorseEncoder::encode(&framed));
    let result = pipeline_with(RENDER_THRESHOLD).decode(&pcm);

    assert!(!result.success);
    assert_eq!(result.stage_reached, DecodeStage::Validate);
    assert_eq!(result.error, "Transaction validation failed");
    assert_eq!(result.hex_string, "998877");
}

#[test]
fn test_success_iff_complete() {
    let ok = pipeline_with(RENDER_THRESHOLD).decode(&render(&encode_tx(&signed_tx_hex())));
    assert!(ok.success && ok.stage_reached == DecodeStage::Complete);

    let failures = [
        pipeline_with(0.0).decode(&[]),
        pipeline_with(0.0).decode(&vec![0.0f32; SAMPLE_RATE as usize]),
        pipeline_with(RENDER_THRESHOLD).decode(&render(&MorseEncoder::encode("KKK A AR"))),
    ];
    for result in failures {
        assert!(!result.success);
        assert!(result.stage_reached < DecodeStage::Complete);
    }
}
