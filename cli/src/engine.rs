//! Node engine: wires the codec pipelines to audio I/O and the network
//! broadcaster.
//!
//! Transmit path: hex -> validate -> Base43 -> frame(+CRC) -> Morse timing
//! -> speaker. Receive path: microphone -> PCM -> decode pipeline ->
//! validated hex -> (optional) broadcast.

use std::cell::OnceCell;

use log::{error, info};

use btccw_core::{
    encode_tx, render_timing, DecodePipeline, DecodeResult, Transaction, GOERTZEL_BLOCK_SIZE,
};

use crate::audio::{AudioConfig, AudioError, AudioIo};
use crate::broadcast::{BroadcastError, Broadcaster};

pub struct NodeEngine {
    audio: AudioIo,
    broadcaster: Broadcaster,
    /// Goertzel threshold for decoding; `<= 0` selects auto.
    threshold: f64,
    pipeline: OnceCell<DecodePipeline>,
}

impl NodeEngine {
    pub fn new(audio: AudioIo, broadcaster: Broadcaster, threshold: f64) -> Self {
        Self {
            audio,
            broadcaster,
            threshold,
            pipeline: OnceCell::new(),
        }
    }

    fn pipeline(&self) -> &DecodePipeline {
        self.pipeline.get_or_init(|| {
            let cfg = self.audio.config();
            DecodePipeline::new(
                cfg.sample_rate,
                cfg.tone_freq,
                cfg.wpm,
                GOERTZEL_BLOCK_SIZE,
                self.threshold,
            )
        })
    }

    pub fn transmit_only(&self) -> bool {
        self.audio.transmit_only()
    }

    // ----- Transmit path -----

    /// Encode a raw transaction into a framed Morse timing array. Empty on
    /// validation failure.
    pub fn encode_tx(&self, raw_tx_hex: &str) -> Vec<i8> {
        encode_tx(raw_tx_hex)
    }

    /// Render a timing array and play it through the speaker.
    pub fn play(&self, timing: &[i8]) -> Result<(), AudioError> {
        let cfg = self.audio.config();
        let pcm = render_timing(timing, cfg.sample_rate, cfg.tone_freq, cfg.wpm);
        info!(
            "playing {} timing units ({:.1} s of audio)",
            timing.len(),
            pcm.len() as f64 / cfg.sample_rate as f64
        );
        self.audio.play(&pcm)
    }

    /// One-shot: validate, encode, frame, and play a raw transaction.
    /// Returns false if the transaction failed validation.
    pub fn transmit(&self, raw_tx_hex: &str) -> Result<bool, AudioError> {
        let timing = self.encode_tx(raw_tx_hex);
        if timing.is_empty() {
            return Ok(false);
        }
        self.play(&timing)?;
        Ok(true)
    }

    // ----- Receive path -----

    /// Capture raw PCM from the microphone for `seconds`.
    pub fn listen(&self, seconds: f64) -> Vec<f32> {
        self.audio.capture(seconds)
    }

    /// Run a PCM buffer through the full decode pipeline.
    pub fn decode_audio(&self, pcm: &[f32]) -> DecodeResult {
        self.pipeline().decode(pcm)
    }

    /// Capture audio and decode it in one step.
    pub fn listen_and_decode(&self, seconds: f64) -> DecodeResult {
        let pcm = self.listen(seconds);
        self.decode_audio(&pcm)
    }

    /// Start queueing microphone samples for a loopback-style capture that
    /// spans a blocking playback.
    pub fn begin_capture(&self) {
        self.audio.begin_capture();
    }

    /// Collect everything heard since `begin_capture`, after a settling
    /// tail.
    pub fn take_captured(&self, tail_seconds: f64) -> Vec<f32> {
        self.audio.take_captured(tail_seconds)
    }

    // ----- Network -----

    /// Broadcast a raw transaction, re-validating first. Returns an empty
    /// txid when the transaction is refused locally.
    pub fn broadcast(&self, raw_tx_hex: &str) -> Result<String, BroadcastError> {
        if !Transaction::validate(raw_tx_hex) {
            error!("refusing to broadcast invalid transaction");
            return Ok(String::new());
        }
        self.broadcaster.broadcast(raw_tx_hex)
    }

    /// Expose the audio config for duration calculations.
    pub fn audio_config(&self) -> &AudioConfig {
        self.audio.config()
    }
}
