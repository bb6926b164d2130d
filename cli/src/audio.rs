//! Speaker and microphone access through cpal.
//!
//! Playback and capture run on cpal's audio threads; this module bridges them
//! to the node's synchronous call model with queue-backed blocking reads and
//! writes. The speaker and microphone streams are owned exclusively by one
//! `AudioIo` for its lifetime.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleRate, Stream, StreamConfig};
use log::{info, warn};
use thiserror::Error;

use btccw_core::{SAMPLE_RATE, TONE_FREQ_HZ, WPM};

const POLL_INTERVAL: Duration = Duration::from_millis(10);
/// Extra wall-clock allowance before a blocking read/write gives up.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("failed to enumerate audio devices: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("failed to read device name: {0}")]
    DeviceName(#[from] cpal::DeviceNameError),

    #[error("no output device matching the configuration")]
    NoOutputDevice,

    #[error("no input device matching the configuration")]
    NoInputDevice,

    #[error("failed to build audio stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("output stream unavailable")]
    OutputUnavailable,
}

#[derive(Debug, Clone)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub tone_freq: f64,
    pub wpm: u32,
    /// Case-insensitive substring of the device name; `None` = default.
    pub output_device: Option<String>,
    pub input_device: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            tone_freq: TONE_FREQ_HZ,
            wpm: WPM,
            output_device: None,
            input_device: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AudioDeviceInfo {
    pub name: String,
    pub supports_input: bool,
    pub supports_output: bool,
}

type SampleQueue = Arc<Mutex<VecDeque<f32>>>;

struct Channel {
    queue: SampleQueue,
    _stream: Stream,
}

/// Exclusive handle on the speaker and (when available) microphone streams.
///
/// A missing or failing microphone is non-fatal: the node keeps running in
/// transmit-only mode.
pub struct AudioIo {
    config: AudioConfig,
    output: Channel,
    input: Option<Channel>,
}

impl AudioIo {
    /// Open speaker and microphone streams. Output failure is fatal; input
    /// failure degrades to transmit-only mode.
    pub fn open(config: AudioConfig) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let stream_config = StreamConfig {
            channels: 1,
            sample_rate: SampleRate(config.sample_rate),
            buffer_size: BufferSize::Default,
        };

        let output_device = match &config.output_device {
            Some(name) => find_device(host.output_devices()?, name)?,
            None => host.default_output_device(),
        }
        .ok_or(AudioError::NoOutputDevice)?;
        info!(
            "output device: {}",
            output_device.name().unwrap_or_else(|_| "<unnamed>".into())
        );

        let out_queue: SampleQueue = Arc::new(Mutex::new(VecDeque::new()));
        let queue = Arc::clone(&out_queue);
        let output_stream = output_device.build_output_stream(
            &stream_config,
            move |data: &mut [f32], _| {
                let mut queue = queue.lock().unwrap();
                for sample in data.iter_mut() {
                    *sample = queue.pop_front().unwrap_or(0.0);
                }
            },
            |err| warn!("output stream error: {err}"),
            None,
        )?;
        output_stream.play()?;

        let input = match Self::open_input(&host, &config, &stream_config) {
            Ok(channel) => Some(channel),
            Err(err) => {
                warn!("microphone unavailable ({err}); running transmit-only");
                None
            }
        };

        Ok(Self {
            config,
            output: Channel {
                queue: out_queue,
                _stream: output_stream,
            },
            input,
        })
    }

    fn open_input(
        host: &cpal::Host,
        config: &AudioConfig,
        stream_config: &StreamConfig,
    ) -> Result<Channel, AudioError> {
        let device = match &config.input_device {
            Some(name) => find_device(host.input_devices()?, name)?,
            None => host.default_input_device(),
        }
        .ok_or(AudioError::NoInputDevice)?;
        info!(
            "input device: {}",
            device.name().unwrap_or_else(|_| "<unnamed>".into())
        );

        let in_queue: SampleQueue = Arc::new(Mutex::new(VecDeque::new()));
        let queue = Arc::clone(&in_queue);
        let stream = device.build_input_stream(
            stream_config,
            move |data: &[f32], _| {
                queue.lock().unwrap().extend(data.iter().copied());
            },
            |err| warn!("input stream error: {err}"),
            None,
        )?;
        stream.play()?;

        Ok(Channel {
            queue: in_queue,
            _stream: stream,
        })
    }

    pub fn config(&self) -> &AudioConfig {
        &self.config
    }

    pub fn transmit_only(&self) -> bool {
        self.input.is_none()
    }

    /// Play a PCM buffer through the speaker, blocking until it has drained.
    pub fn play(&self, pcm: &[f32]) -> Result<(), AudioError> {
        if pcm.is_empty() {
            return Ok(());
        }
        {
            let mut queue = self.output.queue.lock().unwrap();
            queue.extend(pcm.iter().copied());
        }

        let duration = Duration::from_secs_f64(pcm.len() as f64 / self.config.sample_rate as f64);
        let deadline = Instant::now() + duration + DRAIN_GRACE;
        loop {
            if self.output.queue.lock().unwrap().is_empty() {
                break;
            }
            if Instant::now() >= deadline {
                warn!("playback did not drain before deadline");
                break;
            }
            std::thread::sleep(POLL_INTERVAL);
        }
        // Let the driver flush its last buffer.
        std::thread::sleep(Duration::from_millis(50));
        Ok(())
    }

    /// Record from the microphone for `seconds`, blocking for the duration.
    ///
    /// Returns an empty buffer in transmit-only mode. A stalled driver is
    /// abandoned 2 s past the requested duration, returning what arrived.
    pub fn capture(&self, seconds: f64) -> Vec<f32> {
        let Some(input) = &self.input else {
            warn!("capture requested but no microphone is open");
            return Vec::new();
        };

        input.queue.lock().unwrap().clear();

        let target = (self.config.sample_rate as f64 * seconds) as usize;
        let deadline = Instant::now() + Duration::from_secs_f64(seconds) + DRAIN_GRACE;
        let mut pcm = Vec::with_capacity(target);

        while pcm.len() < target {
            {
                let mut queue = input.queue.lock().unwrap();
                while pcm.len() < target {
                    match queue.pop_front() {
                        Some(sample) => pcm.push(sample),
                        None => break,
                    }
                }
            }
            if pcm.len() >= target || Instant::now() >= deadline {
                break;
            }
            std::thread::sleep(POLL_INTERVAL);
        }

        if pcm.len() < target {
            warn!("capture ended short: {} of {} samples", pcm.len(), target);
        }
        pcm
    }

    /// Clear the microphone queue so everything taken later was heard after
    /// this point. Used with [`take_captured`](Self::take_captured) to record
    /// across a blocking playback (the input stream keeps queueing while the
    /// speaker drains).
    pub fn begin_capture(&self) {
        if let Some(input) = &self.input {
            input.queue.lock().unwrap().clear();
        }
    }

    /// Wait `tail_seconds` for stragglers, then take everything the
    /// microphone queued since [`begin_capture`](Self::begin_capture).
    pub fn take_captured(&self, tail_seconds: f64) -> Vec<f32> {
        let Some(input) = &self.input else {
            return Vec::new();
        };
        std::thread::sleep(Duration::from_secs_f64(tail_seconds.max(0.0)));
        let mut queue = input.queue.lock().unwrap();
        queue.drain(..).collect()
    }

    /// Enumerate audio devices on the default host.
    pub fn list_devices() -> Result<Vec<AudioDeviceInfo>, AudioError> {
        let host = cpal::default_host();
        let mut devices: Vec<AudioDeviceInfo> = Vec::new();

        for device in host.output_devices()? {
            let name = device.name()?;
            devices.push(AudioDeviceInfo {
                name,
                supports_input: false,
                supports_output: true,
            });
        }
        for device in host.input_devices()? {
            let name = device.name()?;
            match devices.iter_mut().find(|d| d.name == name) {
                Some(existing) => existing.supports_input = true,
                None => devices.push(AudioDeviceInfo {
                    name,
                    supports_input: true,
                    supports_output: false,
                }),
            }
        }
        Ok(devices)
    }
}

/// Select the first device whose name contains `needle` (case-insensitive).
fn find_device(
    devices: impl Iterator<Item = cpal::Device>,
    needle: &str,
) -> Result<Option<cpal::Device>, AudioError> {
    let needle = needle.to_lowercase();
    for device in devices {
        if device.name()?.to_lowercase().contains(&needle) {
            return Ok(Some(device));
        }
    }
    Ok(None)
}
