//! btccw — Morse-over-audio Bitcoin transaction relay node.

mod audio;
mod broadcast;
mod engine;
#[cfg(feature = "sdr")]
mod sdr;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::error;

use btccw_core::{
    encode_tx, render_timing, unit_duration, DecodePipeline, DecodeResult, DecodeStage,
    GOERTZEL_BLOCK_SIZE, SAMPLE_RATE, TONE_FREQ_HZ, WPM,
};

use crate::audio::{AudioConfig, AudioIo};
use crate::broadcast::{BroadcastBackend, Broadcaster, DEFAULT_MEMPOOL_URL, DEFAULT_RPC_HOST,
    DEFAULT_RPC_PORT};
use crate::engine::NodeEngine;

#[derive(Parser)]
#[command(name = "btccw")]
#[command(about = "Relay raw Bitcoin transactions as CW (Morse) audio")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// CW tone frequency in Hz
    #[arg(long, default_value_t = TONE_FREQ_HZ, global = true)]
    freq: f64,

    /// Keying speed in words per minute
    #[arg(long, default_value_t = WPM, global = true)]
    wpm: u32,

    /// Goertzel detection threshold (0 = auto from median block power)
    #[arg(long, default_value_t = 0.0, global = true)]
    threshold: f64,

    /// Output device name substring (default device if omitted)
    #[arg(long, global = true)]
    output_device: Option<String>,

    /// Input device name substring (default device if omitted)
    #[arg(long, global = true)]
    input_device: Option<String>,

    /// Broadcast backend: "mempool" or "rpc"
    #[arg(long, default_value = "mempool", global = true)]
    backend: String,

    /// mempool.space transaction endpoint
    #[arg(long, default_value = DEFAULT_MEMPOOL_URL, global = true)]
    mempool_url: String,

    /// Bitcoin Core RPC host
    #[arg(long, default_value = DEFAULT_RPC_HOST, global = true)]
    rpc_host: String,

    /// Bitcoin Core RPC port
    #[arg(long, default_value_t = DEFAULT_RPC_PORT, global = true)]
    rpc_port: u16,

    /// Bitcoin Core RPC user (or BTCCW_RPC_USER)
    #[arg(long, env = "BTCCW_RPC_USER", default_value = "", global = true)]
    rpc_user: String,

    /// Bitcoin Core RPC password (or BTCCW_RPC_PASS)
    #[arg(long, env = "BTCCW_RPC_PASS", default_value = "", global = true)]
    rpc_pass: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate, encode, and transmit a raw transaction via audio
    Tx {
        /// Raw signed transaction hex
        hex: String,

        /// Render to a WAV file instead of the speaker
        #[arg(long)]
        wav: Option<PathBuf>,
    },

    /// Capture audio from the microphone and decode it
    Listen {
        /// Capture duration in seconds
        seconds: f64,
    },

    /// Broadcast a raw transaction to the Bitcoin network
    Broadcast {
        /// Raw signed transaction hex
        hex: String,
    },

    /// List available audio devices
    Devices,

    /// Full acoustic loopback test: transmit and decode on this machine
    Loopback {
        /// Raw signed transaction hex
        hex: String,
    },

    /// Decode a WAV capture file through the receive pipeline
    Decode {
        /// Mono or stereo WAV file
        input: PathBuf,
    },

    /// Decode an 8-bit interleaved I/Q capture (RTL-SDR wire format)
    #[cfg(feature = "sdr")]
    SdrDecode {
        /// Raw I/Q capture file
        input: PathBuf,

        /// I/Q sample rate (must be a multiple of 44100)
        #[arg(long, default_value_t = 441_000)]
        input_rate: u32,

        /// Mixer shift in Hz: carrier offset minus the audio tone
        #[arg(long, default_value_t = 12_000.0)]
        shift_hz: f64,
    },
}

fn main() -> ExitCode {
    let _ = simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .env()
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // clap renders help/usage; any parse problem is a usage error.
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<bool, Box<dyn std::error::Error>> {
    match &cli.command {
        Commands::Devices => return cmd_devices(),
        Commands::Tx {
            hex,
            wav: Some(path),
        } => return cmd_tx_to_wav(&cli, hex, path),
        Commands::Decode { input } => return cmd_decode_wav(&cli, input),
        #[cfg(feature = "sdr")]
        Commands::SdrDecode {
            input,
            input_rate,
            shift_hz,
        } => return cmd_sdr_decode(&cli, input, *input_rate, *shift_hz),
        _ => {}
    }

    // The remaining commands run against live audio hardware.
    let engine = build_engine(&cli)?;
    match cli.command {
        Commands::Tx { ref hex, .. } => cmd_tx(&engine, hex),
        Commands::Listen { seconds } => cmd_listen(&engine, seconds),
        Commands::Broadcast { ref hex } => cmd_broadcast(&engine, hex),
        Commands::Loopback { ref hex } => cmd_loopback(&engine, hex),
        Commands::Devices | Commands::Decode { .. } => unreachable!("handled above"),
        #[cfg(feature = "sdr")]
        Commands::SdrDecode { .. } => unreachable!("handled above"),
    }
}

fn build_engine(cli: &Cli) -> Result<NodeEngine, Box<dyn std::error::Error>> {
    let audio = AudioIo::open(AudioConfig {
        sample_rate: SAMPLE_RATE,
        tone_freq: cli.freq,
        wpm: cli.wpm,
        output_device: cli.output_device.clone(),
        input_device: cli.input_device.clone(),
    })?;

    let backend = match cli.backend.as_str() {
        "mempool" => BroadcastBackend::Mempool {
            url: cli.mempool_url.clone(),
        },
        "rpc" => BroadcastBackend::BitcoinRpc {
            host: cli.rpc_host.clone(),
            port: cli.rpc_port,
            user: cli.rpc_user.clone(),
            pass: cli.rpc_pass.clone(),
        },
        other => return Err(format!("unknown backend '{other}' (use mempool or rpc)").into()),
    };

    Ok(NodeEngine::new(
        audio,
        Broadcaster::new(backend)?,
        cli.threshold,
    ))
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_tx(engine: &NodeEngine, hex: &str) -> Result<bool, Box<dyn std::error::Error>> {
    if !engine.transmit(hex)? {
        eprintln!("error: invalid or unsigned transaction");
        return Ok(false);
    }
    println!("[tx] transmission complete");
    Ok(true)
}

fn cmd_tx_to_wav(cli: &Cli, hex: &str, path: &Path) -> Result<bool, Box<dyn std::error::Error>> {
    let timing = encode_tx(hex);
    if timing.is_empty() {
        eprintln!("error: invalid or unsigned transaction");
        return Ok(false);
    }
    let pcm = render_timing(&timing, SAMPLE_RATE, cli.freq, cli.wpm);
    write_wav(path, &pcm, SAMPLE_RATE)?;
    println!(
        "[tx] wrote {} samples ({:.1} s) to {}",
        pcm.len(),
        pcm.len() as f64 / SAMPLE_RATE as f64,
        path.display()
    );
    Ok(true)
}

fn cmd_listen(engine: &NodeEngine, seconds: f64) -> Result<bool, Box<dyn std::error::Error>> {
    if engine.transmit_only() {
        eprintln!("error: no microphone available");
        return Ok(false);
    }
    println!("[listen] capturing {seconds:.1} seconds of audio...");
    let result = engine.listen_and_decode(seconds);
    println!("[listen] analyzed {} blocks", result.tone_bits.len());

    report_decode(&result);
    Ok(result.success)
}

fn cmd_broadcast(engine: &NodeEngine, hex: &str) -> Result<bool, Box<dyn std::error::Error>> {
    println!("[broadcast] sending to network...");
    let txid = engine.broadcast(hex)?;
    if txid.is_empty() {
        eprintln!("error: broadcast refused");
        return Ok(false);
    }
    println!("[broadcast] success - txid: {txid}");
    Ok(true)
}

fn cmd_loopback(engine: &NodeEngine, hex: &str) -> Result<bool, Box<dyn std::error::Error>> {
    println!("=== acoustic loopback test ===");

    let timing = engine.encode_tx(hex);
    if timing.is_empty() {
        eprintln!("error: invalid or unsigned transaction");
        return Ok(false);
    }
    println!("[1/4] encoded {} timing units", timing.len());

    if engine.transmit_only() {
        eprintln!("error: loopback needs a microphone");
        return Ok(false);
    }

    // Capture runs across the playback: the input stream queues samples
    // while the speaker drains.
    let unit = unit_duration(engine.audio_config().wpm);
    let tail = 0.5;
    engine.begin_capture();
    engine.play(&timing)?;
    let pcm = engine.take_captured(tail);
    println!(
        "[2/4] transmitted {:.1} s of audio",
        timing.len() as f64 * unit
    );
    println!("[3/4] captured {} samples", pcm.len());

    let result = engine.decode_audio(&pcm);
    if result.success {
        println!("[4/4] decoded TX: {}", result.hex_string);
        if result.hex_string.eq_ignore_ascii_case(hex) {
            println!("=== PASS - roundtrip matches ===");
            Ok(true)
        } else {
            println!("=== MISMATCH - decoded hex differs from input ===");
            Ok(false)
        }
    } else {
        report_decode(&result);
        Ok(false)
    }
}

fn cmd_devices() -> Result<bool, Box<dyn std::error::Error>> {
    let devices = AudioIo::list_devices()?;
    println!("available audio devices:");
    for device in devices {
        println!(
            "  {} (in:{} out:{})",
            device.name,
            device.supports_input as u8,
            device.supports_output as u8
        );
    }
    Ok(true)
}

fn cmd_decode_wav(cli: &Cli, input: &Path) -> Result<bool, Box<dyn std::error::Error>> {
    let (pcm, sample_rate) = read_wav(input)?;
    println!(
        "[decode] read {} samples at {} Hz from {}",
        pcm.len(),
        sample_rate,
        input.display()
    );

    // Decode at the file's own sample rate.
    let pipeline = DecodePipeline::new(
        sample_rate,
        cli.freq,
        cli.wpm,
        GOERTZEL_BLOCK_SIZE,
        cli.threshold,
    );
    let result = pipeline.decode(&pcm);
    report_decode(&result);
    Ok(result.success)
}

#[cfg(feature = "sdr")]
fn cmd_sdr_decode(
    cli: &Cli,
    input: &Path,
    input_rate: u32,
    shift_hz: f64,
) -> Result<bool, Box<dyn std::error::Error>> {
    use crate::sdr::{IqDownconverter, SdrConfig};

    let iq = std::fs::read(input)?;
    let converter = IqDownconverter::new(SdrConfig {
        input_rate,
        audio_rate: SAMPLE_RATE,
        shift_hz,
    })
    .ok_or("input rate must be an integer multiple of 44100")?;
    let pcm = converter.downconvert(&iq);
    println!(
        "[sdr] downconverted {} I/Q pairs to {} audio samples",
        iq.len() / 2,
        pcm.len()
    );

    let pipeline = DecodePipeline::new(
        SAMPLE_RATE,
        cli.freq,
        cli.wpm,
        GOERTZEL_BLOCK_SIZE,
        cli.threshold,
    );
    let result = pipeline.decode(&pcm);
    report_decode(&result);
    Ok(result.success)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn report_decode(result: &DecodeResult) {
    if result.success {
        println!("[decode] decoded TX: {}", result.hex_string);
        return;
    }
    eprintln!(
        "[decode] failed at stage '{}': {}",
        stage_name(result.stage_reached),
        result.error
    );
    if !result.morse_text.is_empty() {
        eprintln!("[decode] morse text: {}", result.morse_text);
    }
}

fn stage_name(stage: DecodeStage) -> &'static str {
    match stage {
        DecodeStage::None => "none",
        DecodeStage::Goertzel => "goertzel",
        DecodeStage::MorseDecode => "morse_decode",
        DecodeStage::Deframe => "deframe",
        DecodeStage::Base43Decode => "base43_decode",
        DecodeStage::Validate => "validate",
        DecodeStage::Complete => "complete",
    }
}

fn write_wav(path: &Path, pcm: &[f32], sample_rate: u32) -> Result<(), hound::Error> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in pcm {
        let clamped = sample.clamp(-1.0, 1.0);
        writer.write_sample((clamped * 32767.0) as i16)?;
    }
    writer.finalize()
}

/// Read a WAV file as mono f32, averaging channels if needed.
fn read_wav(path: &Path) -> Result<(Vec<f32>, u32), Box<dyn std::error::Error>> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();

    let samples: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / 32767.0))
            .collect::<Result<_, _>>()?,
        (hound::SampleFormat::Float, 32) => reader.samples::<f32>().collect::<Result<_, _>>()?,
        (format, bits) => {
            return Err(format!("unsupported WAV format: {bits}-bit {format:?}").into());
        }
    };

    let mono = if spec.channels > 1 {
        samples
            .chunks_exact(spec.channels as usize)
            .map(|frame| frame.iter().sum::<f32>() / spec.channels as f32)
            .collect()
    } else {
        samples
    };

    Ok((mono, spec.sample_rate))
}
