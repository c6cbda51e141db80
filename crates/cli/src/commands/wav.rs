//! `sentinel wav`: wrap raw PCM in a WAV container, or read a WAV header.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::Subcommand;
use sentinel_audio::{PcmFormat, WavInfo, encode_wav};

#[derive(Subcommand)]
pub enum WavCommand {
    /// Wrap raw little-endian PCM in a WAV container
    Encode {
        /// Raw PCM input file
        pcm: PathBuf,

        /// WAV output file
        out: PathBuf,

        #[arg(long, default_value_t = PcmFormat::SPEECH.channels)]
        channels: u16,

        /// Sample rate in Hz
        #[arg(long, default_value_t = PcmFormat::SPEECH.sample_rate_hz)]
        rate: u32,

        /// Bits per sample (8, 16, 24 or 32)
        #[arg(long, default_value_t = PcmFormat::SPEECH.bit_depth)]
        bits: u16,
    },

    /// Print the header of a WAV file
    Inspect { file: PathBuf },
}

pub fn run(command: WavCommand) -> anyhow::Result<()> {
    match command {
        WavCommand::Encode {
            pcm,
            out,
            channels,
            rate,
            bits,
        } => {
            let info = encode(&pcm, &out, PcmFormat::new(channels, rate, bits))?;
            println!("✅ Wrote {}", out.display());
            print_info(&info);
        }
        WavCommand::Inspect { file } => {
            let bytes = std::fs::read(&file).with_context(|| format!("Failed to read {}", file.display()))?;
            let info = WavInfo::parse(&bytes).with_context(|| format!("{} is not a canonical WAV file", file.display()))?;
            print_info(&info);
        }
    }
    Ok(())
}

/// Encode `pcm` into `out` and return the header that was written.
pub fn encode(pcm: &Path, out: &Path, format: PcmFormat) -> anyhow::Result<WavInfo> {
    let samples = std::fs::read(pcm).with_context(|| format!("Failed to read {}", pcm.display()))?;
    let wav = encode_wav(&samples, format)?;
    std::fs::write(out, &wav).with_context(|| format!("Failed to write {}", out.display()))?;
    Ok(WavInfo::parse(&wav)?)
}

fn print_info(info: &WavInfo) {
    println!("  Channels:    {}", info.format.channels);
    println!("  Sample rate: {} Hz", info.format.sample_rate_hz);
    println!("  Bit depth:   {}", info.format.bit_depth);
    println!("  Byte rate:   {}", info.byte_rate);
    println!("  Data:        {} bytes", info.data_size);
    println!("  Duration:    {:.3} s", info.duration_secs());
}
