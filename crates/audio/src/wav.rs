//! Canonical WAV container: RIFF header, 16-byte `fmt ` chunk, `data` chunk.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::format::PcmFormat;
use crate::{EncodingError, WavParseError};

/// Size of the canonical header written by [`encode_wav`].
pub const WAV_HEADER_LEN: usize = 44;

const FMT_CHUNK_LEN: u32 = 16;
const FORMAT_PCM: u16 = 1;

/// Wrap `pcm` in a WAV container.
///
/// The payload is copied verbatim after the header. Nothing is returned on
/// failure: the format is checked and every header field is computed before
/// the output buffer is allocated.
pub fn encode_wav(pcm: &[u8], format: PcmFormat) -> Result<Vec<u8>, EncodingError> {
    format.validate()?;
    let block_align = format.block_align()?;
    let byte_rate = format.byte_rate()?;

    if pcm.len() % usize::from(block_align) != 0 {
        return Err(EncodingError::PartialFrame {
            len: pcm.len(),
            block_align,
        });
    }

    let data_size = u32::try_from(pcm.len()).map_err(|_| EncodingError::Overflow("data size"))?;
    let riff_size = data_size
        .checked_add(36)
        .ok_or(EncodingError::Overflow("RIFF size"))?;

    let mut wav = Vec::with_capacity(WAV_HEADER_LEN + pcm.len());

    // RIFF header
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&riff_size.to_le_bytes());
    wav.extend_from_slice(b"WAVE");

    // fmt chunk
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&FMT_CHUNK_LEN.to_le_bytes());
    wav.extend_from_slice(&FORMAT_PCM.to_le_bytes());
    wav.extend_from_slice(&format.channels.to_le_bytes());
    wav.extend_from_slice(&format.sample_rate_hz.to_le_bytes());
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&block_align.to_le_bytes());
    wav.extend_from_slice(&format.bit_depth.to_le_bytes());

    // data chunk
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_size.to_le_bytes());
    wav.extend_from_slice(pcm);

    tracing::debug!(
        channels = format.channels,
        sample_rate = format.sample_rate_hz,
        bit_depth = format.bit_depth,
        bytes = wav.len(),
        "Encoded WAV"
    );

    Ok(wav)
}

/// `data:audio/wav;base64,...` for an encoded container.
pub fn to_data_uri(wav: &[u8]) -> String {
    format!("data:audio/wav;base64,{}", STANDARD.encode(wav))
}

/// Header fields read back from a canonical WAV buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavInfo {
    pub format: PcmFormat,
    pub riff_size: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub data_size: u32,
}

impl WavInfo {
    /// Parse the 44-byte header written by [`encode_wav`].
    pub fn parse(bytes: &[u8]) -> Result<Self, WavParseError> {
        if bytes.len() < WAV_HEADER_LEN {
            return Err(WavParseError::TooShort(bytes.len()));
        }
        let u16_at = |at: usize| u16::from_le_bytes([bytes[at], bytes[at + 1]]);
        let u32_at = |at: usize| {
            u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
        };

        for (at, marker) in [(0, "RIFF"), (8, "WAVE"), (12, "fmt "), (36, "data")] {
            if &bytes[at..at + 4] != marker.as_bytes() {
                return Err(WavParseError::MissingMarker(marker));
            }
        }

        let format_tag = u16_at(20);
        if format_tag != FORMAT_PCM {
            return Err(WavParseError::UnsupportedFormat(format_tag));
        }

        let data_size = u32_at(40);
        let actual = bytes.len() - WAV_HEADER_LEN;
        if usize::try_from(data_size).ok() != Some(actual) {
            return Err(WavParseError::SizeMismatch {
                declared: data_size,
                actual,
            });
        }

        Ok(Self {
            format: PcmFormat::new(u16_at(22), u32_at(24), u16_at(34)),
            riff_size: u32_at(4),
            byte_rate: u32_at(28),
            block_align: u16_at(32),
            data_size,
        })
    }

    pub fn duration_secs(&self) -> f64 {
        self.format.duration_secs(self.data_size as usize)
    }
}
