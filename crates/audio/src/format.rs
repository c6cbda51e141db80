//! PCM sample layout.

use crate::EncodingError;

/// Layout of an interleaved little-endian PCM buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub channels: u16,
    pub sample_rate_hz: u32,
    pub bit_depth: u16,
}

impl PcmFormat {
    /// Mono, 24 kHz, 16-bit: what the speech model returns.
    pub const SPEECH: PcmFormat = PcmFormat {
        channels: 1,
        sample_rate_hz: 24_000,
        bit_depth: 16,
    };

    pub fn new(channels: u16, sample_rate_hz: u32, bit_depth: u16) -> Self {
        Self {
            channels,
            sample_rate_hz,
            bit_depth,
        }
    }

    /// Check that the format can be written to a WAV header.
    pub fn validate(&self) -> Result<(), EncodingError> {
        if self.channels == 0 {
            return Err(EncodingError::ZeroChannels);
        }
        if self.sample_rate_hz == 0 {
            return Err(EncodingError::ZeroSampleRate);
        }
        if self.bit_depth == 0 || self.bit_depth % 8 != 0 || self.bit_depth > 32 {
            return Err(EncodingError::UnsupportedBitDepth(self.bit_depth));
        }
        Ok(())
    }

    /// Bytes per frame (one sample for every channel).
    pub fn block_align(&self) -> Result<u16, EncodingError> {
        self.channels
            .checked_mul(self.bit_depth / 8)
            .ok_or(EncodingError::Overflow("block align"))
    }

    pub fn byte_rate(&self) -> Result<u32, EncodingError> {
        self.sample_rate_hz
            .checked_mul(u32::from(self.block_align()?))
            .ok_or(EncodingError::Overflow("byte rate"))
    }

    /// Playback length of `len` bytes in this format.
    pub fn duration_secs(&self, len: usize) -> f64 {
        match self.byte_rate() {
            Ok(rate) if rate > 0 => len as f64 / f64::from(rate),
            _ => 0.0,
        }
    }

    /// Derive a format from a provider mime type such as
    /// `audio/L16;codec=pcm;rate=24000`.
    ///
    /// `L<n>` gives the bit depth, `rate=` the sample rate and `channels=`
    /// the channel count; anything unspecified falls back to [`Self::SPEECH`].
    pub fn from_mime_type(mime: &str) -> Result<Self, EncodingError> {
        let unsupported = || EncodingError::UnsupportedMimeType(mime.to_string());
        let mut params = mime.split(';').map(str::trim);
        let essence = params.next().unwrap_or_default().to_ascii_lowercase();
        let subtype = essence.strip_prefix("audio/").ok_or_else(unsupported)?;

        let mut format = Self::SPEECH;
        if let Some(bits) = subtype.strip_prefix('l') {
            format.bit_depth = bits.parse().map_err(|_| unsupported())?;
        } else if subtype != "pcm" {
            return Err(unsupported());
        }

        for param in params {
            let Some((key, value)) = param.split_once('=') else {
                continue;
            };
            match key.trim().to_ascii_lowercase().as_str() {
                "rate" => format.sample_rate_hz = value.trim().parse().map_err(|_| unsupported())?,
                "channels" => format.channels = value.trim().parse().map_err(|_| unsupported())?,
                _ => {}
            }
        }

        format.validate()?;
        Ok(format)
    }
}

impl Default for PcmFormat {
    fn default() -> Self {
        Self::SPEECH
    }
}
