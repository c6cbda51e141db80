//! # Sentinel Audio
//!
//! Wraps raw PCM samples, as returned by speech models, in a canonical
//! 44-byte WAV (RIFF) container so browsers and players can use them.
//!
//! ```
//! use sentinel_audio::{PcmFormat, encode_wav};
//!
//! let pcm = vec![0u8; 480];
//! let wav = encode_wav(&pcm, PcmFormat::SPEECH).unwrap();
//! assert_eq!(wav.len(), 44 + 480);
//! assert_eq!(&wav[..4], b"RIFF");
//! ```

pub mod format;
pub mod wav;

pub use format::PcmFormat;
pub use wav::{WAV_HEADER_LEN, WavInfo, encode_wav, to_data_uri};

use thiserror::Error;

/// Why a PCM buffer could not be wrapped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    #[error("channel count must be at least 1")]
    ZeroChannels,

    #[error("sample rate must be at least 1 Hz")]
    ZeroSampleRate,

    #[error("unsupported bit depth {0}: must be 8, 16, 24 or 32")]
    UnsupportedBitDepth(u16),

    #[error("PCM payload of {len} bytes is not a whole number of {block_align}-byte frames")]
    PartialFrame { len: usize, block_align: u16 },

    #[error("audio too large for a WAV header: {0}")]
    Overflow(&'static str),

    #[error("unsupported audio mime type '{0}'")]
    UnsupportedMimeType(String),
}

/// Why a byte buffer is not a canonical PCM WAV file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WavParseError {
    #[error("buffer of {0} bytes is shorter than a WAV header")]
    TooShort(usize),

    #[error("missing '{0}' marker")]
    MissingMarker(&'static str),

    #[error("unsupported format tag {0} (only PCM is supported)")]
    UnsupportedFormat(u16),

    #[error("header declares {declared} data bytes but {actual} are present")]
    SizeMismatch { declared: u32, actual: usize },
}
