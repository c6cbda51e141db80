//! Binary media (images, audio) and `data:` URI conversion.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::MediaError;

/// Inline binary content with its mime type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    pub mime_type: String,

    /// Raw bytes; base64 when serialized.
    #[serde(serialize_with = "encode_b64", deserialize_with = "decode_b64")]
    pub data: Vec<u8>,
}

impl Media {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    /// Parse a `data:<mime>;base64,<payload>` URI.
    ///
    /// A missing mime type defaults to `application/octet-stream`.
    pub fn from_data_uri(uri: &str) -> Result<Self, MediaError> {
        let rest = uri.strip_prefix("data:").ok_or(MediaError::NotDataUri)?;
        let (meta, payload) = rest.split_once(',').ok_or(MediaError::NotDataUri)?;
        let mime = meta
            .strip_suffix(";base64")
            .ok_or(MediaError::NotBase64)?;
        let mime = if mime.is_empty() {
            "application/octet-stream"
        } else {
            mime
        };
        let data = STANDARD
            .decode(payload.trim())
            .map_err(|e| MediaError::Decode(e.to_string()))?;
        Ok(Self::new(mime, data))
    }

    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.data))
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

fn encode_b64<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(data))
}

fn decode_b64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let text = String::deserialize(deserializer)?;
    STANDARD.decode(text).map_err(serde::de::Error::custom)
}
