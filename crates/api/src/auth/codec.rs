//! Refresh token transport codec
//!
//! Refresh tokens leave the server compressed, masked with a repeating server key
//! and base64url-encoded (no padding). This is obfuscation only: the mask carries
//! no integrity guarantee, so decoded tokens still go through signature validation.

use std::io::{Read, Write};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression};

/// Largest payload the codec will encode or inflate. A refresh JWT is a few
/// hundred bytes; the cap stops a small cookie from inflating into megabytes.
pub const MAX_PAYLOAD_BYTES: usize = 16 * 1024;

/// Compress -> mask -> encode transform applied to refresh tokens
#[derive(Clone)]
pub struct RefreshCodec {
    key: Vec<u8>,
}

impl std::fmt::Debug for RefreshCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCodec")
            .field("key_len", &self.key.len())
            .finish()
    }
}

impl RefreshCodec {
    /// Create a codec with the server-held mask key
    pub fn new(key: impl Into<Vec<u8>>) -> Result<Self, CodecError> {
        let key = key.into();
        if key.is_empty() {
            return Err(CodecError::EmptyKey);
        }
        Ok(Self { key })
    }

    /// XOR with the repeating key. Self-inverse.
    fn mask(&self, data: &mut [u8]) {
        for (i, b) in data.iter_mut().enumerate() {
            *b ^= self.key[i % self.key.len()];
        }
    }

    /// Encode arbitrary bytes for transport
    pub fn encode(&self, raw: &[u8]) -> Result<String, CodecError> {
        if raw.len() > MAX_PAYLOAD_BYTES {
            return Err(CodecError::TooLarge(MAX_PAYLOAD_BYTES));
        }

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(raw)
            .map_err(|e| CodecError::Compress(e.to_string()))?;
        let mut compressed = encoder
            .finish()
            .map_err(|e| CodecError::Compress(e.to_string()))?;

        self.mask(&mut compressed);

        let encoded = URL_SAFE_NO_PAD.encode(&compressed);
        tracing::trace!(
            raw_len = raw.len(),
            encoded_len = encoded.len(),
            "Refresh token encoded"
        );
        Ok(encoded)
    }

    /// Reverse of [`RefreshCodec::encode`]: decode, unmask, then decompress
    pub fn decode(&self, encoded: &str) -> Result<Vec<u8>, CodecError> {
        let mut masked = URL_SAFE_NO_PAD
            .decode(encoded.as_bytes())
            .map_err(|e| CodecError::Base64(e.to_string()))?;

        self.mask(&mut masked);

        // One byte past the cap is enough to detect an oversized payload
        let mut out = Vec::new();
        ZlibDecoder::new(masked.as_slice())
            .take(MAX_PAYLOAD_BYTES as u64 + 1)
            .read_to_end(&mut out)
            .map_err(|e| CodecError::Decompress(e.to_string()))?;
        if out.len() > MAX_PAYLOAD_BYTES {
            tracing::debug!(limit = MAX_PAYLOAD_BYTES, "Refusing oversized refresh payload");
            return Err(CodecError::TooLarge(MAX_PAYLOAD_BYTES));
        }
        Ok(out)
    }

    pub fn encode_token(&self, token: &str) -> Result<String, CodecError> {
        self.encode(token.as_bytes())
    }

    pub fn decode_token(&self, encoded: &str) -> Result<String, CodecError> {
        let bytes = self.decode(encoded)?;
        String::from_utf8(bytes).map_err(|_| CodecError::Utf8)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Mask key must not be empty")]
    EmptyKey,
    #[error("Compression failed: {0}")]
    Compress(String),
    #[error("Invalid base64 payload: {0}")]
    Base64(String),
    #[error("Decompression failed: {0}")]
    Decompress(String),
    #[error("Decoded token is not valid UTF-8")]
    Utf8,
    #[error("Payload exceeds {0} bytes")]
    TooLarge(usize),
}
