//! Transport codec: zstd compression armored as base64 text.
//!
//! The remote blob is always plain ASCII so any text-oriented store or
//! relay can carry it without charset damage. Decoding stops at an
//! output limit so a corrupt or hostile frame cannot expand without bound.

use std::io::Read;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use snapsync_core::DEFAULT_MAX_PAYLOAD;
use thiserror::Error;

/// Default zstd level. Snapshots are mostly repetitive JSON.
pub const DEFAULT_LEVEL: i32 = 3;

/// Codec errors.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Nothing to decode.
    #[error("empty payload")]
    Empty,

    /// Payload is not valid base64.
    #[error("invalid armor: {0}")]
    InvalidArmor(#[from] base64::DecodeError),

    /// Armor was fine but the zstd frame is corrupt.
    #[error("decompression failed: {0}")]
    Decompression(#[source] std::io::Error),

    /// Decompressed output would exceed the limit.
    #[error("decoded payload exceeds {limit} bytes")]
    TooLarge {
        /// Output limit in bytes.
        limit: usize,
    },

    /// Compressor failed.
    #[error("compression failed: {0}")]
    Compression(#[source] std::io::Error),
}

/// Reversible snapshot codec.
#[derive(Debug, Clone, Copy)]
pub struct Codec {
    level: i32,
    max_output: usize,
}

impl Default for Codec {
    fn default() -> Self {
        Self::new(DEFAULT_LEVEL)
    }
}

impl Codec {
    /// Create a codec with an explicit zstd level.
    pub fn new(level: i32) -> Self {
        Self {
            level,
            max_output: DEFAULT_MAX_PAYLOAD,
        }
    }

    /// Cap decoded output at `max_output` bytes (builder style).
    pub fn with_limit(mut self, max_output: usize) -> Self {
        self.max_output = max_output;
        self
    }

    /// Largest payload [`Codec::decode`] will produce.
    pub fn limit(&self) -> usize {
        self.max_output
    }

    /// Compress and armor.
    pub fn encode(&self, bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
        let compressed = zstd::encode_all(bytes, self.level).map_err(CodecError::Compression)?;
        Ok(STANDARD.encode(compressed).into_bytes())
    }

    /// Exact inverse of [`Codec::encode`].
    ///
    /// Surrounding whitespace (a trailing newline added by some stores) is
    /// ignored.
    pub fn decode(&self, transport: &[u8]) -> Result<Vec<u8>, CodecError> {
        let trimmed = transport.trim_ascii();
        if trimmed.is_empty() {
            return Err(CodecError::Empty);
        }

        let compressed = STANDARD.decode(trimmed)?;
        let decoder =
            zstd::stream::Decoder::new(compressed.as_slice()).map_err(CodecError::Decompression)?;
        let mut out = Vec::new();
        decoder
            .take(self.max_output as u64 + 1)
            .read_to_end(&mut out)
            .map_err(CodecError::Decompression)?;
        if out.len() > self.max_output {
            return Err(CodecError::TooLarge {
                limit: self.max_output,
            });
        }
        Ok(out)
    }
}
