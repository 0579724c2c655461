//! Payload compression
//!
//! Types configured with `compress: true` store their relay payloads LZ4
//! compressed. A payload records whether it was actually compressed, since
//! small or incompressible payloads are kept as-is.
//!
//! ```
//! use cacheindex::store::compression::CompressionManager;
//!
//! let manager = CompressionManager::new();
//! let data = vec![7u8; 4096];
//!
//! let payload = manager.encode(&data, true);
//! assert!(payload.compressed);
//! assert_eq!(manager.decode(&payload).unwrap().as_ref(), data.as_slice());
//! ```

use bytes::Bytes;
use tracing::warn;

use super::relay::Payload;
use crate::error::{Error, Result};

// =============================================================================
// Compression Algorithm
// =============================================================================

/// Supported payload codecs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompressionAlgorithm {
    /// Stored verbatim
    None,
    /// LZ4 block format with the decoded size prepended
    #[default]
    Lz4,
}

impl CompressionAlgorithm {
    pub fn name(&self) -> &'static str {
        match self {
            CompressionAlgorithm::None => "none",
            CompressionAlgorithm::Lz4 => "lz4",
        }
    }
}

impl std::fmt::Display for CompressionAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Compression settings shared by every type
#[derive(Debug, Clone)]
pub struct CompressionConfig {
    /// Payloads shorter than this are never compressed
    pub min_size_bytes: usize,
    /// LZ4 high-compression level
    pub level: i32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            min_size_bytes: 64,
            level: 4,
        }
    }
}

// =============================================================================
// Compressors
// =============================================================================

/// A payload codec
pub trait Compressor: Send + Sync {
    fn algorithm(&self) -> CompressionAlgorithm;

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>>;
}

/// Pass-through codec
pub struct NoopCompressor;

impl Compressor for NoopCompressor {
    fn algorithm(&self) -> CompressionAlgorithm {
        CompressionAlgorithm::None
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }
}

/// LZ4 block codec
pub struct Lz4Compressor {
    level: i32,
}

impl Lz4Compressor {
    pub fn with_level(level: i32) -> Self {
        Self { level }
    }
}

impl Default for Lz4Compressor {
    fn default() -> Self {
        Self::with_level(4)
    }
}

impl Compressor for Lz4Compressor {
    fn algorithm(&self) -> CompressionAlgorithm {
        CompressionAlgorithm::Lz4
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        lz4::block::compress(
            data,
            Some(lz4::block::CompressionMode::HIGHCOMPRESSION(self.level)),
            true,
        )
        .map_err(|e| Error::CompressionFailed {
            algorithm: self.algorithm().to_string(),
            reason: e.to_string(),
        })
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        lz4::block::decompress(data, None).map_err(|e| Error::DecompressionFailed {
            algorithm: self.algorithm().to_string(),
            reason: e.to_string(),
        })
    }
}

// =============================================================================
// Compression Manager
// =============================================================================

/// Builds and opens relay payloads
pub struct CompressionManager {
    config: CompressionConfig,
    noop: NoopCompressor,
    lz4: Lz4Compressor,
}

impl CompressionManager {
    pub fn new() -> Self {
        Self::with_config(CompressionConfig::default())
    }

    pub fn with_config(config: CompressionConfig) -> Self {
        Self {
            lz4: Lz4Compressor::with_level(config.level),
            noop: NoopCompressor,
            config,
        }
    }

    fn compressor(&self, algorithm: CompressionAlgorithm) -> &dyn Compressor {
        match algorithm {
            CompressionAlgorithm::None => &self.noop,
            CompressionAlgorithm::Lz4 => &self.lz4,
        }
    }

    /// Wraps `data` in a payload, compressing it when `compress` is set and
    /// compression actually shrinks it. Compression failures fall back to
    /// the raw bytes.
    pub fn encode(&self, data: &[u8], compress: bool) -> Payload {
        if !compress || data.len() < self.config.min_size_bytes {
            return Payload::new(Bytes::copy_from_slice(data), false);
        }
        match self.compressor(CompressionAlgorithm::Lz4).compress(data) {
            Ok(packed) if packed.len() < data.len() => Payload::new(Bytes::from(packed), true),
            Ok(_) => Payload::new(Bytes::copy_from_slice(data), false),
            Err(e) => {
                warn!(error = %e, "Payload compression failed, storing uncompressed");
                Payload::new(Bytes::copy_from_slice(data), false)
            }
        }
    }

    /// Raw bytes of a payload
    pub fn decode(&self, payload: &Payload) -> Result<Bytes> {
        if !payload.compressed {
            return Ok(payload.data.clone());
        }
        let raw = self
            .compressor(CompressionAlgorithm::Lz4)
            .decompress(&payload.data)?;
        Ok(Bytes::from(raw))
    }

    pub fn config(&self) -> &CompressionConfig {
        &self.config
    }
}

impl Default for CompressionManager {
    fn default() -> Self {
        Self::new()
    }
}
