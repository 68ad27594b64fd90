// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 gamenet contributors

//! Pluggable payload compression.
//!
//! A [`Compressor`] turns payload bytes into fewer payload bytes and back;
//! the send path applies one only when it actually helps (ratio gate) and
//! marks the packet with the COMPRESSED header flag. Implementations are
//! created per connection through a [`CompressorFactory`] registered by
//! name in the [`CompressorRegistry`].
//!
//! # Algorithms
//!
//! - **Deflate** (always available via flate2): better ratio, slower
//! - **LZ4** (feature `lz4`): fast, good for real-time payloads

pub mod deflate;
#[cfg(feature = "lz4")]
pub mod lz4;

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// FourCC-style identifier for a compression algorithm, carried in
/// connection negotiation rather than per packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompressorType(pub u32);

impl std::fmt::Display for CompressorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let b = self.0.to_be_bytes();
        if b.iter().all(|c| c.is_ascii_graphic()) {
            for c in b {
                write!(f, "{}", c as char)?;
            }
            Ok(())
        } else {
            write!(f, "{:#010x}", self.0)
        }
    }
}

/// Error type for compression operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressError {
    /// Output buffer too small for the result.
    InsufficientBuffer,
    /// Input is not valid data for this algorithm.
    CorruptData,
}

impl std::fmt::Display for CompressError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InsufficientBuffer => write!(f, "output buffer too small"),
            Self::CorruptData => write!(f, "corrupt compressed data"),
        }
    }
}

impl std::error::Error for CompressError {}

/// Bytes consumed and produced by a decompression call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecompressCounts {
    /// Compressed input bytes consumed.
    pub consumed: usize,
    /// Uncompressed output bytes produced.
    pub produced: usize,
}

/// A compression codec instance, owned by one connection at a time.
pub trait Compressor: Send {
    fn compressor_type(&self) -> CompressorType;

    /// Largest input this codec accepts in one call.
    fn max_chunk_size(&self) -> usize;

    /// Worst-case compressed size for `input_len` bytes; size output
    /// buffers with this.
    fn max_compressed_size(&self, input_len: usize) -> usize;

    /// Compress `input` into `output`, returning bytes written.
    fn compress(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize, CompressError>;

    /// Decompress `input` into `output`.
    ///
    /// Corrupt input must fail cleanly with
    /// [`CompressError::CorruptData`]; it arrives straight off the wire.
    fn decompress(
        &mut self,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<DecompressCounts, CompressError>;
}

/// Creates [`Compressor`] instances; registered by name.
pub trait CompressorFactory: Send + Sync {
    fn name(&self) -> &str;
    fn compressor_type(&self) -> CompressorType;
    fn create_compressor(&self) -> Box<dyn Compressor>;
}

/// Name-keyed factory registry.
///
/// Registration is expected at startup, before connections negotiate; the
/// map is read-mostly, so a plain reader-writer lock is enough.
pub struct CompressorRegistry {
    factories: RwLock<HashMap<String, Arc<dyn CompressorFactory>>>,
}

impl CompressorRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self { factories: RwLock::new(HashMap::new()) }
    }

    /// Register a factory. Returns `false` without replacing anything if
    /// the name is already taken.
    pub fn register(&self, factory: Arc<dyn CompressorFactory>) -> bool {
        let name = factory.name().to_owned();
        let mut factories = self.factories.write();
        if factories.contains_key(&name) {
            log::warn!("[COMPRESS] duplicate factory registration name={name}");
            return false;
        }
        log::debug!(
            "[COMPRESS] registered factory name={} type={}",
            name,
            factory.compressor_type()
        );
        factories.insert(name, factory);
        true
    }

    /// Remove a factory by name. Existing compressor instances created
    /// from it keep working.
    pub fn unregister(&self, name: &str) -> bool {
        self.factories.write().remove(name).is_some()
    }

    /// Instantiate a compressor by factory name.
    #[must_use]
    pub fn create(&self, name: &str) -> Option<Box<dyn Compressor>> {
        self.factories.read().get(name).map(|f| f.create_compressor())
    }

    #[must_use]
    pub fn compressor_type(&self, name: &str) -> Option<CompressorType> {
        self.factories.read().get(name).map(|f| f.compressor_type())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.read().is_empty()
    }
}

impl Default for CompressorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullCompressor;

    impl Compressor for NullCompressor {
        fn compressor_type(&self) -> CompressorType {
            CompressorType(u32::from_be_bytes(*b"NULL"))
        }
        fn max_chunk_size(&self) -> usize {
            usize::MAX
        }
        fn max_compressed_size(&self, input_len: usize) -> usize {
            input_len
        }
        fn compress(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize, CompressError> {
            if output.len() < input.len() {
                return Err(CompressError::InsufficientBuffer);
            }
            output[..input.len()].copy_from_slice(input);
            Ok(input.len())
        }
        fn decompress(
            &mut self,
            input: &[u8],
            output: &mut [u8],
        ) -> Result<DecompressCounts, CompressError> {
            if output.len() < input.len() {
                return Err(CompressError::InsufficientBuffer);
            }
            output[..input.len()].copy_from_slice(input);
            Ok(DecompressCounts { consumed: input.len(), produced: input.len() })
        }
    }

    struct NullFactory;

    impl CompressorFactory for NullFactory {
        fn name(&self) -> &str {
            "null"
        }
        fn compressor_type(&self) -> CompressorType {
            CompressorType(u32::from_be_bytes(*b"NULL"))
        }
        fn create_compressor(&self) -> Box<dyn Compressor> {
            Box::new(NullCompressor)
        }
    }

    #[test]
    fn test_register_and_create() {
        let registry = CompressorRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.register(Arc::new(NullFactory)));
        assert_eq!(registry.len(), 1);

        let compressor = registry.create("null").unwrap();
        assert_eq!(compressor.compressor_type(), CompressorType(u32::from_be_bytes(*b"NULL")));
        assert!(registry.create("missing").is_none());
    }

    #[test]
    fn test_duplicate_registration_keeps_first() {
        let registry = CompressorRegistry::new();
        assert!(registry.register(Arc::new(NullFactory)));
        assert!(!registry.register(Arc::new(NullFactory)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister() {
        let registry = CompressorRegistry::new();
        registry.register(Arc::new(NullFactory));
        assert!(registry.unregister("null"));
        assert!(!registry.unregister("null"));
        assert!(registry.create("null").is_none());
    }

    #[test]
    fn test_compressor_type_display() {
        assert_eq!(CompressorType(u32::from_be_bytes(*b"DFLT")).to_string(), "DFLT");
        assert_eq!(CompressorType(1).to_string(), "0x00000001");
    }
}
