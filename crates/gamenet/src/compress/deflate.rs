// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 gamenet contributors

//! Deflate codec via flate2 (raw deflate, no zlib wrapper).

use crate::compress::{
    CompressError, Compressor, CompressorFactory, CompressorType, DecompressCounts,
};
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::{Read, Write};
use std::sync::Arc;

pub const DEFLATE_NAME: &str = "deflate";
pub const DEFLATE_TYPE: CompressorType = CompressorType(u32::from_be_bytes(*b"DFLT"));

/// Default deflate level; 6 is zlib's speed/ratio sweet spot.
pub const DEFAULT_DEFLATE_LEVEL: u32 = 6;

const MAX_CHUNK: usize = 1 << 20;

pub struct DeflateCompressor {
    level: Compression,
}

impl DeflateCompressor {
    #[must_use]
    pub fn new(level: u32) -> Self {
        Self { level: Compression::new(level.min(9)) }
    }
}

impl Compressor for DeflateCompressor {
    fn compressor_type(&self) -> CompressorType {
        DEFLATE_TYPE
    }

    fn max_chunk_size(&self) -> usize {
        MAX_CHUNK
    }

    fn max_compressed_size(&self, input_len: usize) -> usize {
        // Deflate's worst case is ~5 bytes per 16 KiB stored block plus a
        // small constant; this bound is the classic zlib compressBound.
        input_len + (input_len >> 12) + (input_len >> 14) + (input_len >> 25) + 13
    }

    fn compress(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize, CompressError> {
        let mut encoder = DeflateEncoder::new(Vec::with_capacity(input.len() / 2 + 16), self.level);
        encoder.write_all(input).map_err(|_| CompressError::CorruptData)?;
        let compressed = encoder.finish().map_err(|_| CompressError::CorruptData)?;
        if compressed.len() > output.len() {
            return Err(CompressError::InsufficientBuffer);
        }
        output[..compressed.len()].copy_from_slice(&compressed);
        Ok(compressed.len())
    }

    fn decompress(
        &mut self,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<DecompressCounts, CompressError> {
        let mut decoder = DeflateDecoder::new(input);
        let mut produced = 0usize;
        loop {
            if produced == output.len() {
                // Probe one extra byte: either the stream is exactly done,
                // or the caller's buffer is too small.
                let mut probe = [0u8; 1];
                match decoder.read(&mut probe) {
                    Ok(0) => break,
                    Ok(_) => return Err(CompressError::InsufficientBuffer),
                    Err(_) => return Err(CompressError::CorruptData),
                }
            }
            match decoder.read(&mut output[produced..]) {
                Ok(0) => break,
                Ok(n) => produced += n,
                Err(_) => return Err(CompressError::CorruptData),
            }
        }
        let consumed = decoder.total_in() as usize;
        Ok(DecompressCounts { consumed, produced })
    }
}

/// Factory for [`DeflateCompressor`] at a fixed level.
pub struct DeflateFactory {
    level: u32,
}

impl DeflateFactory {
    #[must_use]
    pub fn new(level: u32) -> Arc<Self> {
        Arc::new(Self { level })
    }

    #[must_use]
    pub fn with_defaults() -> Arc<Self> {
        Self::new(DEFAULT_DEFLATE_LEVEL)
    }
}

impl CompressorFactory for DeflateFactory {
    fn name(&self) -> &str {
        DEFLATE_NAME
    }

    fn compressor_type(&self) -> CompressorType {
        DEFLATE_TYPE
    }

    fn create_compressor(&self) -> Box<dyn Compressor> {
        Box::new(DeflateCompressor::new(self.level))
    }
}
