// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 gamenet contributors

//! LZ4 block codec via lz4_flex (feature `lz4`).

use crate::compress::{
    CompressError, Compressor, CompressorFactory, CompressorType, DecompressCounts,
};
use lz4_flex::block;
use std::sync::Arc;

pub const LZ4_NAME: &str = "lz4";
pub const LZ4_TYPE: CompressorType = CompressorType(u32::from_be_bytes(*b"LZ4B"));

const MAX_CHUNK: usize = 1 << 20;

pub struct Lz4Compressor;

impl Compressor for Lz4Compressor {
    fn compressor_type(&self) -> CompressorType {
        LZ4_TYPE
    }

    fn max_chunk_size(&self) -> usize {
        MAX_CHUNK
    }

    fn max_compressed_size(&self, input_len: usize) -> usize {
        block::get_maximum_output_size(input_len)
    }

    fn compress(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize, CompressError> {
        block::compress_into(input, output).map_err(|_| CompressError::InsufficientBuffer)
    }

    fn decompress(
        &mut self,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<DecompressCounts, CompressError> {
        match block::decompress_into(input, output) {
            Ok(produced) => Ok(DecompressCounts { consumed: input.len(), produced }),
            Err(block::DecompressError::OutputTooSmall { .. }) => {
                Err(CompressError::InsufficientBuffer)
            }
            Err(_) => Err(CompressError::CorruptData),
        }
    }
}

pub struct Lz4Factory;

impl Lz4Factory {
    #[must_use]
    pub fn with_defaults() -> Arc<Self> {
        Arc::new(Self)
    }
}

impl CompressorFactory for Lz4Factory {
    fn name(&self) -> &str {
        LZ4_NAME
    }

    fn compressor_type(&self) -> CompressorType {
        LZ4_TYPE
    }

    fn create_compressor(&self) -> Box<dyn Compressor> {
        Box::new(Lz4Compressor)
    }
}
