use crate::compress::{CompAlgo, SingleCompressor};
use crate::core::BlockcolError;

/// What a stream compressor is tuned for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Payload {
    /// Tables of 32-bit integers; byte-shuffled before compression.
    Integers,
    /// Opaque bytes such as string characters.
    Bytes,
}

/// Compressor for a sequence of blocks, picking an algorithm per block
/// number. The choice only depends on the block number and the ratio, so
/// the same column compresses identically on any thread count.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamCompressor {
    Single(SingleCompressor),
    /// `ratio` percent of the blocks use `compressor`, the rest are stored raw.
    Linear {
        compressor: SingleCompressor,
        ratio: u32,
    },
    /// `ratio` percent of the blocks use `second`, the rest use `first`.
    Composite {
        first: SingleCompressor,
        second: SingleCompressor,
        ratio: u32,
    },
}

impl StreamCompressor {
    /// Preset for a 0-100 compression level. Level 0 means no compression.
    ///
    /// Levels up to 50 ramp the share of LZ4-compressed blocks from 0 to 100%.
    /// Above 50 an increasing share of blocks switches from LZ4 to ZSTD, with
    /// the ZSTD level growing with the setting.
    pub fn for_level(level: u32, payload: Payload) -> Option<Self> {
        let (fast, strong) = match payload {
            Payload::Integers => (CompAlgo::Lz4Shuf4, CompAlgo::ZstdShuf4),
            Payload::Bytes => (CompAlgo::Lz4, CompAlgo::Zstd),
        };
        match level.min(100) {
            0 => None,
            50 => Some(StreamCompressor::Single(SingleCompressor::new(fast, 0))),
            level @ 1..=49 => Some(StreamCompressor::Linear {
                compressor: SingleCompressor::new(fast, 0),
                ratio: 2 * level,
            }),
            level => {
                let zstd_level = ((level - 50) * 9 / 50).max(1) as i32;
                Some(StreamCompressor::Composite {
                    first: SingleCompressor::new(fast, 0),
                    second: SingleCompressor::new(strong, zstd_level),
                    ratio: 2 * (level - 50),
                })
            }
        }
    }

    /// Worst-case output size for a block of `raw_len` bytes.
    pub fn compress_buffer_size(&self, raw_len: usize) -> usize {
        let bound = match self {
            StreamCompressor::Single(compressor) => compressor.compress_buffer_size(raw_len),
            StreamCompressor::Linear { compressor, .. } => {
                compressor.compress_buffer_size(raw_len)
            }
            StreamCompressor::Composite { first, second, .. } => first
                .compress_buffer_size(raw_len)
                .max(second.compress_buffer_size(raw_len)),
        };
        bound.max(raw_len)
    }

    /// Compress block `block_nr` from `src` into `dst`, which must hold at
    /// least [`Self::compress_buffer_size`] bytes. Returns the number of bytes
    /// written and the algorithm tag to store with them.
    pub fn compress(
        &self,
        src: &[u8],
        dst: &mut [u8],
        block_nr: usize,
    ) -> Result<(usize, CompAlgo), BlockcolError> {
        let chosen = match self {
            StreamCompressor::Single(compressor) => Some(compressor),
            StreamCompressor::Linear { compressor, ratio } => {
                is_selected(block_nr, *ratio).then_some(compressor)
            }
            StreamCompressor::Composite {
                first,
                second,
                ratio,
            } => Some(if is_selected(block_nr, *ratio) {
                second
            } else {
                first
            }),
        };

        if let Some(compressor) = chosen {
            if let Some(len) = compressor.compress(src, dst)? {
                return Ok((len, compressor.algo()));
            }
        }
        dst[..src.len()].copy_from_slice(src);
        Ok((src.len(), CompAlgo::Uncompressed))
    }
}

/// Spreads `ratio` percent of the block numbers evenly over the stream.
fn is_selected(block_nr: usize, ratio: u32) -> bool {
    let ratio = ratio.min(100) as usize;
    (block_nr + 1) * ratio / 100 > block_nr * ratio / 100
}
