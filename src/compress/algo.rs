use crate::compress::shuffle::{shuffle4, unshuffle4};
use crate::core::BlockcolError;

/// Bytes in front of every compressed frame: CRC32 of the uncompressed data.
pub const FRAME_HEADER_SIZE: usize = 4;

/// Algorithm tag stored in a block index entry for every frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum CompAlgo {
    Uncompressed = 0,
    Lz4 = 1,
    Zstd = 2,
    Lz4Shuf4 = 3,
    ZstdShuf4 = 4,
}

impl CompAlgo {
    pub fn tag(self) -> u16 {
        self as u16
    }

    pub fn from_tag(tag: u16) -> Result<Self, BlockcolError> {
        match tag {
            0 => Ok(CompAlgo::Uncompressed),
            1 => Ok(CompAlgo::Lz4),
            2 => Ok(CompAlgo::Zstd),
            3 => Ok(CompAlgo::Lz4Shuf4),
            4 => Ok(CompAlgo::ZstdShuf4),
            other => Err(BlockcolError::FormatError(format!(
                "unknown compression algorithm tag {other}"
            ))),
        }
    }

    fn is_shuffled(self) -> bool {
        matches!(self, CompAlgo::Lz4Shuf4 | CompAlgo::ZstdShuf4)
    }
}

/// One algorithm at a fixed level.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SingleCompressor {
    algo: CompAlgo,
    level: i32,
}

impl SingleCompressor {
    pub fn new(algo: CompAlgo, level: i32) -> Self {
        Self { algo, level }
    }

    pub fn algo(&self) -> CompAlgo {
        self.algo
    }

    /// Worst-case frame size for `raw_len` input bytes.
    pub fn compress_buffer_size(&self, raw_len: usize) -> usize {
        FRAME_HEADER_SIZE
            + match self.algo {
                CompAlgo::Uncompressed => raw_len,
                CompAlgo::Lz4 | CompAlgo::Lz4Shuf4 => {
                    lz4_flex::block::get_maximum_output_size(raw_len)
                }
                CompAlgo::Zstd | CompAlgo::ZstdShuf4 => zstd::zstd_safe::compress_bound(raw_len),
            }
    }

    /// Compress `src` into a frame at the start of `dst`. Returns `None` when
    /// the frame would not be smaller than `src`, in which case the caller
    /// stores the data raw.
    pub fn compress(&self, src: &[u8], dst: &mut [u8]) -> Result<Option<usize>, BlockcolError> {
        if src.is_empty() || self.algo == CompAlgo::Uncompressed {
            return Ok(None);
        }

        let mut shuffled = Vec::new();
        let input = if self.algo.is_shuffled() {
            shuffle4(src, &mut shuffled);
            &shuffled[..]
        } else {
            src
        };

        let (header, body) = dst.split_at_mut(FRAME_HEADER_SIZE);
        let written = match self.algo {
            CompAlgo::Lz4 | CompAlgo::Lz4Shuf4 => lz4_flex::block::compress_into(input, body)
                .map_err(|e| BlockcolError::CorruptBlock(format!("lz4 compression failed: {e}")))?,
            CompAlgo::Zstd | CompAlgo::ZstdShuf4 => {
                zstd::bulk::compress_to_buffer(input, body, self.level).map_err(|e| {
                    BlockcolError::CorruptBlock(format!("zstd compression failed: {e}"))
                })?
            }
            CompAlgo::Uncompressed => return Ok(None),
        };

        let frame_len = FRAME_HEADER_SIZE + written;
        if frame_len >= src.len() {
            return Ok(None);
        }
        header.copy_from_slice(&crc32fast::hash(src).to_le_bytes());
        Ok(Some(frame_len))
    }
}

/// Each LZ4 input byte expands to at most 255 output bytes.
const LZ4_MAX_EXPANSION: usize = 255;

/// Check that the frame `src` written with algorithm `tag` can decode to
/// exactly `decoded_len` bytes, before a buffer of that size is allocated.
pub fn validate_frame_len(tag: u16, src: &[u8], decoded_len: usize) -> Result<(), BlockcolError> {
    let algo = CompAlgo::from_tag(tag)?;
    if algo == CompAlgo::Uncompressed {
        if src.len() != decoded_len {
            return Err(BlockcolError::FormatError(format!(
                "raw frame holds {} bytes, expected {decoded_len}",
                src.len()
            )));
        }
        return Ok(());
    }
    if src.len() < FRAME_HEADER_SIZE {
        return Err(BlockcolError::FormatError(format!(
            "compressed frame of {} bytes is too short",
            src.len()
        )));
    }
    let body = &src[FRAME_HEADER_SIZE..];
    let fits = match algo {
        CompAlgo::Lz4 | CompAlgo::Lz4Shuf4 => {
            decoded_len <= body.len().saturating_mul(LZ4_MAX_EXPANSION)
        }
        CompAlgo::Zstd | CompAlgo::ZstdShuf4 => matches!(
            zstd::zstd_safe::get_frame_content_size(body),
            Ok(Some(size)) if size == decoded_len as u64
        ),
        CompAlgo::Uncompressed => true,
    };
    if !fits {
        return Err(BlockcolError::FormatError(format!(
            "{algo:?} frame of {} bytes cannot hold {decoded_len} decoded bytes",
            src.len()
        )));
    }
    Ok(())
}

/// Inverse of [`SingleCompressor`] for every known algorithm tag.
#[derive(Debug, Default)]
pub struct Decompressor {
    scratch: Vec<u8>,
}

impl Decompressor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the frame `src` written with algorithm `tag` into `dst`, which
    /// must be exactly the uncompressed size.
    pub fn decompress(&mut self, tag: u16, dst: &mut [u8], src: &[u8]) -> Result<(), BlockcolError> {
        validate_frame_len(tag, src, dst.len())?;
        let algo = CompAlgo::from_tag(tag)?;
        if algo == CompAlgo::Uncompressed {
            dst.copy_from_slice(src);
            return Ok(());
        }

        let (header, body) = src.split_at(FRAME_HEADER_SIZE);
        let checksum = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);

        if algo.is_shuffled() {
            let mut scratch = std::mem::take(&mut self.scratch);
            scratch.clear();
            scratch.resize(dst.len(), 0);
            let result = decode_frame(algo, body, &mut scratch);
            if result.is_ok() {
                unshuffle4(&scratch, dst);
            }
            self.scratch = scratch;
            result?;
        } else {
            decode_frame(algo, body, dst)?;
        }

        if crc32fast::hash(dst) != checksum {
            return Err(BlockcolError::FormatError(format!(
                "checksum mismatch in {algo:?} frame"
            )));
        }
        Ok(())
    }
}

fn decode_frame(algo: CompAlgo, body: &[u8], dst: &mut [u8]) -> Result<(), BlockcolError> {
    let written = match algo {
        CompAlgo::Lz4 | CompAlgo::Lz4Shuf4 => lz4_flex::block::decompress_into(body, dst)
            .map_err(|e| BlockcolError::FormatError(format!("lz4 frame: {e}")))?,
        CompAlgo::Zstd | CompAlgo::ZstdShuf4 => zstd::bulk::decompress_to_buffer(body, dst)
            .map_err(|e| BlockcolError::FormatError(format!("zstd frame: {e}")))?,
        CompAlgo::Uncompressed => 0,
    };
    if written != dst.len() {
        return Err(BlockcolError::FormatError(format!(
            "frame decoded to {written} bytes, expected {}",
            dst.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn sample_table() -> Vec<u8> {
        let table: Vec<u32> = (0..4096u32).map(|i| i / 16).collect();
        bytemuck::cast_slice(&table).to_vec()
    }

    #[rstest]
    #[case(CompAlgo::Lz4, 0)]
    #[case(CompAlgo::Zstd, 3)]
    #[case(CompAlgo::Lz4Shuf4, 0)]
    #[case(CompAlgo::ZstdShuf4, 1)]
    fn test_frame_decodes(#[case] algo: CompAlgo, #[case] level: i32) {
        let src = sample_table();
        let compressor = SingleCompressor::new(algo, level);
        let mut frame = vec![0u8; compressor.compress_buffer_size(src.len())];
        let len = compressor.compress(&src, &mut frame).unwrap().unwrap();
        assert!(len < src.len());

        let mut out = vec![0u8; src.len()];
        Decompressor::new()
            .decompress(algo.tag(), &mut out, &frame[..len])
            .unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn test_incompressible_input_is_declined() {
        let src = [17u8, 3, 250];
        let compressor = SingleCompressor::new(CompAlgo::Lz4, 0);
        let mut frame = vec![0u8; compressor.compress_buffer_size(src.len())];
        assert_eq!(compressor.compress(&src, &mut frame).unwrap(), None);
    }

    #[test]
    fn test_unknown_tag() {
        let mut out = [0u8; 4];
        let err = Decompressor::new().decompress(9, &mut out, &[0; 8]).unwrap_err();
        assert!(matches!(err, BlockcolError::FormatError(_)));
    }

    #[test]
    fn test_corrupt_frame_is_detected() {
        let src = sample_table();
        let compressor = SingleCompressor::new(CompAlgo::Lz4, 0);
        let mut frame = vec![0u8; compressor.compress_buffer_size(src.len())];
        let len = compressor.compress(&src, &mut frame).unwrap().unwrap();
        frame[len / 2] ^= 0x5a;

        let mut out = vec![0u8; src.len()];
        let err = Decompressor::new()
            .decompress(CompAlgo::Lz4.tag(), &mut out, &frame[..len])
            .unwrap_err();
        assert!(matches!(err, BlockcolError::FormatError(_)));
    }

    #[test]
    fn test_frame_len_bounds() {
        let src = sample_table();
        for (algo, level) in [(CompAlgo::Lz4, 0), (CompAlgo::Zstd, 3)] {
            let compressor = SingleCompressor::new(algo, level);
            let mut frame = vec![0u8; compressor.compress_buffer_size(src.len())];
            let len = compressor.compress(&src, &mut frame).unwrap().unwrap();
            let frame = &frame[..len];

            assert!(validate_frame_len(algo.tag(), frame, src.len()).is_ok());
            assert!(matches!(
                validate_frame_len(algo.tag(), frame, 0xF000_0000),
                Err(BlockcolError::FormatError(_))
            ));
        }
        assert!(validate_frame_len(CompAlgo::Lz4.tag(), &[0; 3], 10).is_err());
        assert!(validate_frame_len(CompAlgo::Uncompressed.tag(), &[0; 3], 3).is_ok());
    }

    #[test]
    fn test_raw_frame_length_mismatch() {
        let mut out = [0u8; 4];
        let err = Decompressor::new().decompress(0, &mut out, &[1, 2, 3]).unwrap_err();
        assert!(matches!(err, BlockcolError::FormatError(_)));
    }
}
