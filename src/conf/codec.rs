use serde::{Deserialize, Serialize};

use crate::core::BlockcolError;

/// Upper bound on worker threads used by the column codecs.
pub const MAX_CODEC_THREADS: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CodecConfig {
    /// Thread-count hint. `None` uses the available parallelism of the host.
    #[serde(default)]
    pub threads: Option<usize>,
    #[serde(default = "CodecConfig::default_compression")]
    pub compression: u32,
    #[serde(default = "CodecConfig::default_string_block_size")]
    pub string_block_size: u32,
    #[serde(default = "CodecConfig::default_fixed_block_size")]
    pub fixed_block_size: u32,
    #[serde(default = "CodecConfig::default_batch_blocks")]
    pub write_batch_blocks: usize,
    #[serde(default = "CodecConfig::default_batch_blocks")]
    pub read_batch_blocks: usize,
}

impl CodecConfig {
    fn default_compression() -> u32 {
        50
    }

    fn default_string_block_size() -> u32 {
        4096
    }

    fn default_fixed_block_size() -> u32 {
        16384
    }

    fn default_batch_blocks() -> usize {
        32
    }

    /// Same settings, but pinned to exactly `threads` workers.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    /// Resolved number of worker threads, at least 1 and capped at
    /// [`MAX_CODEC_THREADS`].
    pub fn threads(&self) -> usize {
        let hint = self.threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        });
        hint.clamp(1, MAX_CODEC_THREADS)
    }

    pub fn validate(&self) -> Result<(), BlockcolError> {
        if self.compression > 100 {
            return Err(BlockcolError::ConfigParsingError(format!(
                "codec.compression must be within 0..=100, got {}",
                self.compression
            )));
        }
        if self.string_block_size == 0 || self.fixed_block_size == 0 {
            return Err(BlockcolError::ConfigParsingError(
                "codec block sizes must be larger than zero".into(),
            ));
        }
        if self.write_batch_blocks == 0 || self.read_batch_blocks == 0 {
            return Err(BlockcolError::ConfigParsingError(
                "codec batch sizes must be larger than zero".into(),
            ));
        }
        if self.threads == Some(0) {
            return Err(BlockcolError::ConfigParsingError(
                "codec.threads must be larger than zero".into(),
            ));
        }
        Ok(())
    }
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            threads: None,
            compression: Self::default_compression(),
            string_block_size: Self::default_string_block_size(),
            fixed_block_size: Self::default_fixed_block_size(),
            write_batch_blocks: Self::default_batch_blocks(),
            read_batch_blocks: Self::default_batch_blocks(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_default() {
        let codec = CodecConfig::default();
        assert_eq!(codec.compression, 50);
        assert_eq!(codec.string_block_size, 4096);
        assert_eq!(codec.fixed_block_size, 16384);
        assert!(codec.validate().is_ok());
    }

    #[test]
    fn test_threads_are_clamped() {
        assert_eq!(CodecConfig::default().with_threads(1000).threads(), MAX_CODEC_THREADS);
        assert!(CodecConfig::default().threads() >= 1);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let codec = CodecConfig {
            compression: 101,
            ..CodecConfig::default()
        };
        assert!(matches!(
            codec.validate(),
            Err(BlockcolError::ConfigParsingError(_))
        ));

        let codec = CodecConfig {
            string_block_size: 0,
            ..CodecConfig::default()
        };
        assert!(codec.validate().is_err());

        let codec = CodecConfig::default().with_threads(0);
        assert!(codec.validate().is_err());
    }
}
