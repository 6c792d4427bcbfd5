mod codec;
mod config;

pub use codec::{CodecConfig, MAX_CODEC_THREADS};
pub use config::Config;
