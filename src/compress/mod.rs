mod algo;
mod shuffle;
mod stream;

pub use algo::{CompAlgo, Decompressor, FRAME_HEADER_SIZE, SingleCompressor, validate_frame_len};
pub use stream::{Payload, StreamCompressor};
