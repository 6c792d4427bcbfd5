//! Fixed-width value columns.
//!
//! ```text
//! uncompressed: [flags: u32][block_size: u32][values: [T; len]]
//! compressed:   [flags: u32][block_size: u32][index: [FixedIndexEntry; blocks]][frame 0][frame 1]...
//! ```

mod read;
mod write;

use std::io::{Read, Seek, Write};

use bytemuck::Pod;

use crate::conf::CodecConfig;
use crate::core::BlockcolError;

pub use read::FixedColumnReader;
pub use write::FixedColumnWriter;

pub fn write_fixed_column<W, T>(stream: &mut W, values: &[T], compression: u32) -> Result<(), BlockcolError>
where
    W: Write + Seek + Send,
    T: Pod + Sync,
{
    FixedColumnWriter::new(&CodecConfig::default()).write(stream, values, compression)
}

pub fn read_fixed_column<R, T>(
    stream: &mut R,
    column_offset: u64,
    start_row: u64,
    row_count: u64,
    total_length: u64,
) -> Result<Vec<T>, BlockcolError>
where
    R: Read + Seek,
    T: Pod,
{
    FixedColumnReader::new().read(
        stream,
        column_offset,
        start_row,
        row_count,
        total_length,
    )
}
