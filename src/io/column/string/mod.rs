//! Block-indexed string columns.
//!
//! Column layout, offsets relative to the column start:
//! ```text
//! [flags: u32][block_size: u32]
//! [index: one entry per block]          // end offset u64, or 16-byte entry if compressed
//! [block 0][block 1]...
//! ```
//!
//! Uncompressed block of `n` elements:
//! ```text
//! [cumulative end offsets: [u32; n]][NA bitmap: [u32; 1 + n / 32]][characters]
//! ```
//!
//! Compressed block, with the frame algorithms and the size table length
//! recorded in the index entry:
//! ```text
//! [size table frame][NA bitmap: [u32; 1 + n / 32]][character frame]
//! ```

mod pipeline;
mod read;
mod write;

use std::io::{Read, Seek, Write};

use crate::conf::CodecConfig;
use crate::core::BlockcolError;
use crate::io::column::StringEncoding;

pub use read::StringColumnReader;
pub use write::StringColumnWriter;

/// Write `strings` at the current stream position with default settings.
pub fn write_string_column<W, S>(
    stream: &mut W,
    strings: &[Option<S>],
    compression: u32,
    encoding: StringEncoding,
) -> Result<(), BlockcolError>
where
    W: Write + Seek + Send,
    S: AsRef<str> + Sync,
{
    StringColumnWriter::new(&CodecConfig::default()).write(stream, strings, compression, encoding)
}

/// Read a row range of the string column at `column_offset` with default
/// settings.
pub fn read_string_column<R: Read + Seek + Send>(
    stream: &mut R,
    column_offset: u64,
    start_row: u64,
    row_count: u64,
    total_length: u64,
) -> Result<Vec<Option<String>>, BlockcolError> {
    StringColumnReader::new(&CodecConfig::default()).read(
        stream,
        column_offset,
        start_row,
        row_count,
        total_length,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::column::header::{COLUMN_HEADER_SIZE, ColumnHeader};
    use std::io::Cursor;

    fn config(threads: usize, block_size: u32) -> CodecConfig {
        CodecConfig {
            string_block_size: block_size,
            ..CodecConfig::default().with_threads(threads)
        }
    }

    fn sample(len: usize) -> Vec<Option<String>> {
        (0..len)
            .map(|i| match i % 11 {
                0 => None,
                5 => Some(String::new()),
                _ => Some(format!("value-{i}")),
            })
            .collect()
    }

    fn write(values: &[Option<String>], config: &CodecConfig, compression: u32) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        StringColumnWriter::new(config)
            .write(&mut cursor, values, compression, StringEncoding::Utf8)
            .unwrap();
        cursor.into_inner()
    }

    #[test]
    fn test_small_column_layout() {
        let values = vec![Some("ab".to_string()), None, Some("c".to_string())];
        let bytes = write(&values, &config(1, 4096), 0);

        let header = ColumnHeader::from_bytes(bytes[..8].try_into().unwrap()).unwrap();
        assert!(!header.compressed);
        assert_eq!(header.encoding, StringEncoding::Utf8);

        // header, one index entry, 3 offsets, 1 NA word, 3 characters
        let end = u64::from_ne_bytes(bytes[8..16].try_into().unwrap());
        assert_eq!(end, 16 + 12 + 4 + 3);
        assert_eq!(bytes.len() as u64, end);
        assert_eq!(&bytes[32..], b"abc");
    }

    #[test]
    fn test_stream_positioned_after_column() {
        let values = sample(300);
        let mut cursor = Cursor::new(vec![0xAAu8; 5]);
        cursor.set_position(5);
        StringColumnWriter::new(&config(2, 64))
            .write(&mut cursor, &values, 30, StringEncoding::Native)
            .unwrap();
        assert_eq!(cursor.position(), cursor.get_ref().len() as u64);

        let read = StringColumnReader::new(&config(2, 64))
            .read(&mut cursor, 5, 0, 300, 300)
            .unwrap();
        assert_eq!(read, values);
    }

    #[test]
    fn test_pipeline_and_sequential_agree() {
        let values = sample(5000);
        let bytes = write(&values, &config(4, 100), 0);

        for threads in [1, 2, 5] {
            let reader = StringColumnReader::new(&CodecConfig {
                read_batch_blocks: 3,
                ..config(threads, 100)
            });
            let read = reader
                .read(&mut Cursor::new(&bytes), 0, 150, 4321, 5000)
                .unwrap();
            assert_eq!(read, values[150..4471].to_vec());
        }
    }

    #[test]
    fn test_pipeline_reports_format_errors() {
        let values = sample(1000);
        let mut bytes = write(&values, &config(1, 100), 0);
        // Point the size table of block 6 past its characters.
        let block_start = u64::from_ne_bytes(bytes[8 + 5 * 8..8 + 6 * 8].try_into().unwrap());
        let pos = block_start as usize + 99 * 4;
        bytes[pos..pos + 4].copy_from_slice(&u32::MAX.to_ne_bytes());

        let result = StringColumnReader::new(&config(3, 100)).read(
            &mut Cursor::new(&bytes),
            0,
            0,
            1000,
            1000,
        );
        assert!(matches!(result, Err(BlockcolError::FormatError(_))));
    }

    #[test]
    fn test_index_start_is_checked() {
        let values = sample(10);
        let mut corrupt = write(&values, &config(1, 4), 0);
        // The end of block 0 now points into the index.
        let entry = COLUMN_HEADER_SIZE as usize;
        corrupt[entry..entry + 8].copy_from_slice(&9u64.to_ne_bytes());
        let result = read_string_column(&mut Cursor::new(&corrupt), 0, 5, 3, 10);
        assert!(matches!(result, Err(BlockcolError::FormatError(_))));
    }
}
