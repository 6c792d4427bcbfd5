use std::io::{Read, Seek, SeekFrom};

use bytemuck::{Pod, Zeroable};

use crate::core::BlockcolError;

/// Size of the column header: flags and block size.
pub const COLUMN_HEADER_SIZE: u64 = 8;

const FLAG_COMPRESSED: u32 = 1;
const ENCODING_SHIFT: u32 = 1;
const ENCODING_MASK: u32 = 0b111;
const KNOWN_FLAGS: u32 = FLAG_COMPRESSED | (ENCODING_MASK << ENCODING_SHIFT);

/// Character encoding of a string column. The writer does not transcode:
/// `Native` and `Utf8` store the UTF-8 bytes, `Latin1` stores one byte per
/// character.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StringEncoding {
    #[default]
    Native,
    Latin1,
    Utf8,
}

impl StringEncoding {
    fn bits(self) -> u32 {
        match self {
            StringEncoding::Native => 0,
            StringEncoding::Latin1 => 1,
            StringEncoding::Utf8 => 2,
        }
    }

    fn from_bits(bits: u32) -> Result<Self, BlockcolError> {
        match bits {
            0 => Ok(StringEncoding::Native),
            1 => Ok(StringEncoding::Latin1),
            2 => Ok(StringEncoding::Utf8),
            other => Err(BlockcolError::FormatError(format!(
                "unknown string encoding {other}"
            ))),
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct RawHeader {
    flags: u32,
    block_size: u32,
}

/// Column header: compression flag, encoding and elements per block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColumnHeader {
    pub compressed: bool,
    pub encoding: StringEncoding,
    pub block_size: u32,
}

impl ColumnHeader {
    pub fn to_bytes(&self) -> [u8; COLUMN_HEADER_SIZE as usize] {
        let mut flags = self.encoding.bits() << ENCODING_SHIFT;
        if self.compressed {
            flags |= FLAG_COMPRESSED;
        }
        bytemuck::cast(RawHeader {
            flags,
            block_size: self.block_size,
        })
    }

    pub fn from_bytes(bytes: [u8; COLUMN_HEADER_SIZE as usize]) -> Result<Self, BlockcolError> {
        let raw: RawHeader = bytemuck::cast(bytes);
        if raw.flags & !KNOWN_FLAGS != 0 {
            return Err(BlockcolError::FormatError(format!(
                "unknown column flags {:#x}",
                raw.flags
            )));
        }
        if raw.block_size == 0 {
            return Err(BlockcolError::FormatError(
                "column block size is zero".into(),
            ));
        }
        Ok(Self {
            compressed: raw.flags & FLAG_COMPRESSED != 0,
            encoding: StringEncoding::from_bits((raw.flags >> ENCODING_SHIFT) & ENCODING_MASK)?,
            block_size: raw.block_size,
        })
    }

    /// Read the header of the column starting at `column_offset`.
    pub fn read<R: Read + Seek>(stream: &mut R, column_offset: u64) -> Result<Self, BlockcolError> {
        let mut bytes = [0u8; COLUMN_HEADER_SIZE as usize];
        stream.seek(SeekFrom::Start(column_offset))?;
        stream.read_exact(&mut bytes)?;
        Self::from_bytes(bytes)
    }
}

/// Index record of a compressed string block.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub(crate) struct StringIndexEntry {
    /// End of the block, relative to the column start.
    pub end_offset: u64,
    pub algo_int: u16,
    pub algo_char: u16,
    /// Bytes taken by the (possibly compressed) size table.
    pub size_table_len: i32,
}

/// Index record of a compressed fixed-width block.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub(crate) struct FixedIndexEntry {
    pub end_offset: u64,
    pub algo: u16,
    pub reserved: [u16; 3],
}

/// Leading record of a factor column. `levels_offset` is relative to the
/// column start; the codes column follows the record directly.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub(crate) struct FactorHeader {
    pub nr_of_levels: u64,
    pub levels_offset: u64,
}

/// Byte range of one block relative to the column start, as resolved from
/// the index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct BlockExtent {
    pub start: u64,
    pub end: u64,
}

impl BlockExtent {
    pub fn len(&self) -> usize {
        (self.end - self.start) as usize
    }
}

/// Turn the block end offsets `ends` into extents, where `first_start` is
/// where the first listed block begins. Rejects offsets that do not grow or
/// that point past `column_len`.
pub(crate) fn block_extents(
    first_start: u64,
    ends: impl IntoIterator<Item = u64>,
    column_len: u64,
) -> Result<Vec<BlockExtent>, BlockcolError> {
    let mut start = first_start;
    let mut extents = Vec::new();
    for end in ends {
        if end <= start {
            return Err(BlockcolError::FormatError(format!(
                "block offsets are not increasing: {end} after {start}"
            )));
        }
        if end > column_len {
            return Err(BlockcolError::FormatError(format!(
                "block ends at {end} beyond the stream end {column_len}"
            )));
        }
        extents.push(BlockExtent { start, end });
        start = end;
    }
    Ok(extents)
}

/// Read `count` index records of type `T` starting at `position`.
pub(crate) fn read_index<R: Read + Seek, T: Pod>(
    stream: &mut R,
    position: u64,
    count: usize,
) -> Result<Vec<T>, BlockcolError> {
    let mut entries = vec![T::zeroed(); count];
    stream.seek(SeekFrom::Start(position))?;
    stream.read_exact(bytemuck::cast_slice_mut(&mut entries))?;
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_header_bytes() {
        let header = ColumnHeader {
            compressed: true,
            encoding: StringEncoding::Utf8,
            block_size: 4096,
        };
        let bytes = header.to_bytes();
        assert_eq!(&bytes[..4], &(1u32 | (2 << 1)).to_ne_bytes());
        assert_eq!(&bytes[4..], &4096u32.to_ne_bytes());
        assert_eq!(ColumnHeader::from_bytes(bytes), Ok(header));
    }

    #[test]
    fn test_header_rejects_garbage() {
        let mut bytes = [0u8; 8];
        assert!(ColumnHeader::from_bytes(bytes).is_err());

        bytes[..4].copy_from_slice(&0x100u32.to_ne_bytes());
        bytes[4..].copy_from_slice(&16u32.to_ne_bytes());
        assert!(matches!(
            ColumnHeader::from_bytes(bytes),
            Err(BlockcolError::FormatError(_))
        ));
    }

    #[test]
    fn test_index_entry_layout() {
        assert_eq!(std::mem::size_of::<StringIndexEntry>(), 16);
        assert_eq!(std::mem::size_of::<FixedIndexEntry>(), 16);
    }

    #[test]
    fn test_block_extents() {
        let extents = block_extents(24, [40, 100], 100).unwrap();
        assert_eq!(
            extents,
            vec![
                BlockExtent { start: 24, end: 40 },
                BlockExtent { start: 40, end: 100 }
            ]
        );
        assert!(block_extents(24, [40, 40], 100).is_err());
        assert!(block_extents(24, [40, 101], 100).is_err());
    }

    #[test]
    fn test_read_truncated_index() {
        let mut cursor = Cursor::new(vec![0u8; 20]);
        let result: Result<Vec<u64>, _> = read_index(&mut cursor, 8, 2);
        assert!(matches!(result, Err(BlockcolError::FormatError(_))));
    }
}
