//! Factor columns: a vector of integer codes into a table of levels.
//!
//! ```text
//! [nr_of_levels: u64][levels_offset: u64][codes: fixed i32 column][levels: string column]
//! ```
//!
//! Codes are 1-based, [`NA_CODE`] marks a missing value. The levels column
//! is omitted when there are no levels.

use std::io::{Read, Seek, SeekFrom, Write};

use bytemuck::{Zeroable, bytes_of};
use log::debug;

use crate::conf::CodecConfig;
use crate::core::BlockcolError;
use crate::io::column::header::{COLUMN_HEADER_SIZE, FactorHeader, read_index};
use crate::io::column::{
    FixedColumnReader, FixedColumnWriter, StringColumnReader, StringColumnWriter, StringEncoding,
};

/// Code of a missing value.
pub const NA_CODE: i32 = i32::MIN;

const FACTOR_HEADER_SIZE: u64 = size_of::<FactorHeader>() as u64;

/// Categorical vector: `codes[i]` is `NA_CODE` or a 1-based index into
/// `levels`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Factor {
    pub levels: Vec<String>,
    pub codes: Vec<i32>,
}

impl Factor {
    /// Build a factor with the sorted distinct values as levels.
    pub fn from_values<S: AsRef<str>>(values: &[Option<S>]) -> Result<Self, BlockcolError> {
        let mut levels: Vec<&str> = values.iter().flatten().map(AsRef::as_ref).collect();
        levels.sort_unstable();
        levels.dedup();
        if i32::try_from(levels.len()).is_err() {
            return Err(BlockcolError::InvalidInput(format!(
                "{} levels do not fit in 32-bit codes",
                levels.len()
            )));
        }

        let codes = values
            .iter()
            .map(|value| match value {
                None => NA_CODE,
                // Levels were collected from these values, so the search hits.
                Some(value) => match levels.binary_search(&value.as_ref()) {
                    Ok(pos) => pos as i32 + 1,
                    Err(_) => NA_CODE,
                },
            })
            .collect();
        Ok(Self {
            levels: levels.into_iter().map(str::to_owned).collect(),
            codes,
        })
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Level of `row`, `None` for NA or rows past the end.
    pub fn get(&self, row: usize) -> Option<&str> {
        let code = *self.codes.get(row)?;
        let pos = usize::try_from(code.checked_sub(1)?).ok()?;
        self.levels.get(pos).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<&str>> + '_ {
        (0..self.codes.len()).map(|row| self.get(row))
    }
}

fn check_codes(codes: &[i32], nr_of_levels: usize) -> Result<(), (usize, i32)> {
    match codes
        .iter()
        .position(|&code| code != NA_CODE && (code < 1 || code as usize > nr_of_levels))
    {
        Some(row) => Err((row, codes[row])),
        None => Ok(()),
    }
}

/// Writes factors as a codes column followed by a levels column.
#[derive(Clone, Debug)]
pub struct FactorColumnWriter {
    codes: FixedColumnWriter,
    levels: StringColumnWriter,
}

impl FactorColumnWriter {
    pub fn new(config: &CodecConfig) -> Self {
        Self {
            codes: FixedColumnWriter::new(config),
            levels: StringColumnWriter::new(config),
        }
    }

    /// Append a factor column at the current stream position. On success
    /// the stream is positioned right after the column.
    pub fn write<W, S>(
        &self,
        stream: &mut W,
        codes: &[i32],
        levels: &[S],
        compression: u32,
        encoding: StringEncoding,
    ) -> Result<(), BlockcolError>
    where
        W: Write + Seek + Send,
        S: AsRef<str>,
    {
        if codes.is_empty() {
            return Err(BlockcolError::EmptyVectorError);
        }
        if i32::try_from(levels.len()).is_err() {
            return Err(BlockcolError::InvalidInput(format!(
                "{} levels do not fit in 32-bit codes",
                levels.len()
            )));
        }
        if let Err((row, code)) = check_codes(codes, levels.len()) {
            return Err(BlockcolError::InvalidInput(format!(
                "code {code} at row {row} is not a level of {}",
                levels.len()
            )));
        }
        debug!(
            "Writing factor of {} codes and {} levels",
            codes.len(),
            levels.len()
        );

        let column_start = stream.stream_position()?;
        stream.write_all(bytes_of(&FactorHeader::zeroed()))?;
        self.codes.write(stream, codes, compression)?;

        let levels_offset = stream.stream_position()? - column_start;
        if !levels.is_empty() {
            let levels: Vec<Option<&str>> = levels.iter().map(|l| Some(l.as_ref())).collect();
            self.levels.write(stream, &levels, compression, encoding)?;
        }

        let column_end = stream.stream_position()?;
        let header = FactorHeader {
            nr_of_levels: levels.len() as u64,
            levels_offset,
        };
        stream.seek(SeekFrom::Start(column_start))?;
        stream.write_all(bytes_of(&header))?;
        stream.seek(SeekFrom::Start(column_end))?;
        Ok(())
    }
}

/// Reads row ranges of factor columns. All levels are returned with every
/// range.
#[derive(Clone, Debug)]
pub struct FactorColumnReader {
    codes: FixedColumnReader,
    levels: StringColumnReader,
}

impl FactorColumnReader {
    pub fn new(config: &CodecConfig) -> Self {
        Self {
            codes: FixedColumnReader::new(),
            levels: StringColumnReader::new(config),
        }
    }

    pub fn read<R: Read + Seek + Send>(
        &self,
        stream: &mut R,
        column_offset: u64,
        start_row: u64,
        row_count: u64,
        total_length: u64,
    ) -> Result<Factor, BlockcolError> {
        let stream_len = stream.seek(SeekFrom::End(0))?;
        let column_len = stream_len.saturating_sub(column_offset);
        let header = read_index::<_, FactorHeader>(stream, column_offset, 1)?[0];
        if header.levels_offset < FACTOR_HEADER_SIZE + COLUMN_HEADER_SIZE
            || header.levels_offset > column_len
        {
            return Err(BlockcolError::FormatError(format!(
                "levels offset {} outside of a factor column of {column_len} bytes",
                header.levels_offset
            )));
        }
        if i32::try_from(header.nr_of_levels).is_err() {
            return Err(BlockcolError::FormatError(format!(
                "factor of {} levels",
                header.nr_of_levels
            )));
        }

        let codes: Vec<i32> = self.codes.read(
            stream,
            column_offset + FACTOR_HEADER_SIZE,
            start_row,
            row_count,
            total_length,
        )?;

        let levels = if header.nr_of_levels == 0 {
            Vec::new()
        } else {
            self.levels
                .read(
                    stream,
                    column_offset + header.levels_offset,
                    0,
                    header.nr_of_levels,
                    header.nr_of_levels,
                )?
                .into_iter()
                .map(|level| {
                    level.ok_or_else(|| BlockcolError::FormatError("factor level is NA".into()))
                })
                .collect::<Result<Vec<_>, _>>()?
        };

        if let Err((row, code)) = check_codes(&codes, levels.len()) {
            return Err(BlockcolError::FormatError(format!(
                "code {code} at row {} is not a level of {}",
                start_row + row as u64,
                levels.len()
            )));
        }
        Ok(Factor { levels, codes })
    }
}

/// Write a factor at the current stream position with default settings.
pub fn write_factor_column<W: Write + Seek + Send>(
    stream: &mut W,
    factor: &Factor,
    compression: u32,
    encoding: StringEncoding,
) -> Result<(), BlockcolError> {
    FactorColumnWriter::new(&CodecConfig::default()).write(
        stream,
        &factor.codes,
        &factor.levels,
        compression,
        encoding,
    )
}

/// Read a row range of the factor column at `column_offset` with default
/// settings.
pub fn read_factor_column<R: Read + Seek + Send>(
    stream: &mut R,
    column_offset: u64,
    start_row: u64,
    row_count: u64,
    total_length: u64,
) -> Result<Factor, BlockcolError> {
    FactorColumnReader::new(&CodecConfig::default()).read(
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
    use std::io::Cursor;

    fn write(codes: &[i32], levels: &[&str]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        FactorColumnWriter::new(&CodecConfig::default())
            .write(&mut cursor, codes, levels, 0, StringEncoding::Utf8)
            .unwrap();
        cursor.into_inner()
    }

    #[test]
    fn test_from_values() {
        let values = [Some("pear"), None, Some("apple"), Some("pear")];
        let factor = Factor::from_values(&values).unwrap();
        assert_eq!(factor.levels, vec!["apple", "pear"]);
        assert_eq!(factor.codes, vec![2, NA_CODE, 1, 2]);
        assert_eq!(factor.iter().collect::<Vec<_>>(), values.to_vec());
        assert_eq!(factor.get(4), None);
    }

    #[test]
    fn test_layout() {
        let bytes = write(&[1, 2, NA_CODE], &["a", "b"]);
        assert_eq!(&bytes[..8], &2u64.to_ne_bytes());
        let levels_offset = FACTOR_HEADER_SIZE + COLUMN_HEADER_SIZE + 3 * 4;
        assert_eq!(&bytes[8..16], &levels_offset.to_ne_bytes());
        assert_eq!(&bytes[24..28], &1i32.to_ne_bytes());
    }

    #[test]
    fn test_no_levels() {
        let bytes = write(&[NA_CODE; 5], &[]);
        let factor = read_factor_column(&mut Cursor::new(&bytes), 0, 1, 3, 5).unwrap();
        assert!(factor.levels.is_empty());
        assert_eq!(factor.codes, vec![NA_CODE; 3]);
    }

    #[test]
    fn test_invalid_codes() {
        let writer = FactorColumnWriter::new(&CodecConfig::default());
        for codes in [vec![1, 3], vec![0], vec![-1, 1]] {
            let result = writer.write(
                &mut Cursor::new(Vec::new()),
                &codes,
                &["x", "y"],
                0,
                StringEncoding::Native,
            );
            assert!(matches!(result, Err(BlockcolError::InvalidInput(_))), "{codes:?}");
        }
        let empty: [&str; 0] = [];
        assert_eq!(
            writer.write(&mut Cursor::new(Vec::new()), &[], &empty, 0, StringEncoding::Native),
            Err(BlockcolError::EmptyVectorError)
        );
    }

    #[test]
    fn test_bad_levels_offset() {
        let mut bytes = write(&[1, 1, 1], &["only"]);
        let len = bytes.len() as u64;
        bytes[8..16].copy_from_slice(&(len + 1).to_ne_bytes());
        let result = read_factor_column(&mut Cursor::new(&bytes), 0, 0, 3, 3);
        assert!(matches!(result, Err(BlockcolError::FormatError(_))));
    }

    #[test]
    fn test_out_of_range_code_on_disk() {
        let mut bytes = write(&[1, 2, 1], &["a", "b"]);
        // Second code of the uncompressed codes column.
        let pos = (FACTOR_HEADER_SIZE + COLUMN_HEADER_SIZE + 4) as usize;
        bytes[pos..pos + 4].copy_from_slice(&7i32.to_ne_bytes());
        let result = read_factor_column(&mut Cursor::new(&bytes), 0, 0, 3, 3);
        assert!(matches!(result, Err(BlockcolError::FormatError(_))));
        // Rows that avoid the bad code still read.
        let factor = read_factor_column(&mut Cursor::new(&bytes), 0, 2, 1, 3).unwrap();
        assert_eq!(factor.get(0), Some("a"));
    }
}
