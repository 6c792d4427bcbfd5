use std::io::{Read, Seek, SeekFrom};

use bytemuck::{Pod, cast_slice_mut};

use crate::compress::{Decompressor, validate_frame_len};
use crate::core::BlockcolError;
use crate::io::column::header::{
    COLUMN_HEADER_SIZE, ColumnHeader, FixedIndexEntry, block_extents, read_index,
};
use crate::io::column::{to_usize, try_resize, try_with_capacity};

fn past_end(what: &str) -> BlockcolError {
    BlockcolError::FormatError(format!("{what} runs past the stream end"))
}

/// Reads row ranges of columns written by
/// [`FixedColumnWriter`](super::FixedColumnWriter). Blocks are decoded on
/// the calling thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct FixedColumnReader;

impl FixedColumnReader {
    pub fn new() -> Self {
        Self
    }

    pub fn read<R, T>(
        &self,
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
        if row_count == 0 {
            return Ok(Vec::new());
        }
        if start_row
            .checked_add(row_count)
            .is_none_or(|end| end > total_length)
        {
            return Err(BlockcolError::InvalidInput(format!(
                "rows {start_row}..{start_row}+{row_count} outside of a column of {total_length}"
            )));
        }
        let elem = size_of::<T>() as u64;
        if elem == 0 {
            return Err(BlockcolError::InvalidInput(
                "zero-sized values cannot be read".into(),
            ));
        }

        let stream_len = stream.seek(SeekFrom::End(0))?;
        let header = ColumnHeader::read(stream, column_offset)?;
        let column_len = stream_len.saturating_sub(column_offset);

        if !header.compressed {
            // Row ranges are inside the column, so only its end needs checking.
            total_length
                .checked_mul(elem)
                .and_then(|data_len| data_len.checked_add(COLUMN_HEADER_SIZE))
                .filter(|column_end| *column_end <= column_len)
                .ok_or_else(|| past_end(&format!("column of {total_length} values")))?;
            let mut out = Vec::new();
            try_resize(&mut out, to_usize(row_count, "row count")?, T::zeroed())?;
            stream.seek(SeekFrom::Start(
                column_offset + COLUMN_HEADER_SIZE + start_row * elem,
            ))?;
            stream.read_exact(cast_slice_mut(&mut out))?;
            return Ok(out);
        }

        let block_size = header.block_size as u64;
        let nr_of_blocks = total_length.div_ceil(block_size);
        let start_block = start_row / block_size;
        let end_block = (start_row + row_count - 1) / block_size;
        let entry_size = size_of::<FixedIndexEntry>() as u64;
        let data_start = nr_of_blocks
            .checked_mul(entry_size)
            .and_then(|index_len| index_len.checked_add(COLUMN_HEADER_SIZE))
            .filter(|data_start| *data_start <= column_len)
            .ok_or_else(|| past_end(&format!("index of {nr_of_blocks} blocks")))?;
        let mut out = try_with_capacity(to_usize(row_count, "row count")?)?;

        let first_entry = start_block.saturating_sub(1);
        let entries: Vec<FixedIndexEntry> = read_index(
            stream,
            column_offset + COLUMN_HEADER_SIZE + first_entry * entry_size,
            (end_block - first_entry + 1) as usize,
        )?;
        let (first_start, entries) = if start_block > 0 {
            (entries[0].end_offset, &entries[1..])
        } else {
            (data_start, &entries[..])
        };
        if first_start < data_start {
            return Err(BlockcolError::FormatError(format!(
                "block offset {first_start} points into the column index"
            )));
        }
        let extents = block_extents(first_start, entries.iter().map(|e| e.end_offset), column_len)?;

        let mut decompressor = Decompressor::new();
        let mut frame = Vec::new();
        let mut block = Vec::new();
        stream.seek(SeekFrom::Start(column_offset + first_start))?;
        for ((block_nr, extent), entry) in (start_block..=end_block).zip(extents).zip(entries) {
            frame.resize(extent.len(), 0);
            stream.read_exact(&mut frame)?;

            let block_start = block_nr * block_size;
            let nr_of_elements = block_size.min(total_length - block_start) as usize;
            let first = start_row.saturating_sub(block_start) as usize;
            let last = ((start_row + row_count - 1 - block_start) as usize).min(nr_of_elements - 1);

            let decoded_len = nr_of_elements
                .checked_mul(elem as usize)
                .ok_or_else(|| past_end(&format!("block of {nr_of_elements} values")))?;
            validate_frame_len(entry.algo, &frame, decoded_len)?;
            try_resize(&mut block, nr_of_elements, T::zeroed())?;
            decompressor.decompress(entry.algo, cast_slice_mut(&mut block), &frame)?;
            out.extend_from_slice(&block[first..=last]);
        }
        Ok(out)
    }
}
