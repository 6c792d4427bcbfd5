use std::io::{Read, Seek, SeekFrom};

use bytemuck::{cast_slice_mut, pod_read_unaligned};
use log::debug;

use crate::compress::{Decompressor, validate_frame_len};
use crate::conf::CodecConfig;
use crate::core::BlockcolError;
use crate::io::column::{StringEncoding, to_usize, try_resize, try_with_capacity};
use crate::io::column::header::{
    BlockExtent, COLUMN_HEADER_SIZE, ColumnHeader, StringIndexEntry, block_extents, read_index,
};
use crate::io::column::meta::{BlockDecoder, na_words, validate_sizes};
use crate::io::column::string::pipeline::read_pipelined;

/// Uncompressed reads spanning fewer blocks run on the calling thread.
const PIPELINE_MIN_BLOCKS: usize = 4;

/// One block touched by a read and the element range wanted from it.
#[derive(Clone, Copy, Debug)]
pub(super) struct BlockPlan {
    pub extent: BlockExtent,
    pub nr_of_elements: usize,
    pub first: usize,
    pub last: usize,
    pub entry: StringIndexEntry,
}

/// Reads row ranges of string columns written by
/// [`StringColumnWriter`](super::StringColumnWriter).
#[derive(Clone, Debug)]
pub struct StringColumnReader {
    threads: usize,
    batch_blocks: usize,
}

impl StringColumnReader {
    pub fn new(config: &CodecConfig) -> Self {
        Self {
            threads: config.threads(),
            batch_blocks: config.read_batch_blocks.max(1),
        }
    }

    /// Read `row_count` elements starting at `start_row` from the column at
    /// `column_offset`, which holds `total_length` elements in total.
    pub fn read<R: Read + Seek + Send>(
        &self,
        stream: &mut R,
        column_offset: u64,
        start_row: u64,
        row_count: u64,
        total_length: u64,
    ) -> Result<Vec<Option<String>>, BlockcolError> {
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
        let header = ColumnHeader::read(stream, column_offset)?;
        let plans = plan_blocks(stream, column_offset, &header, start_row, row_count, total_length)?;
        let mut out = try_with_capacity(to_usize(row_count, "row count")?)?;

        if header.compressed {
            debug!("Reading {} compressed blocks sequentially", plans.len());
            read_compressed(stream, column_offset, &plans, header.encoding, &mut out)?;
        } else if self.threads < 2 || plans.len() < PIPELINE_MIN_BLOCKS {
            read_sequential(stream, column_offset, &plans, header.encoding, &mut out)?;
        } else {
            debug!(
                "Reading {} blocks with {} reader threads",
                plans.len(),
                self.threads - 1
            );
            read_pipelined(
                stream,
                column_offset,
                &plans,
                header.encoding,
                self.threads - 1,
                self.batch_blocks,
                &mut out,
            )?;
        }
        Ok(out)
    }
}

/// Resolve the blocks covering `start_row..start_row + row_count` from the
/// index. Only the index entries of those blocks and their predecessor are
/// read.
fn plan_blocks<R: Read + Seek>(
    stream: &mut R,
    column_offset: u64,
    header: &ColumnHeader,
    start_row: u64,
    row_count: u64,
    total_length: u64,
) -> Result<Vec<BlockPlan>, BlockcolError> {
    let stream_len = stream.seek(SeekFrom::End(0))?;
    let column_len = stream_len.checked_sub(column_offset).ok_or_else(|| {
        BlockcolError::FormatError(format!(
            "column offset {column_offset} beyond the stream end {stream_len}"
        ))
    })?;

    let block_size = header.block_size as u64;
    let nr_of_blocks = total_length.div_ceil(block_size);
    let start_block = start_row / block_size;
    let end_block = (start_row + row_count - 1) / block_size;
    let entry_size = if header.compressed {
        size_of::<StringIndexEntry>() as u64
    } else {
        size_of::<u64>() as u64
    };
    let data_start = nr_of_blocks
        .checked_mul(entry_size)
        .and_then(|index_len| index_len.checked_add(COLUMN_HEADER_SIZE))
        .filter(|data_start| *data_start <= column_len);
    let Some(data_start) = data_start else {
        return Err(BlockcolError::FormatError(format!(
            "index of {nr_of_blocks} blocks runs past the stream end"
        )));
    };

    let first_entry = start_block.saturating_sub(1);
    let nr_of_entries = (end_block - first_entry + 1) as usize;
    let position = column_offset + COLUMN_HEADER_SIZE + first_entry * entry_size;
    let entries: Vec<StringIndexEntry> = if header.compressed {
        read_index(stream, position, nr_of_entries)?
    } else {
        read_index::<_, u64>(stream, position, nr_of_entries)?
            .into_iter()
            .map(|end_offset| StringIndexEntry {
                end_offset,
                ..StringIndexEntry::default()
            })
            .collect()
    };

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

    let last_row = start_row + row_count - 1;
    Ok((start_block..=end_block)
        .zip(extents)
        .zip(entries)
        .map(|((block_nr, extent), entry)| {
            let block_start = block_nr * block_size;
            let nr_of_elements = block_size.min(total_length - block_start) as usize;
            BlockPlan {
                extent,
                nr_of_elements,
                first: start_row.saturating_sub(block_start) as usize,
                last: (last_row - block_start).min(nr_of_elements as u64 - 1) as usize,
                entry: *entry,
            }
        })
        .collect())
}

/// Decode the elements a plan wants from an uncompressed block.
pub(super) fn decode_raw_block(
    plan: &BlockPlan,
    raw: &[u8],
    meta: &mut Vec<u32>,
    encoding: StringEncoding,
    out: &mut Vec<Option<String>>,
) -> Result<(), BlockcolError> {
    let n = plan.nr_of_elements;
    let meta_len = 4 * (n + na_words(n));
    if raw.len() < meta_len {
        return Err(BlockcolError::FormatError(format!(
            "block of {} bytes is smaller than its {meta_len} bytes of metadata",
            raw.len()
        )));
    }
    let (meta_bytes, chars) = raw.split_at(meta_len);
    meta.clear();
    meta.extend(meta_bytes.chunks_exact(4).map(pod_read_unaligned::<u32>));

    let decoder = BlockDecoder::new(meta, n, chars, encoding)?;
    if decoder.char_len() != chars.len() {
        return Err(BlockcolError::FormatError(format!(
            "size table declares {} character bytes, block holds {}",
            decoder.char_len(),
            chars.len()
        )));
    }
    decoder.decode_into(plan.first, plan.last, out)
}

pub(super) fn read_sequential<R: Read + Seek>(
    stream: &mut R,
    column_offset: u64,
    plans: &[BlockPlan],
    encoding: StringEncoding,
    out: &mut Vec<Option<String>>,
) -> Result<(), BlockcolError> {
    let mut raw = Vec::new();
    let mut meta = Vec::new();
    if let Some(plan) = plans.first() {
        stream.seek(SeekFrom::Start(column_offset + plan.extent.start))?;
    }
    for plan in plans {
        raw.resize(plan.extent.len(), 0);
        stream.read_exact(&mut raw)?;
        decode_raw_block(plan, &raw, &mut meta, encoding, out)?;
    }
    Ok(())
}

fn read_compressed<R: Read + Seek>(
    stream: &mut R,
    column_offset: u64,
    plans: &[BlockPlan],
    encoding: StringEncoding,
    out: &mut Vec<Option<String>>,
) -> Result<(), BlockcolError> {
    let mut decompressor = Decompressor::new();
    let mut raw = Vec::new();
    let mut meta = Vec::new();
    let mut chars = Vec::new();
    if let Some(plan) = plans.first() {
        stream.seek(SeekFrom::Start(column_offset + plan.extent.start))?;
    }

    for plan in plans {
        raw.resize(plan.extent.len(), 0);
        stream.read_exact(&mut raw)?;

        let n = plan.nr_of_elements;
        let na_len = 4 * na_words(n);
        let size_table_len = usize::try_from(plan.entry.size_table_len)
            .ok()
            .filter(|len| len + na_len <= raw.len())
            .ok_or_else(|| {
                BlockcolError::FormatError(format!(
                    "size table length {} does not fit a block of {} bytes",
                    plan.entry.size_table_len,
                    raw.len()
                ))
            })?;
        let (size_frame, rest) = raw.split_at(size_table_len);
        let (na_bytes, char_frame) = rest.split_at(na_len);

        validate_frame_len(plan.entry.algo_int, size_frame, 4 * n)?;
        try_resize(&mut meta, n + na_words(n), 0u32)?;
        decompressor.decompress(plan.entry.algo_int, cast_slice_mut(&mut meta[..n]), size_frame)?;
        for (word, bytes) in meta[n..].iter_mut().zip(na_bytes.chunks_exact(4)) {
            *word = pod_read_unaligned(bytes);
        }
        validate_sizes(&meta[..n])?;

        // The size table may be stored raw, so its total is checked against
        // the character frame before allocating.
        let char_len = meta[n - 1] as usize;
        validate_frame_len(plan.entry.algo_char, char_frame, char_len)?;
        try_resize(&mut chars, char_len, 0u8)?;
        decompressor.decompress(plan.entry.algo_char, &mut chars, char_frame)?;

        BlockDecoder::new(&meta, n, &chars, encoding)?.decode_into(plan.first, plan.last, out)?;
    }
    Ok(())
}
