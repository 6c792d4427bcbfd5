use std::io::{Seek, SeekFrom, Write};
use std::ops::Range;

use bytemuck::{Zeroable, cast_slice};
use log::debug;

use crate::compress::{Payload, StreamCompressor};
use crate::conf::CodecConfig;
use crate::core::BlockcolError;
use crate::io::column::header::{COLUMN_HEADER_SIZE, ColumnHeader, StringIndexEntry};
use crate::io::column::meta::{calculate_sizes, na_words, serialize_block};
use crate::io::column::ordered::OrderedCommit;
use crate::io::column::{StringEncoding, grow_buffer};
use crate::parallel::run_workers;

/// Compressors for the two parts of a block.
struct BlockCompressors {
    sizes: StreamCompressor,
    chars: StreamCompressor,
}

/// Per-worker scratch space, reused across jobs.
#[derive(Default)]
struct WorkerBuffers {
    meta: Vec<u32>,
    block: Vec<u8>,
    batch: Vec<u8>,
}

/// Result of serializing one block into the batch buffer.
#[derive(Clone, Copy, Debug)]
struct BlockRecord {
    size: u64,
    algo_int: u16,
    algo_char: u16,
    size_table_len: i32,
}

/// Output stream plus the bookkeeping updated under the commit order.
struct CommitTarget<'a, W> {
    stream: &'a mut W,
    column_size: u64,
    index: Vec<StringIndexEntry>,
}

/// Writes string vectors as block-indexed columns.
///
/// Blocks are grouped into jobs of consecutive blocks. Workers serialize
/// jobs concurrently and write them to the stream in job order, so the
/// output does not depend on the thread count.
#[derive(Clone, Debug)]
pub struct StringColumnWriter {
    threads: usize,
    block_size: u32,
    batch_blocks: usize,
}

impl StringColumnWriter {
    pub fn new(config: &CodecConfig) -> Self {
        Self {
            threads: config.threads(),
            block_size: config.string_block_size.max(1),
            batch_blocks: config.write_batch_blocks.max(1),
        }
    }

    /// Append `strings` as a column at the current stream position. On
    /// success the stream is positioned right after the column.
    pub fn write<W, S>(
        &self,
        stream: &mut W,
        strings: &[Option<S>],
        compression: u32,
        encoding: StringEncoding,
    ) -> Result<(), BlockcolError>
    where
        W: Write + Seek + Send,
        S: AsRef<str> + Sync,
    {
        if strings.is_empty() {
            return Err(BlockcolError::EmptyVectorError);
        }
        if compression > 100 {
            return Err(BlockcolError::InvalidInput(format!(
                "compression level {compression} is outside 0..=100"
            )));
        }

        let block_size = self.block_size as usize;
        let nr_of_blocks = strings.len().div_ceil(block_size);
        let nr_of_threads = self.threads.min(nr_of_blocks).max(1);
        let blocks_per_job = nr_of_blocks
            .div_ceil(nr_of_threads)
            .min(self.batch_blocks);
        let nr_of_jobs = nr_of_blocks.div_ceil(blocks_per_job);

        let compressors = StreamCompressor::for_level(compression, Payload::Integers)
            .zip(StreamCompressor::for_level(compression, Payload::Bytes))
            .map(|(sizes, chars)| BlockCompressors { sizes, chars });
        let header = ColumnHeader {
            compressed: compressors.is_some(),
            encoding,
            block_size: self.block_size,
        };
        let entry_size = if header.compressed {
            size_of::<StringIndexEntry>()
        } else {
            size_of::<u64>()
        };
        debug!(
            "Writing {} strings in {} blocks, {} jobs on {} threads, compressed: {}",
            strings.len(),
            nr_of_blocks,
            nr_of_jobs,
            nr_of_threads,
            header.compressed
        );

        let column_start = stream.stream_position()?;
        stream.write_all(&header.to_bytes())?;
        stream.write_all(&vec![0u8; nr_of_blocks * entry_size])?;

        let commit = OrderedCommit::new(CommitTarget {
            stream: &mut *stream,
            column_size: COLUMN_HEADER_SIZE + (nr_of_blocks * entry_size) as u64,
            index: vec![StringIndexEntry::zeroed(); nr_of_blocks],
        });

        run_workers(nr_of_threads, |worker, nr_of_workers| {
            let _guard = commit.abort_on_unwind();
            let mut buffers = WorkerBuffers::default();
            for job_nr in (worker..nr_of_jobs).step_by(nr_of_workers) {
                let start_block = job_nr * blocks_per_job;
                let blocks = start_block..nr_of_blocks.min(start_block + blocks_per_job);
                let (records, batch_len) = match self.serialize_job(
                    strings,
                    encoding,
                    blocks,
                    compressors.as_ref(),
                    &mut buffers,
                ) {
                    Ok(serialized) => serialized,
                    Err(e) => {
                        commit.abort();
                        return Err(e);
                    }
                };

                let batch = &buffers.batch[..batch_len];
                let committed = commit.commit(job_nr, |target| {
                    target.stream.write_all(batch)?;
                    for (i, record) in records.iter().enumerate() {
                        target.column_size += record.size;
                        target.index[start_block + i] = StringIndexEntry {
                            end_offset: target.column_size,
                            algo_int: record.algo_int,
                            algo_char: record.algo_char,
                            size_table_len: record.size_table_len,
                        };
                    }
                    Ok(())
                })?;
                if committed.is_none() {
                    return Ok(());
                }
            }
            Ok(())
        })?;

        let CommitTarget {
            column_size, index, ..
        } = commit.into_inner();
        stream.seek(SeekFrom::Start(column_start + COLUMN_HEADER_SIZE))?;
        if header.compressed {
            stream.write_all(cast_slice(&index))?;
        } else {
            let offsets: Vec<u64> = index.iter().map(|e| e.end_offset).collect();
            stream.write_all(cast_slice(&offsets))?;
        }
        stream.seek(SeekFrom::Start(column_start + column_size))?;
        Ok(())
    }

    /// Serialize `blocks` into `buffers.batch`. Returns one record per block
    /// and the number of batch bytes used.
    fn serialize_job<S: AsRef<str>>(
        &self,
        strings: &[Option<S>],
        encoding: StringEncoding,
        blocks: Range<usize>,
        compressors: Option<&BlockCompressors>,
        buffers: &mut WorkerBuffers,
    ) -> Result<(Vec<BlockRecord>, usize), BlockcolError> {
        let block_size = self.block_size as usize;
        let stride = block_size + na_words(block_size);
        let WorkerBuffers { meta, block, batch } = buffers;
        meta.resize(stride * blocks.len(), 0);

        // Size every block first, so the buffers grow at most once per job.
        let mut char_sizes = Vec::with_capacity(blocks.len());
        let mut max_block = 0usize;
        let mut batch_bound = 0usize;
        for (i, block_nr) in blocks.clone().enumerate() {
            let elements = block_elements(strings, block_nr, block_size);
            let n = elements.len();
            let block_meta = &mut meta[i * stride..i * stride + n + na_words(n)];
            let char_size = calculate_sizes(elements, encoding, block_meta)? as usize;

            max_block = max_block.max(char_size);
            batch_bound += match compressors {
                None => 4 * (n + na_words(n)) + char_size,
                Some(c) => {
                    c.sizes.compress_buffer_size(4 * n)
                        + 4 * na_words(n)
                        + c.chars.compress_buffer_size(char_size)
                }
            };
            char_sizes.push(char_size);
        }
        grow_buffer(block, max_block);
        grow_buffer(batch, batch_bound);

        let mut records = Vec::with_capacity(blocks.len());
        let mut pos = 0usize;
        for (i, block_nr) in blocks.enumerate() {
            let elements = block_elements(strings, block_nr, block_size);
            let n = elements.len();
            let block_meta = &meta[i * stride..i * stride + n + na_words(n)];
            let chars = &mut block[..char_sizes[i]];
            serialize_block(elements, encoding, &block_meta[..n], chars);

            let record = match compressors {
                None => {
                    let meta_bytes: &[u8] = cast_slice(block_meta);
                    batch[pos..pos + meta_bytes.len()].copy_from_slice(meta_bytes);
                    batch[pos + meta_bytes.len()..pos + meta_bytes.len() + chars.len()]
                        .copy_from_slice(chars);
                    BlockRecord {
                        size: (meta_bytes.len() + chars.len()) as u64,
                        algo_int: 0,
                        algo_char: 0,
                        size_table_len: (4 * n) as i32,
                    }
                }
                Some(c) => {
                    let (size_table_len, algo_int) =
                        c.sizes
                            .compress(cast_slice(&block_meta[..n]), &mut batch[pos..], block_nr)?;
                    let na_bytes: &[u8] = cast_slice(&block_meta[n..]);
                    let na_start = pos + size_table_len;
                    batch[na_start..na_start + na_bytes.len()].copy_from_slice(na_bytes);
                    let (char_len, algo_char) = c.chars.compress(
                        chars,
                        &mut batch[na_start + na_bytes.len()..],
                        block_nr,
                    )?;
                    BlockRecord {
                        size: (size_table_len + na_bytes.len() + char_len) as u64,
                        algo_int: algo_int.tag(),
                        algo_char: algo_char.tag(),
                        size_table_len: size_table_len as i32,
                    }
                }
            };
            pos += record.size as usize;
            records.push(record);
        }
        Ok((records, pos))
    }
}

fn block_elements<S>(strings: &[Option<S>], block_nr: usize, block_size: usize) -> &[Option<S>] {
    let start = block_nr * block_size;
    &strings[start..strings.len().min(start + block_size)]
}
