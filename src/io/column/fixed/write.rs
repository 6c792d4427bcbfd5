use std::io::{Seek, SeekFrom, Write};

use bytemuck::{Pod, Zeroable, cast_slice};
use log::debug;

use crate::compress::{Payload, StreamCompressor};
use crate::conf::CodecConfig;
use crate::core::BlockcolError;
use crate::io::column::header::{COLUMN_HEADER_SIZE, ColumnHeader, FixedIndexEntry};
use crate::io::column::ordered::OrderedCommit;
use crate::io::column::{StringEncoding, grow_buffer};
use crate::parallel::run_workers;

struct CommitTarget<'a, W> {
    stream: &'a mut W,
    column_size: u64,
    index: Vec<FixedIndexEntry>,
}

/// Writes slices of plain fixed-width values (integers, floats) as columns.
/// Uncompressed columns hold the raw values right after the header,
/// compressed ones add a block index like string columns.
#[derive(Clone, Debug)]
pub struct FixedColumnWriter {
    threads: usize,
    block_size: u32,
    batch_blocks: usize,
}

impl FixedColumnWriter {
    pub fn new(config: &CodecConfig) -> Self {
        Self {
            threads: config.threads(),
            block_size: config.fixed_block_size.max(1),
            batch_blocks: config.write_batch_blocks.max(1),
        }
    }

    pub fn write<W, T>(&self, stream: &mut W, values: &[T], compression: u32) -> Result<(), BlockcolError>
    where
        W: Write + Seek + Send,
        T: Pod + Sync,
    {
        if values.is_empty() {
            return Err(BlockcolError::EmptyVectorError);
        }
        if size_of::<T>() == 0 {
            return Err(BlockcolError::InvalidInput(
                "zero-sized values cannot be stored".into(),
            ));
        }
        if compression > 100 {
            return Err(BlockcolError::InvalidInput(format!(
                "compression level {compression} is outside 0..=100"
            )));
        }

        let payload = if size_of::<T>() % 4 == 0 {
            Payload::Integers
        } else {
            Payload::Bytes
        };
        let compressor = StreamCompressor::for_level(compression, payload);
        let header = ColumnHeader {
            compressed: compressor.is_some(),
            encoding: StringEncoding::Native,
            block_size: self.block_size,
        };
        let column_start = stream.stream_position()?;
        stream.write_all(&header.to_bytes())?;

        let Some(compressor) = compressor else {
            stream.write_all(cast_slice(values))?;
            return Ok(());
        };

        let block_size = self.block_size as usize;
        let nr_of_blocks = values.len().div_ceil(block_size);
        let nr_of_threads = self.threads.min(nr_of_blocks).max(1);
        let blocks_per_job = nr_of_blocks.div_ceil(nr_of_threads).min(self.batch_blocks);
        let nr_of_jobs = nr_of_blocks.div_ceil(blocks_per_job);
        let entry_size = size_of::<FixedIndexEntry>();
        debug!(
            "Writing {} fixed-width values in {} blocks on {} threads",
            values.len(),
            nr_of_blocks,
            nr_of_threads
        );

        stream.write_all(&vec![0u8; nr_of_blocks * entry_size])?;
        let commit = OrderedCommit::new(CommitTarget {
            stream: &mut *stream,
            column_size: COLUMN_HEADER_SIZE + (nr_of_blocks * entry_size) as u64,
            index: vec![FixedIndexEntry::zeroed(); nr_of_blocks],
        });

        run_workers(nr_of_threads, |worker, nr_of_workers| {
            let _guard = commit.abort_on_unwind();
            let mut batch = Vec::new();
            for job_nr in (worker..nr_of_jobs).step_by(nr_of_workers) {
                let start_block = job_nr * blocks_per_job;
                let end_block = nr_of_blocks.min(start_block + blocks_per_job);
                let block_bytes = |block_nr: usize| {
                    let start = block_nr * block_size;
                    cast_slice::<T, u8>(&values[start..values.len().min(start + block_size)])
                };

                let bound: usize = (start_block..end_block)
                    .map(|b| compressor.compress_buffer_size(block_bytes(b).len()))
                    .sum();
                grow_buffer(&mut batch, bound);

                let mut frames = Vec::with_capacity(end_block - start_block);
                let mut pos = 0;
                for block_nr in start_block..end_block {
                    match compressor.compress(block_bytes(block_nr), &mut batch[pos..], block_nr) {
                        Ok((len, algo)) => {
                            frames.push((len as u64, algo.tag()));
                            pos += len;
                        }
                        Err(e) => {
                            commit.abort();
                            return Err(e);
                        }
                    }
                }

                let frame_bytes = &batch[..pos];
                let committed = commit.commit(job_nr, |target| {
                    target.stream.write_all(frame_bytes)?;
                    for (i, (len, algo)) in frames.iter().enumerate() {
                        target.column_size += len;
                        target.index[start_block + i] = FixedIndexEntry {
                            end_offset: target.column_size,
                            algo: *algo,
                            reserved: [0; 3],
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
        stream.write_all(cast_slice(&index))?;
        stream.seek(SeekFrom::Start(column_start + column_size))?;
        Ok(())
    }
}
