use std::io::{Read, Seek, SeekFrom};

use crossbeam_channel::bounded;
use parking_lot::Mutex;

use crate::core::BlockcolError;
use crate::io::column::StringEncoding;
use crate::io::column::ordered::OrderedCommit;
use crate::io::column::string::read::{BlockPlan, decode_raw_block, read_sequential};
use crate::parallel::build_pool;

/// Buffers owned by each reader thread. With two, a reader fills the next
/// job while the previous one is still being decoded.
const BUFFERS_PER_READER: usize = 2;

/// Read uncompressed blocks with `readers` background threads while the
/// calling thread decodes them.
///
/// Blocks are grouped into jobs covering one contiguous byte range each.
/// Reader `r` reads jobs `r, r + readers, ...` from the shared stream in job
/// order and hands the filled buffer to the decoder, which consumes jobs
/// strictly in order and returns every buffer to its reader.
pub(super) fn read_pipelined<R: Read + Seek + Send>(
    stream: &mut R,
    column_offset: u64,
    plans: &[BlockPlan],
    encoding: StringEncoding,
    readers: usize,
    batch_blocks: usize,
    out: &mut Vec<Option<String>>,
) -> Result<(), BlockcolError> {
    let blocks_per_job = plans.len().div_ceil(readers.max(1)).min(batch_blocks).max(1);
    let jobs: Vec<&[BlockPlan]> = plans.chunks(blocks_per_job).collect();
    let readers = readers.clamp(1, jobs.len());
    let Some(pool) = build_pool(readers) else {
        return read_sequential(stream, column_offset, plans, encoding, out);
    };

    let commit = OrderedCommit::new(stream);
    let failure: Mutex<Option<BlockcolError>> = Mutex::new(None);

    let completed = pool.in_place_scope(|scope| -> Result<bool, BlockcolError> {
        let mut filled = Vec::with_capacity(readers);
        let mut free = Vec::with_capacity(readers);
        for reader in 0..readers {
            let (filled_tx, filled_rx) = bounded::<(usize, Vec<u8>)>(BUFFERS_PER_READER);
            let (free_tx, free_rx) = bounded::<Vec<u8>>(BUFFERS_PER_READER);
            for _ in 0..BUFFERS_PER_READER {
                let _ = free_tx.send(Vec::new());
            }
            filled.push(filled_rx);
            free.push(free_tx);

            let commit = &commit;
            let failure = &failure;
            let jobs = &jobs;
            scope.spawn(move |_| {
                let _guard = commit.abort_on_unwind();
                for job_nr in (reader..jobs.len()).step_by(readers) {
                    let Ok(mut buffer) = free_rx.recv() else {
                        return;
                    };
                    let job = jobs[job_nr];
                    let start = job[0].extent.start;
                    let end = job[job.len() - 1].extent.end;
                    buffer.resize((end - start) as usize, 0);

                    let read = commit.commit(job_nr, |stream| {
                        stream.seek(SeekFrom::Start(column_offset + start))?;
                        stream.read_exact(&mut buffer)?;
                        Ok(())
                    });
                    match read {
                        Ok(Some(())) => {}
                        Ok(None) => return,
                        Err(e) => {
                            failure.lock().get_or_insert(e);
                            return;
                        }
                    }
                    if filled_tx.send((job_nr, buffer)).is_err() {
                        return;
                    }
                }
            });
        }

        let mut meta = Vec::new();
        for (job_nr, job) in jobs.iter().enumerate() {
            let reader = job_nr % readers;
            let Ok((read_nr, buffer)) = filled[reader].recv() else {
                commit.abort();
                return Ok(false);
            };
            debug_assert_eq!(read_nr, job_nr);

            let base = job[0].extent.start;
            for plan in job.iter() {
                let raw = &buffer[(plan.extent.start - base) as usize..(plan.extent.end - base) as usize];
                if let Err(e) = decode_raw_block(plan, raw, &mut meta, encoding, out) {
                    commit.abort();
                    return Err(e);
                }
            }
            let _ = free[reader].send(buffer);
        }
        Ok(true)
    })?;

    // Readers are joined at this point, so a read error is already recorded.
    if completed {
        Ok(())
    } else {
        Err(failure.into_inner().unwrap_or_else(|| {
            BlockcolError::IoError("column reader stopped early".into())
        }))
    }
}
