use std::path::Path;

use parking_lot::{Condvar, Mutex};

use crate::block::{LinesBlock, DEFAULT_SUB_BLOCK};
use crate::errors::ScanResult;
use crate::matcher::WildcardMatch;
use crate::metrics::ScanMetrics;
use crate::reader::{LineReader, ScopedOpen};
use crate::ring::{Cursors, DisruptorRing};
use crate::strategy::{fill_block, filter_block, join_worker};

struct SyncState {
    cursors: Cursors,
    stop: bool,
}

/// Condvar strategy over the two-phase disruptor ring.
///
/// Blocks never leave the ring: the producer fills a claimed slot in place
/// and consumers filter claimed slots in place, both outside the lock. Only
/// the cursor bookkeeping runs under the mutex, so the slow work (reading,
/// matching) never serializes on it.
pub struct DisruptorScan {
    ring: DisruptorRing<LinesBlock>,
    sync: Mutex<SyncState>,
    non_empty: Condvar,
    non_full: Condvar,
    consumers: usize,
    metrics: ScanMetrics,
}

impl DisruptorScan {
    pub fn new(queue_size: usize, consumers: usize, max_lines: usize) -> Self {
        assert!(queue_size > 1);
        assert!(consumers > 0);

        let slots = (0..queue_size)
            .map(|_| LinesBlock::new(max_lines, DEFAULT_SUB_BLOCK, false))
            .collect();

        Self {
            ring: DisruptorRing::new(slots),
            sync: Mutex::new(SyncState {
                cursors: Cursors::new(queue_size, consumers),
                stop: false,
            }),
            non_empty: Condvar::new(),
            non_full: Condvar::new(),
            consumers,
            metrics: ScanMetrics::new(),
        }
    }

    pub fn metrics(&self) -> &ScanMetrics {
        &self.metrics
    }

    fn init(&mut self, needs_buffer: bool) {
        let state = self.sync.get_mut();
        state.stop = false;
        state.cursors.reset();
        self.ring.apply(|block| {
            block.clear();
            if needs_buffer {
                block.ensure_buffer();
            }
        });
    }

    pub fn execute<R: LineReader, M: WildcardMatch>(
        &mut self,
        reader: &mut R,
        path: &Path,
        matcher: &M,
        pattern: &str,
    ) -> ScanResult<usize> {
        let needs_buffer = reader.needs_buffer();
        self.init(needs_buffer);
        let mut reader = ScopedOpen::new(reader, path)?;

        let ring = &self.ring;
        let sync = &self.sync;
        let non_empty = &self.non_empty;
        let non_full = &self.non_full;
        let metrics = &self.metrics;

        let (total, produced) = std::thread::scope(|s| {
            let handles: Vec<_> = (0..self.consumers)
                .map(|id| {
                    s.spawn(move || {
                        consume(id, ring, sync, non_empty, non_full, matcher, pattern, needs_buffer)
                    })
                })
                .collect();

            let produced = produce(ring, sync, non_empty, non_full, metrics, &mut *reader);

            {
                let mut state = sync.lock();
                state.stop = true;
                non_empty.notify_all();
            }

            let total = handles.into_iter().map(join_worker).sum::<usize>();
            (total, produced)
        });

        produced?;
        self.metrics.record_matches(total);
        Ok(total)
    }
}

fn produce<R: LineReader>(
    ring: &DisruptorRing<LinesBlock>,
    sync: &Mutex<SyncState>,
    non_empty: &Condvar,
    non_full: &Condvar,
    metrics: &ScanMetrics,
    reader: &mut R,
) -> ScanResult<()> {
    loop {
        let idx = {
            let mut state = sync.lock();
            while state.cursors.is_full() {
                non_full.wait(&mut state);
            }
            state.cursors.enqueue_prepare()
        };

        // SAFETY: the write claim on `idx` is exclusive until the commit
        // below, so the slot can be filled without holding the lock.
        let block = unsafe { ring.claimed(idx) };
        fill_block(reader, block)?;
        if block.lines().is_empty() {
            // end of input; the claimed slot is simply never committed
            return Ok(());
        }
        metrics.record_block(block.lines().len());

        let mut state = sync.lock();
        state.cursors.enqueue_commit();
        non_empty.notify_one();
    }
}

#[allow(clippy::too_many_arguments)]
fn consume<M: WildcardMatch>(
    id: usize,
    ring: &DisruptorRing<LinesBlock>,
    sync: &Mutex<SyncState>,
    non_empty: &Condvar,
    non_full: &Condvar,
    matcher: &M,
    pattern: &str,
    needs_buffer: bool,
) -> usize {
    let mut counter = 0;
    loop {
        let idx = {
            let mut state = sync.lock();
            loop {
                if !state.cursors.is_empty() {
                    break;
                }
                if state.stop {
                    return counter;
                }
                non_empty.wait(&mut state);
            }
            state.cursors.dequeue_prepare(id)
        };

        // SAFETY: the read claim on `idx` is exclusive until the commit
        // below; the producer cannot reclaim the slot while it is claimed.
        let block = unsafe { ring.claimed(idx) };
        counter += filter_block(matcher, pattern, &*block);

        let mut state = sync.lock();
        state.cursors.dequeue_commit(id);
        // in buffered mode one slot is effectively reserved by the producer's
        // uncommitted claim, so the producer unblocks at size 1, not 0
        let unblocks_producer = if needs_buffer {
            state.cursors.len() <= 1
        } else {
            state.cursors.is_empty()
        };
        if unblocks_producer {
            non_full.notify_one();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::BacktrackMatch;
    use crate::reader::{BufferedReader, MmapReader};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn fixture(lines: usize) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for i in 0..lines {
            let name = if i % 5 == 0 { "apricot" } else { "banana" };
            writeln!(file, "{name} {i}").unwrap();
        }
        file
    }

    #[test]
    fn test_counts_match_sequential() {
        let file = fixture(400);
        for consumers in [1, 2, 4] {
            let mut scan = DisruptorScan::new(4, consumers, 16);
            let count = scan
                .execute(&mut BufferedReader::new(), file.path(), &BacktrackMatch, "ap*")
                .unwrap();
            assert_eq!(count, 80, "consumers={consumers}");
        }
    }

    #[test]
    fn test_mmap_mode_uses_empty_threshold() {
        let file = fixture(400);
        let mut scan = DisruptorScan::new(4, 2, 16);
        let count = scan
            .execute(&mut MmapReader::new(), file.path(), &BacktrackMatch, "ap*")
            .unwrap();
        assert_eq!(count, 80);
    }

    #[test]
    fn test_empty_file_terminates() {
        let file = NamedTempFile::new().unwrap();
        let mut scan = DisruptorScan::new(2, 4, 8);
        let count = scan
            .execute(&mut BufferedReader::new(), file.path(), &BacktrackMatch, "*")
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_rerun_is_idempotent() {
        let file = fixture(150);
        let mut scan = DisruptorScan::new(4, 3, 8);
        let mut reader = BufferedReader::new();
        let first = scan
            .execute(&mut reader, file.path(), &BacktrackMatch, "ap*")
            .unwrap();
        let second = scan
            .execute(&mut reader, file.path(), &BacktrackMatch, "ap*")
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_tiny_queue_still_completes() {
        let file = fixture(300);
        let mut scan = DisruptorScan::new(2, 4, 4);
        let count = scan
            .execute(&mut BufferedReader::new(), file.path(), &BacktrackMatch, "ap*")
            .unwrap();
        assert_eq!(count, 60);
    }
}
