use std::path::Path;

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::block::{LinesBlock, DEFAULT_SUB_BLOCK};
use crate::errors::ScanResult;
use crate::matcher::WildcardMatch;
use crate::metrics::ScanMetrics;
use crate::reader::{LineReader, ScopedOpen};
use crate::ring::SwapRing;
use crate::strategy::{fill_block, filter_block, join_worker};

struct QueueState {
    ring: SwapRing<LinesBlock>,
    stop: bool,
}

/// Mutex + condition-variable strategy over a ring of blocks held by value.
///
/// Hand-off in both directions is a swap with the slot's resident block, so
/// the ring doubles as the free list and no block contents are ever copied.
/// The mutex acquire/release pairs give the usual release/acquire ordering,
/// which is what makes the producer's writes to a block visible to the
/// consumer that swaps it out.
pub struct CondVarScan {
    queue: Mutex<QueueState>,
    non_empty: Condvar,
    non_full: Condvar,
    /// One private block per thread (producer first), redistributed each run.
    carries: Vec<LinesBlock>,
    metrics: ScanMetrics,
}

impl CondVarScan {
    pub fn new(queue_size: usize, consumers: usize, max_lines: usize) -> Self {
        assert!(queue_size > 0);
        assert!(consumers > 0);

        let residents = (0..queue_size)
            .map(|_| LinesBlock::new(max_lines, DEFAULT_SUB_BLOCK, false))
            .collect();
        let carries = (0..consumers + 1)
            .map(|_| LinesBlock::new(max_lines, DEFAULT_SUB_BLOCK, false))
            .collect();

        Self {
            queue: Mutex::new(QueueState {
                ring: SwapRing::new(residents),
                stop: false,
            }),
            non_empty: Condvar::new(),
            non_full: Condvar::new(),
            carries,
            metrics: ScanMetrics::new(),
        }
    }

    pub fn metrics(&self) -> &ScanMetrics {
        &self.metrics
    }

    fn init(&mut self, needs_buffer: bool) {
        let state = self.queue.get_mut();
        state.stop = false;
        state.ring.reset();
        state.ring.apply(|block| {
            block.clear();
            if needs_buffer {
                block.ensure_buffer();
            }
        });
        for carry in &mut self.carries {
            carry.clear();
            if needs_buffer {
                carry.ensure_buffer();
            }
        }
    }

    pub fn execute<R: LineReader, M: WildcardMatch>(
        &mut self,
        reader: &mut R,
        path: &Path,
        matcher: &M,
        pattern: &str,
    ) -> ScanResult<usize> {
        debug!(path = %path.display(), pattern, "condvar scan");

        self.init(reader.needs_buffer());
        let mut reader = ScopedOpen::new(reader, path)?;

        let mut carries = std::mem::take(&mut self.carries);
        let mut producer_carry = carries.pop().expect("one carry per thread");

        let queue = &self.queue;
        let non_empty = &self.non_empty;
        let non_full = &self.non_full;
        let metrics = &self.metrics;

        let (total, produced) = std::thread::scope(|s| {
            let handles: Vec<_> = carries
                .drain(..)
                .map(|mut carry| {
                    s.spawn(move || {
                        let count = consume(queue, non_empty, non_full, matcher, pattern, &mut carry);
                        (count, carry)
                    })
                })
                .collect();

            let produced = produce(queue, non_empty, non_full, metrics, &mut *reader, &mut producer_carry);

            // stop is broadcast under the queue lock so it orders after the
            // last push; consumers drain the ring before honoring it
            {
                let mut state = queue.lock();
                state.stop = true;
                non_empty.notify_all();
            }

            let mut total = 0;
            for handle in handles {
                let (count, carry) = join_worker(handle);
                carries.push(carry);
                total += count;
            }
            (total, produced)
        });

        carries.push(producer_carry);
        self.carries = carries;

        produced?;
        self.metrics.record_matches(total);
        Ok(total)
    }
}

fn produce<R: LineReader>(
    queue: &Mutex<QueueState>,
    non_empty: &Condvar,
    non_full: &Condvar,
    metrics: &ScanMetrics,
    reader: &mut R,
    carry: &mut LinesBlock,
) -> ScanResult<()> {
    loop {
        fill_block(reader, carry)?;
        if carry.lines().is_empty() {
            return Ok(());
        }
        metrics.record_block(carry.lines().len());

        let mut state = queue.lock();
        while state.ring.is_full() {
            non_full.wait(&mut state);
        }
        state.ring.push_swap(carry);
        non_empty.notify_one();
    }
}

fn consume<M: WildcardMatch>(
    queue: &Mutex<QueueState>,
    non_empty: &Condvar,
    non_full: &Condvar,
    matcher: &M,
    pattern: &str,
    carry: &mut LinesBlock,
) -> usize {
    let mut counter = 0;
    loop {
        {
            let mut state = queue.lock();
            loop {
                if !state.ring.is_empty() {
                    break;
                }
                if state.stop {
                    return counter;
                }
                non_empty.wait(&mut state);
            }

            state.ring.pop_swap(carry);
            // the producer only ever waits on a full ring, so wake it
            // exactly when this pop left the full state
            if state.ring.len() + 1 == state.ring.capacity() {
                non_full.notify_one();
            }
        }

        counter += filter_block(matcher, pattern, carry);
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
            let name = if i % 3 == 0 { "apple" } else { "cherry" };
            writeln!(file, "{name}-{i}").unwrap();
        }
        file
    }

    #[test]
    fn test_counts_match_sequential() {
        let file = fixture(500);
        for consumers in [1, 2, 4] {
            let mut scan = CondVarScan::new(4, consumers, 16);
            let count = scan
                .execute(&mut BufferedReader::new(), file.path(), &BacktrackMatch, "apple*")
                .unwrap();
            assert_eq!(count, 167, "consumers={consumers}");
        }
    }

    #[test]
    fn test_mmap_reader_counts_match() {
        let file = fixture(500);
        let mut scan = CondVarScan::new(4, 2, 16);
        let count = scan
            .execute(&mut MmapReader::new(), file.path(), &BacktrackMatch, "apple*")
            .unwrap();
        assert_eq!(count, 167);
    }

    #[test]
    fn test_empty_file_terminates() {
        let file = NamedTempFile::new().unwrap();
        let mut scan = CondVarScan::new(2, 4, 8);
        let count = scan
            .execute(&mut BufferedReader::new(), file.path(), &BacktrackMatch, "*")
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_rerun_is_idempotent() {
        let file = fixture(200);
        let mut scan = CondVarScan::new(2, 2, 8);
        let mut reader = BufferedReader::new();
        let first = scan
            .execute(&mut reader, file.path(), &BacktrackMatch, "apple*")
            .unwrap();
        let second = scan
            .execute(&mut reader, file.path(), &BacktrackMatch, "apple*")
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_switching_reader_kind_between_runs() {
        let file = fixture(120);
        let mut scan = CondVarScan::new(2, 2, 8);
        let mmap_count = scan
            .execute(&mut MmapReader::new(), file.path(), &BacktrackMatch, "apple*")
            .unwrap();
        let buffered_count = scan
            .execute(&mut BufferedReader::new(), file.path(), &BacktrackMatch, "apple*")
            .unwrap();
        assert_eq!(mmap_count, buffered_count);
    }
}
