use std::path::Path;

use parking_lot::Mutex;

use crate::block::{BlockPool, DEFAULT_SUB_BLOCK};
use crate::errors::ScanResult;
use crate::matcher::WildcardMatch;
use crate::metrics::ScanMetrics;
use crate::reader::{LineReader, ScopedOpen};
use crate::ring::SwapRing;
use crate::strategy::{fill_block, filter_block, join_worker, Slot};
use crate::sync::Semaphore;

/// Counting-semaphore strategy: `sem_empty` gates the producer on free
/// slots, `sem_full` gates consumers on queued blocks, and a short mutex
/// section swaps blocks in and out of the ring.
///
/// End of input is a [`Slot::Terminal`] pushed once as the last entry.
/// Consumers peek it but never pop it, and re-release `sem_full` on the way
/// out so the next consumer observes it too — exactly one terminal token
/// stays visible until every consumer has stopped.
pub struct SemaphoreScan {
    queue: Mutex<SwapRing<Slot>>,
    sem_empty: Semaphore,
    sem_full: Semaphore,
    pool: BlockPool,
    consumers: usize,
    metrics: ScanMetrics,
}

impl SemaphoreScan {
    pub fn new(queue_size: usize, consumers: usize, max_lines: usize) -> Self {
        assert!(queue_size > 0);
        assert!(consumers > 0);

        // one block per ring slot plus one carry per thread
        let mut pool = BlockPool::new(queue_size + consumers + 1, max_lines, DEFAULT_SUB_BLOCK);
        let residents = (0..queue_size)
            .map(|_| Slot::Data(pool.alloc().expect("pool covers ring residents")))
            .collect();

        Self {
            queue: Mutex::new(SwapRing::new(residents)),
            sem_empty: Semaphore::new(queue_size),
            sem_full: Semaphore::new(0),
            pool,
            consumers,
            metrics: ScanMetrics::new(),
        }
    }

    pub fn metrics(&self) -> &ScanMetrics {
        &self.metrics
    }

    fn init(&mut self, needs_buffer: bool) {
        let Self { queue, pool, .. } = self;
        let ring = queue.get_mut();
        ring.reset();
        // the previous run leaves its terminal token in one slot; swap a
        // pooled block back in so every resident is a data block again
        ring.apply(|slot| {
            if slot.is_terminal() {
                *slot = Slot::Data(pool.alloc().expect("pool covers terminal replacement"));
            }
            let block = slot.data_mut();
            block.clear();
            if needs_buffer {
                block.ensure_buffer();
            }
        });
        pool.reset(needs_buffer);

        self.sem_empty.reset(ring.capacity());
        self.sem_full.reset(0);
    }

    pub fn execute<R: LineReader, M: WildcardMatch>(
        &mut self,
        reader: &mut R,
        path: &Path,
        matcher: &M,
        pattern: &str,
    ) -> ScanResult<usize> {
        self.init(reader.needs_buffer());
        let mut reader = ScopedOpen::new(reader, path)?;

        let mut carries: Vec<Slot> = (0..self.consumers + 1)
            .map(|_| Slot::Data(self.pool.alloc().expect("pool covers thread carries")))
            .collect();
        let mut producer_carry = carries.pop().expect("one carry per thread");

        let queue = &self.queue;
        let sem_empty = &self.sem_empty;
        let sem_full = &self.sem_full;
        let metrics = &self.metrics;

        let (total, produced, extra) = std::thread::scope(|s| {
            let handles: Vec<_> = carries
                .drain(..)
                .map(|mut carry| {
                    s.spawn(move || {
                        let count =
                            consume(queue, sem_empty, sem_full, matcher, pattern, &mut carry);
                        (count, carry)
                    })
                })
                .collect();

            let (produced, extra) =
                produce(queue, sem_empty, sem_full, metrics, &mut *reader, &mut producer_carry);

            let mut total = 0;
            for handle in handles {
                let (count, carry) = join_worker(handle);
                carries.push(carry);
                total += count;
            }
            (total, produced, extra)
        });

        // everything flows back to the pool for the next run
        carries.push(producer_carry);
        carries.push(extra);
        for slot in carries {
            if let Some(block) = slot.into_data() {
                self.pool.free(block);
            }
        }

        produced?;
        self.metrics.record_matches(total);
        Ok(total)
    }
}

/// Returns the producer's I/O result plus the free block swapped out when
/// the terminal token went in.
fn produce<R: LineReader>(
    queue: &Mutex<SwapRing<Slot>>,
    sem_empty: &Semaphore,
    sem_full: &Semaphore,
    metrics: &ScanMetrics,
    reader: &mut R,
    carry: &mut Slot,
) -> (ScanResult<()>, Slot) {
    let mut result = Ok(());
    loop {
        let block = carry.data_mut();
        if let Err(e) = fill_block(reader, block) {
            result = Err(e);
            break;
        }
        if block.lines().is_empty() {
            break;
        }
        metrics.record_block(block.lines().len());

        sem_empty.acquire();
        queue.lock().push_swap(carry);
        sem_full.release();
    }

    // the terminal token is always the last entry in the queue
    let mut terminal = Slot::Terminal;
    sem_empty.acquire();
    queue.lock().push_swap(&mut terminal);
    sem_full.release();

    (result, terminal)
}

fn consume<M: WildcardMatch>(
    queue: &Mutex<SwapRing<Slot>>,
    sem_empty: &Semaphore,
    sem_full: &Semaphore,
    matcher: &M,
    pattern: &str,
    carry: &mut Slot,
) -> usize {
    let mut counter = 0;
    loop {
        sem_full.acquire();

        let last = {
            let mut ring = queue.lock();
            if ring.front().is_terminal() {
                // leave the terminal in the queue or the other consumers
                // would never stop
                true
            } else {
                ring.pop_swap(carry);
                false
            }
        };

        sem_empty.release();

        if last {
            // wake the next consumer so it can observe the terminal too
            sem_full.release();
            return counter;
        }

        counter += filter_block(matcher, pattern, carry.data());
    }
}
