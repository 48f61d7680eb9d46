use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crate::block::{BlockPool, LinesBlock, DEFAULT_SUB_BLOCK};
use crate::errors::ScanResult;
use crate::matcher::WildcardMatch;
use crate::metrics::ScanMetrics;
use crate::reader::{LineReader, ScopedOpen};
use crate::ring::SpscRing;
use crate::strategy::{fill_block, filter_block, join_worker};

/// One consumer's slice of the topology: its data ring (producer pushes,
/// consumer pops) and its recycle ring (consumer pushes, producer pops).
/// The recycle ring is the consumer's private pool partition, which is what
/// removes the pool mutex from this design entirely.
struct Lane {
    data: SpscRing<LinesBlock>,
    recycle: SpscRing<LinesBlock>,
}

/// Lock-free fan-out: a dedicated wait-free SPSC ring pair per consumer,
/// no mutex or condvar anywhere on the data path.
///
/// The producer round-robins over the lanes. A lane with no free block in
/// its recycle ring counts as a failed attempt and the producer moves on
/// without blocking; after a run of failures across every lane it yields the
/// CPU once so busy-waiting does not peg a core while all consumers are
/// behind. Because a free block popped from lane `i` always goes back onto
/// lane `i`'s data ring, the data push can never find the ring full.
pub struct SpscFanoutScan {
    lanes: Vec<Lane>,
    stop: AtomicBool,
    pool: BlockPool,
    queue_size: usize,
    metrics: ScanMetrics,
}

impl SpscFanoutScan {
    pub fn new(queue_size: usize, consumers: usize, max_lines: usize) -> Self {
        assert!(queue_size > 0);
        assert!(consumers > 0);

        let lanes = (0..consumers)
            .map(|_| Lane {
                data: SpscRing::new(queue_size),
                recycle: SpscRing::new(queue_size),
            })
            .collect();

        Self {
            lanes,
            stop: AtomicBool::new(false),
            // every lane circulates queue_size blocks
            pool: BlockPool::new(queue_size * consumers, max_lines, DEFAULT_SUB_BLOCK),
            queue_size,
            metrics: ScanMetrics::new(),
        }
    }

    pub fn metrics(&self) -> &ScanMetrics {
        &self.metrics
    }

    fn init(&mut self, needs_buffer: bool) {
        *self.stop.get_mut() = false;

        for lane in &mut self.lanes {
            while let Some(block) = lane.data.pop() {
                self.pool.free(block);
            }
            while let Some(block) = lane.recycle.pop() {
                self.pool.free(block);
            }
        }
        self.pool.reset(needs_buffer);

        for lane in &self.lanes {
            for _ in 0..self.queue_size {
                let block = self.pool.alloc().expect("pool covers lane seeding");
                if lane.recycle.push(block).is_err() {
                    unreachable!("freshly drained recycle ring cannot be full");
                }
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
        self.init(reader.needs_buffer());
        let mut reader = ScopedOpen::new(reader, path)?;

        let lanes = &self.lanes;
        let stop = &self.stop;
        let metrics = &self.metrics;

        let (total, produced, leftover) = std::thread::scope(|s| {
            let handles: Vec<_> = lanes
                .iter()
                .map(|lane| s.spawn(move || consume(lane, stop, matcher, pattern)))
                .collect();

            let (produced, leftover) = produce(lanes, metrics, &mut *reader);
            stop.store(true, Ordering::Release);

            let total = handles.into_iter().map(join_worker).sum::<usize>();
            (total, produced, leftover)
        });

        if let Some(block) = leftover {
            self.pool.free(block);
        }

        produced?;
        self.metrics.record_matches(total);
        Ok(total)
    }
}

/// Returns the producer's I/O result plus the block it was holding when the
/// input ran out (it goes back to the pool, not onto a recycle ring, since
/// the producer is not the recycle rings' pushing side).
fn produce<R: LineReader>(
    lanes: &[Lane],
    metrics: &ScanMetrics,
    reader: &mut R,
) -> (ScanResult<()>, Option<LinesBlock>) {
    let num_lanes = lanes.len();
    let max_failures = num_lanes * 2;
    let mut failures = 0usize;
    let mut lane_idx = 0usize;

    loop {
        let Some(mut block) = lanes[lane_idx].recycle.pop() else {
            // this consumer has no free block right now; try the next one
            lane_idx = (lane_idx + 1) % num_lanes;
            failures += 1;
            if failures >= max_failures {
                // mostly useless on a many-core box, but it keeps
                // busy-waiting from pegging the CPU when all lanes are behind
                thread::yield_now();
                failures = 0;
            }
            continue;
        };
        failures = 0;

        if let Err(e) = fill_block(reader, &mut block) {
            return (Err(e), Some(block));
        }
        if block.lines().is_empty() {
            return (Ok(()), Some(block));
        }
        metrics.record_block(block.lines().len());

        if lanes[lane_idx].data.push(block).is_err() {
            unreachable!("data ring cannot be full after a recycle pop");
        }
        lane_idx = (lane_idx + 1) % num_lanes;
    }
}

fn consume<M: WildcardMatch>(
    lane: &Lane,
    stop: &AtomicBool,
    matcher: &M,
    pattern: &str,
) -> usize {
    let mut counter = 0;

    let mut filter_and_recycle = |block: LinesBlock| {
        let found = filter_block(matcher, pattern, &block);
        if lane.recycle.push(block).is_err() {
            unreachable!("recycle ring sized for every lane block");
        }
        found
    };

    loop {
        match lane.data.pop() {
            Some(block) => counter += filter_and_recycle(block),
            None => {
                if stop.load(Ordering::Acquire) {
                    // a block may have been pushed between the failed pop and
                    // the stop read; stop is sticky, so one more drain settles it
                    while let Some(block) = lane.data.pop() {
                        counter += filter_and_recycle(block);
                    }
                    return counter;
                }
                thread::yield_now();
            }
        }
    }
}
