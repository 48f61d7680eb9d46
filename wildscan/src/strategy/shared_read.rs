use std::path::Path;

use parking_lot::Mutex;

use crate::block::{LinesBlock, DEFAULT_SUB_BLOCK};
use crate::errors::ScanResult;
use crate::matcher::WildcardMatch;
use crate::metrics::ScanMetrics;
use crate::reader::{LineReader, ScopedOpen};
use crate::strategy::{fill_block, filter_block, join_worker};

/// The no-queue strategy: every thread owns a private block and the threads
/// take turns filling it from the shared reader under one mutex.
///
/// The lock is held only across the read call; filtering runs on the
/// thread's own block with no contention. Holding a mutex over a slow read
/// is normally the wrong shape, which is exactly why this variant exists as
/// a baseline for the queued designs. The calling thread works as one of
/// the N threads.
pub struct SharedReadScan {
    blocks: Vec<LinesBlock>,
    metrics: ScanMetrics,
}

impl SharedReadScan {
    pub fn new(threads: usize, max_lines: usize) -> Self {
        assert!(threads > 0);

        Self {
            blocks: (0..threads)
                .map(|_| LinesBlock::new(max_lines, DEFAULT_SUB_BLOCK, false))
                .collect(),
            metrics: ScanMetrics::new(),
        }
    }

    pub fn metrics(&self) -> &ScanMetrics {
        &self.metrics
    }

    pub fn execute<R: LineReader + Send, M: WildcardMatch>(
        &mut self,
        reader: &mut R,
        path: &Path,
        matcher: &M,
        pattern: &str,
    ) -> ScanResult<usize> {
        let needs_buffer = reader.needs_buffer();
        for block in &mut self.blocks {
            block.clear();
            if needs_buffer {
                block.ensure_buffer();
            }
        }

        let mut reader = ScopedOpen::new(reader, path)?;
        let reader_lock = Mutex::new(&mut *reader);

        let mut blocks = std::mem::take(&mut self.blocks);
        let mut own_block = blocks.pop().expect("at least one thread");
        let metrics = &self.metrics;

        let (results, own_result) = std::thread::scope(|s| {
            let handles: Vec<_> = blocks
                .drain(..)
                .map(|mut block| {
                    let reader_lock = &reader_lock;
                    s.spawn(move || {
                        let result = worker(reader_lock, metrics, matcher, pattern, &mut block);
                        (result, block)
                    })
                })
                .collect();

            let own_result = worker(&reader_lock, metrics, matcher, pattern, &mut own_block);

            let mut results = Vec::with_capacity(handles.len());
            for handle in handles {
                let (result, block) = join_worker(handle);
                blocks.push(block);
                results.push(result);
            }
            (results, own_result)
        });

        blocks.push(own_block);
        self.blocks = blocks;

        let mut total = own_result?;
        for result in results {
            total += result?;
        }
        self.metrics.record_matches(total);
        Ok(total)
    }
}

fn worker<R: LineReader, M: WildcardMatch>(
    reader_lock: &Mutex<&mut R>,
    metrics: &ScanMetrics,
    matcher: &M,
    pattern: &str,
    block: &mut LinesBlock,
) -> ScanResult<usize> {
    let mut counter = 0;
    loop {
        {
            let mut reader = reader_lock.lock();
            fill_block(&mut **reader, block)?;
        }

        if block.lines().is_empty() {
            return Ok(counter);
        }
        metrics.record_block(block.lines().len());
        counter += filter_block(matcher, pattern, block);
    }
}
