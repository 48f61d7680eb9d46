use std::path::Path;

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::debug;

use crate::block::{LinesBlock, DEFAULT_SUB_BLOCK};
use crate::errors::ScanResult;
use crate::matcher::WildcardMatch;
use crate::metrics::ScanMetrics;
use crate::reader::{LineReader, ScopedOpen};
use crate::strategy::{fill_block, filter_block, join_worker, Slot};

/// Strategy built on a third-party MPMC queue instead of the hand-rolled
/// rings: a bounded crossbeam channel carries blocks to consumers and a
/// second bounded channel is the free list they return blocks through.
///
/// Termination uses the same protocol as the semaphore strategy, carried
/// in band: exactly one [`Slot::Terminal`] is sent after the last block,
/// and every consumer that receives it re-sends it before exiting so the
/// remaining consumers observe it too.
pub struct MpmcScan {
    data_tx: Sender<Slot>,
    data_rx: Receiver<Slot>,
    free_tx: Sender<LinesBlock>,
    free_rx: Receiver<LinesBlock>,
    consumers: usize,
    metrics: ScanMetrics,
}

impl MpmcScan {
    pub fn new(queue_size: usize, consumers: usize, max_lines: usize) -> Self {
        assert!(queue_size > 0);
        assert!(consumers > 0);

        let (data_tx, data_rx) = bounded(queue_size);
        // one block per queue slot plus one carry per thread
        let block_count = queue_size + consumers + 1;
        let (free_tx, free_rx) = bounded(block_count);
        for _ in 0..block_count {
            free_tx
                .send(LinesBlock::new(max_lines, DEFAULT_SUB_BLOCK, false))
                .expect("free channel sized for every block");
        }

        Self {
            data_tx,
            data_rx,
            free_tx,
            free_rx,
            consumers,
            metrics: ScanMetrics::new(),
        }
    }

    pub fn metrics(&self) -> &ScanMetrics {
        &self.metrics
    }

    fn init(&mut self, needs_buffer: bool) {
        // drop the terminal token a previous run left behind
        for slot in self.data_rx.try_iter() {
            if let Some(block) = slot.into_data() {
                self.free_tx.send(block).expect("free channel sized for every block");
            }
        }

        let blocks: Vec<LinesBlock> = self.free_rx.try_iter().collect();
        for mut block in blocks {
            block.clear();
            if needs_buffer {
                block.ensure_buffer();
            }
            self.free_tx.send(block).expect("free channel sized for every block");
        }
    }

    pub fn execute<R: LineReader, M: WildcardMatch>(
        &mut self,
        reader: &mut R,
        path: &Path,
        matcher: &M,
        pattern: &str,
    ) -> ScanResult<usize> {
        debug!(path = %path.display(), pattern, "mpmc scan");

        self.init(reader.needs_buffer());
        let mut reader = ScopedOpen::new(reader, path)?;

        let data_tx = &self.data_tx;
        let data_rx = &self.data_rx;
        let free_tx = &self.free_tx;
        let free_rx = &self.free_rx;
        let metrics = &self.metrics;

        let (total, produced) = std::thread::scope(|s| {
            let handles: Vec<_> = (0..self.consumers)
                .map(|_| s.spawn(move || consume(data_tx, data_rx, free_tx, matcher, pattern)))
                .collect();

            let produced = produce(data_tx, free_tx, free_rx, metrics, &mut *reader);

            let total = handles.into_iter().map(join_worker).sum::<usize>();
            (total, produced)
        });

        produced?;
        self.metrics.record_matches(total);
        Ok(total)
    }
}

fn produce<R: LineReader>(
    data_tx: &Sender<Slot>,
    free_tx: &Sender<LinesBlock>,
    free_rx: &Receiver<LinesBlock>,
    metrics: &ScanMetrics,
    reader: &mut R,
) -> ScanResult<()> {
    let mut result = Ok(());
    loop {
        let mut block = free_rx.recv().expect("free channel stays open");

        match fill_block(reader, &mut block) {
            Ok(()) => {}
            Err(e) => {
                result = Err(e);
                free_tx.send(block).expect("free channel sized for every block");
                break;
            }
        }
        if block.lines().is_empty() {
            free_tx.send(block).expect("free channel sized for every block");
            break;
        }
        metrics.record_block(block.lines().len());

        data_tx.send(Slot::Data(block)).expect("data channel stays open");
    }

    // the terminal token is always the last entry in the queue
    data_tx.send(Slot::Terminal).expect("data channel stays open");
    result
}

fn consume<M: WildcardMatch>(
    data_tx: &Sender<Slot>,
    data_rx: &Receiver<Slot>,
    free_tx: &Sender<LinesBlock>,
    matcher: &M,
    pattern: &str,
) -> usize {
    let mut counter = 0;
    loop {
        match data_rx.recv().expect("data channel stays open") {
            Slot::Terminal => {
                // pass the token on or the other consumers would never stop
                data_tx.send(Slot::Terminal).expect("data channel stays open");
                return counter;
            }
            Slot::Data(block) => {
                counter += filter_block(matcher, pattern, &block);
                free_tx.send(block).expect("free channel sized for every block");
            }
        }
    }
}
