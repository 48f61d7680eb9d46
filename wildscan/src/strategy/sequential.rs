use std::path::Path;

use tracing::debug;

use crate::block::{LinesBlock, DEFAULT_SUB_BLOCK};
use crate::errors::ScanResult;
use crate::matcher::WildcardMatch;
use crate::metrics::ScanMetrics;
use crate::reader::{LineReader, ScopedOpen};
use crate::strategy::{fill_block, filter_block};

/// Single-threaded baseline: one block, fill then filter until end of
/// input. Every concurrent strategy must produce the same count this one
/// does.
#[derive(Debug)]
pub struct SequentialScan {
    block: LinesBlock,
    metrics: ScanMetrics,
}

impl SequentialScan {
    pub fn new(max_lines: usize) -> Self {
        Self {
            block: LinesBlock::new(max_lines, DEFAULT_SUB_BLOCK, false),
            metrics: ScanMetrics::new(),
        }
    }

    pub fn metrics(&self) -> &ScanMetrics {
        &self.metrics
    }

    pub fn execute<R: LineReader, M: WildcardMatch>(
        &mut self,
        reader: &mut R,
        path: &Path,
        matcher: &M,
        pattern: &str,
    ) -> ScanResult<usize> {
        debug!(path = %path.display(), pattern, "sequential scan");

        if reader.needs_buffer() {
            self.block.ensure_buffer();
        }
        let mut reader = ScopedOpen::new(reader, path)?;

        let mut total = 0;
        loop {
            fill_block(&mut *reader, &mut self.block)?;
            if self.block.lines().is_empty() {
                break;
            }
            self.metrics.record_block(self.block.lines().len());
            total += filter_block(matcher, pattern, &self.block);
        }

        self.metrics.record_matches(total);
        Ok(total)
    }
}
