//! Producer/consumer orchestrations of one scan.
//!
//! Every strategy runs the same logical task: one producer fills blocks with
//! file lines, N consumers filter blocks against the pattern, and the
//! per-consumer counts are summed after the join. The strategies differ only
//! in the queue primitive between the two roles and in how end-of-input is
//! signaled. The producer always runs inline on the calling thread.

pub mod condvar;
pub mod disruptor;
pub mod lockfree;
pub mod mpmc;
pub mod semaphore;
pub mod sequential;
pub mod shared_read;

use std::thread::ScopedJoinHandle;

use crate::block::LinesBlock;
use crate::config::{MatcherKind, ReaderKind, ScanConfig, StrategyKind};
use crate::errors::ScanResult;
use crate::matcher::{BacktrackMatch, GlobPatternMatch, RegexMatch, WildcardMatch};
use crate::reader::{BufferedReader, LineReader, MmapReader, NextLine};

pub use condvar::CondVarScan;
pub use disruptor::DisruptorScan;
pub use lockfree::SpscFanoutScan;
pub use mpmc::MpmcScan;
pub use semaphore::SemaphoreScan;
pub use sequential::SequentialScan;
pub use shared_read::SharedReadScan;

/// Hand-off token for the sentinel-terminated queues: either a block of
/// lines or the terminal marker that tells consumers no more data will
/// arrive.
#[derive(Debug)]
pub enum Slot {
    Data(LinesBlock),
    Terminal,
}

impl Slot {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Slot::Terminal)
    }

    pub fn data(&self) -> &LinesBlock {
        match self {
            Slot::Data(block) => block,
            Slot::Terminal => panic!("terminal slot carries no block"),
        }
    }

    pub fn data_mut(&mut self) -> &mut LinesBlock {
        match self {
            Slot::Data(block) => block,
            Slot::Terminal => panic!("terminal slot carries no block"),
        }
    }

    pub fn into_data(self) -> Option<LinesBlock> {
        match self {
            Slot::Data(block) => Some(block),
            Slot::Terminal => None,
        }
    }
}

/// Fills `block` with up to `max_lines` lines from `reader`.
///
/// For buffered readers each line's scratch window starts right where the
/// previous line ended, so the lines of one block are laid out back to back
/// in its buffer. A block left with zero lines means end of input.
pub fn fill_block<R: LineReader>(reader: &mut R, block: &mut LinesBlock) -> ScanResult<()> {
    block.clear();
    let needs_buffer = reader.needs_buffer();
    if !needs_buffer {
        block.set_shared(reader.shared());
    }

    let mut write_at = 0;
    for _ in 0..block.max_lines() {
        let next = if needs_buffer {
            reader.read_line(block.scratch(write_at))?
        } else {
            reader.read_line(&mut [])?
        };
        match next {
            NextLine::Copied(len) => {
                block.push_line(write_at..write_at + len);
                write_at += len;
            }
            NextLine::View(span) => block.push_line(span),
            NextLine::Eof => break,
        }
    }
    Ok(())
}

/// Counts the lines of `block` that match `pattern`. The block's line list
/// is left untouched so the caller decides when to clear it for reuse.
pub fn filter_block<M: WildcardMatch + ?Sized>(
    matcher: &M,
    pattern: &str,
    block: &LinesBlock,
) -> usize {
    block
        .lines()
        .iter()
        .filter(|span| matcher.is_match(block.line_bytes(span), pattern))
        .count()
}

/// Joins a scoped worker, re-raising its panic on the calling thread.
pub(crate) fn join_worker<T>(handle: ScopedJoinHandle<'_, T>) -> T {
    match handle.join() {
        Ok(value) => value,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

/// Runs one scan described by `config` and returns the total match count.
///
/// This is the library entrypoint the CLI, benches, and integration tests
/// share; it resolves the configured reader, matcher, and strategy and
/// validates the pattern eagerly before any thread starts.
pub fn count_matches(config: &ScanConfig) -> ScanResult<usize> {
    match config.reader {
        ReaderKind::Buffered => dispatch_matcher(config, BufferedReader::new()),
        ReaderKind::Mmap => dispatch_matcher(config, MmapReader::new()),
    }
}

fn dispatch_matcher<R: LineReader + Send>(config: &ScanConfig, mut reader: R) -> ScanResult<usize> {
    match config.matcher {
        MatcherKind::Backtrack => run_strategy(config, &mut reader, &BacktrackMatch),
        MatcherKind::GlobPattern => run_strategy(config, &mut reader, &GlobPatternMatch),
        MatcherKind::Regex => run_strategy(config, &mut reader, &RegexMatch),
    }
}

fn run_strategy<R: LineReader + Send, M: WildcardMatch>(
    config: &ScanConfig,
    reader: &mut R,
    matcher: &M,
) -> ScanResult<usize> {
    matcher.validate(&config.pattern)?;
    if config.strategy == StrategyKind::Disruptor && config.queue_size < 2 {
        return Err(crate::errors::ScanError::config_error(
            "the disruptor strategy needs a queue of at least 2 slots",
        ));
    }

    let consumers = config.consumers.get();
    let file = config.file.as_path();
    let pattern = config.pattern.as_str();

    match config.strategy {
        StrategyKind::Sequential => {
            SequentialScan::new(config.max_lines).execute(reader, file, matcher, pattern)
        }
        StrategyKind::CondVar => CondVarScan::new(config.queue_size, consumers, config.max_lines)
            .execute(reader, file, matcher, pattern),
        StrategyKind::Disruptor => {
            DisruptorScan::new(config.queue_size, consumers, config.max_lines)
                .execute(reader, file, matcher, pattern)
        }
        StrategyKind::Semaphore => {
            SemaphoreScan::new(config.queue_size, consumers, config.max_lines)
                .execute(reader, file, matcher, pattern)
        }
        StrategyKind::SpscFanout => {
            SpscFanoutScan::new(config.queue_size, consumers, config.max_lines)
                .execute(reader, file, matcher, pattern)
        }
        StrategyKind::Mpmc => MpmcScan::new(config.queue_size, consumers, config.max_lines)
            .execute(reader, file, matcher, pattern),
        StrategyKind::SharedRead => SharedReadScan::new(consumers + 1, config.max_lines)
            .execute(reader, file, matcher, pattern),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{LinesBlock, DEFAULT_SUB_BLOCK};
    use crate::matcher::BacktrackMatch;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn fixture(lines: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file
    }

    #[test]
    fn test_fill_block_respects_max_lines() {
        let file = fixture(&["one", "two", "three", "four", "five"]);
        let mut reader = BufferedReader::new();
        reader.open(file.path()).unwrap();

        let mut block = LinesBlock::new(2, DEFAULT_SUB_BLOCK, true);
        fill_block(&mut reader, &mut block).unwrap();
        assert_eq!(block.lines().len(), 2);

        fill_block(&mut reader, &mut block).unwrap();
        assert_eq!(block.lines().len(), 2);

        fill_block(&mut reader, &mut block).unwrap();
        assert_eq!(block.lines().len(), 1);

        // end of input
        fill_block(&mut reader, &mut block).unwrap();
        assert!(block.lines().is_empty());
    }

    #[test]
    fn test_fill_block_lays_lines_out_back_to_back() {
        let file = fixture(&["apple", "pie"]);
        let mut reader = BufferedReader::new();
        reader.open(file.path()).unwrap();

        let mut block = LinesBlock::new(4, DEFAULT_SUB_BLOCK, true);
        fill_block(&mut reader, &mut block).unwrap();

        let spans = block.lines().to_vec();
        assert_eq!(spans[0], 0..5);
        assert_eq!(spans[1], 5..8);
        assert_eq!(block.line_bytes(&spans[0]), b"apple");
        assert_eq!(block.line_bytes(&spans[1]), b"pie");
    }

    #[test]
    fn test_fill_block_with_view_reader() {
        let file = fixture(&["apple", "banana"]);
        let mut reader = MmapReader::new();
        reader.open(file.path()).unwrap();

        let mut block = LinesBlock::new(4, DEFAULT_SUB_BLOCK, false);
        fill_block(&mut reader, &mut block).unwrap();
        assert_eq!(block.lines().len(), 2);
        assert_eq!(block.line_bytes(&block.lines()[0].clone()), b"apple");
    }

    #[test]
    fn test_filter_block_counts_without_mutating() {
        let file = fixture(&["apple", "banana", "apricot", "cherry"]);
        let mut reader = BufferedReader::new();
        reader.open(file.path()).unwrap();

        let mut block = LinesBlock::new(8, DEFAULT_SUB_BLOCK, true);
        fill_block(&mut reader, &mut block).unwrap();

        assert_eq!(filter_block(&BacktrackMatch, "a*", &block), 2);
        assert_eq!(block.lines().len(), 4, "filter must not mutate the block");
        assert_eq!(filter_block(&BacktrackMatch, "a*", &block), 2);
    }

    #[test]
    fn test_count_matches_smoke() {
        let file = fixture(&["apple", "banana", "apricot", "cherry"]);
        let mut config = ScanConfig::new(file.path(), "a*");
        config.strategy = StrategyKind::Sequential;
        assert_eq!(count_matches(&config).unwrap(), 2);
    }

    #[test]
    fn test_count_matches_rejects_bad_pattern_eagerly() {
        let file = fixture(&["apple"]);
        let mut config = ScanConfig::new(file.path(), "[unclosed");
        config.matcher = MatcherKind::GlobPattern;
        config.strategy = StrategyKind::Sequential;
        assert!(count_matches(&config).is_err());
    }

    #[test]
    fn test_slot_accessors() {
        let slot = Slot::Data(LinesBlock::new(1, 16, false));
        assert!(!slot.is_terminal());
        assert!(slot.into_data().is_some());
        assert!(Slot::Terminal.is_terminal());
        assert!(Slot::Terminal.into_data().is_none());
    }
}
