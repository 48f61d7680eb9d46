use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::str::FromStr;

use crate::errors::{ScanError, ScanResult};

/// Environment variable holding the input file path.
pub const ENV_FILE: &str = "WILDSCAN_FILE";
/// Environment variable holding the wildcard pattern.
pub const ENV_PATTERN: &str = "WILDSCAN_PATTERN";
/// Optional override for the number of consumer threads.
pub const ENV_CONSUMERS: &str = "WILDSCAN_CONSUMERS";
/// Optional override for the queue capacity.
pub const ENV_QUEUE_SIZE: &str = "WILDSCAN_QUEUE_SIZE";
/// Optional override for the lines-per-block limit.
pub const ENV_MAX_LINES: &str = "WILDSCAN_MAX_LINES";

/// Which producer/consumer orchestration runs the scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    Sequential,
    CondVar,
    Disruptor,
    Semaphore,
    SpscFanout,
    Mpmc,
    SharedRead,
}

impl StrategyKind {
    /// Every strategy, sequential baseline first.
    pub const ALL: [StrategyKind; 7] = [
        StrategyKind::Sequential,
        StrategyKind::CondVar,
        StrategyKind::Disruptor,
        StrategyKind::Semaphore,
        StrategyKind::SpscFanout,
        StrategyKind::Mpmc,
        StrategyKind::SharedRead,
    ];

    /// The concurrent strategies (everything but the baseline).
    pub const CONCURRENT: [StrategyKind; 6] = [
        StrategyKind::CondVar,
        StrategyKind::Disruptor,
        StrategyKind::Semaphore,
        StrategyKind::SpscFanout,
        StrategyKind::Mpmc,
        StrategyKind::SharedRead,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Sequential => "sequential",
            StrategyKind::CondVar => "condvar",
            StrategyKind::Disruptor => "disruptor",
            StrategyKind::Semaphore => "semaphore",
            StrategyKind::SpscFanout => "spsc-fanout",
            StrategyKind::Mpmc => "mpmc",
            StrategyKind::SharedRead => "shared-read",
        }
    }
}

impl FromStr for StrategyKind {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sequential" => Ok(StrategyKind::Sequential),
            "condvar" => Ok(StrategyKind::CondVar),
            "disruptor" => Ok(StrategyKind::Disruptor),
            "semaphore" => Ok(StrategyKind::Semaphore),
            "spsc-fanout" => Ok(StrategyKind::SpscFanout),
            "mpmc" => Ok(StrategyKind::Mpmc),
            "shared-read" => Ok(StrategyKind::SharedRead),
            other => Err(ScanError::config_error(format!(
                "unknown strategy '{other}'"
            ))),
        }
    }
}

/// Which line-reading backend feeds the producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderKind {
    Buffered,
    Mmap,
}

impl ReaderKind {
    pub const ALL: [ReaderKind; 2] = [ReaderKind::Buffered, ReaderKind::Mmap];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReaderKind::Buffered => "buffered",
            ReaderKind::Mmap => "mmap",
        }
    }
}

impl FromStr for ReaderKind {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buffered" => Ok(ReaderKind::Buffered),
            "mmap" => Ok(ReaderKind::Mmap),
            other => Err(ScanError::config_error(format!("unknown reader '{other}'"))),
        }
    }
}

/// Which wildcard matcher filters lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatcherKind {
    Backtrack,
    GlobPattern,
    Regex,
}

impl MatcherKind {
    pub const ALL: [MatcherKind; 3] = [
        MatcherKind::Backtrack,
        MatcherKind::GlobPattern,
        MatcherKind::Regex,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MatcherKind::Backtrack => "backtrack",
            MatcherKind::GlobPattern => "glob",
            MatcherKind::Regex => "regex",
        }
    }
}

impl FromStr for MatcherKind {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "backtrack" => Ok(MatcherKind::Backtrack),
            "glob" => Ok(MatcherKind::GlobPattern),
            "regex" => Ok(MatcherKind::Regex),
            other => Err(ScanError::config_error(format!(
                "unknown matcher '{other}'"
            ))),
        }
    }
}

/// Configuration for one scan.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Input file path
    pub file: PathBuf,

    /// Wildcard pattern; empty matches every line
    pub pattern: String,

    /// Orchestration strategy
    pub strategy: StrategyKind,

    /// Line-reading backend
    pub reader: ReaderKind,

    /// Wildcard matcher
    pub matcher: MatcherKind,

    /// Number of consumer threads (the producer runs on the calling thread)
    pub consumers: NonZeroUsize,

    /// Capacity of the block queue between producer and consumers
    pub queue_size: usize,

    /// Maximum lines batched into one block
    pub max_lines: usize,
}

fn default_consumers() -> NonZeroUsize {
    NonZeroUsize::new(num_cpus::get().saturating_sub(1).max(1))
        .expect("clamped consumer count is nonzero")
}

impl ScanConfig {
    pub const DEFAULT_QUEUE_SIZE: usize = 8;
    pub const DEFAULT_MAX_LINES: usize = 96;

    pub fn new(file: impl Into<PathBuf>, pattern: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            pattern: pattern.into(),
            strategy: StrategyKind::CondVar,
            reader: ReaderKind::Buffered,
            matcher: MatcherKind::Backtrack,
            consumers: default_consumers(),
            queue_size: Self::DEFAULT_QUEUE_SIZE,
            max_lines: Self::DEFAULT_MAX_LINES,
        }
    }

    /// Loads the configuration from the process environment. The file and
    /// pattern variables are required; topology variables are optional
    /// overrides of the defaults.
    pub fn from_env() -> ScanResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ScanResult<Self> {
        let file = lookup(ENV_FILE)
            .ok_or_else(|| ScanError::config_error(format!("{ENV_FILE} is not set")))?;
        if file.is_empty() {
            return Err(ScanError::config_error(format!("{ENV_FILE} is empty")));
        }
        let pattern = lookup(ENV_PATTERN)
            .ok_or_else(|| ScanError::config_error(format!("{ENV_PATTERN} is not set")))?;

        let mut config = Self::new(file, pattern);

        if let Some(raw) = lookup(ENV_CONSUMERS) {
            config.consumers = raw.parse().map_err(|_| {
                ScanError::config_error(format!("{ENV_CONSUMERS} must be a positive integer"))
            })?;
        }
        if let Some(raw) = lookup(ENV_QUEUE_SIZE) {
            config.queue_size = parse_positive(&raw, ENV_QUEUE_SIZE)?;
        }
        if let Some(raw) = lookup(ENV_MAX_LINES) {
            config.max_lines = parse_positive(&raw, ENV_MAX_LINES)?;
        }

        Ok(config)
    }
}

fn parse_positive(raw: &str, name: &str) -> ScanResult<usize> {
    match raw.parse::<usize>() {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(ScanError::config_error(format!(
            "{name} must be a positive integer"
        ))),
    }
}
