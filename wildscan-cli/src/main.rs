use clap::Parser;
use colored::Colorize;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use wildscan::{count_matches, ScanConfig, ScanError};

/// Count the lines of a file that match a wildcard pattern, using a
/// selectable producer/consumer strategy.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// File to scan
    file: PathBuf,

    /// Wildcard pattern; `*` matches any run of bytes, `?` exactly one
    pattern: String,

    /// Processing strategy
    /// (sequential|condvar|disruptor|semaphore|spsc-fanout|mpmc|shared-read)
    #[arg(short, long, default_value = "condvar", verbatim_doc_comment)]
    strategy: String,

    /// Line-reading backend (buffered|mmap)
    #[arg(short, long, default_value = "buffered")]
    reader: String,

    /// Wildcard matcher (backtrack|glob|regex)
    #[arg(short, long, default_value = "backtrack")]
    matcher: String,

    /// Number of consumer threads (default: CPU cores - 1)
    #[arg(short = 'j', long)]
    consumers: Option<NonZeroUsize>,

    /// Capacity of the block queue
    #[arg(long, default_value_t = ScanConfig::DEFAULT_QUEUE_SIZE)]
    queue_size: usize,

    /// Maximum lines per block
    #[arg(long, default_value_t = ScanConfig::DEFAULT_MAX_LINES)]
    max_lines: usize,

    /// Log progress details to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn build_config(cli: &Cli) -> Result<ScanConfig, ScanError> {
    let mut config = ScanConfig::new(&cli.file, &cli.pattern);
    config.strategy = cli.strategy.parse()?;
    config.reader = cli.reader.parse()?;
    config.matcher = cli.matcher.parse()?;
    if let Some(consumers) = cli.consumers {
        config.consumers = consumers;
    }
    if cli.queue_size == 0 || cli.max_lines == 0 {
        return Err(ScanError::config_error(
            "--queue-size and --max-lines must be positive",
        ));
    }
    config.queue_size = cli.queue_size;
    config.max_lines = cli.max_lines;
    Ok(config)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "wildscan=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = build_config(&cli).and_then(|config| count_matches(&config));

    match result {
        Ok(count) => {
            println!("{count}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{} {}", "error:".red().bold(), err);
            match err {
                // configuration and pattern problems are caller mistakes
                ScanError::ConfigError(_) | ScanError::InvalidPattern(_) => ExitCode::from(2),
                _ => ExitCode::from(1),
            }
        }
    }
}
