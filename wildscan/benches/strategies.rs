use std::path::Path;
use std::sync::OnceLock;

use criterion::{black_box, BenchmarkId, Criterion};

use wildscan::config::{ReaderKind, ScanConfig, StrategyKind};
use wildscan::errors::ScanResult;
use wildscan::matcher::BacktrackMatch;
use wildscan::reader::{BufferedReader, LineReader, MmapReader};
use wildscan::strategy::{
    CondVarScan, DisruptorScan, MpmcScan, SemaphoreScan, SequentialScan, SharedReadScan,
    SpscFanoutScan,
};

static ENV: OnceLock<ScanConfig> = OnceLock::new();

fn bench_env() -> &'static ScanConfig {
    ENV.get().expect("environment validated in main")
}

/// Strategy instances are built once per benchmark and reused across
/// iterations, so steady-state timings exclude pool construction.
enum AnyScan {
    Sequential(SequentialScan),
    CondVar(CondVarScan),
    Disruptor(DisruptorScan),
    Semaphore(SemaphoreScan),
    SpscFanout(SpscFanoutScan),
    Mpmc(MpmcScan),
    SharedRead(SharedReadScan),
}

impl AnyScan {
    fn new(kind: StrategyKind, queue_size: usize, consumers: usize, max_lines: usize) -> Self {
        match kind {
            StrategyKind::Sequential => AnyScan::Sequential(SequentialScan::new(max_lines)),
            StrategyKind::CondVar => {
                AnyScan::CondVar(CondVarScan::new(queue_size, consumers, max_lines))
            }
            StrategyKind::Disruptor => {
                AnyScan::Disruptor(DisruptorScan::new(queue_size, consumers, max_lines))
            }
            StrategyKind::Semaphore => {
                AnyScan::Semaphore(SemaphoreScan::new(queue_size, consumers, max_lines))
            }
            StrategyKind::SpscFanout => {
                AnyScan::SpscFanout(SpscFanoutScan::new(queue_size, consumers, max_lines))
            }
            StrategyKind::Mpmc => AnyScan::Mpmc(MpmcScan::new(queue_size, consumers, max_lines)),
            StrategyKind::SharedRead => {
                AnyScan::SharedRead(SharedReadScan::new(consumers + 1, max_lines))
            }
        }
    }

    fn execute<R: LineReader + Send>(
        &mut self,
        reader: &mut R,
        path: &Path,
        pattern: &str,
    ) -> ScanResult<usize> {
        let matcher = &BacktrackMatch;
        match self {
            AnyScan::Sequential(scan) => scan.execute(reader, path, matcher, pattern),
            AnyScan::CondVar(scan) => scan.execute(reader, path, matcher, pattern),
            AnyScan::Disruptor(scan) => scan.execute(reader, path, matcher, pattern),
            AnyScan::Semaphore(scan) => scan.execute(reader, path, matcher, pattern),
            AnyScan::SpscFanout(scan) => scan.execute(reader, path, matcher, pattern),
            AnyScan::Mpmc(scan) => scan.execute(reader, path, matcher, pattern),
            AnyScan::SharedRead(scan) => scan.execute(reader, path, matcher, pattern),
        }
    }
}

fn run_case(
    b: &mut criterion::Bencher<'_>,
    kind: StrategyKind,
    reader_kind: ReaderKind,
    queue_size: usize,
    consumers: usize,
    max_lines: usize,
) {
    let env = bench_env();
    let mut scan = AnyScan::new(kind, queue_size, consumers, max_lines);
    match reader_kind {
        ReaderKind::Buffered => {
            let mut reader = BufferedReader::new();
            b.iter(|| {
                black_box(
                    scan.execute(&mut reader, &env.file, &env.pattern)
                        .expect("scan failed"),
                )
            });
        }
        ReaderKind::Mmap => {
            let mut reader = MmapReader::new();
            b.iter(|| {
                black_box(
                    scan.execute(&mut reader, &env.file, &env.pattern)
                        .expect("scan failed"),
                )
            });
        }
    }
}

fn bench_sequential(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequential");
    for reader_kind in ReaderKind::ALL {
        for max_lines in [1, 4, 16, 32] {
            let id = BenchmarkId::new(reader_kind.as_str(), format!("mlines-{max_lines}"));
            group.bench_function(id, |b| {
                run_case(b, StrategyKind::Sequential, reader_kind, 1, 1, max_lines)
            });
        }
    }
    group.finish();
}

fn bench_concurrent(c: &mut Criterion) {
    // (queue size, consumers, max lines) operating points worth comparing:
    // small queues that stress the hand-off, and wider ones that let the
    // producer run ahead
    const GRID: &[(usize, usize, usize)] = &[
        (2, 1, 16),
        (2, 1, 96),
        (8, 1, 96),
        (2, 3, 96),
        (8, 3, 96),
        (32, 3, 96),
        (8, 3, 256),
        (16, 7, 256),
    ];

    for kind in StrategyKind::CONCURRENT {
        let mut group = c.benchmark_group(kind.as_str());
        for reader_kind in ReaderKind::ALL {
            for &(queue_size, consumers, max_lines) in GRID {
                if kind == StrategyKind::Disruptor && queue_size < 2 {
                    continue;
                }
                let id = BenchmarkId::new(
                    reader_kind.as_str(),
                    format!("q{queue_size}-c{consumers}-l{max_lines}"),
                );
                group.bench_function(id, |b| {
                    run_case(b, kind, reader_kind, queue_size, consumers, max_lines)
                });
            }
        }
        group.finish();
    }
}

fn main() {
    // required input comes from the environment, like the rest of the
    // harness: WILDSCAN_FILE and WILDSCAN_PATTERN
    let config = match ScanConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };
    ENV.set(config).expect("bench env set once");

    let mut criterion = Criterion::default().configure_from_args();
    bench_sequential(&mut criterion);
    bench_concurrent(&mut criterion);
    criterion.final_summary();
}
