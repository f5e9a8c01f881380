use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use log::{error, info};
use numparse_bench::cases;
use numparse_bench::driver::{self, CaseFilter, Driver};
use numparse_bench::harness::{BenchConfig, Profile};
use numparse_bench::registry::Registry;
use numparse_bench::report;
use numparse_bench::schema::{BenchReport, RunMeta, SCHEMA_VERSION};
use numparse_bench::workload::{self, BlockSize, Corpus};
use numparse_bench::{HarnessError, ReportFormat, Result};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ProfileArg {
    Quick,
    Full,
}

impl From<ProfileArg> for Profile {
    fn from(v: ProfileArg) -> Self {
        match v {
            ProfileArg::Quick => Profile::Quick,
            ProfileArg::Full => Profile::Full,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the benchmark cases (the default command).
    Run {
        /// Only run cases whose name matches this regular expression.
        #[arg(value_name = "FILTER")]
        filter: Option<String>,
    },

    /// Print the registered case names.
    List {
        #[arg(value_name = "FILTER")]
        filter: Option<String>,
    },

    /// Write a deterministic line block to disk for use with --block-file.
    GenerateBlock {
        /// Minimum number of lines.
        #[arg(long, short = 'n', default_value_t = 100_000)]
        lines: usize,

        /// Size the block in bytes instead of lines (whole lines, newline-terminated).
        #[arg(long, value_name = "BYTES", conflicts_with = "lines")]
        bytes: Option<usize>,

        /// Output directory for the generated block.
        #[arg(long, value_name = "DIR")]
        out_dir: PathBuf,
    },

    /// Show the header of a block file.
    BlockInfo {
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },
}

#[derive(Parser, Debug)]
#[command(name = "numparse-bench")]
#[command(about = "Adaptive throughput benchmarks for numeric text parsing")]
struct Args {
    #[arg(long, value_enum, default_value_t = ProfileArg::Quick, global = true)]
    profile: ProfileArg,

    /// Seed for the random corpora.
    #[arg(long, default_value_t = 0, global = true)]
    seed: u64,

    /// How to print results on stdout.
    #[arg(long, value_enum, default_value_t = ReportFormat::Table, global = true)]
    format: ReportFormat,

    /// Also write the JSON report to this file.
    #[arg(long, global = true)]
    out: Option<PathBuf>,

    /// Minimum duration of an accepted round, in seconds.
    #[arg(long, value_name = "SECS", value_parser = parse_secs, global = true)]
    min_time: Option<Duration>,

    /// Timed rounds per case once the iteration count is settled.
    #[arg(long, global = true)]
    repetitions: Option<u32>,

    /// Time this block file instead of the generated block.
    #[arg(long, value_name = "FILE", global = true)]
    block_file: Option<PathBuf>,

    /// Case filter for the implicit `run` when no subcommand is given.
    #[arg(value_name = "FILTER")]
    filter: Option<String>,

    #[command(subcommand)]
    cmd: Option<Command>,
}

fn now_utc() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("unix:{secs}")
}

fn git_sha_short() -> Option<String> {
    std::env::var("GIT_SHA")
        .ok()
        .or_else(|| std::env::var("GITHUB_SHA").ok())
        .map(|s| s.chars().take(12).collect())
}

fn parse_secs(s: &str) -> std::result::Result<Duration, String> {
    let secs: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if secs <= 0.0 {
        return Err("must be greater than zero".to_string());
    }
    Duration::try_from_secs_f64(secs).map_err(|e| e.to_string())
}

fn parse_filter(filter: Option<&str>) -> Result<Option<CaseFilter>> {
    filter.map(CaseFilter::new).transpose()
}

fn bench_config(args: &Args) -> BenchConfig {
    let mut cfg = BenchConfig::new(args.profile.into(), args.seed);
    cfg.min_time = args.min_time;
    cfg.repetitions = args.repetitions;
    cfg
}

fn build_corpus(cfg: &BenchConfig, block_file: Option<&Path>) -> Result<Corpus> {
    let corpus_cfg = cfg.corpus();
    match block_file {
        Some(path) => {
            let (meta, block) = workload::load_block(path)?;
            info!(
                "loaded block {} ({} lines, {} bytes)",
                path.display(),
                meta.lines,
                meta.bytes
            );
            Corpus::with_block(&corpus_cfg, block)
        }
        None => Corpus::build(&corpus_cfg),
    }
}

/// Registration errors are fatal: they mean the suite itself is broken.
fn build_registry(corpus: &Corpus) -> Result<Registry> {
    let mut registry = Registry::new();
    cases::register_all(&mut registry, corpus)?;
    Ok(registry)
}

fn run(args: &Args, filter: Option<&str>) -> Result<ExitCode> {
    let cfg = bench_config(args);
    let timing = cfg.timing();
    let filter = parse_filter(filter)?;

    let corpus = build_corpus(&cfg, args.block_file.as_deref())?;
    let registry = build_registry(&corpus)?;

    let driver = Driver::new(&registry, timing.clone());
    let outcome = driver.run(filter.as_ref());
    let status = driver::exit_status(&outcome);
    let results = match outcome {
        Ok(results) => results,
        Err(e) => {
            error!("{e}");
            return Ok(ExitCode::from(status));
        }
    };

    let failed = results.iter().filter(|r| r.is_failed()).count();
    info!("{} cases finished, {failed} failed", results.len());

    let report = BenchReport {
        run: RunMeta {
            schema_version: SCHEMA_VERSION,
            bench_version: env!("CARGO_PKG_VERSION").to_string(),
            profile: cfg.profile.as_str().to_string(),
            seed: cfg.seed,
            timestamp_utc: now_utc(),
            git_sha: git_sha_short(),
            min_time_ns: timing.min_time.as_nanos(),
            repetitions: timing.repetitions,
            workloads: corpus.describe().into_iter().collect::<BTreeMap<_, _>>(),
        },
        results,
    };

    println!("{}", report::render(&report, args.format)?);
    if let Some(out) = &args.out {
        report::write_json(out, &report)?;
        info!("report written to {}", out.display());
    }

    Ok(ExitCode::from(status))
}

fn list(args: &Args, filter: Option<&str>) -> Result<ExitCode> {
    let cfg = bench_config(args);
    let filter = parse_filter(filter)?;
    let corpus = build_corpus(&cfg, args.block_file.as_deref())?;
    let registry = build_registry(&corpus)?;

    match driver::select(&registry, filter.as_ref()) {
        Ok(names) => {
            for name in names {
                println!("{name}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e @ HarnessError::NoMatchingCases { .. }) => {
            error!("{e}");
            Ok(ExitCode::from(1))
        }
        Err(e) => Err(e),
    }
}

fn block_size(lines: usize, bytes: Option<usize>) -> BlockSize {
    match bytes {
        Some(n) => BlockSize::Bytes(n),
        None => BlockSize::Lines(lines),
    }
}

fn generate_block(size: BlockSize, out_dir: &Path) -> Result<ExitCode> {
    fs::create_dir_all(out_dir)?;
    let block = workload::generate_block(size)?;
    let path = out_dir.join(format!("block_{}_lines.npb", block.lines().count()));

    let start = std::time::Instant::now();
    let meta = workload::write_block(&path, &block)?;
    let elapsed = start.elapsed();

    info!(
        "wrote {} lines ({:.2} MB) to {} in {:.2}s",
        meta.lines,
        meta.bytes as f64 / 1_048_576.0,
        path.display(),
        elapsed.as_secs_f64()
    );
    println!("{}", path.display());
    Ok(ExitCode::SUCCESS)
}

fn block_info(path: &Path) -> Result<ExitCode> {
    let meta = workload::read_block_meta(path)?;
    println!("Block: {}", path.display());
    println!("  Lines: {}", meta.lines);
    println!("  Bytes: {}", meta.bytes);
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let result = match &args.cmd {
        None => run(&args, args.filter.as_deref()),
        Some(Command::Run { filter }) => run(&args, filter.as_deref()),
        Some(Command::List { filter }) => list(&args, filter.as_deref()),
        Some(Command::GenerateBlock {
            lines,
            bytes,
            out_dir,
        }) => generate_block(block_size(*lines, *bytes), out_dir),
        Some(Command::BlockInfo { path }) => block_info(path),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!("{e}");
            ExitCode::from(2)
        }
    }
}
