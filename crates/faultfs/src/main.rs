//! FaultFS CLI: configure, probe and exercise the fault injection hooks.
//!
//! # Usage
//!
//! ```bash
//! # Validate a configuration and show what it arms
//! faultfs check --type 0 --percent 50
//!
//! # Estimate the trigger rate without side effects
//! faultfs probe --type ReadFileErr --percent 98 --calls 100000 --seed 7
//!
//! # Drive a scripted workload through the hooks against a real directory
//! faultfs exercise --type ReadFileDelay --percent 30 --delay 200ms --original /tmp/fs
//! ```
//!
//! Fault type codes:
//!
//! | Code | Name            | Code | Name            |
//! |------|-----------------|------|-----------------|
//! | 0    | OpenFileEIO     | 7    | MkDirEPERM      |
//! | 1    | OpenFileEPERM   | 8    | RmDirEACCES     |
//! | 2    | ReadFileDelay   | 9    | RmDirEPERM      |
//! | 3    | ReadFileErr     | 10   | FsyncDelay      |
//! | 4    | WriteFileENOSPC | 11   | FsyncEIO        |
//! | 5    | WriteFileDelay  | 12   | OpenDirEACCES   |
//! | 6    | MkDirEACCES     | 13   | OpenDirEPERM    |

mod report;
mod workload;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use faultfs_core::config::{FaultSpec, ProbabilityMode, SpecError};
use faultfs_core::engine::DecisionEngine;
use faultfs_core::faults::FaultType;
use faultfs_core::hooks::FaultHooks;
use faultfs_core::host::PassthroughHost;
use faultfs_core::random::SeededRng;
use log::info;
use snafu::Snafu;

/// CLI errors for the faultfs binary.
#[derive(Debug, Snafu)]
enum CliError {
    #[snafu(display("Invalid fault configuration: {source}"), context(false))]
    Spec { source: SpecError },
    #[snafu(display("I/O error: {source}"), context(false))]
    Io { source: std::io::Error },
    #[snafu(display("{message}"))]
    Other { message: String },
}

#[derive(Parser)]
#[command(name = "faultfs")]
#[command(about = "Fault injection hooks for a pass-through filesystem")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the fault configuration and show the armed slot
    Check {
        #[command(flatten)]
        fault: FaultArgs,

        /// Mount point the FUSE host would serve
        #[arg(short, long, default_value = "/mnt/faultfs")]
        mountpoint: PathBuf,

        /// Underlying directory the FUSE host would forward to
        #[arg(short, long, default_value = "/mnt/fs")]
        original: PathBuf,
    },

    /// Evaluate the armed slot repeatedly and report the trigger rate
    Probe {
        #[command(flatten)]
        fault: FaultArgs,

        /// Number of decisions to take
        #[arg(short = 'n', long, default_value = "10000")]
        calls: u32,
    },

    /// Run a scripted workload through the hooks on a real directory
    Exercise {
        #[command(flatten)]
        fault: FaultArgs,

        /// Underlying directory to operate on
        #[arg(short, long, default_value = "/mnt/fs")]
        original: PathBuf,

        /// Workload rounds (each round touches every operation)
        #[arg(short, long, default_value = "10")]
        rounds: u32,
    },
}

/// The fault configuration shared by every subcommand.
#[derive(Args, Debug, Clone)]
struct FaultArgs {
    /// Fault type: code 0..=13 or name (see --help)
    #[arg(short = 't', long = "type")]
    fault_type: FaultType,

    /// Trigger percentage, 0..=99 (0..=100 with --exact-percent)
    #[arg(short, long, default_value = "0")]
    percent: u32,

    /// Delay for ReadFileDelay, WriteFileDelay and FsyncDelay (e.g. 500ms, 2s)
    #[arg(short, long, value_parser = humantime::parse_duration, default_value = "0s")]
    delay: Duration,

    /// Treat --percent as a true percentage instead of a share of 99
    #[arg(long)]
    exact_percent: bool,

    /// Seed for the trigger RNG (default: current time)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Log verbosity: 0 info, 1 debug, 2 trace (RUST_LOG overrides)
    #[arg(long, default_value = "0")]
    log_level: u8,
}

impl FaultArgs {
    fn mode(&self) -> ProbabilityMode {
        if self.exact_percent {
            ProbabilityMode::Exact
        } else {
            ProbabilityMode::Compatible
        }
    }

    fn spec(&self) -> Result<FaultSpec, SpecError> {
        FaultSpec::with_mode(self.fault_type, self.percent, self.delay, self.mode())
    }

    fn rng(&self) -> SeededRng {
        match self.seed {
            Some(seed) => SeededRng::from_seed(seed),
            None => SeededRng::from_time(),
        }
    }

    fn engine(&self) -> Result<(DecisionEngine, u64), SpecError> {
        let spec = self.spec()?;
        let rng = self.rng();
        let seed = rng.seed();
        Ok((DecisionEngine::with_source(spec, Arc::new(rng)), seed))
    }
}

fn log_filter(level: u8) -> &'static str {
    match level {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

fn init_logging(level: u8) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_filter(level)))
        .init();
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check {
            fault,
            mountpoint,
            original,
        } => cmd_check(fault, mountpoint, original),
        Commands::Probe { fault, calls } => cmd_probe(fault, calls),
        Commands::Exercise {
            fault,
            original,
            rounds,
        } => cmd_exercise(fault, original, rounds),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_check(fault: FaultArgs, mountpoint: PathBuf, original: PathBuf) -> Result<(), CliError> {
    init_logging(fault.log_level);
    let spec = fault.spec()?;
    if spec.percent() == 0 {
        log::warn!("percent is 0: {} will never fire", spec.fault_type());
    }
    print!("{}", report::format_config(&spec, &mountpoint, &original));
    Ok(())
}

fn cmd_probe(fault: FaultArgs, calls: u32) -> Result<(), CliError> {
    init_logging(fault.log_level);
    if calls == 0 {
        return OtherSnafu {
            message: "--calls must be at least 1",
        }
        .fail();
    }
    let (engine, seed) = fault.engine()?;
    let slot = engine.armed_slot();
    info!("probing {} with seed {}", slot, seed);

    for _ in 0..calls {
        engine.should_trigger(slot);
    }

    print!("{}", report::format_probe(engine.spec(), &engine.stats_for(slot), seed));
    Ok(())
}

fn cmd_exercise(fault: FaultArgs, original: PathBuf, rounds: u32) -> Result<(), CliError> {
    init_logging(fault.log_level);
    if !original.is_dir() {
        return OtherSnafu {
            message: format!("{} is not a directory", original.display()),
        }
        .fail();
    }
    let (engine, seed) = fault.engine()?;
    let engine = Arc::new(engine);
    let host = PassthroughHost::new(&original, FaultHooks::new(Arc::clone(&engine)));
    info!(
        "exercising {} rounds under {} with seed {}",
        rounds,
        original.display(),
        seed
    );

    let records = workload::run(&host, rounds)?;

    print!(
        "{}",
        report::format_exercise(engine.spec(), &records, &engine.stats(), seed)
    );
    Ok(())
}
