// Copyright 2025 STARGA Inc.
// Licensed under the Apache License, Version 2.0 (the “License”);
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at:
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an “AS IS” BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Part of the MIND project (Machine Intelligence Native Design).

//! `mind-vec`: inspect the CPU topology and exercise the vectorized engine.

use std::path::PathBuf;
use std::process;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use mind_vectorized::config::{find_config_file, EngineConfig, QueueMode};
use mind_vectorized::matrix::DenseMatrix;
use mind_vectorized::vectorized::{
    discover, CpuInfoFile, MTWrapper, OutputSpec, Pipeline, PipelineInput, VectorCombine, CPUINFO_PATH,
};
use mind_vectorized::{ExecutionContext, Matrix};

#[derive(Parser, Debug)]
#[command(name = "mind-vec", version, about = "MIND vectorized execution engine", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). `RUST_LOG` takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the discovered CPU topology.
    Topology {
        /// Hardware description to read.
        #[arg(long, value_name = "PATH", default_value = CPUINFO_PATH)]
        cpuinfo: PathBuf,
    },
    /// Run a row-sum pipeline over a generated matrix.
    Run {
        /// Engine configuration file. Defaults to the nearest `mind-vec.toml`.
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
        #[arg(long, default_value_t = 100_000)]
        rows: usize,
        #[arg(long, default_value_t = 16)]
        cols: usize,
        /// CPU worker threads (0 = hardware concurrency).
        #[arg(long)]
        threads: Option<usize>,
        #[arg(long, value_enum)]
        queue_mode: Option<QueueModeArg>,
        #[arg(long)]
        batch_size: Option<usize>,
        /// Tasks a worker claims per queue access.
        #[arg(long)]
        claim_size: Option<usize>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum QueueModeArg {
    Centralized,
    PerCpu,
    PerGroup,
}

impl From<QueueModeArg> for QueueMode {
    fn from(arg: QueueModeArg) -> Self {
        match arg {
            QueueModeArg::Centralized => QueueMode::Centralized,
            QueueModeArg::PerCpu => QueueMode::PerCpu,
            QueueModeArg::PerGroup => QueueMode::PerGroup,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if let Err(err) = dispatch(cli.command) {
        eprintln!("error: {err:#}");
        process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "mind_vectorized=debug",
        _ => "mind_vectorized=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(false).try_init();
}

fn dispatch(command: Command) -> Result<()> {
    match command {
        Command::Topology { cpuinfo } => {
            let topology = discover(&CpuInfoFile::new(cpuinfo));
            if topology.is_empty() {
                println!("no topology information available");
            } else {
                print!("{topology}");
            }
            Ok(())
        }
        Command::Run { config, rows, cols, threads, queue_mode, batch_size, claim_size } => {
            let mut engine = load_config(config)?;
            if let Some(threads) = threads {
                engine.runtime.threads = threads;
            }
            if let Some(mode) = queue_mode {
                engine.vectorized.queue_mode = mode.into();
            }
            if let Some(batch) = batch_size {
                engine.vectorized.batch_size = batch;
            }
            if let Some(claim) = claim_size {
                engine.vectorized.claim_size = claim;
            }
            engine.vectorized.validate()?;
            row_sum(engine, rows, cols)
        }
    }
}

fn load_config(path: Option<PathBuf>) -> Result<EngineConfig> {
    let path = match path {
        Some(path) => Some(path),
        None => {
            let cwd = std::env::current_dir().context("Failed to resolve current directory")?;
            find_config_file(&cwd).ok()
        }
    };
    match path {
        Some(path) => EngineConfig::load(&path),
        None => Ok(EngineConfig::default()),
    }
}

fn row_sum(engine: EngineConfig, rows: usize, cols: usize) -> Result<()> {
    let values: Vec<f64> = (0..rows * cols).map(|i| (i % 7) as f64).collect();
    let input = DenseMatrix::from_vec(rows, cols, values)?;

    let pipeline = Pipeline::<DenseMatrix<f64>>::new(|outs, ins, _| {
        let block = &ins[0];
        let mut sums = DenseMatrix::<f64>::zeros(block.num_rows(), 1);
        let mut total = 0.0;
        for r in 0..block.num_rows() {
            let s: f64 = block.row(r).iter().sum();
            sums.set(r, 0, s);
            total += s;
        }
        outs[0] = Some(sums);
        outs[1] = Some(DenseMatrix::from_vec(1, 1, vec![total])?);
        Ok(())
    });

    let ctx = ExecutionContext::new(engine.runtime.clone());
    let wrapper = MTWrapper::new(ctx, engine.vectorized.clone());
    let outputs = [OutputSpec::rows(rows, 1), OutputSpec::scalar(VectorCombine::Add)];

    let start = Instant::now();
    let result = wrapper
        .run(&pipeline, &[PipelineInput::rows(&input)], &outputs, vec![None, None])
        .context("row-sum pipeline failed")?;
    let elapsed = start.elapsed();

    let stats = &result.stats;
    println!("rows            {rows} x {cols}");
    println!("queue mode      {}", engine.vectorized.queue_mode);
    println!("workers         {} cpu, {} accelerator", stats.cpu_workers, stats.accelerator_workers);
    println!("queues / tasks  {} / {}", stats.queues, stats.tasks);
    println!("elapsed         {:.3} ms", elapsed.as_secs_f64() * 1e3);
    println!("total           {}", result.outputs[1].get(0, 0));
    for (worker, (executed, stolen)) in stats.tasks_per_worker.iter().zip(&stats.stolen_per_worker).enumerate() {
        println!("  worker {worker:>3}  {executed:>6} tasks  ({stolen} stolen)");
    }
    Ok(())
}
