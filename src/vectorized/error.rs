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

use std::error::Error;

use crate::config::ConfigError;
use crate::matrix::{MatrixError, MatrixKind};
use crate::runtime::{DeviceKind, RuntimeError};
use crate::vectorized::partition::PartitionError;
use crate::vectorized::queue::QueueClosed;

/// Error type returned by pipeline functions.
pub type PipelineError = Box<dyn Error + Send + Sync + 'static>;

/// Errors surfaced by a vectorized pipeline run.
///
/// A run either returns every declared output complete, or one of these.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Partition(#[from] PartitionError),
    #[error(transparent)]
    Queue(#[from] QueueClosed),
    /// No CPU or accelerator worker would run.
    #[error("no workers available to execute the pipeline")]
    NoWorkers,
    /// The pipeline has no stage for the requested device class.
    #[error("pipeline has no {0} stage")]
    MissingStage(DeviceKind),
    /// Accumulation was requested on an output that cannot accumulate.
    #[error("output {output}: accumulation combine is not supported for {kind} matrices")]
    UnsupportedCombine { output: usize, kind: MatrixKind },
    /// Row-partitioned inputs disagree on their row count.
    #[error("input {input} has {found} rows, expected {expected}")]
    InputRows { input: usize, expected: usize, found: usize },
    /// The number of pre-materialised outputs differs from the declared outputs.
    #[error("{found} output slots supplied for {expected} declared outputs")]
    OutputCount { expected: usize, found: usize },
    /// A pipeline function returned without filling an output slot.
    #[error("task {task} left output {output} unset")]
    MissingOutput { task: usize, output: usize },
    /// A pipeline function failed inside a worker.
    #[error("worker {worker} failed on task {task}")]
    Pipeline {
        worker: usize,
        task: usize,
        #[source]
        source: PipelineError,
    },
    /// A partial or final output could not be merged.
    #[error("output {output}: {source}")]
    Combine {
        output: usize,
        #[source]
        source: MatrixError,
    },
    /// Slicing an input for a task failed.
    #[error("input {input}: {source}")]
    Slice {
        input: usize,
        #[source]
        source: MatrixError,
    },
    /// Staging task rows to an accelerator failed.
    #[error("worker {worker}: {source}")]
    Device {
        worker: usize,
        #[source]
        source: RuntimeError,
    },
    /// A worker thread panicked or could not be spawned.
    #[error("worker {worker} terminated abnormally: {message}")]
    WorkerAborted { worker: usize, message: String },
}
