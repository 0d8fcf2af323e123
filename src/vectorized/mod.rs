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

//! Vectorized pipeline execution.
//!
//! [`MTWrapper`] partitions the rows of a pipeline's inputs into [`Task`]s,
//! hands them to CPU and accelerator [`Worker`]s through one or more
//! [`TaskQueue`]s and merges the per-worker partial outputs.
//!
//! ```text
//! MTWrapper ──► LoadPartitioner ──► TaskQueue(s) ──► Worker threads
//!     ▲                                                   │
//!     └──────────────── combine partial outputs ◄─────────┘
//! ```

pub mod combine;
pub mod error;
pub mod partition;
pub mod pipeline;
pub mod queue;
pub mod task;
pub mod topology;
pub mod worker;
pub mod wrapper;

pub use combine::PartialOutput;
pub use error::{ExecError, PipelineError};
pub use partition::{partition, split_blocks, LoadPartitioner, PartitionError, PartitionScheme};
pub use pipeline::{OutputSpec, Pipeline, PipelineFn, PipelineInput, TaskContext, VectorCombine, VectorSplit};
pub use queue::{QueueClosed, TaskQueue};
pub use task::Task;
pub use topology::{discover, CpuInfoFile, StaticTopology, Topology, TopologySource, CPUINFO_PATH};
pub use worker::{pin_to_processor, Worker, WorkerOutput, WorkerStrategy};
pub use wrapper::{MTWrapper, Phase, RunResult, RunStats};
