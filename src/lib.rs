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

//! MIND vectorized execution engine.
//!
//! Runs a compiled pipeline over row-partitioned matrices on a pool of CPU
//! and accelerator worker threads, then recombines the partial results.

pub mod config;
pub mod matrix;
pub mod runtime;
pub mod vectorized;

pub use config::{EngineConfig, QueueMode, RuntimeConfig, StealLogic, VectorizedConfig};
pub use matrix::{gen_given_vals, CsrMatrix, DenseMatrix, Matrix, MatrixError, MatrixKind};
pub use runtime::{AcceleratorDevice, DeviceKind, ExecutionContext, RuntimeError};
pub use vectorized::{ExecError, MTWrapper, OutputSpec, Pipeline, PipelineInput, RunStats};
