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

//! Pipeline descriptors: the compiled function plus its input split and
//! output combine policies.

use std::fmt;

use crate::matrix::Matrix;
use crate::runtime::{AcceleratorDevice, DeviceKind, ExecutionContext};
use crate::vectorized::error::PipelineError;
use crate::vectorized::task::Task;

/// How an input is handed to tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorSplit {
    /// Each task receives rows `[begin, end)`.
    Rows,
    /// Each task receives the whole matrix.
    None,
}

/// How per-task partial outputs are merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorCombine {
    /// Concatenate row blocks at their task's row offset.
    Rows,
    /// Elementwise sum of every partial.
    Add,
}

impl fmt::Display for VectorCombine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VectorCombine::Rows => write!(f, "rows"),
            VectorCombine::Add => write!(f, "add"),
        }
    }
}

/// One pipeline input.
#[derive(Debug, Clone, Copy)]
pub struct PipelineInput<'a, M> {
    pub matrix: &'a M,
    pub split: VectorSplit,
}

impl<'a, M> PipelineInput<'a, M> {
    pub fn rows(matrix: &'a M) -> Self {
        Self { matrix, split: VectorSplit::Rows }
    }

    pub fn broadcast(matrix: &'a M) -> Self {
        Self { matrix, split: VectorSplit::None }
    }
}

/// Declared properties of one pipeline output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputSpec {
    pub combine: VectorCombine,
    pub rows: Option<usize>,
    pub cols: Option<usize>,
    pub scalar: bool,
}

impl OutputSpec {
    /// Row-concatenated output of known shape.
    pub fn rows(rows: usize, cols: usize) -> Self {
        Self { combine: VectorCombine::Rows, rows: Some(rows), cols: Some(cols), scalar: false }
    }

    /// Accumulated output of known shape.
    pub fn add(rows: usize, cols: usize) -> Self {
        Self { combine: VectorCombine::Add, rows: Some(rows), cols: Some(cols), scalar: false }
    }

    /// Output whose shape is only known once tasks have run.
    pub fn unknown(combine: VectorCombine) -> Self {
        Self { combine, rows: None, cols: None, scalar: false }
    }

    /// Single-value output, stored as a 1x1 matrix.
    pub fn scalar(combine: VectorCombine) -> Self {
        Self { combine, rows: Some(1), cols: Some(1), scalar: true }
    }

    /// `(rows, cols)` when both dimensions are declared.
    pub fn known_shape(&self) -> Option<(usize, usize)> {
        if self.scalar {
            return Some((1, 1));
        }
        self.rows.zip(self.cols)
    }
}

/// Per-invocation information passed to a pipeline function.
#[derive(Clone, Copy)]
pub struct TaskContext<'a> {
    pub worker_id: usize,
    pub device: DeviceKind,
    pub task: Task,
    /// Set for accelerator workers.
    pub accelerator: Option<&'a dyn AcceleratorDevice>,
    /// Row-partitioned inputs were made resident before the run.
    pub prefetched: bool,
    pub context: &'a ExecutionContext,
}

impl fmt::Debug for TaskContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskContext")
            .field("worker_id", &self.worker_id)
            .field("device", &self.device)
            .field("task", &self.task)
            .field("accelerator", &self.accelerator.map(|d| d.id()))
            .field("prefetched", &self.prefetched)
            .finish()
    }
}

/// Compiled pipeline body.
///
/// Called once per task with one empty slot per declared output, the task's
/// view of every input, and the task context. Every slot must be filled.
pub type PipelineFn<M> =
    dyn Fn(&mut [Option<M>], &[M], &TaskContext<'_>) -> Result<(), PipelineError> + Send + Sync;

/// A pipeline with a CPU stage and an optional accelerator stage.
pub struct Pipeline<M: Matrix> {
    cpu: Box<PipelineFn<M>>,
    accelerator: Option<Box<PipelineFn<M>>>,
}

impl<M: Matrix> Pipeline<M> {
    pub fn new<F>(cpu: F) -> Self
    where
        F: Fn(&mut [Option<M>], &[M], &TaskContext<'_>) -> Result<(), PipelineError> + Send + Sync + 'static,
    {
        Self { cpu: Box::new(cpu), accelerator: None }
    }

    pub fn with_accelerator<F>(mut self, stage: F) -> Self
    where
        F: Fn(&mut [Option<M>], &[M], &TaskContext<'_>) -> Result<(), PipelineError> + Send + Sync + 'static,
    {
        self.accelerator = Some(Box::new(stage));
        self
    }

    /// Number of compiled stages. Accelerator workers are only started when
    /// there is more than one.
    pub fn stage_count(&self) -> usize {
        1 + usize::from(self.accelerator.is_some())
    }

    pub fn stage(&self, device: DeviceKind) -> Option<&PipelineFn<M>> {
        match device {
            DeviceKind::Cpu => Some(self.cpu.as_ref()),
            DeviceKind::Accelerator => self.accelerator.as_deref(),
        }
    }
}

impl<M: Matrix> fmt::Debug for Pipeline<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline").field("stages", &self.stage_count()).finish()
    }
}
