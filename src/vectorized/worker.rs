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

//! Worker threads.
//!
//! Every worker runs the same loop: claim up to `claim_size` tasks from its
//! own queue, run the pipeline stage for its device class over each task and
//! fold the result into its private partial outputs. Once the own queue has
//! ended, the worker visits its steal victims in order until all are empty.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, trace, warn};

use crate::matrix::Matrix;
use crate::runtime::{AcceleratorDevice, DeviceKind, ExecutionContext};
use crate::vectorized::combine::PartialOutput;
use crate::vectorized::error::ExecError;
use crate::vectorized::pipeline::{OutputSpec, Pipeline, PipelineFn, PipelineInput, TaskContext, VectorSplit};
use crate::vectorized::queue::TaskQueue;
use crate::vectorized::task::Task;

/// Placement and device binding of a worker.
#[derive(Debug, Clone)]
pub enum WorkerStrategy {
    /// CPU worker sharing the single central queue.
    SingleQueue,
    /// CPU worker owning one queue, optionally pinned to `core`.
    PerCore { core: Option<u32> },
    /// CPU worker sharing the queue of physical package `group`.
    PerGroup { group: u32, core: Option<u32> },
    /// Controller thread of one accelerator device.
    Accelerator {
        device: Arc<dyn AcceleratorDevice>,
        /// Row-partitioned inputs are already resident on the device.
        prefetched: bool,
    },
}

impl WorkerStrategy {
    pub fn device_kind(&self) -> DeviceKind {
        match self {
            WorkerStrategy::Accelerator { .. } => DeviceKind::Accelerator,
            _ => DeviceKind::Cpu,
        }
    }

    pub fn pinned_processor(&self) -> Option<u32> {
        match self {
            WorkerStrategy::PerCore { core } | WorkerStrategy::PerGroup { core, .. } => *core,
            _ => None,
        }
    }
}

/// One worker, created before the run and consumed by its thread.
#[derive(Debug, Clone)]
pub struct Worker {
    pub id: usize,
    pub strategy: WorkerStrategy,
    /// Index of the worker's own queue.
    pub queue: usize,
    /// Sibling queues visited, in order, once the own queue has ended.
    pub steal_order: Vec<usize>,
    /// Maximum tasks claimed per queue access.
    pub claim_size: usize,
    pub verbose: bool,
}

/// What a worker hands back after it is joined.
#[derive(Debug)]
pub struct WorkerOutput<M> {
    pub worker_id: usize,
    pub device: DeviceKind,
    /// One partial per declared output.
    pub partials: Vec<PartialOutput<M>>,
    pub tasks_executed: usize,
    pub tasks_stolen: usize,
}

/// State shared read-only by every worker of one run.
pub(crate) struct SharedRun<'a, M: Matrix> {
    pub queues: &'a [TaskQueue],
    pub pipeline: &'a Pipeline<M>,
    pub inputs: &'a [PipelineInput<'a, M>],
    pub outputs: &'a [OutputSpec],
    pub context: &'a ExecutionContext,
    /// Raised by the first failing worker so the others stop early.
    pub abort: &'a AtomicBool,
}

impl Worker {
    pub(crate) fn run<M: Matrix>(&self, shared: &SharedRun<'_, M>) -> Result<WorkerOutput<M>, ExecError> {
        let result = self.run_inner(shared);
        if result.is_err() {
            shared.abort.store(true, Ordering::Release);
        }
        result
    }

    fn run_inner<M: Matrix>(&self, shared: &SharedRun<'_, M>) -> Result<WorkerOutput<M>, ExecError> {
        let device = self.strategy.device_kind();
        let stage = shared.pipeline.stage(device).ok_or(ExecError::MissingStage(device))?;

        if let Some(processor) = self.strategy.pinned_processor() {
            if pin_to_processor(processor) {
                debug!(worker = self.id, processor, "pinned worker");
            } else {
                warn!(worker = self.id, processor, "could not pin worker, running unpinned");
            }
        }

        let accelerator = match &self.strategy {
            WorkerStrategy::Accelerator { device, prefetched } => Some((device.as_ref(), *prefetched)),
            _ => None,
        };
        if let Some((dev, _)) = accelerator {
            for (i, input) in shared.inputs.iter().enumerate() {
                if input.split == VectorSplit::None {
                    dev.stage(i, 0..input.matrix.num_rows(), input.matrix.buffer_size())
                        .map_err(|source| ExecError::Device { worker: self.id, source })?;
                }
            }
        }

        let mut partials: Vec<PartialOutput<M>> =
            shared.outputs.iter().map(|o| PartialOutput::new(o.combine)).collect();
        let mut tasks_executed = 0;
        let mut tasks_stolen = 0;
        let mut batch = Vec::with_capacity(self.claim_size);

        loop {
            batch.clear();
            if shared.queues[self.queue].pop_batch(self.claim_size, &mut batch) == 0 {
                match self.steal(shared.queues) {
                    Some(task) => {
                        tasks_stolen += 1;
                        batch.push(task);
                    }
                    None => break,
                }
            }
            for &task in &batch {
                if shared.abort.load(Ordering::Acquire) {
                    debug!(worker = self.id, "run aborted, worker stopping");
                    return Ok(self.finish(device, partials, tasks_executed, tasks_stolen));
                }
                self.execute(task, stage, accelerator, shared, &mut partials)?;
                tasks_executed += 1;
            }
        }

        if let Some((dev, _)) = accelerator {
            dev.synchronize().map_err(|source| ExecError::Device { worker: self.id, source })?;
        }
        Ok(self.finish(device, partials, tasks_executed, tasks_stolen))
    }

    fn finish<M>(
        &self,
        device: DeviceKind,
        partials: Vec<PartialOutput<M>>,
        tasks_executed: usize,
        tasks_stolen: usize,
    ) -> WorkerOutput<M> {
        debug!(worker = self.id, %device, tasks_executed, tasks_stolen, "worker finished");
        WorkerOutput { worker_id: self.id, device, partials, tasks_executed, tasks_stolen }
    }

    fn steal(&self, queues: &[TaskQueue]) -> Option<Task> {
        let task = self.steal_order.iter().find_map(|&victim| queues[victim].steal());
        if let Some(task) = task {
            trace!(worker = self.id, %task, "stole task");
        }
        task
    }

    fn execute<M: Matrix>(
        &self,
        task: Task,
        stage: &PipelineFn<M>,
        accelerator: Option<(&dyn AcceleratorDevice, bool)>,
        shared: &SharedRun<'_, M>,
        partials: &mut [PartialOutput<M>],
    ) -> Result<(), ExecError> {
        if self.verbose {
            info!(worker = self.id, %task, "executing task");
        }

        let mut args = Vec::with_capacity(shared.inputs.len());
        for (i, input) in shared.inputs.iter().enumerate() {
            match input.split {
                VectorSplit::Rows => {
                    let view = input
                        .matrix
                        .slice_rows(task.begin, task.end)
                        .map_err(|source| ExecError::Slice { input: i, source })?;
                    if let Some((dev, false)) = accelerator {
                        dev.stage(i, task.rows(), view.buffer_size())
                            .map_err(|source| ExecError::Device { worker: self.id, source })?;
                    }
                    args.push(view);
                }
                VectorSplit::None => args.push(input.matrix.clone()),
            }
        }

        let ctx = TaskContext {
            worker_id: self.id,
            device: self.strategy.device_kind(),
            task,
            accelerator: accelerator.map(|(dev, _)| dev),
            prefetched: accelerator.is_some_and(|(_, prefetched)| prefetched),
            context: shared.context,
        };
        let mut slots: Vec<Option<M>> = vec![None; shared.outputs.len()];
        stage(slots.as_mut_slice(), args.as_slice(), &ctx)
            .map_err(|source| ExecError::Pipeline { worker: self.id, task: task.index, source })?;

        for (output, (slot, partial)) in slots.into_iter().zip(partials.iter_mut()).enumerate() {
            let block = slot.ok_or(ExecError::MissingOutput { task: task.index, output })?;
            partial
                .absorb(task, block)
                .map_err(|source| ExecError::Combine { output, source })?;
        }
        Ok(())
    }
}

/// Best-effort pinning of the calling thread to one logical processor.
#[cfg(target_os = "linux")]
pub fn pin_to_processor(processor: u32) -> bool {
    let cpu = processor as usize;
    if cpu >= libc::CPU_SETSIZE as usize {
        return false;
    }
    // SAFETY: a zeroed cpu_set_t is a valid empty set, `cpu` is below
    // CPU_SETSIZE, and pid 0 targets the calling thread.
    unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_SET(cpu, &mut set);
        libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set) == 0
    }
}

#[cfg(not(target_os = "linux"))]
pub fn pin_to_processor(_processor: u32) -> bool {
    false
}
