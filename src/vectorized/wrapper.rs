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

//! Orchestrator of a vectorized pipeline run.
//!
//! A run moves through [`Phase`]s in order. Validation happens entirely in
//! `Configuring`, before any output is allocated or any task is queued, so a
//! rejected run has no side effects on devices or threads.

use std::any::Any;
use std::fmt;
use std::ops::Range;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;

use tracing::{debug, info, warn};

use crate::config::{QueueMode, StealLogic, VectorizedConfig};
use crate::matrix::Matrix;
use crate::runtime::{AcceleratorDevice, DeviceKind, ExecutionContext};
use crate::vectorized::combine::{combine_output, PartialOutput};
use crate::vectorized::error::ExecError;
use crate::vectorized::partition::{split_blocks, LoadPartitioner};
use crate::vectorized::pipeline::{OutputSpec, Pipeline, PipelineInput, VectorCombine, VectorSplit};
use crate::vectorized::queue::TaskQueue;
use crate::vectorized::task::Task;
use crate::vectorized::topology::{discover, CpuInfoFile, Topology, TopologySource};
use crate::vectorized::worker::{SharedRun, Worker, WorkerOutput, WorkerStrategy};

/// Lifecycle of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Configuring,
    Allocating,
    Running,
    Combining,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Configuring => "configuring",
            Phase::Allocating => "allocating",
            Phase::Running => "running",
            Phase::Combining => "combining",
            Phase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub total_rows: usize,
    pub cpu_workers: usize,
    pub accelerator_workers: usize,
    pub queues: usize,
    pub tasks: usize,
    /// Bytes of inputs and pre-allocated outputs.
    pub mem_required: usize,
    /// Tasks executed by each worker, indexed by worker id.
    pub tasks_per_worker: Vec<usize>,
    /// Tasks each worker took from a sibling queue.
    pub stolen_per_worker: Vec<usize>,
    /// Whether inputs were prefetched, per accelerator device.
    pub prefetched: Vec<bool>,
}

/// Outputs of a run together with its statistics.
#[derive(Debug)]
pub struct RunResult<M> {
    pub outputs: Vec<M>,
    pub stats: RunStats,
}

/// Multi-threaded wrapper that runs a [`Pipeline`] over row-partitioned inputs.
#[derive(Debug, Clone)]
pub struct MTWrapper {
    context: ExecutionContext,
    config: VectorizedConfig,
    topology: Topology,
}

/// Releases device residency when a run ends, on every exit path.
struct ReleaseGuard<'a> {
    devices: &'a [Arc<dyn AcceleratorDevice>],
}

impl Drop for ReleaseGuard<'_> {
    fn drop(&mut self) {
        for device in self.devices {
            device.release();
        }
    }
}

/// Queue layout and workers of one run.
struct Plan {
    queues: Vec<TaskQueue>,
    workers: Vec<Worker>,
    tasks: usize,
}

impl MTWrapper {
    /// Wrapper using the topology in `/proc/cpuinfo`.
    pub fn new(context: ExecutionContext, config: VectorizedConfig) -> Self {
        Self::with_topology_source(context, config, &CpuInfoFile::default())
    }

    pub fn with_topology_source(
        context: ExecutionContext,
        config: VectorizedConfig,
        source: &dyn TopologySource,
    ) -> Self {
        Self::with_topology(context, config, discover(source))
    }

    pub fn with_topology(context: ExecutionContext, config: VectorizedConfig, topology: Topology) -> Self {
        Self { context, config, topology }
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn cpu_workers(&self) -> usize {
        self.context.cpu_threads()
    }

    /// Devices that get a worker when running `pipeline`.
    pub fn accelerator_devices<M: Matrix>(&self, pipeline: &Pipeline<M>) -> &[Arc<dyn AcceleratorDevice>] {
        if self.context.use_accelerators() && pipeline.stage_count() > 1 {
            self.context.accelerators()
        } else {
            &[]
        }
    }

    /// Run `pipeline` and return one matrix per declared output.
    pub fn execute<M: Matrix>(
        &self,
        pipeline: &Pipeline<M>,
        inputs: &[PipelineInput<'_, M>],
        outputs: &[OutputSpec],
    ) -> Result<Vec<M>, ExecError> {
        Ok(self.run(pipeline, inputs, outputs, vec![None; outputs.len()])?.outputs)
    }

    /// Like [`MTWrapper::execute`], writing into already-allocated outputs
    /// where `existing` holds one.
    pub fn execute_with<M: Matrix>(
        &self,
        pipeline: &Pipeline<M>,
        inputs: &[PipelineInput<'_, M>],
        outputs: &[OutputSpec],
        existing: Vec<Option<M>>,
    ) -> Result<Vec<M>, ExecError> {
        Ok(self.run(pipeline, inputs, outputs, existing)?.outputs)
    }

    pub fn run<M: Matrix>(
        &self,
        pipeline: &Pipeline<M>,
        inputs: &[PipelineInput<'_, M>],
        outputs: &[OutputSpec],
        mut existing: Vec<Option<M>>,
    ) -> Result<RunResult<M>, ExecError> {
        enter(Phase::Configuring);
        self.config.validate()?;
        for (output, spec) in outputs.iter().enumerate() {
            if spec.combine == VectorCombine::Add && !M::KIND.supports_accumulate() {
                return Err(ExecError::UnsupportedCombine { output, kind: M::KIND });
            }
        }
        if existing.len() != outputs.len() {
            return Err(ExecError::OutputCount { expected: outputs.len(), found: existing.len() });
        }
        let total_rows = row_count(inputs)?;
        let cpu_workers = self.cpu_workers();
        let devices = self.accelerator_devices(pipeline);
        if cpu_workers + devices.len() == 0 {
            return Err(ExecError::NoWorkers);
        }
        let mut mem_required: usize =
            inputs.iter().filter(|i| i.split == VectorSplit::Rows).map(|i| i.matrix.buffer_size()).sum();
        debug!(total_rows, cpu_workers, accelerators = devices.len(), queue_mode = %self.config.queue_mode, "configured run");

        enter(Phase::Allocating);
        for (slot, spec) in existing.iter_mut().zip(outputs) {
            if slot.is_none() {
                if let Some((rows, cols)) = spec.known_shape() {
                    *slot = Some(M::create(rows, cols, spec.combine == VectorCombine::Add));
                }
            }
            if let Some(out) = slot {
                mem_required += out.buffer_size();
            }
        }

        let _release = ReleaseGuard { devices };
        let prefetched: Vec<bool> = devices.iter().map(|d| self.prefetch(d.as_ref(), inputs, mem_required)).collect();

        enter(Phase::Running);
        let plan = self.plan(total_rows, cpu_workers, devices, &prefetched)?;
        let abort = AtomicBool::new(false);
        let shared = SharedRun {
            queues: &plan.queues,
            pipeline,
            inputs,
            outputs,
            context: &self.context,
            abort: &abort,
        };
        let results = spawn_and_join(&plan.workers, &shared)?;

        enter(Phase::Combining);
        let stats = RunStats {
            total_rows,
            cpu_workers,
            accelerator_workers: devices.len(),
            queues: plan.queues.len(),
            tasks: plan.tasks,
            mem_required,
            tasks_per_worker: results.iter().map(|w| w.tasks_executed).collect(),
            stolen_per_worker: results.iter().map(|w| w.tasks_stolen).collect(),
            prefetched,
        };
        let mut per_output: Vec<Vec<PartialOutput<M>>> = outputs.iter().map(|_| Vec::new()).collect();
        for result in results {
            for (partials, partial) in per_output.iter_mut().zip(result.partials) {
                partials.push(partial);
            }
        }
        let mut combined = Vec::with_capacity(outputs.len());
        for (index, ((spec, partials), slot)) in outputs.iter().zip(per_output).zip(existing).enumerate() {
            combined.push(combine_output(index, spec, total_rows, slot, partials)?);
        }

        enter(Phase::Done);
        info!(total_rows, tasks = stats.tasks, workers = stats.tasks_per_worker.len(), "vectorized pipeline finished");
        Ok(RunResult { outputs: combined, stats })
    }

    /// Prefetch the row-partitioned inputs to `device` when the run fits its
    /// budget. Broadcast inputs are staged once by the accelerator worker.
    fn prefetch<M: Matrix>(&self, device: &dyn AcceleratorDevice, inputs: &[PipelineInput<'_, M>], mem_required: usize) -> bool {
        let budget = device.mem_budget();
        let ratio = if budget == 0 { f64::INFINITY } else { mem_required as f64 / budget as f64 };
        if ratio >= self.config.prefetch_ratio {
            debug!(device = device.id(), mem_required, budget, "inputs exceed prefetch budget, staging per task");
            return false;
        }
        for (i, input) in inputs.iter().enumerate().filter(|(_, input)| input.split == VectorSplit::Rows) {
            if let Err(err) = device.prefetch(i, input.matrix.buffer_size()) {
                warn!(device = device.id(), input = i, error = %err, "prefetch failed, staging per task");
                return false;
            }
        }
        debug!(device = device.id(), mem_required, budget, "prefetched inputs");
        true
    }

    fn plan(
        &self,
        total_rows: usize,
        cpu_workers: usize,
        devices: &[Arc<dyn AcceleratorDevice>],
        prefetched: &[bool],
    ) -> Result<Plan, ExecError> {
        let batch_size = self.config.batch_size;
        let claim_size = self.config.claim_size;
        let scheme = self.config.partitioning;
        let verbose = self.config.verbose;
        let accelerator = |id: usize, queue: usize, d: usize| Worker {
            id,
            strategy: WorkerStrategy::Accelerator { device: Arc::clone(&devices[d]), prefetched: prefetched[d] },
            queue,
            steal_order: Vec::new(),
            claim_size,
            verbose,
        };

        if self.config.queue_mode == QueueMode::Centralized {
            let total_workers = cpu_workers + devices.len();
            let tasks = LoadPartitioner::new(scheme, total_workers, batch_size)?.tasks(0..total_rows, 0);
            let queue = TaskQueue::new();
            let count = tasks.len();
            queue.extend(tasks)?;
            queue.close();
            let mut workers: Vec<Worker> = (0..cpu_workers)
                .map(|id| Worker {
                    id,
                    strategy: WorkerStrategy::SingleQueue,
                    queue: 0,
                    steal_order: Vec::new(),
                    claim_size,
                    verbose,
                })
                .collect();
            workers.extend((0..devices.len()).map(|d| accelerator(cpu_workers + d, 0, d)));
            return Ok(Plan { queues: vec![queue], workers, tasks: count });
        }

        let (cpu_rows, accel_rows): (Range<usize>, Range<usize>) = if devices.is_empty() {
            (0..total_rows, total_rows..total_rows)
        } else if cpu_workers == 0 {
            (0..0, 0..total_rows)
        } else {
            let blocks = split_blocks(total_rows, &[cpu_workers, devices.len()]);
            (blocks[0].clone(), blocks[1].clone())
        };

        let placement = self.cpu_placement(cpu_workers);
        let num_cpu_queues = match self.config.queue_mode {
            QueueMode::PerGroup => placement.iter().map(|p| p.queue + 1).max().unwrap_or(0),
            _ => cpu_workers,
        };
        let mut queues: Vec<TaskQueue> = (0..num_cpu_queues).map(|_| TaskQueue::new()).collect();

        let mut count = 0;
        if cpu_workers > 0 {
            let tasks = LoadPartitioner::new(scheme, cpu_workers, batch_size)?.tasks(cpu_rows, 0);
            count += tasks.len();
            distribute(&queues, tasks)?;
        }

        let mut workers: Vec<Worker> = placement
            .iter()
            .enumerate()
            .map(|(id, p)| Worker {
                id,
                strategy: match self.config.queue_mode {
                    QueueMode::PerGroup => WorkerStrategy::PerGroup { group: p.group, core: p.core },
                    _ => WorkerStrategy::PerCore { core: p.core },
                },
                queue: p.queue,
                steal_order: self.steal_order(p, &placement, num_cpu_queues),
                claim_size,
                verbose,
            })
            .collect();

        if !devices.is_empty() {
            let queue = TaskQueue::new();
            let tasks = LoadPartitioner::new(scheme, devices.len(), batch_size)?.tasks(accel_rows, count);
            count += tasks.len();
            queue.extend(tasks)?;
            queues.push(queue);
            workers.extend((0..devices.len()).map(|d| accelerator(cpu_workers + d, num_cpu_queues, d)));
        }
        queues.iter().for_each(TaskQueue::close);
        Ok(Plan { queues, workers, tasks: count })
    }

    /// Queue, physical group and pinning target of every CPU worker.
    ///
    /// Under per-group distribution queues are numbered by ascending physical
    /// id over the groups that received at least one worker.
    fn cpu_placement(&self, cpu_workers: usize) -> Vec<Placement> {
        let unique = &self.topology.unique_processors;
        let located: Vec<(Option<u32>, u32)> = (0..cpu_workers)
            .map(|i| {
                let processor = (!unique.is_empty()).then(|| unique[i % unique.len()]);
                let group = processor.and_then(|p| self.topology.physical_id_of(p)).unwrap_or(0);
                (processor, group)
            })
            .collect();
        let mut used_groups: Vec<u32> = located.iter().map(|&(_, g)| g).collect();
        used_groups.sort_unstable();
        used_groups.dedup();
        located
            .into_iter()
            .enumerate()
            .map(|(i, (processor, group))| {
                let queue = match self.config.queue_mode {
                    QueueMode::PerGroup => used_groups.iter().position(|&g| g == group).unwrap_or(0),
                    _ => i,
                };
                let core = if self.config.pin_workers { processor } else { None };
                Placement { queue, group, core }
            })
            .collect()
    }

    fn steal_order(&self, own: &Placement, placement: &[Placement], num_queues: usize) -> Vec<usize> {
        let wrapped = (own.queue + 1..num_queues).chain(0..own.queue);
        match (self.config.steal_logic, self.config.queue_mode) {
            (StealLogic::Off, _) | (_, QueueMode::Centralized) => Vec::new(),
            (StealLogic::Sequential, _) => wrapped.collect(),
            (StealLogic::SequentialPriority, QueueMode::PerGroup) => Vec::new(),
            (StealLogic::SequentialPriority, QueueMode::PerCpu) => {
                let group_of = |q: usize| placement[q].group;
                let (mut near, far): (Vec<usize>, Vec<usize>) = wrapped.partition(|&q| group_of(q) == own.group);
                near.extend(far);
                near
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Placement {
    queue: usize,
    group: u32,
    core: Option<u32>,
}

fn enter(phase: Phase) {
    debug!(%phase, "vectorized pipeline phase");
}

/// Common row count of the row-partitioned inputs, `0` when there are none.
fn row_count<M: Matrix>(inputs: &[PipelineInput<'_, M>]) -> Result<usize, ExecError> {
    let mut rows = None;
    for (input, p) in inputs.iter().enumerate() {
        if p.split != VectorSplit::Rows {
            continue;
        }
        let found = p.matrix.num_rows();
        match rows {
            None => rows = Some(found),
            Some(expected) if expected != found => {
                return Err(ExecError::InputRows { input, expected, found });
            }
            Some(_) => {}
        }
    }
    Ok(rows.unwrap_or(0))
}

/// Deal tasks round-robin over `queues`.
fn distribute(queues: &[TaskQueue], tasks: Vec<Task>) -> Result<(), ExecError> {
    if queues.is_empty() {
        return Ok(());
    }
    for (i, task) in tasks.into_iter().enumerate() {
        queues[i % queues.len()].push(task)?;
    }
    Ok(())
}

fn spawn_and_join<M: Matrix>(workers: &[Worker], shared: &SharedRun<'_, M>) -> Result<Vec<WorkerOutput<M>>, ExecError> {
    thread::scope(|scope| {
        let mut handles = Vec::with_capacity(workers.len());
        let mut spawn_error = None;
        for worker in workers {
            let kind = worker.strategy.device_kind();
            let name = match kind {
                DeviceKind::Cpu => format!("mind-vec-cpu-{}", worker.id),
                DeviceKind::Accelerator => format!("mind-vec-acc-{}", worker.id),
            };
            match thread::Builder::new().name(name).spawn_scoped(scope, move || worker.run(shared)) {
                Ok(handle) => handles.push((worker.id, handle)),
                Err(err) => {
                    shared.abort.store(true, std::sync::atomic::Ordering::Release);
                    spawn_error = Some(ExecError::WorkerAborted { worker: worker.id, message: err.to_string() });
                    break;
                }
            }
        }
        debug!(workers = handles.len(), "workers started");

        let mut outputs = Vec::with_capacity(handles.len());
        let mut first_error = spawn_error;
        for (id, handle) in handles {
            let result = handle
                .join()
                .unwrap_or_else(|payload| Err(ExecError::WorkerAborted { worker: id, message: panic_message(payload) }));
            match result {
                Ok(output) => outputs.push(output),
                Err(err) => {
                    warn!(worker = id, error = %err, "worker failed");
                    first_error.get_or_insert(err);
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(outputs),
        }
    })
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}
