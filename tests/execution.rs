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

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use mind_vectorized::config::{QueueMode, RuntimeConfig, StealLogic, VectorizedConfig};
use mind_vectorized::matrix::{CsrMatrix, DenseMatrix, Matrix};
use mind_vectorized::vectorized::{
    ExecError, MTWrapper, OutputSpec, PartitionScheme, Pipeline, PipelineInput, Topology, VectorCombine,
};
use mind_vectorized::ExecutionContext;

const MODES: [QueueMode; 3] = [QueueMode::Centralized, QueueMode::PerCpu, QueueMode::PerGroup];

fn topology() -> Topology {
    Topology {
        processors: vec![0, 1, 2, 3, 4, 5, 6, 7],
        physical_ids: vec![0, 0, 1, 1, 0, 0, 1, 1],
        unique_processors: vec![0, 1, 2, 3],
    }
}

fn wrapper(threads: usize, config: VectorizedConfig) -> MTWrapper {
    let ctx = ExecutionContext::new(RuntimeConfig { threads, accelerators: false });
    MTWrapper::with_topology(ctx, config, topology())
}

fn configs() -> Vec<VectorizedConfig> {
    let mut configs = Vec::new();
    for queue_mode in MODES {
        for (partitioning, batch_size) in [
            (PartitionScheme::Static, 1),
            (PartitionScheme::Batched, 1),
            (PartitionScheme::Guided, 2),
            (PartitionScheme::Factoring, 1),
        ] {
            configs.push(VectorizedConfig {
                queue_mode,
                partitioning,
                batch_size,
                ..VectorizedConfig::default()
            });
        }
    }
    configs
}

fn identity() -> Pipeline<DenseMatrix<f64>> {
    Pipeline::<DenseMatrix<f64>>::new(|outs, ins, _| {
        outs[0] = Some(ins[0].clone());
        Ok(())
    })
}

#[test]
fn identity_round_trip_reproduces_input() {
    let input = DenseMatrix::from_vec(4, 3, (1..=12).map(f64::from).collect()).unwrap();
    for config in configs() {
        for threads in [1, 2, 3, 5] {
            let out = wrapper(threads, config.clone())
                .execute(&identity(), &[PipelineInput::rows(&input)], &[OutputSpec::rows(4, 3)])
                .unwrap();
            assert_eq!(out[0], input, "{config:?} with {threads} threads");
        }
    }
}

#[test]
fn identity_with_unknown_output_shape() {
    let input = DenseMatrix::from_vec(7, 2, (0..14).map(f64::from).collect()).unwrap();
    let config = VectorizedConfig { partitioning: PartitionScheme::Batched, ..VectorizedConfig::default() };
    let out = wrapper(3, config)
        .execute(&identity(), &[PipelineInput::rows(&input)], &[OutputSpec::unknown(VectorCombine::Rows)])
        .unwrap();
    assert_eq!(out[0], input);
}

#[test]
fn accumulation_counts_every_row() {
    let rows = 1_000;
    let input = DenseMatrix::<f64>::zeros(rows, 1);
    let ones = Pipeline::<DenseMatrix<f64>>::new(|outs, ins, _| {
        let n = ins[0].num_rows() as f64;
        outs[0] = Some(DenseMatrix::from_vec(1, 1, vec![n])?);
        Ok(())
    });
    for config in configs() {
        for threads in [1, 4, 7] {
            let out = wrapper(threads, config.clone())
                .execute(&ones, &[PipelineInput::rows(&input)], &[OutputSpec::add(1, 1)])
                .unwrap();
            assert_eq!(out[0].get(0, 0), rows as f64, "{config:?} with {threads} threads");
        }
    }
}

#[test]
fn broadcast_inputs_are_passed_whole() {
    let rows = DenseMatrix::from_vec(6, 1, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
    let offset = DenseMatrix::from_vec(1, 1, vec![10.0]).unwrap();
    let add_offset = Pipeline::<DenseMatrix<f64>>::new(|outs, ins, _| {
        let mut block = ins[0].clone();
        let delta = ins[1].get(0, 0);
        for v in block.values_mut() {
            *v += delta;
        }
        outs[0] = Some(block);
        Ok(())
    });
    let out = wrapper(3, VectorizedConfig::default())
        .execute(
            &add_offset,
            &[PipelineInput::rows(&rows), PipelineInput::broadcast(&offset)],
            &[OutputSpec::rows(6, 1)],
        )
        .unwrap();
    assert_eq!(out[0].values(), &[11.0, 12.0, 13.0, 14.0, 15.0, 16.0]);
    assert_eq!(rows.values(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
}

#[test]
fn row_and_sum_outputs_in_one_run() {
    let input = DenseMatrix::from_vec(5, 2, vec![1.0; 10]).unwrap();
    let sums = Pipeline::<DenseMatrix<f64>>::new(|outs, ins, _| {
        let block = &ins[0];
        let mut per_row = DenseMatrix::<f64>::zeros(block.num_rows(), 1);
        for r in 0..block.num_rows() {
            per_row.set(r, 0, block.row(r).iter().sum());
        }
        let total: f64 = block.values().iter().sum();
        outs[0] = Some(per_row);
        outs[1] = Some(DenseMatrix::from_vec(1, 1, vec![total])?);
        Ok(())
    });
    let result = wrapper(2, VectorizedConfig { queue_mode: QueueMode::PerCpu, ..VectorizedConfig::default() })
        .run(
            &sums,
            &[PipelineInput::rows(&input)],
            &[OutputSpec::rows(5, 1), OutputSpec::scalar(VectorCombine::Add)],
            vec![None, None],
        )
        .unwrap();
    assert_eq!(result.outputs[0].values(), &[2.0; 5]);
    assert_eq!(result.outputs[1].get(0, 0), 10.0);
    assert_eq!(result.stats.cpu_workers, 2);
    assert_eq!(result.stats.queues, 2);
    assert_eq!(result.stats.tasks_per_worker.iter().sum::<usize>(), result.stats.tasks);
}

#[test]
fn stealing_balances_a_lopsided_run() {
    let input = DenseMatrix::<f64>::zeros(64, 1);
    let config = VectorizedConfig {
        queue_mode: QueueMode::PerCpu,
        steal_logic: StealLogic::Sequential,
        partitioning: PartitionScheme::Batched,
        ..VectorizedConfig::default()
    };
    let result = wrapper(4, config)
        .run(&identity(), &[PipelineInput::rows(&input)], &[OutputSpec::rows(64, 1)], vec![None])
        .unwrap();
    assert_eq!(result.stats.tasks, 64);
    assert_eq!(result.stats.tasks_per_worker.iter().sum::<usize>(), 64);
    assert_eq!(result.outputs[0], input);
}

#[test]
fn pre_materialised_outputs_are_accumulated_into() {
    let input = DenseMatrix::<f64>::zeros(10, 1);
    let ones = Pipeline::<DenseMatrix<f64>>::new(|outs, ins, _| {
        outs[0] = Some(DenseMatrix::from_vec(1, 1, vec![ins[0].num_rows() as f64])?);
        Ok(())
    });
    let existing = DenseMatrix::from_vec(1, 1, vec![100.0]).unwrap();
    let out = wrapper(3, VectorizedConfig::default())
        .execute_with(&ones, &[PipelineInput::rows(&input)], &[OutputSpec::add(1, 1)], vec![Some(existing)])
        .unwrap();
    assert_eq!(out[0].get(0, 0), 110.0);
}

#[test]
fn csr_outputs_combine_by_rows() {
    let input: CsrMatrix<f64> =
        mind_vectorized::gen_given_vals(3, &[1.0, 0.0, 2.0, 0.0, 0.0, 3.0, 4.0, 5.0, 0.0]).unwrap();
    let identity = Pipeline::<CsrMatrix<f64>>::new(|outs, ins, _| {
        outs[0] = Some(ins[0].clone());
        Ok(())
    });
    for queue_mode in MODES {
        let config = VectorizedConfig { queue_mode, ..VectorizedConfig::default() };
        let out = wrapper(2, config)
            .execute(&identity, &[PipelineInput::rows(&input)], &[OutputSpec::rows(3, 3)])
            .unwrap();
        assert_eq!(out[0], input);
        assert_eq!(out[0].num_non_zeros(), 5);
    }
}

#[test]
fn add_on_csr_is_rejected_before_any_task_runs() {
    let input: CsrMatrix<f64> = CsrMatrix::empty(8, 2);
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let pipeline = Pipeline::<CsrMatrix<f64>>::new(move |outs, ins, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        outs[0] = Some(ins[0].clone());
        Ok(())
    });
    let err = wrapper(4, VectorizedConfig::default())
        .execute(&pipeline, &[PipelineInput::rows(&input)], &[OutputSpec::add(8, 2)])
        .unwrap_err();
    assert!(matches!(err, ExecError::UnsupportedCombine { output: 0, .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn pipeline_error_fails_the_run() {
    let input = DenseMatrix::<f64>::zeros(32, 1);
    let failing = Pipeline::<DenseMatrix<f64>>::new(|outs, ins, ctx| {
        if ctx.task.begin <= 16 && 16 < ctx.task.end {
            return Err("row 16 is poisoned".into());
        }
        outs[0] = Some(ins[0].clone());
        Ok(())
    });
    for queue_mode in MODES {
        let config = VectorizedConfig {
            queue_mode,
            partitioning: PartitionScheme::Batched,
            batch_size: 4,
            ..VectorizedConfig::default()
        };
        let err = wrapper(3, config)
            .execute(&failing, &[PipelineInput::rows(&input)], &[OutputSpec::rows(32, 1)])
            .unwrap_err();
        match err {
            ExecError::Pipeline { task, source, .. } => {
                assert_eq!(task, 4);
                assert_eq!(source.to_string(), "row 16 is poisoned");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}

#[test]
fn worker_panic_is_reported() {
    let input = DenseMatrix::<f64>::zeros(4, 1);
    let panicking = Pipeline::<DenseMatrix<f64>>::new(|_, _, _| panic!("kernel exploded"));
    let err = wrapper(2, VectorizedConfig::default())
        .execute(&panicking, &[PipelineInput::rows(&input)], &[OutputSpec::rows(4, 1)])
        .unwrap_err();
    match err {
        ExecError::WorkerAborted { message, .. } => assert!(message.contains("kernel exploded")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn zero_batch_size_is_a_configuration_error() {
    let input = DenseMatrix::<f64>::zeros(4, 1);
    let config = VectorizedConfig { batch_size: 0, ..VectorizedConfig::default() };
    let err = wrapper(2, config)
        .execute(&identity(), &[PipelineInput::rows(&input)], &[OutputSpec::rows(4, 1)])
        .unwrap_err();
    assert!(matches!(err, ExecError::Config(_)));
}

#[test]
fn empty_input_produces_empty_outputs() {
    let input = DenseMatrix::<f64>::zeros(0, 3);
    let result = wrapper(4, VectorizedConfig::default())
        .run(&identity(), &[PipelineInput::rows(&input)], &[OutputSpec::rows(0, 3)], vec![None])
        .unwrap();
    assert_eq!(result.stats.tasks, 0);
    assert_eq!(result.outputs[0].num_rows(), 0);
}
