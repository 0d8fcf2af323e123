use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use mind_vectorized::config::{QueueMode, RuntimeConfig, VectorizedConfig};
use mind_vectorized::matrix::{DenseMatrix, Matrix};
use mind_vectorized::vectorized::{partition, MTWrapper, OutputSpec, PartitionScheme, Pipeline, PipelineInput, VectorCombine};
use mind_vectorized::ExecutionContext;

const SCHEMES: &[(&str, PartitionScheme)] = &[
    ("static", PartitionScheme::Static),
    ("batched", PartitionScheme::Batched),
    ("guided", PartitionScheme::Guided),
    ("factoring", PartitionScheme::Factoring),
];

fn row_sum() -> Pipeline<DenseMatrix<f64>> {
    Pipeline::<DenseMatrix<f64>>::new(|outs, ins, _| {
        let total: f64 = ins[0].values().iter().sum();
        outs[0] = Some(DenseMatrix::from_vec(1, 1, vec![total])?);
        Ok(())
    })
}

fn bench_partition(c: &mut Criterion) {
    let mut group = c.benchmark_group("partition");

    for &(name, scheme) in SCHEMES {
        group.bench_with_input(BenchmarkId::new("1M_rows_16_workers", name), &scheme, |b, &scheme| {
            b.iter(|| partition(black_box(1_000_000), 16, 64, scheme).expect("partitioning failed"));
        });
    }

    group.finish();
}

fn bench_row_sum(c: &mut Criterion) {
    let mut group = c.benchmark_group("row_sum");
    let input = DenseMatrix::from_vec(200_000, 8, vec![1.0; 1_600_000]).expect("input");
    let pipeline = row_sum();
    let outputs = [OutputSpec::scalar(VectorCombine::Add)];

    for mode in [QueueMode::Centralized, QueueMode::PerCpu, QueueMode::PerGroup] {
        let config = VectorizedConfig {
            queue_mode: mode,
            partitioning: PartitionScheme::Batched,
            batch_size: 1_024,
            ..VectorizedConfig::default()
        };
        let wrapper = MTWrapper::new(ExecutionContext::new(RuntimeConfig::default()), config);
        group.bench_with_input(BenchmarkId::new("200k_x_8", mode), &wrapper, |b, wrapper| {
            b.iter(|| {
                let out = wrapper
                    .execute(&pipeline, &[PipelineInput::rows(black_box(&input))], &outputs)
                    .expect("run failed");
                assert_eq!(out[0].num_rows(), 1);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_partition, bench_row_sum);

criterion_main!(benches);
