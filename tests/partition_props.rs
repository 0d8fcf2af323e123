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

use mind_vectorized::vectorized::{partition, split_blocks, PartitionScheme, Task};
use proptest::prelude::*;

fn scheme() -> impl Strategy<Value = PartitionScheme> {
    prop_oneof![
        Just(PartitionScheme::Static),
        Just(PartitionScheme::Batched),
        Just(PartitionScheme::Guided),
        Just(PartitionScheme::Factoring),
    ]
}

fn assert_covers(tasks: &[Task], total_rows: usize) {
    let mut next = 0;
    for (i, task) in tasks.iter().enumerate() {
        assert_eq!(task.index, i);
        assert_eq!(task.begin, next, "gap or overlap before {task}");
        assert!(task.end > task.begin, "empty task {task}");
        next = task.end;
    }
    assert_eq!(next, total_rows);
}

proptest! {
    #[test]
    fn tasks_are_contiguous_and_cover_all_rows(
        total_rows in 0usize..5_000,
        workers in 1usize..64,
        batch in 1usize..128,
        scheme in scheme(),
    ) {
        let tasks = partition(total_rows, workers, batch, scheme).unwrap();
        assert_covers(&tasks, total_rows);
    }

    #[test]
    fn only_the_last_task_may_undercut_the_batch(
        total_rows in 1usize..5_000,
        workers in 1usize..64,
        batch in 1usize..128,
        scheme in scheme(),
    ) {
        let tasks = partition(total_rows, workers, batch, scheme).unwrap();
        let (last, rest) = tasks.split_last().unwrap();
        prop_assert!(rest.iter().all(|t| t.len() >= batch));
        prop_assert!(last.len() >= 1);
    }

    #[test]
    fn partitioning_is_deterministic(
        total_rows in 0usize..2_000,
        workers in 1usize..16,
        batch in 1usize..32,
        scheme in scheme(),
    ) {
        prop_assert_eq!(
            partition(total_rows, workers, batch, scheme).unwrap(),
            partition(total_rows, workers, batch, scheme).unwrap()
        );
    }

    #[test]
    fn static_never_exceeds_worker_count_without_batch_floor(
        total_rows in 0usize..5_000,
        workers in 1usize..64,
    ) {
        let tasks = partition(total_rows, workers, 1, PartitionScheme::Static).unwrap();
        prop_assert!(tasks.len() <= workers);
    }

    #[test]
    fn blocks_partition_the_rows(
        total_rows in 0usize..10_000,
        weights in proptest::collection::vec(0usize..8, 1..8),
    ) {
        prop_assume!(weights.iter().sum::<usize>() > 0);
        let blocks = split_blocks(total_rows, &weights);
        prop_assert_eq!(blocks.len(), weights.len());
        prop_assert_eq!(blocks[0].start, 0);
        prop_assert_eq!(blocks.last().unwrap().end, total_rows);
        for pair in blocks.windows(2) {
            prop_assert_eq!(pair[0].end, pair[1].start);
        }
    }
}
