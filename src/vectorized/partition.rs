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

//! Load partitioning: turning "N rows, K workers" into row-range tasks.
//!
//! Every scheme produces tasks that are contiguous, non-overlapping, sorted by
//! start row and cover the requested range exactly. Chunk sizes never drop
//! below the batch size except for the final task, which is clipped at the
//! end of the range.
//!
//! | Scheme      | Chunk size                                                 |
//! |-------------|------------------------------------------------------------|
//! | `Static`    | `max(batch, ceil(rows / workers))`                         |
//! | `Batched`   | `batch`                                                    |
//! | `Guided`    | `max(batch, ceil(remaining / workers))`, recomputed per task |
//! | `Factoring` | `max(batch, ceil(remaining / (2 * workers)))`, per round of `workers` tasks |

use std::ops::Range;

use serde::Deserialize;

use crate::vectorized::task::Task;

/// Chunking strategy used by the [`LoadPartitioner`].
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PartitionScheme {
    /// One chunk per worker.
    #[default]
    Static,
    /// Fixed chunks of `batch_size` rows, for load balancing by stealing.
    Batched,
    /// Guided self-scheduling: shrinking chunks.
    Guided,
    /// Factoring: shrinking rounds of equal chunks.
    Factoring,
}

/// Invalid partitioner arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PartitionError {
    #[error("cannot partition rows over zero workers")]
    ZeroWorkers,
    #[error("batch size must be positive")]
    ZeroBatchSize,
}

/// Validated partitioning parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadPartitioner {
    scheme: PartitionScheme,
    num_workers: usize,
    batch_size: usize,
}

impl LoadPartitioner {
    pub fn new(scheme: PartitionScheme, num_workers: usize, batch_size: usize) -> Result<Self, PartitionError> {
        if num_workers == 0 {
            return Err(PartitionError::ZeroWorkers);
        }
        if batch_size == 0 {
            return Err(PartitionError::ZeroBatchSize);
        }
        Ok(Self { scheme, num_workers, batch_size })
    }

    /// Tasks covering `rows`, numbered from `first_index`.
    pub fn tasks(&self, rows: Range<usize>, first_index: usize) -> Vec<Task> {
        let mut tasks = Vec::new();
        let mut begin = rows.start;
        let total = rows.end.saturating_sub(rows.start);
        let fixed = match self.scheme {
            PartitionScheme::Static => Some(self.batch_size.max(total.div_ceil(self.num_workers))),
            PartitionScheme::Batched => Some(self.batch_size),
            PartitionScheme::Guided | PartitionScheme::Factoring => None,
        };
        let mut round_left = 0usize;
        let mut round_chunk = 0usize;
        while begin < rows.end {
            let remaining = rows.end - begin;
            let chunk = match (fixed, self.scheme) {
                (Some(chunk), _) => chunk,
                (None, PartitionScheme::Guided) => self.batch_size.max(remaining.div_ceil(self.num_workers)),
                _ => {
                    if round_left == 0 {
                        round_chunk = self.batch_size.max(remaining.div_ceil(2 * self.num_workers));
                        round_left = self.num_workers;
                    }
                    round_left -= 1;
                    round_chunk
                }
            };
            let end = begin + chunk.min(remaining);
            tasks.push(Task::new(first_index + tasks.len(), begin, end));
            begin = end;
        }
        tasks
    }
}

/// Partition `[0, total_rows)` for `num_workers` workers.
pub fn partition(
    total_rows: usize,
    num_workers: usize,
    batch_size: usize,
    scheme: PartitionScheme,
) -> Result<Vec<Task>, PartitionError> {
    Ok(LoadPartitioner::new(scheme, num_workers, batch_size)?.tasks(0..total_rows, 0))
}

/// Split `[0, total_rows)` into one contiguous block per weight, sized in
/// proportion to the weights. Zero weights receive empty blocks.
pub fn split_blocks(total_rows: usize, weights: &[usize]) -> Vec<Range<usize>> {
    let total_weight: usize = weights.iter().sum();
    if total_weight == 0 {
        return weights.iter().map(|_| 0..0).collect();
    }
    let mut blocks = Vec::with_capacity(weights.len());
    let mut cumulative = 0usize;
    let mut begin = 0usize;
    for &weight in weights {
        cumulative += weight;
        let end = if cumulative == total_weight {
            total_rows
        } else {
            ((total_rows as u128 * cumulative as u128) / total_weight as u128) as usize
        };
        blocks.push(begin..end);
        begin = end;
    }
    blocks
}
