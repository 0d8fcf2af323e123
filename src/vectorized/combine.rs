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

//! Partial outputs and their combination into final matrices.

use crate::matrix::{Matrix, MatrixError};
use crate::vectorized::error::ExecError;
use crate::vectorized::pipeline::{OutputSpec, VectorCombine};
use crate::vectorized::task::Task;

/// A worker's private result for one declared output.
#[derive(Debug, Clone)]
pub enum PartialOutput<M> {
    /// Row blocks tagged with the task that produced them.
    Rows(Vec<(Task, M)>),
    /// Running sum of every block the worker produced.
    Sum(Option<M>),
}

impl<M: Matrix> PartialOutput<M> {
    pub fn new(combine: VectorCombine) -> Self {
        match combine {
            VectorCombine::Rows => PartialOutput::Rows(Vec::new()),
            VectorCombine::Add => PartialOutput::Sum(None),
        }
    }

    /// Record the block `task` produced.
    pub fn absorb(&mut self, task: Task, block: M) -> Result<(), MatrixError> {
        match self {
            PartialOutput::Rows(blocks) => {
                if block.num_rows() != task.len() {
                    return Err(MatrixError::ShapeMismatch {
                        expected_rows: task.len(),
                        expected_cols: block.num_cols(),
                        found_rows: block.num_rows(),
                        found_cols: block.num_cols(),
                    });
                }
                blocks.push((task, block));
            }
            PartialOutput::Sum(acc) => {
                if let Some(sum) = acc.as_mut() {
                    sum.accumulate(&block)?;
                } else {
                    *acc = Some(block);
                }
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            PartialOutput::Rows(blocks) => blocks.is_empty(),
            PartialOutput::Sum(acc) => acc.is_none(),
        }
    }
}

/// Merge every worker's partial for output `index` into the final matrix.
///
/// `existing` is the matrix allocated before the run, if any. Row blocks are
/// written at their task's start row; sums are accumulated into a zeroed
/// matrix.
pub(crate) fn combine_output<M: Matrix>(
    index: usize,
    spec: &OutputSpec,
    total_rows: usize,
    existing: Option<M>,
    partials: Vec<PartialOutput<M>>,
) -> Result<M, ExecError> {
    let wrap = |source: MatrixError| ExecError::Combine { output: index, source };
    match spec.combine {
        VectorCombine::Rows => {
            let mut blocks: Vec<(Task, M)> = partials
                .into_iter()
                .flat_map(|p| match p {
                    PartialOutput::Rows(blocks) => blocks,
                    PartialOutput::Sum(_) => Vec::new(),
                })
                .collect();
            blocks.sort_by_key(|(task, _)| task.begin);
            let mut out = match existing {
                Some(out) => out,
                None => {
                    let rows = spec.rows.unwrap_or(total_rows);
                    let cols = spec
                        .cols
                        .or_else(|| blocks.first().map(|(_, b)| b.num_cols()))
                        .unwrap_or(0);
                    M::create(rows, cols, false)
                }
            };
            let blocks: Vec<(usize, M)> = blocks.into_iter().map(|(task, block)| (task.begin, block)).collect();
            out.write_row_blocks(&blocks).map_err(wrap)?;
            Ok(out)
        }
        VectorCombine::Add => {
            let sums: Vec<M> = partials
                .into_iter()
                .filter_map(|p| match p {
                    PartialOutput::Sum(acc) => acc,
                    PartialOutput::Rows(_) => None,
                })
                .collect();
            let mut out = match existing {
                Some(out) => out,
                None => {
                    let (rows, cols) = spec
                        .known_shape()
                        .or_else(|| sums.first().map(|m| (m.num_rows(), m.num_cols())))
                        .unwrap_or((spec.rows.unwrap_or(0), spec.cols.unwrap_or(0)));
                    M::create(rows, cols, true)
                }
            };
            for sum in &sums {
                out.accumulate(sum).map_err(wrap)?;
            }
            Ok(out)
        }
    }
}
