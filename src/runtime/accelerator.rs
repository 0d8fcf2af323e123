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

//! Accelerator device contract.
//!
//! The engine only needs a memory budget and three residency hooks from a
//! device. Kernels themselves run inside the accelerator pipeline stage,
//! which receives the device through the task context.

use std::fmt;
use std::ops::Range;

use crate::runtime::types::RuntimeError;

/// Abstract contract for accelerator devices.
///
/// Inputs are identified by their position in the pipeline's input list.
/// Implementations must be callable from the device's controller thread and
/// from the orchestrator thread.
pub trait AcceleratorDevice: fmt::Debug + Send + Sync {
    /// Device ordinal.
    fn id(&self) -> usize;

    /// Bytes of device memory available to one pipeline run.
    fn mem_budget(&self) -> usize;

    /// Make the whole of input `input` (`bytes` long) resident on the device.
    fn prefetch(&self, input: usize, bytes: usize) -> Result<(), RuntimeError>;

    /// Copy rows `rows` of input `input` to the device ahead of one task.
    fn stage(&self, input: usize, rows: Range<usize>, bytes: usize) -> Result<(), RuntimeError>;

    /// Synchronises device execution, ensuring all prior operations are visible.
    fn synchronize(&self) -> Result<(), RuntimeError> {
        Ok(())
    }

    /// Free every buffer prefetched or staged during the current run.
    fn release(&self);
}
