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

//! Blocking task queue.
//!
//! Consumers block while the queue is empty and open. [`TaskQueue::close`]
//! wakes every blocked consumer; once the remaining tasks are drained each
//! consumer observes the end of the queue.

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

use crate::vectorized::task::Task;

/// Returned by [`TaskQueue::push`] after the queue was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("task {0} pushed to a closed queue")]
pub struct QueueClosed(pub Task);

#[derive(Debug, Default)]
struct State {
    tasks: VecDeque<Task>,
    closed: bool,
}

/// FIFO queue of row-range tasks shared by one or more workers.
#[derive(Debug, Default)]
pub struct TaskQueue {
    state: Mutex<State>,
    available: Condvar,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, task: Task) -> Result<(), QueueClosed> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(QueueClosed(task));
        }
        state.tasks.push_back(task);
        drop(state);
        self.available.notify_one();
        Ok(())
    }

    /// Push every task in order. Stops at the first rejected task.
    pub fn extend<I: IntoIterator<Item = Task>>(&self, tasks: I) -> Result<(), QueueClosed> {
        let mut state = self.state.lock();
        for task in tasks {
            if state.closed {
                return Err(QueueClosed(task));
            }
            state.tasks.push_back(task);
        }
        drop(state);
        self.available.notify_all();
        Ok(())
    }

    /// Next task, blocking while the queue is empty and open. `None` marks
    /// the end of the queue.
    pub fn pop(&self) -> Option<Task> {
        let mut state = self.state.lock();
        loop {
            if let Some(task) = state.tasks.pop_front() {
                return Some(task);
            }
            if state.closed {
                return None;
            }
            self.available.wait(&mut state);
        }
    }

    /// Claim up to `max` tasks into `out`, blocking like [`TaskQueue::pop`].
    /// Returns the number claimed; `0` marks the end of the queue.
    pub fn pop_batch(&self, max: usize, out: &mut Vec<Task>) -> usize {
        let max = max.max(1);
        let mut state = self.state.lock();
        loop {
            if !state.tasks.is_empty() {
                let n = max.min(state.tasks.len());
                out.extend(state.tasks.drain(..n));
                return n;
            }
            if state.closed {
                return 0;
            }
            self.available.wait(&mut state);
        }
    }

    /// Non-blocking pop used when stealing from a sibling queue.
    pub fn steal(&self) -> Option<Task> {
        self.state.lock().tasks.pop_front()
    }

    /// Stop accepting tasks and release blocked consumers.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.available.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn len(&self) -> usize {
        self.state.lock().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
