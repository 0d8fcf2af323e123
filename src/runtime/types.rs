//! Shared runtime surface types for execution backends.

use std::fmt;

/// Class of hardware a worker executes on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    /// General-purpose CPU core.
    Cpu,
    /// Accelerator device driven by a controller thread.
    Accelerator,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::Cpu => write!(f, "cpu"),
            DeviceKind::Accelerator => write!(f, "accelerator"),
        }
    }
}

/// Structured runtime error for device implementations.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The device cannot hold the requested bytes.
    #[error("device {device}: {requested} bytes requested, budget is {budget}")]
    OutOfMemory { device: usize, requested: usize, budget: usize },
    /// Generic device failure message.
    #[error("device {device}: {message}")]
    Device { device: usize, message: String },
}
