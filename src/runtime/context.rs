use std::sync::Arc;

use crate::config::RuntimeConfig;
use crate::runtime::accelerator::AcceleratorDevice;

/// Resolved execution resources handed to the orchestrator and to every
/// pipeline invocation.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    pub config: RuntimeConfig,
    accelerators: Vec<Arc<dyn AcceleratorDevice>>,
}

impl ExecutionContext {
    pub fn new(config: RuntimeConfig) -> Self {
        Self { config, accelerators: Vec::new() }
    }

    /// Register an accelerator device.
    pub fn with_accelerator(mut self, device: Arc<dyn AcceleratorDevice>) -> Self {
        self.accelerators.push(device);
        self
    }

    pub fn accelerators(&self) -> &[Arc<dyn AcceleratorDevice>] {
        &self.accelerators
    }

    /// Accelerators are enabled and at least one device is registered.
    pub fn use_accelerators(&self) -> bool {
        self.config.accelerators && !self.accelerators.is_empty()
    }

    /// CPU worker count: the configured value, or the detected hardware
    /// concurrency when unset.
    pub fn cpu_threads(&self) -> usize {
        if self.config.threads > 0 {
            self.config.threads
        } else {
            num_cpus::get()
        }
    }
}
