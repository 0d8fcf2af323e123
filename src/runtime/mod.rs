//! Runtime surface shared by the vectorized engine: device classes, the
//! accelerator device contract, and the resolved execution context.
//!
//! No concrete accelerator driver lives in this crate; devices are supplied
//! by the embedding runtime through [`AcceleratorDevice`].

pub mod accelerator;
pub mod context;
pub mod types;

pub use accelerator::AcceleratorDevice;
pub use context::ExecutionContext;
pub use types::{DeviceKind, RuntimeError};
