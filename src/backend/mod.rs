//! Execution backend
//!
//! Devices are logical partitions of the grid. On the host backend every
//! device is served by the same rayon pool; per-device work is dispatched as
//! independent parallel tasks.

pub mod backend_data;
pub mod backend_operations;

pub use backend_data::{Backend, BackendConfig, BackendKind};
pub use backend_operations::{create_backend, validate_backend_config};
