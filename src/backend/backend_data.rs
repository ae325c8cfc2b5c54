//! Backend Data - device set and worker pool handed to grid construction

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Kind of hardware the devices live on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Devices are emulated as host partitions sharing one thread pool
    #[default]
    Host,
    /// Discrete accelerators; rejected on host-only builds
    Cuda,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Host => write!(f, "host"),
            BackendKind::Cuda => write!(f, "cuda"),
        }
    }
}

/// Serializable backend description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub kind: BackendKind,
    pub device_count: u32,
    /// Worker threads for the shared pool; `None` uses every logical core
    pub worker_threads: Option<usize>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Host,
            device_count: 1,
            worker_threads: None,
        }
    }
}

/// Explicit execution context threaded through grid construction and task runs
#[derive(Clone)]
pub struct Backend {
    pub(crate) kind: BackendKind,
    pub(crate) device_count: u32,
    pub(crate) worker_threads: usize,
    pub(crate) pool: Arc<rayon::ThreadPool>,
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backend")
            .field("kind", &self.kind)
            .field("device_count", &self.device_count)
            .field("worker_threads", &self.worker_threads)
            .finish()
    }
}
