//! Backend Operations - creation, validation and dispatch helpers

use super::backend_data::{Backend, BackendConfig, BackendKind};
use crate::constants::limits::MAX_DEVICES;
use crate::error::{GridError, GridResult};
use crate::grid::DeviceId;

/// Check a backend description before any thread is spawned
pub fn validate_backend_config(config: &BackendConfig) -> GridResult<()> {
    if config.kind != BackendKind::Host {
        return Err(GridError::UnsupportedBackend {
            kind: config.kind.to_string(),
        });
    }

    if config.device_count == 0 {
        return Err(GridError::InvalidBackend {
            reason: "device_count cannot be 0".to_string(),
        });
    }

    if config.device_count > MAX_DEVICES {
        return Err(GridError::InvalidBackend {
            reason: format!(
                "device_count {} exceeds maximum of {}",
                config.device_count, MAX_DEVICES
            ),
        });
    }

    if config.worker_threads == Some(0) {
        return Err(GridError::InvalidBackend {
            reason: "worker_threads cannot be 0".to_string(),
        });
    }

    Ok(())
}

/// Build a backend and its worker pool
pub fn create_backend(config: &BackendConfig) -> GridResult<Backend> {
    validate_backend_config(config)?;

    let worker_threads = config.worker_threads.unwrap_or_else(num_cpus::get).max(1);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(worker_threads)
        .thread_name(|i| format!("lattice-worker-{}", i))
        .build()
        .map_err(|e| GridError::InvalidBackend {
            reason: format!("failed to build worker pool: {}", e),
        })?;

    log::info!(
        "[Backend] Created {} backend: {} device(s), {} worker thread(s)",
        config.kind,
        config.device_count,
        worker_threads
    );

    Ok(Backend {
        kind: config.kind,
        device_count: config.device_count,
        worker_threads,
        pool: std::sync::Arc::new(pool),
    })
}

impl Backend {
    /// Host backend with `device_count` emulated devices
    pub fn host(device_count: u32) -> GridResult<Self> {
        create_backend(&BackendConfig {
            device_count,
            ..BackendConfig::default()
        })
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    pub fn device_count(&self) -> u32 {
        self.device_count
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    /// All device handles in order
    pub fn device_ids(&self) -> impl Iterator<Item = DeviceId> {
        (0..self.device_count).map(DeviceId)
    }

    pub fn check_device(&self, device: DeviceId) -> GridResult<()> {
        if device.0 < self.device_count {
            Ok(())
        } else {
            Err(GridError::InvalidDevice {
                device: device.0,
                count: self.device_count,
            })
        }
    }

    /// Run `op` inside the backend's worker pool
    pub fn install<R, F>(&self, op: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }
}
