//! Grid configuration
//!
//! TOML-backed description of a grid build. Everything is checked before any
//! allocation happens.

use crate::backend::{validate_backend_config, BackendConfig};
use crate::constants::core::{DEFAULT_BLOCK_SIZE, MAX_BLOCK_SIZE};
use crate::constants::limits::{MAX_DOMAIN_EXTENT, MAX_LEVELS, MAX_REFINEMENT_FACTOR};
use crate::error::{GridError, GridResult};
use crate::grid::StencilKind;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Base-level extent in voxels
    pub domain: [i32; 3],
    pub block_size: u32,
    /// Ratios between consecutive levels, finest first; empty for one level
    pub refinement_factors: Vec<u32>,
    pub stencil: StencilKind,
    pub backend: BackendConfig,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            domain: [64, 64, 64],
            block_size: DEFAULT_BLOCK_SIZE,
            refinement_factors: Vec::new(),
            stencil: StencilKind::S27,
            backend: BackendConfig::default(),
        }
    }
}

impl GridConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: GridConfig =
            toml::from_str(text).context("GridConfig: failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("GridConfig: failed to read {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("GridConfig: invalid {}", path.display()))
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("GridConfig: failed to serialize")
    }

    pub fn depth(&self) -> usize {
        self.refinement_factors.len() + 1
    }

    /// Typed check shared with the grid builder
    pub fn check(&self) -> GridResult<()> {
        let invalid = |field: &str, value: String, reason: String| GridError::InvalidConfig {
            field: field.to_string(),
            value,
            reason,
        };

        if self
            .domain
            .iter()
            .any(|&d| d <= 0 || d > MAX_DOMAIN_EXTENT)
        {
            return Err(invalid(
                "domain",
                format!("{:?}", self.domain),
                format!("every extent must be in 1..={}", MAX_DOMAIN_EXTENT),
            ));
        }

        if self.block_size == 0 || self.block_size > MAX_BLOCK_SIZE {
            return Err(invalid(
                "block_size",
                self.block_size.to_string(),
                format!("must be in 1..={}", MAX_BLOCK_SIZE),
            ));
        }

        if self.depth() > MAX_LEVELS {
            return Err(invalid(
                "refinement_factors",
                format!("{:?}", self.refinement_factors),
                format!("at most {} levels", MAX_LEVELS),
            ));
        }

        for &factor in &self.refinement_factors {
            if !(2..=MAX_REFINEMENT_FACTOR).contains(&factor) || self.block_size % factor != 0 {
                return Err(invalid(
                    "refinement_factors",
                    factor.to_string(),
                    format!(
                        "each factor must be in 2..={} and divide block_size {}",
                        MAX_REFINEMENT_FACTOR, self.block_size
                    ),
                ));
            }
        }

        if let Some(stencil) = self.stencil.build() {
            if stencil.radius() > self.block_size {
                return Err(GridError::StencilTooWide {
                    radius: stencil.radius(),
                    block_size: self.block_size,
                });
            }
        }

        validate_backend_config(&self.backend)
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if let Err(e) = self.check() {
            return Err(anyhow::anyhow!(
                "GridConfig: {}. {}",
                e,
                self.suggest_safe_config()
            ));
        }

        log::info!(
            "[GridConfig] Validation: domain={:?}, block_size={}, levels={}, devices={}, dense_bytes_per_channel={}KB",
            self.domain,
            self.block_size,
            self.depth(),
            self.backend.device_count,
            self.dense_bytes_per_channel::<f32>() / 1024
        );
        log::info!("[GridConfig] Configuration validated successfully");
        Ok(())
    }

    /// Upper bound of one `T` channel on the finest level if every block were active
    pub fn dense_bytes_per_channel<T>(&self) -> u64 {
        let b = self.block_size.max(1) as u64;
        let blocks: u64 = self
            .domain
            .iter()
            .map(|&d| (d.max(0) as u64).div_ceil(b))
            .product();
        blocks * b * b * b * std::mem::size_of::<T>() as u64
    }

    /// Suggest safe configuration parameters
    pub fn suggest_safe_config(&self) -> String {
        let mut suggestions = vec!["Common safe configurations:".to_string()];
        suggestions.push(format!(
            "  - block_size={}, refinement_factors=[2, 2], stencil=s27",
            DEFAULT_BLOCK_SIZE
        ));
        suggestions.push("  - block_size=4, refinement_factors=[2], stencil=s7".to_string());
        if self.block_size > 0 {
            let divisors: Vec<u32> = (2..=MAX_REFINEMENT_FACTOR)
                .filter(|f| self.block_size % f == 0)
                .collect();
            suggestions.push(format!(
                "For block_size={}, valid refinement factors are {:?}",
                self.block_size, divisors
            ));
        }
        suggestions.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendKind;
    use std::io::Write;

    #[test]
    fn test_default_is_valid() {
        assert!(GridConfig::default().validate().is_ok());
    }

    #[test]
    fn test_parse_toml() {
        let text = r#"
            domain = [32, 16, 16]
            block_size = 4
            refinement_factors = [2, 2]
            stencil = "s7"

            [backend]
            kind = "host"
            device_count = 2
            worker_threads = 2
        "#;
        let config = GridConfig::from_toml_str(text).unwrap();
        assert_eq!(config.domain, [32, 16, 16]);
        assert_eq!(config.depth(), 3);
        assert_eq!(config.stencil, StencilKind::S7);
        assert_eq!(config.backend.device_count, 2);
        assert_eq!(config.backend.worker_threads, Some(2));
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config = GridConfig::from_toml_str("block_size = 4").unwrap();
        assert_eq!(config.domain, [64, 64, 64]);
        assert_eq!(config.backend, BackendConfig::default());
    }

    #[test]
    fn test_rejects_bad_factor() {
        let err = GridConfig::from_toml_str("block_size = 8\nrefinement_factors = [3]").unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("refinement_factors"));
        assert!(message.contains("valid refinement factors are [2, 4, 8]"));
    }

    #[test]
    fn test_rejects_cuda() {
        let config = GridConfig {
            backend: BackendConfig {
                kind: BackendKind::Cuda,
                ..BackendConfig::default()
            },
            ..GridConfig::default()
        };
        assert!(matches!(config.check(), Err(GridError::UnsupportedBackend { .. })));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "domain = [16, 16, 16]\nblock_size = 8").unwrap();
        let config = GridConfig::load(file.path()).unwrap();
        assert_eq!(config.domain, [16, 16, 16]);

        let text = config.to_toml_string().unwrap();
        assert_eq!(GridConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = GridConfig::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }

    #[test]
    fn test_dense_bytes() {
        let config = GridConfig {
            domain: [16, 16, 10],
            block_size: 8,
            ..GridConfig::default()
        };
        // 2 x 2 x 2 blocks of 512 voxels
        assert_eq!(config.dense_bytes_per_channel::<f32>(), 8 * 512 * 4);
    }
}
