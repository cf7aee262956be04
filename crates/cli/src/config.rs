use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use bucketdir_core::Storage;
use bucketdir_core::apply::DEFAULT_CONCURRENCY;
use bucketdir_core::backend::Backend;
use bucketdir_core::backend::local::LocalBackend;
use bucketdir_core::backend::s3::S3Backend;

const CONFIG_FILE: &str = "bucketdir.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub backend: BackendConfig,
    #[serde(default)]
    pub transfer: TransferConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BackendConfig {
    #[serde(rename = "local")]
    Local { path: String },
    #[serde(rename = "s3")]
    S3 {
        endpoint: String,
        region: String,
        bucket: String,
        access_key: String,
        secret_key: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Simultaneous object operations for `rm` and `cp`.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

impl AppConfig {
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("bucketdir")
            .join(CONFIG_FILE)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).with_context(|| {
            format!(
                "config not found at {} (run `bucketdir init` first)",
                path.display()
            )
        })?;
        toml::from_str(&content).context("failed to parse config")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("failed to write config to {}", path.display()))?;
        Ok(())
    }

    pub fn open_backend(&self) -> Result<Arc<dyn Backend>> {
        match &self.backend {
            BackendConfig::Local { path } => Ok(Arc::new(LocalBackend::new(path)?)),
            BackendConfig::S3 {
                endpoint,
                region,
                bucket,
                access_key,
                secret_key,
            } => {
                let backend = S3Backend::new(bucket, endpoint, region, access_key, secret_key)?;
                Ok(Arc::new(backend))
            }
        }
    }

    /// The backend is opened once here and shared by everything the command
    /// does with the returned handle.
    pub fn open_storage(&self) -> Result<Storage> {
        let backend = self.open_backend()?;
        Ok(Storage::new(backend).with_concurrency(self.transfer.concurrency))
    }
}

/// Load the config at `path` and open its storage.
pub fn storage(path: &Path) -> Result<Storage> {
    AppConfig::load(path)?.open_storage()
}
