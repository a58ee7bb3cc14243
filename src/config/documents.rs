//! Invoice document configuration

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use super::error::ValidationError;

/// Renderer backend used before falling back to Markdown
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RendererKind {
    #[default]
    Markdown,
    Html,
}

/// Invoice document configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentsConfig {
    /// Directory rendered invoices are written to
    #[serde(default = "default_storage_path")]
    pub storage_path: PathBuf,

    #[serde(default)]
    pub renderer: RendererKind,

    /// Seconds between sweeps for invoices missing a document
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Invoices handled per sweep
    #[serde(default = "default_sweep_batch_size")]
    pub sweep_batch_size: u32,
}

impl DocumentsConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.storage_path.as_os_str().is_empty() {
            return Err(ValidationError::MissingRequired("DOCUMENTS__STORAGE_PATH"));
        }
        if self.sweep_interval_secs == 0 {
            return Err(ValidationError::InvalidInterval("documents.sweep_interval_secs"));
        }
        if self.sweep_batch_size == 0 {
            return Err(ValidationError::InvalidBatchSize);
        }
        Ok(())
    }
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            storage_path: default_storage_path(),
            renderer: RendererKind::default(),
            sweep_interval_secs: default_sweep_interval(),
            sweep_batch_size: default_sweep_batch_size(),
        }
    }
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("./data/documents")
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_sweep_batch_size() -> u32 {
    50
}
