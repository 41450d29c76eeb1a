//! Directory-backed resource source.
//!
//! Every `*.yaml`, `*.yml` or `*.json` file in the directory holds exactly one
//! resource. Files are read in path order so listings are reproducible. One
//! unparsable file fails the whole listing; the aggregator keeps the last
//! good list for this source until the file is fixed.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use super::polling::{PollingSource, ResourceLister};
use crate::domain::Resource;
use crate::errors::{Result, SwitchyardError};

const RESOURCE_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

#[derive(Debug, Clone)]
pub struct FileSource {
    dir: PathBuf,
}

impl FileSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Watchable source re-reading the directory every `refresh`.
    pub fn polling(name: impl Into<String>, dir: impl Into<PathBuf>, refresh: Duration) -> PollingSource<Self> {
        PollingSource::new(name, Self::new(dir), refresh)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn resource_files(&self) -> Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| SwitchyardError::from(e).context(format!("read directory {}", self.dir.display())))?;

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_resource = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| RESOURCE_EXTENSIONS.contains(&ext))
                .unwrap_or(false);
            if is_resource && entry.file_type().await?.is_file() {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }
}

#[async_trait]
impl<R: Resource> ResourceLister<R> for FileSource {
    async fn list_resources(&self, _namespace: &str) -> Result<Vec<R>> {
        let paths = self.resource_files().await?;
        let mut resources = Vec::with_capacity(paths.len());

        for path in paths {
            let content = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| SwitchyardError::from(e).context(format!("read {}", path.display())))?;
            // YAML is a superset of JSON, one parser covers both.
            let resource: R = serde_yaml::from_str(&content).map_err(|e| {
                SwitchyardError::source(
                    self.dir.display().to_string(),
                    format!("invalid resource file {}: {}", path.display(), e),
                )
            })?;
            resources.push(resource);
        }

        debug!(dir = %self.dir.display(), count = resources.len(), "Listed resource files");
        Ok(resources)
    }
}
