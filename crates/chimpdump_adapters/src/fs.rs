use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use chimpdump_core::ports::ExportSink;
use chimpdump_core::Error;
use serde_json::Value;
use tokio::fs;
use tracing::{debug, info, instrument};

/// Export sink writing into a directory tree on disk.
pub struct FileExportSink {
    root: PathBuf,
}

impl FileExportSink {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Map a `/`-separated relative path under the root. Segments that could
    /// leave the root (`.`, `..`, backslashes, drive prefixes) are refused.
    fn resolve(&self, relative: &str) -> Result<PathBuf, Error> {
        let mut path = self.root.clone();
        for part in relative.split('/').filter(|part| !part.is_empty()) {
            if part == "." || part == ".." || part.contains(['\\', ':']) {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("refusing path outside export root: {}", relative),
                )));
            }
            path.push(part);
        }
        Ok(path)
    }

    fn resolve_file(&self, dir: &str, name: &str) -> Result<PathBuf, Error> {
        self.resolve(&format!("{}/{}", dir, name))
    }
}

#[async_trait]
impl ExportSink for FileExportSink {
    #[instrument(skip(self))]
    async fn ensure_dir(&self, dir: &str) -> Result<(), Error> {
        let path = self.resolve(dir)?;
        if fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(());
        }

        fs::create_dir_all(&path).await?;
        info!("created folder {}", path.display());
        Ok(())
    }

    #[instrument(skip(self, value))]
    async fn write_json(&self, dir: &str, name: &str, value: &Value) -> Result<(), Error> {
        let content = serde_json::to_string_pretty(value)
            .map_err(|e| Error::Serialization(format!("failed to serialize {}: {}", name, e)))?;
        fs::write(self.resolve_file(dir, name)?, content).await?;
        debug!("wrote {}", name);
        Ok(())
    }

    #[instrument(skip(self, content))]
    async fn write_text(&self, dir: &str, name: &str, content: &str) -> Result<(), Error> {
        fs::write(self.resolve_file(dir, name)?, content).await?;
        debug!("wrote {}", name);
        Ok(())
    }
}
