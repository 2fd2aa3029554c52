use async_trait::async_trait;
use serde_json::Value;

use crate::error::Error;

// ============================================================================
// Remote API
// ============================================================================

/// Read-only access to the marketing API.
#[async_trait]
pub trait MarketingApi: Send + Sync {
    /// GET an endpoint (path plus query, e.g. `/campaigns?count=1000`) and
    /// return the parsed JSON body.
    async fn get(&self, endpoint: &str) -> Result<Value, Error>;

    /// Health check against `/ping`.
    async fn ping(&self) -> Result<(), Error> {
        self.get("/ping").await.map(|_| ())
    }
}

// ============================================================================
// Output
// ============================================================================

/// Destination for exported artifacts.
///
/// All paths are relative to the export root and use `/` as separator.
#[async_trait]
pub trait ExportSink: Send + Sync {
    /// Create a directory and its parents. No-op if it already exists.
    async fn ensure_dir(&self, dir: &str) -> Result<(), Error>;

    /// Write `value` as indented JSON to `dir/name`, replacing any existing file.
    async fn write_json(&self, dir: &str, name: &str, value: &Value) -> Result<(), Error>;

    /// Write `content` verbatim to `dir/name`, replacing any existing file.
    async fn write_text(&self, dir: &str, name: &str, content: &str) -> Result<(), Error>;
}
