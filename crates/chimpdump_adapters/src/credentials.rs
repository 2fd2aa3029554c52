use std::path::PathBuf;

use chimpdump_core::entities::Credential;
use chimpdump_core::Error;
use serde::Deserialize;
use tokio::fs;
use tracing::{info, instrument};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyFile {
    api_key: String,
}

/// Reads the API key from a JSON file of the form `{"apiKey": "<secret>-<dc>"}`.
pub struct FileCredentialLoader {
    path: PathBuf,
}

impl FileCredentialLoader {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Load and validate the credential. Every failure here is a
    /// configuration error; nothing has been requested yet.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub async fn load(&self) -> Result<Credential, Error> {
        info!("reading API key");

        let content = fs::read_to_string(&self.path).await.map_err(|e| {
            Error::Configuration(format!(
                "failed to read API key file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let key_file: KeyFile = serde_json::from_str(&content).map_err(|e| {
            Error::Configuration(format!(
                "failed to parse API key file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let credential = Credential::parse(&key_file.api_key)?;
        info!(datacenter = credential.datacenter(), "API key loaded");
        Ok(credential)
    }
}
