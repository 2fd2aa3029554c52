use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// API version prefix prepended to every endpoint.
pub const API_VERSION_PATH: &str = "/3.0";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    pub api: ApiSettings,
    pub export: ExportSettings,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ApiSettings {
    /// JSON file holding `{"apiKey": "<secret>-<dc>"}`
    pub key_path: PathBuf,
    /// Vendor host; the datacenter is prepended as a subdomain
    pub host: String,
    pub user_agent: String,
    /// Per-request timeout. `None` waits indefinitely.
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ExportSettings {
    pub output_dir: PathBuf,
    /// `count` sent with list endpoints
    pub list_count: u32,
    /// Page size for audience members
    pub page_size: u32,
    /// `count` sent with the ecommerce stores endpoint
    pub store_count: u32,
}

impl ApiSettings {
    /// Base URL for a datacenter, e.g. `https://us21.api.mailchimp.com/3.0`.
    pub fn base_url(&self, datacenter: &str) -> String {
        format!("https://{}.{}{}", datacenter, self.host, API_VERSION_PATH)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api: ApiSettings::default(),
            export: ExportSettings::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            key_path: PathBuf::from("mailchimp-api-key.json"),
            host: "api.mailchimp.com".to_string(),
            user_agent: "mailchimp-export".to_string(),
            timeout_secs: None,
        }
    }
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("export"),
            list_count: 1000,
            page_size: 1000,
            store_count: 100,
        }
    }
}
