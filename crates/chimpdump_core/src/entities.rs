use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;

use crate::error::Error;

/// Longest folder-name prefix derived from a display name.
pub const MAX_SANITIZED_LEN: usize = 64;

const DATACENTER_SEPARATOR: char = '-';

// ============================================================================
// Credential
// ============================================================================

/// API key together with the datacenter it routes to.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    api_key: String,
    datacenter: String,
}

impl Credential {
    /// Parse `<secret>-<dc>`. The datacenter is everything after the first `-`.
    pub fn parse(api_key: &str) -> Result<Self, Error> {
        let api_key = api_key.trim();
        let (_, datacenter) = api_key.split_once(DATACENTER_SEPARATOR).ok_or_else(|| {
            Error::InvalidApiKey("API key must include datacenter suffix".to_string())
        })?;

        if datacenter.is_empty() {
            return Err(Error::InvalidApiKey(
                "datacenter suffix is empty".to_string(),
            ));
        }

        Ok(Self {
            api_key: api_key.to_string(),
            datacenter: datacenter.to_string(),
        })
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn datacenter(&self) -> &str {
        &self.datacenter
    }

    /// Value of the `Authorization` header.
    pub fn authorization(&self) -> String {
        format!("anystring {}", self.api_key)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("api_key", &"<redacted>")
            .field("datacenter", &self.datacenter)
            .finish()
    }
}

// ============================================================================
// Folder naming
// ============================================================================

/// Make a display name filesystem safe.
///
/// Anything outside `[A-Za-z0-9_- ]` becomes `_`, and the result is cut to
/// [`MAX_SANITIZED_LEN`] characters.
pub fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .take(MAX_SANITIZED_LEN)
        .collect()
}

/// The `id` of a resource item as a string. Numeric ids are accepted too.
pub fn item_id(item: &Value) -> Option<String> {
    match item.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// First non-empty string found at one of the JSON pointers, in order.
pub fn display_name<'a>(item: &'a Value, pointers: &[&str]) -> Option<&'a str> {
    pointers
        .iter()
        .filter_map(|p| item.pointer(p).and_then(Value::as_str))
        .find(|s| !s.trim().is_empty())
}

/// Whether an item id can be used as-is in a folder name and a URL path.
///
/// Only `[A-Za-z0-9_-]` is accepted, so an id can never add a path segment
/// or need percent-encoding.
pub fn is_safe_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Folder name for an item: `sanitize(name)-id`. Callers check the id with
/// [`is_safe_id`] first.
pub fn folder_name(name: &str, id: &str) -> String {
    format!("{}-{}", sanitize(name), id)
}

// ============================================================================
// Resource kinds
// ============================================================================

/// Resource types exported, in the order the orchestrator runs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    Campaigns,
    Templates,
    Automations,
    Audiences,
    AudienceMembers,
    LandingPages,
    FileManager,
    Surveys,
    Ecommerce,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 9] = [
        ResourceKind::Campaigns,
        ResourceKind::Templates,
        ResourceKind::Automations,
        ResourceKind::Audiences,
        ResourceKind::AudienceMembers,
        ResourceKind::LandingPages,
        ResourceKind::FileManager,
        ResourceKind::Surveys,
        ResourceKind::Ecommerce,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ResourceKind::Campaigns => "campaigns",
            ResourceKind::Templates => "templates",
            ResourceKind::Automations => "automations",
            ResourceKind::Audiences => "audiences",
            ResourceKind::AudienceMembers => "audience-members",
            ResourceKind::LandingPages => "landing-pages",
            ResourceKind::FileManager => "file-manager",
            ResourceKind::Surveys => "surveys",
            ResourceKind::Ecommerce => "ecommerce",
        }
    }

    /// Output directory, relative to the export root.
    pub fn dir(self) -> &'static str {
        match self {
            ResourceKind::Campaigns => "campaigns",
            ResourceKind::Templates => "templates",
            ResourceKind::Automations => "automations",
            ResourceKind::Audiences | ResourceKind::AudienceMembers => "audiences",
            ResourceKind::LandingPages => "landing-pages",
            ResourceKind::FileManager => "assets",
            ResourceKind::Surveys => "surveys",
            ResourceKind::Ecommerce => "ecommerce/stores",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ResourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceKind::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::Configuration(format!("unknown resource kind '{}'", s)))
    }
}

// ============================================================================
// Export results
// ============================================================================

/// Counters for one exporter run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResourceStats {
    /// Items (or whole collections, for single-file resources) written
    pub items: usize,
    /// Per-item detail fetches that failed and were skipped
    pub skipped: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    pub resources: Vec<(ResourceKind, ResourceStats)>,
}

impl ExportSummary {
    pub fn get(&self, kind: ResourceKind) -> Option<ResourceStats> {
        self.resources
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, stats)| *stats)
    }

    pub fn total_items(&self) -> usize {
        self.resources.iter().map(|(_, s)| s.items).sum()
    }

    pub fn total_skipped(&self) -> usize {
        self.resources.iter().map(|(_, s)| s.skipped).sum()
    }
}
