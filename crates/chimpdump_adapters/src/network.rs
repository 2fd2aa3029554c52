//! Shared HTTP client configuration for API requests.

use std::time::Duration;

use chimpdump_core::Error;
use reqwest::Client;

/// Build the HTTP client used for every API request.
///
/// This client is configured with:
/// - The given user agent
/// - An optional request timeout (none means a request may wait forever)
pub fn build_api_client(user_agent: &str, timeout: Option<Duration>) -> Result<Client, Error> {
    let mut builder = Client::builder().user_agent(user_agent);
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }

    builder
        .build()
        .map_err(|e| Error::Transport(format!("failed to create API HTTP client: {}", e)))
}
