use async_trait::async_trait;
use chimpdump_core::config::ApiSettings;
use chimpdump_core::entities::Credential;
use chimpdump_core::ports::MarketingApi;
use chimpdump_core::Error;
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, instrument, warn};

/// Marketing API client over HTTPS.
pub struct HttpMarketingApi {
    client: Client,
    base_url: String,
    authorization: String,
}

impl HttpMarketingApi {
    /// Client for the credential's datacenter host.
    pub fn new(credential: &Credential, settings: &ApiSettings) -> Result<Self, Error> {
        let base_url = settings.base_url(credential.datacenter());
        Self::with_base_url(base_url, credential, settings)
    }

    /// Client against an explicit base URL (including the version prefix).
    pub fn with_base_url(
        base_url: impl Into<String>,
        credential: &Credential,
        settings: &ApiSettings,
    ) -> Result<Self, Error> {
        let client = crate::network::build_api_client(&settings.user_agent, settings.timeout())?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            authorization: credential.authorization(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl MarketingApi for HttpMarketingApi {
    #[instrument(skip(self))]
    async fn get(&self, endpoint: &str) -> Result<Value, Error> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!("API GET {}", endpoint);

        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, &self.authorization)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "request error");
                Error::Transport(e.to_string())
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        if status.as_u16() >= 400 {
            warn!(status = status.as_u16(), "request failed");
            return Err(Error::api(status.as_u16(), &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            warn!(error = %e, "failed to parse JSON");
            Error::Parse(e.to_string())
        })
    }
}
