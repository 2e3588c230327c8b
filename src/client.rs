use serde::de::DeserializeOwned;

use crate::config::ClientConfig;
use crate::credential::AccessKey;
use crate::error::{Result, StsError};
use crate::exec::handle_response;
use crate::request::{AssumeRoleRequest, build_signed_query};
use crate::response::{AssumeRoleResponse, GetCallerIdentityResponse};

/// Async client for Alibaba Cloud STS API.
pub struct Client {
    http: reqwest::Client,
    config: ClientConfig,
    access_key: AccessKey,
}

impl Client {
    /// Creates a new client with an explicit AccessKey.
    pub fn new(access_key: AccessKey) -> Result<Self> {
        Self::with_config(access_key, ClientConfig::default())
    }

    /// Creates a new client with an explicit AccessKey and custom configuration.
    pub fn with_config(access_key: AccessKey, config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| StsError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            config,
            access_key,
        })
    }

    /// Creates a new client using the AccessKey from the environment.
    pub fn from_env() -> Result<Self> {
        Self::new(AccessKey::from_env()?)
    }

    /// Assumes a RAM role and obtains temporary security credentials.
    pub async fn assume_role(&self, request: &AssumeRoleRequest) -> Result<AssumeRoleResponse> {
        self.execute("AssumeRole", &request.to_params()).await
    }

    /// Queries the identity of the current caller.
    pub async fn get_caller_identity(&self) -> Result<GetCallerIdentityResponse> {
        self.execute("GetCallerIdentity", &[]).await
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        action: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let query = build_signed_query(action, params, &self.access_key, &self.config)?;
        tracing::debug!(action, endpoint = %self.config.endpoint, "sending STS request");

        let response = self.http.get(self.config.url_for(&query)).send().await?;

        let status = response.status();
        let text = response.text().await?;

        handle_response(status, &text)
    }
}
