//! Synchronous (blocking) client for Alibaba Cloud STS API.
//!
//! This module is only available when the `blocking` feature is enabled
//! (it is by default). It mirrors the async [`crate::Client`] API using
//! `reqwest::blocking`, and it is the client that plugs into
//! [`crate::CredentialCache`] as a [`CredentialSource`].
//!
//! Do not call it from inside an async runtime; `reqwest::blocking` spins
//! up its own.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use rs_ali_sts_cache::blocking::Client;
//! use rs_ali_sts_cache::{AccessKey, AssumeRoleRequest, CredentialCache};
//!
//! fn main() -> rs_ali_sts_cache::Result<()> {
//!     let client = Client::new(AccessKey::new("id", "secret"))?;
//!     let cache = CredentialCache::new(client);
//!
//!     let request = AssumeRoleRequest::for_role("123456789012", "uploader", "session")
//!         .with_duration_seconds(3600);
//!
//!     // Reuses the cached credentials while they have 5+ minutes left.
//!     let creds = cache.get(&request, Duration::from_secs(300))?;
//!     println!("AK: {}", creds.access_key_id);
//!     Ok(())
//! }
//! ```

use serde::de::DeserializeOwned;

use crate::cache::CredentialSource;
use crate::config::ClientConfig;
use crate::credential::AccessKey;
use crate::error::{Result, StsError};
use crate::exec::handle_response;
use crate::request::{AssumeRoleRequest, build_signed_query};
use crate::response::{AssumeRoleResponse, Credentials, GetCallerIdentityResponse};

/// Synchronous client for Alibaba Cloud STS API.
pub struct Client {
    http: reqwest::blocking::Client,
    config: ClientConfig,
    access_key: AccessKey,
}

impl Client {
    /// Creates a new blocking client with an explicit AccessKey.
    pub fn new(access_key: AccessKey) -> Result<Self> {
        Self::with_config(access_key, ClientConfig::default())
    }

    /// Creates a new blocking client with custom configuration.
    pub fn with_config(access_key: AccessKey, config: ClientConfig) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
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

    /// Creates a new blocking client using the AccessKey from the environment.
    pub fn from_env() -> Result<Self> {
        Self::new(AccessKey::from_env()?)
    }

    /// Assumes a RAM role and obtains temporary security credentials.
    pub fn assume_role(&self, request: &AssumeRoleRequest) -> Result<AssumeRoleResponse> {
        self.execute("AssumeRole", &request.to_params())
    }

    /// Queries the identity of the current caller.
    pub fn get_caller_identity(&self) -> Result<GetCallerIdentityResponse> {
        self.execute("GetCallerIdentity", &[])
    }

    fn execute<T: DeserializeOwned>(&self, action: &str, params: &[(&str, String)]) -> Result<T> {
        let query = build_signed_query(action, params, &self.access_key, &self.config)?;
        tracing::debug!(action, endpoint = %self.config.endpoint, "sending STS request");

        let response = self.http.get(self.config.url_for(&query)).send()?;

        let status = response.status();
        let text = response.text()?;

        handle_response(status, &text)
    }
}

impl CredentialSource for Client {
    fn fetch(&self, request: &AssumeRoleRequest) -> Result<Credentials> {
        self.assume_role(request).map(|resp| resp.credentials)
    }
}
