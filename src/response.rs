use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Temporary security credentials returned by STS.
///
/// The `Debug` implementation redacts `access_key_secret` and `security_token`
/// to prevent accidental credential leakage in logs.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Credentials {
    pub access_key_id: String,
    pub access_key_secret: String,
    #[serde(default)]
    pub security_token: Option<String>,
    /// Absolute expiry, sent on the wire as `2006-01-02T15:04:05Z`.
    pub expiration: DateTime<Utc>,
}

impl Credentials {
    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    pub fn access_key_secret(&self) -> &str {
        &self.access_key_secret
    }

    pub fn security_token(&self) -> Option<&str> {
        self.security_token.as_deref()
    }

    /// Returns `true` if the credentials are still valid strictly after `instant`.
    pub fn expires_after(&self, instant: DateTime<Utc>) -> bool {
        self.expiration > instant
    }

    /// Checks if the credentials have expired.
    pub fn is_expired(&self) -> bool {
        !self.expires_after(Utc::now())
    }

    /// Returns the remaining time until expiration.
    ///
    /// Returns `None` if the credentials are already expired.
    pub fn time_to_expiry(&self) -> Option<std::time::Duration> {
        (self.expiration - Utc::now()).to_std().ok()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &"****")
            .field("security_token", &self.security_token.as_ref().map(|_| "****"))
            .field("expiration", &self.expiration)
            .finish()
    }
}

/// Response from the AssumeRole API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AssumeRoleResponse {
    #[serde(default)]
    pub request_id: String,
    pub assumed_role_user: AssumedRoleUser,
    pub credentials: Credentials,
}

/// Information about the assumed role identity.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AssumedRoleUser {
    pub arn: String,
    pub assumed_role_id: String,
}

/// Response from the GetCallerIdentity API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetCallerIdentityResponse {
    pub request_id: String,
    pub account_id: String,
    pub arn: String,
    pub principal_id: String,
    pub identity_type: String,
    pub user_id: Option<String>,
    pub role_id: Option<String>,
}

/// Error envelope shared by all Alibaba Cloud RPC APIs.
///
/// A body is an error exactly when it carries a non-empty `Code`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub(crate) struct ApiErrorResponse {
    pub request_id: String,
    pub host_id: String,
    pub code: String,
    pub message: String,
    pub recommend: Option<String>,
}
