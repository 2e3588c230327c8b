use std::env;

use crate::error::{Result, StsError};

/// Environment variable holding the AccessKey ID.
pub const ENV_ACCESS_KEY_ID: &str = "ALIBABA_CLOUD_ACCESS_KEY_ID";
/// Environment variable holding the AccessKey secret.
pub const ENV_ACCESS_KEY_SECRET: &str = "ALIBABA_CLOUD_ACCESS_KEY_SECRET";

/// Long-lived Alibaba Cloud AccessKey used to sign STS calls.
///
/// The `Debug` implementation redacts `access_key_secret` to prevent
/// accidental leakage in logs.
#[derive(Clone)]
pub struct AccessKey {
    pub access_key_id: String,
    pub access_key_secret: String,
}

impl AccessKey {
    pub fn new(access_key_id: impl Into<String>, access_key_secret: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            access_key_secret: access_key_secret.into(),
        }
    }

    /// Reads the key pair from `ALIBABA_CLOUD_ACCESS_KEY_ID` and
    /// `ALIBABA_CLOUD_ACCESS_KEY_SECRET`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let id = lookup(ENV_ACCESS_KEY_ID)
            .ok_or_else(|| StsError::Credential(format!("{ENV_ACCESS_KEY_ID} not set")))?;
        let secret = lookup(ENV_ACCESS_KEY_SECRET)
            .ok_or_else(|| StsError::Credential(format!("{ENV_ACCESS_KEY_SECRET} not set")))?;

        if id.is_empty() || secret.is_empty() {
            return Err(StsError::Credential(format!(
                "{ENV_ACCESS_KEY_ID} or {ENV_ACCESS_KEY_SECRET} is empty"
            )));
        }

        Ok(Self::new(id, secret))
    }
}

impl std::fmt::Debug for AccessKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessKey")
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &"****")
            .finish()
    }
}
