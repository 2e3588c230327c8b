//! Request types and signed query construction for the STS API.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::config::ClientConfig;
use crate::credential::AccessKey;
use crate::error::{Result, StsError};
use crate::sign::{self, SIGNATURE_METHOD, SIGNATURE_VERSION, canonical_query, percent_encode};

/// Parameters for the AssumeRole API.
///
/// This is also the lookup descriptor for [`crate::CredentialCache`]: the
/// cache key is derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssumeRoleRequest {
    /// ARN of the RAM role to assume.
    pub role_arn: String,
    /// Session name, shows up in the assumed role's ARN and audit logs.
    pub role_session_name: String,
    /// Additional policy to further restrict permissions.
    pub policy: Option<String>,
    /// Token validity duration in seconds (900 to the role's maximum).
    pub duration_seconds: Option<u64>,
    /// External ID for cross-account role assumption.
    pub external_id: Option<String>,
}

impl AssumeRoleRequest {
    /// Creates a request for `role_arn` with no policy, duration or external ID.
    pub fn new(role_arn: impl Into<String>, role_session_name: impl Into<String>) -> Self {
        Self {
            role_arn: role_arn.into(),
            role_session_name: role_session_name.into(),
            policy: None,
            duration_seconds: None,
            external_id: None,
        }
    }

    /// Builds a request for `role` owned by account `uid`.
    pub fn for_role(uid: &str, role: &str, role_session_name: impl Into<String>) -> Self {
        Self::new(role_arn(uid, role), role_session_name)
    }

    /// Restricts the session with an additional policy document.
    pub fn with_policy(mut self, policy: impl Into<String>) -> Self {
        self.policy = Some(policy.into());
        self
    }

    /// Sets the requested token validity in seconds.
    pub fn with_duration_seconds(mut self, seconds: u64) -> Self {
        self.duration_seconds = Some(seconds);
        self
    }

    /// Sets the external ID for cross-account role assumption.
    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    pub(crate) fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("RoleArn", self.role_arn.clone()),
            ("RoleSessionName", self.role_session_name.clone()),
        ];
        if let Some(ref policy) = self.policy
            && !policy.is_empty()
        {
            params.push(("Policy", policy.clone()));
        }
        if let Some(duration) = self.duration_seconds {
            params.push(("DurationSeconds", duration.to_string()));
        }
        if let Some(ref external_id) = self.external_id {
            params.push(("ExternalId", external_id.clone()));
        }
        params
    }
}

/// Formats the ARN of a RAM role: `acs:ram::{uid}:role/{role}`.
pub fn role_arn(uid: &str, role: &str) -> String {
    format!("acs:ram::{}:role/{}", uid, role)
}

static ROLE_ARN_REGEX: OnceLock<Regex> = OnceLock::new();

fn role_arn_regex() -> &'static Regex {
    ROLE_ARN_REGEX.get_or_init(|| {
        Regex::new(r"^acs:ram::\d+:role/[a-zA-Z0-9\-_./]{1,64}$")
            .expect("ROLE_ARN_REGEX pattern is valid")
    })
}

fn validate_role_arn(arn: &str) -> Result<()> {
    if !role_arn_regex().is_match(arn) {
        return Err(StsError::Validation(format!(
            "Invalid RoleArn format '{}'. Expected: acs:ram::{{account id}}:role/{{role name}}",
            arn
        )));
    }
    Ok(())
}

/// Builds the signed query string for an STS action sent with `GET`.
///
/// Common parameters are added, the query is canonicalized and signed, and
/// `Signature` is appended last.
pub(crate) fn build_signed_query(
    action: &str,
    params: &[(&str, String)],
    access_key: &AccessKey,
    config: &ClientConfig,
) -> Result<String> {
    for (key, value) in params {
        if *key == "RoleArn" {
            validate_role_arn(value)?;
        }
    }

    let mut all_params = BTreeMap::new();
    for (key, value) in params {
        all_params.insert(key.to_string(), value.clone());
    }

    // Common parameters win over anything the action supplied.
    all_params.insert("Action".to_string(), action.to_string());
    all_params.insert("Version".to_string(), config.api_version.to_string());
    all_params.insert("Format".to_string(), config.format.to_string());
    all_params.insert(
        "AccessKeyId".to_string(),
        access_key.access_key_id.clone(),
    );
    all_params.insert("SignatureMethod".to_string(), SIGNATURE_METHOD.to_string());
    all_params.insert(
        "SignatureVersion".to_string(),
        SIGNATURE_VERSION.to_string(),
    );
    all_params.insert("SignatureNonce".to_string(), sign::nonce());
    all_params.insert(
        "Timestamp".to_string(),
        sign::format_timestamp(chrono::Utc::now()),
    );

    let query = canonical_query(&all_params);
    let signature = sign::sign("GET", &query, &access_key.access_key_secret)?;

    Ok(format!("{}&Signature={}", query, percent_encode(&signature)))
}
