use thiserror::Error;

/// Maximum characters to include in error message body for debugging.
pub(crate) const MAX_ERROR_BODY_CHARS: usize = 200;

/// Error codes shared by all Alibaba Cloud products.
///
/// See <https://error-center.aliyun.com/status/product/Public>.
pub mod codes {
    pub const FORBIDDEN: &str = "Forbidden";
    pub const INTERNAL_ERROR: &str = "InternalError";
    pub const INVALID_PARAMETER: &str = "InvalidParameter";
    pub const UNKNOWN_ERROR: &str = "UnknownError";
    pub const SIGNATURE_NONCE_USED: &str = "SignatureNonceUsed";
    pub const UNSUPPORTED_HTTP_METHOD: &str = "UnsupportedHTTPMethod";
    pub const API_NOT_FOUND: &str = "InvalidApi.NotFound";
    pub const MISSING_SECURITY_TOKEN: &str = "MissingSecurityToken";
    pub const SIGNATURE_DOES_NOT_MATCH: &str = "SignatureDoesNotMatch";
    pub const THROTTLING: &str = "Throttling";
    pub const SERVICE_UNAVAILABLE: &str = "ServiceUnavailable";
}

/// Errors that can occur when using the STS SDK.
#[derive(Debug, Error)]
pub enum StsError {
    /// HTTP/network layer error from reqwest.
    #[error("HTTP request failed: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Unexpected HTTP response (non-JSON error body).
    #[error("HTTP error: {0}")]
    Http(String),

    /// Alibaba Cloud API returned a business error.
    #[error("API error (status {status}, RequestId: {request_id}, HostId: {host_id}): [{code}] {message}")]
    Api {
        status: u16,
        request_id: String,
        host_id: String,
        code: String,
        message: String,
        recommend: Option<String>,
    },

    /// Signature computation error.
    #[error("signature error: {0}")]
    Signature(String),

    /// Access key not found or invalid.
    #[error("credential error: {0}")]
    Credential(String),

    /// Response deserialization error.
    #[error("deserialization error: {0}")]
    Deserialize(#[from] serde_json::Error),

    /// Client configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Validation error for request parameters.
    #[error("validation error: {0}")]
    Validation(String),
}

impl StsError {
    /// Returns `true` if the error is potentially recoverable by retrying.
    ///
    /// Network failures, throttling and server-side errors are retryable.
    /// Credential, validation and other client-side errors are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            StsError::HttpClient(e) => e.is_timeout() || e.is_connect(),
            StsError::Http(_) => true,

            StsError::Api { status, code, .. } => {
                if code == codes::THROTTLING || code == codes::SERVICE_UNAVAILABLE {
                    return true;
                }
                *status >= 500 || code.starts_with("Internal") || code.starts_with("Service")
            }

            StsError::Signature(_)
            | StsError::Credential(_)
            | StsError::Deserialize(_)
            | StsError::Config(_)
            | StsError::Validation(_) => false,
        }
    }

    /// Returns the request ID if this is an API error.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            StsError::Api { request_id, .. } => Some(request_id),
            _ => None,
        }
    }

    /// Returns the error code if this is an API error.
    pub fn error_code(&self) -> Option<&str> {
        match self {
            StsError::Api { code, .. } => Some(code),
            _ => None,
        }
    }
}

/// A specialized Result type for STS operations.
pub type Result<T> = std::result::Result<T, StsError>;

/// Truncates a string to at most `max_chars` characters on a valid UTF-8 boundary.
pub(crate) fn truncate_str(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
