use std::time::Duration;

/// Default public STS endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://sts.aliyuncs.com";

/// STS API version this crate speaks.
pub const API_VERSION: &str = "2015-04-01";

/// Configuration for the STS clients.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// STS API endpoint URL, without a trailing path.
    pub endpoint: String,

    /// Overall HTTP request timeout.
    pub timeout: Duration,

    /// TCP connect timeout.
    pub connect_timeout: Duration,

    /// Response format (always "JSON").
    pub(crate) format: &'static str,

    pub(crate) api_version: &'static str,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            format: "JSON",
            api_version: API_VERSION,
        }
    }
}

impl ClientConfig {
    /// Points the client at a different endpoint, e.g. a VPC endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the HTTP request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the TCP connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Full request URL for a signed query string.
    pub(crate) fn url_for(&self, query: &str) -> String {
        format!("{}/?{}", self.endpoint.trim_end_matches('/'), query)
    }
}
