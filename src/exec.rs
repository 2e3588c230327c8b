//! Response handling shared by the async and blocking clients.

use serde::de::DeserializeOwned;

use crate::error::{MAX_ERROR_BODY_CHARS, Result, StsError, truncate_str};
use crate::response::ApiErrorResponse;

/// Decodes a response body.
///
/// The error envelope is tried first regardless of status: a body with a
/// non-empty `Code` is an API error. Otherwise a success status decodes
/// into `T`, and any other status becomes [`StsError::Http`].
pub(crate) fn handle_response<T: DeserializeOwned>(
    status: reqwest::StatusCode,
    text: &str,
) -> Result<T> {
    if let Ok(api_err) = serde_json::from_str::<ApiErrorResponse>(text)
        && !api_err.code.is_empty()
    {
        return Err(StsError::Api {
            status: status.as_u16(),
            request_id: api_err.request_id,
            host_id: api_err.host_id,
            code: api_err.code,
            message: api_err.message,
            recommend: api_err.recommend,
        });
    }

    if status.is_success() {
        serde_json::from_str(text).map_err(StsError::from)
    } else {
        Err(StsError::Http(format!(
            "HTTP {} with body: {}",
            status,
            truncate_str(text, MAX_ERROR_BODY_CHARS)
        )))
    }
}
