//! Shared HTTP plumbing for panel clients.

use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::error::PanelError;

/// Per-request connect timeout.
pub(crate) const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-request total timeout.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Build the long-lived pooled client every panel client owns.
pub(crate) fn build_http_client() -> Result<reqwest::Client, PanelError> {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(PanelError::from)
}

/// Coerce a base URL to carry a scheme and no trailing slash.
pub(crate) fn normalize_base(base: &str, default_scheme: &str) -> String {
    let base = base.trim().trim_end_matches('/');
    if base.contains("://") {
        base.to_string()
    } else {
        format!("{default_scheme}://{base}")
    }
}

/// Decode a panel response per the shared status ladder.
///
/// - 204 → success with no body
/// - 401 → [`PanelError::Auth`]
/// - 404 → [`PanelError::NotFound`]
/// - other ≥ 400 → [`PanelError::Remote`] carrying the body
/// - 2xx with an undecodable body → success with no body
pub(crate) async fn decode_response(resp: reqwest::Response) -> Result<Option<Value>, PanelError> {
    let status = resp.status();
    match status.as_u16() {
        204 => return Ok(None),
        401 => return Err(PanelError::Auth),
        404 => return Err(PanelError::NotFound),
        s if s >= 400 => {
            let body = resp.text().await.unwrap_or_default();
            return Err(PanelError::Remote { status: s, body });
        }
        _ => {}
    }

    let bytes = resp.bytes().await?;
    if bytes.is_empty() {
        return Ok(None);
    }
    match serde_json::from_slice(&bytes) {
        Ok(value) => Ok(Some(value)),
        Err(err) if status.as_u16() < 300 => {
            debug!(status = status.as_u16(), error = %err, "undecodable body on success status, treating as no-body");
            Ok(None)
        }
        Err(err) => Err(PanelError::decode(err)),
    }
}

/// Require a 204 from the panel; anything else is a failure.
pub(crate) async fn expect_no_content(resp: reqwest::Response) -> Result<(), PanelError> {
    match resp.status().as_u16() {
        204 => Ok(()),
        401 => Err(PanelError::Auth),
        404 => Err(PanelError::NotFound),
        s => {
            let body = resp.text().await.unwrap_or_default();
            Err(PanelError::Remote { status: s, body })
        }
    }
}
