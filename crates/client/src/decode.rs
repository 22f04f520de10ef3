//! Response status/error decoding.
//!
//! Splits a wire response into a success payload or a typed server error.
//! Error bodies arrive as JSON (`{"code": ..., "message": ...}`) or small
//! markup (`<code>`/`<message>` tags); both are extracted when parseable,
//! with a generic status-keyed error otherwise. An empty body where a
//! payload is expected is always an error, never an empty success.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::warn;

use crate::errors::ClientError;
use crate::transport::WireResponse;

static STATUS_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<status>\s*([^<]*?)\s*</status>").expect("valid literal regex"));
static CODE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<code>\s*([^<]*?)\s*</code>").expect("valid literal regex"));
static MESSAGE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<message>\s*([^<]*?)\s*</message>").expect("valid literal regex"));

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(alias = "Code")]
    code: Option<String>,
    #[serde(alias = "Message", alias = "msg")]
    message: Option<String>,
}

/// Structured error content extracted from a response body, if any
fn parse_error_body(body: &str) -> (Option<String>, Option<String>) {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        if parsed.code.is_some() || parsed.message.is_some() {
            return (parsed.code, parsed.message);
        }
    }

    let code = CODE_TAG.captures(body).map(|c| c[1].to_string());
    let message = MESSAGE_TAG.captures(body).map(|c| c[1].to_string());
    (code, message)
}

/// Typed error for a non-success response.
///
/// 5xx statuses map to the transient variant so the caller can tell the
/// retryable class apart; everything else is an application error.
pub fn server_error(response: &WireResponse) -> ClientError {
    let (code, message) = parse_error_body(&response.body);

    if response.is_server_error() {
        let message = message
            .or_else(|| (!response.body.is_empty()).then(|| response.body.clone()))
            .unwrap_or_else(|| "empty response body".to_string());
        ClientError::TransientServer { status: response.status, message }
    } else {
        if code.is_none() && message.is_none() {
            warn!(status = response.status, "error response body was not parseable");
        }
        ClientError::Server {
            status: response.status,
            code: code.unwrap_or_else(|| format!("HTTP{}", response.status)),
            message: message
                .or_else(|| (!response.body.is_empty()).then(|| response.body.clone()))
                .unwrap_or_else(|| "empty response body".to_string()),
        }
    }
}

/// Split a response into its success payload or a typed server error.
///
/// # Errors
///
/// Returns the typed server error for non-2xx statuses, and
/// `ClientError::Decode` for a 2xx response with an empty body.
pub fn decode(response: &WireResponse) -> Result<String, ClientError> {
    if !response.is_success() {
        return Err(server_error(response));
    }
    if response.body.trim().is_empty() {
        return Err(ClientError::Decode(format!(
            "HTTP {} carried an empty body where a payload was expected",
            response.status
        )));
    }
    Ok(response.body.clone())
}

/// Extract the `<status>` tag text from a status-call response.
///
/// # Errors
///
/// Returns the typed server error for non-2xx statuses, and
/// `ClientError::Decode` when the body is empty or carries no status tag.
pub fn status_text(response: &WireResponse) -> Result<String, ClientError> {
    if !response.is_success() {
        return Err(server_error(response));
    }

    STATUS_TAG
        .captures(&response.body)
        .map(|c| c[1].to_string())
        .ok_or_else(|| {
            warn!(status = response.status, "status response carried no status element");
            ClientError::Decode(format!(
                "HTTP {} response carried no status element",
                response.status
            ))
        })
}
