//! Response handling shared by the Graph-style adapters

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{PlatformError, PlatformResult};

#[derive(Debug, Deserialize)]
struct GraphErrorEnvelope {
    error: GraphErrorBody,
}

#[derive(Debug, Deserialize)]
struct GraphErrorBody {
    message: Option<String>,
    code: Option<i64>,
    error_subcode: Option<i64>,
}

/// Decode a Graph API response, turning error payloads into `PlatformError::Api`
///
/// The Graph API can answer with an `error` object on any status, so the
/// body is checked even when the status is 2xx.
pub(crate) async fn decode<T: DeserializeOwned>(
    response: reqwest::Response,
    step: &'static str,
) -> PlatformResult<T> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| PlatformError::network(step, e))?;

    if let Ok(envelope) = serde_json::from_str::<GraphErrorEnvelope>(&body) {
        let mut message = envelope
            .error
            .message
            .unwrap_or_else(|| format!("request failed (status {})", status.as_u16()));
        if let Some(subcode) = envelope.error.error_subcode {
            message.push_str(&format!(" (subcode {})", subcode));
        }
        return Err(PlatformError::Api {
            step,
            status: status.as_u16(),
            code: envelope.error.code,
            message,
        });
    }

    if !status.is_success() {
        return Err(PlatformError::Api {
            step,
            status: status.as_u16(),
            code: None,
            message: if body.is_empty() {
                format!("request failed (status {})", status.as_u16())
            } else {
                body
            },
        });
    }

    serde_json::from_str(&body).map_err(|e| PlatformError::response(step, e.to_string()))
}

/// `{ "id": "..." }`
#[derive(Debug, Deserialize)]
pub(crate) struct IdResponse {
    pub id: String,
}
