use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// Local input rejected before any network traffic.
    #[error("{0}")]
    Validation(String),

    /// Non-2xx response. The message has already been normalized from the
    /// response body, so `Display` renders it alone; the status stays
    /// available as data.
    #[error("{message}")]
    Request { status: StatusCode, message: String },

    /// The password-reset authorization was rejected by the server.
    #[error("Reset authorization has expired or is invalid - please request a new code")]
    AuthorizationExpired,

    /// 2xx response whose body could not be parsed as the expected shape.
    #[error("Invalid response from server: {0}")]
    MalformedResponse(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Maximum length for error response bodies carried in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Shown in place of any server body we refuse to surface verbatim
pub(crate) const INVALID_RESPONSE_MESSAGE: &str =
    "Received an invalid response from the server";

/// Error payload shape used by the backend. Some routes put the text under
/// `message`, older ones under `error`.
#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

impl ApiError {
    /// Truncate a response body to avoid carrying excessive data in messages
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Build the error for a non-2xx response.
    ///
    /// Message priority: a structured `message`/`error` field from the body,
    /// then the raw body text, then the bare status line. Markup-shaped
    /// bodies (HTML error pages from a proxy or mis-routed handler) are
    /// replaced with a generic message so raw markup never reaches a caller.
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let message = extract_message(body)
            .unwrap_or_else(|| status.to_string());
        ApiError::Request { status, message }
    }

    /// Status code of the failed request, when there was a response at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Request { status, .. } => Some(*status),
            ApiError::Network(e) => e.status(),
            _ => None,
        }
    }
}

fn extract_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    let text = match serde_json::from_str::<ErrorBody>(trimmed) {
        Ok(parsed) => match parsed.message.or(parsed.error) {
            Some(field) if !field.trim().is_empty() => field,
            _ => trimmed.to_string(),
        },
        Err(_) => trimmed.to_string(),
    };
    if looks_like_markup(&text) {
        return Some(INVALID_RESPONSE_MESSAGE.to_string());
    }
    Some(ApiError::truncate_body(&text))
}

/// Heuristic for HTML/XML error pages: a body that leads with a tag or
/// doctype is markup, whatever the content-type header claimed.
fn looks_like_markup(body: &str) -> bool {
    let mut chars = body.trim_start().chars();
    chars.next() == Some('<')
        && chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '!' || c == '/')
}
