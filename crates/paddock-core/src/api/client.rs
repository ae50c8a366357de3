//! HTTP client for the Paddock REST API.
//!
//! This module provides the `ApiClient` struct: the single choke point
//! through which the session manager and the recovery flow talk to the
//! backend. It attaches the stored session token, normalizes response
//! bodies, and reports failures through [`ApiError`].

use std::sync::Arc;

use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::auth::{CredentialStore, StoreKey};

use super::ApiError;

/// User agent sent with every request
const USER_AGENT: &str = concat!("paddock/", env!("CARGO_PKG_VERSION"));

/// Request body variants accepted by [`ApiClient::send`].
pub enum Payload {
    /// JSON document, sent with an explicit `application/json` content-type
    Json(Value),
    /// URL-encoded form fields
    Form(Vec<(String, String)>),
    /// Multipart form. No content-type is forced so the transport can set
    /// its own boundary.
    Multipart(reqwest::multipart::Form),
}

impl Payload {
    /// JSON payload built from any serializable value
    pub fn json<T: Serialize>(value: &T) -> Result<Self, ApiError> {
        serde_json::to_value(value)
            .map(Payload::Json)
            .map_err(|e| ApiError::Validation(format!("Could not encode request body: {e}")))
    }
}

/// Whether a request carries the stored session token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Auth {
    /// Attach `Authorization: Bearer <token>` when a usable token is stored.
    /// With no token the header is omitted entirely, never sent empty.
    Bearer,
    /// Never attach credentials (login, registration, recovery)
    Anonymous,
}

/// Terminal state of a request after redirects have been followed.
#[derive(Debug)]
pub struct RawResponse {
    pub status: StatusCode,
    /// The URL the response actually came from, which differs from the
    /// requested one when the server redirected.
    pub url: Url,
    pub body: String,
}

/// API client for the Paddock backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
    store: Arc<dyn CredentialStore>,
}

/// Manual impl: the credential store is a trait object without `Debug`.
impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a client for the given base URL, reading the session token
    /// from `store`. No request timeout is set; callers impose their own
    /// deadlines where they need them.
    pub fn new(base_url: &str, store: Arc<dyn CredentialStore>) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ApiError::Validation(format!("Invalid base URL {base_url:?}: {e}")))?;
        let http = Client::builder().user_agent(USER_AGENT).build()?;

        Ok(Self {
            http,
            base_url,
            store,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// True when `url` shares scheme, host and port with the configured
    /// base. A final URL that fails this check means the server redirected
    /// us off-site.
    pub fn same_origin(&self, url: &Url) -> bool {
        url.origin() == self.base_url.origin()
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    /// Stored session token, trimmed and unwrapped. Older front-ends
    /// persisted the token JSON-stringified, so a redundantly quoted value
    /// must not leak into the Authorization header.
    fn bearer_token(&self) -> Option<String> {
        let raw = self.store.get(StoreKey::SessionToken)?;
        let token = strip_wrapping_quotes(raw.trim());
        if token.is_empty() {
            None
        } else {
            Some(token.to_string())
        }
    }

    /// Send a request and read the body once, without judging the status.
    /// The recovery flow uses this directly because it needs the final URL
    /// to detect redirects to an external identity provider.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        payload: Option<Payload>,
        auth: Auth,
    ) -> Result<RawResponse, ApiError> {
        let url = self.endpoint(path);
        let mut request = self.http.request(method.clone(), &url);

        if auth == Auth::Bearer {
            if let Some(token) = self.bearer_token() {
                request = request.bearer_auth(token);
            }
        }

        request = match payload {
            Some(Payload::Json(body)) => request.json(&body),
            Some(Payload::Form(fields)) => request.form(&fields),
            Some(Payload::Multipart(form)) => request.multipart(form),
            None => request,
        };

        let response = request.send().await?;
        let status = response.status();
        let final_url = response.url().clone();
        let body = response.text().await?;

        debug!(method = %method, url = %url, status = %status, "request completed");

        Ok(RawResponse {
            status,
            url: final_url,
            body,
        })
    }

    /// Send a request and normalize the response:
    ///
    /// - non-2xx becomes [`ApiError::Request`] with a message derived from
    ///   the body (structured field, then raw text, then status line);
    /// - 2xx with an empty body parses as an empty JSON object;
    /// - 2xx with a body that does not parse as `T` becomes
    ///   [`ApiError::MalformedResponse`].
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        payload: Option<Payload>,
        auth: Auth,
    ) -> Result<T, ApiError> {
        let raw = self.send(method, path, payload, auth).await?;
        if !raw.status.is_success() {
            return Err(ApiError::from_response(raw.status, &raw.body));
        }
        parse_success_body(&raw.body)
    }
}

/// Parse the body of a successful response. Several endpoints answer with
/// no content at all; an empty body is read as `{}` so callers with
/// all-optional targets see an empty object rather than an error.
pub(crate) fn parse_success_body<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    let text = body.trim();
    let effective = if text.is_empty() { "{}" } else { text };
    Ok(serde_json::from_str(effective)?)
}

/// Strip one layer of leading/trailing double quotes
fn strip_wrapping_quotes(raw: &str) -> &str {
    let s = raw.strip_prefix('"').unwrap_or(raw);
    s.strip_suffix('"').unwrap_or(s)
}
