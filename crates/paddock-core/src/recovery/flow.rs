//! The password-recovery flow: request a code, verify it, set a new
//! password.
//!
//! Each step validates its input locally, talks to the backend through the
//! shared [`ApiClient`], and hands the next step's state back to the
//! caller. Nothing is stored between steps - the recovery credential a
//! verification yields is threaded explicitly into
//! [`RecoveryFlow::reset_password`], and dropping it abandons the attempt.
//!
//! Accounts that live at an external identity provider are handled by the
//! backend answering the verification request with a redirect off-site.
//! That is a successful outcome, not a failure: the caller is told where
//! to go.

use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};
use url::Url;

use crate::api::client::parse_success_body;
use crate::api::error::INVALID_RESPONSE_MESSAGE;
use crate::api::{ApiClient, ApiError, Auth, Payload};

use super::validate;

/// Confirmation used when the backend acknowledges a code request without
/// a message of its own
pub const MSG_OTP_SENT: &str =
    "If that address has an account, a verification code is on its way";

/// Confirmation used when the backend resets the password silently
pub const MSG_PASSWORD_CHANGED: &str = "Your password has been updated - you can sign in now";

pub const MSG_NETWORK_UNREACHABLE: &str =
    "Unable to reach the server. Check your connection and try again";

pub const MSG_OTP_EXPIRED: &str = "That code has expired. Request a new one";

pub const MSG_OTP_INVALID: &str = "That code is not right. Check it and try again";

pub const MSG_GENERIC_FAILURE: &str = "Something went wrong. Please try again";

#[derive(Debug, Deserialize)]
struct MessageResponse {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VerifyOtpResponse {
    #[serde(rename = "resetToken", default)]
    reset_token: Option<String>,
    #[serde(default)]
    token: Option<String>,
}

/// Result of a successful OTP verification.
#[derive(Debug, Clone, PartialEq)]
pub enum OtpOutcome {
    /// The code was accepted. Pass the credential to
    /// [`RecoveryFlow::reset_password`].
    Verified { reset_token: String },
    /// The account is managed by an external identity provider; navigate
    /// to `location` and finish there. No local reset will work.
    RedirectToProvider { location: Url },
}

/// Stateless driver for the recovery steps. Cheap to construct; borrows
/// the transport's connection pool.
#[derive(Clone)]
pub struct RecoveryFlow {
    api: ApiClient,
}

impl RecoveryFlow {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Ask the backend to email a verification code.
    ///
    /// The email is checked locally first; a malformed one never reaches
    /// the network. Returns the acknowledgment to show the user, server
    /// wording preferred.
    pub async fn request_otp(&self, email: &str) -> Result<String, ApiError> {
        let email = email.trim();
        validate::email(email)?;

        let response: MessageResponse = self
            .api
            .request(
                Method::POST,
                "/forgot-password",
                Some(Payload::Json(json!({ "email": email }))),
                Auth::Anonymous,
            )
            .await?;

        debug!("verification code requested");
        Ok(non_empty(response.message).unwrap_or_else(|| MSG_OTP_SENT.to_string()))
    }

    /// Submit the emailed code.
    ///
    /// Three ways the backend answers a good code:
    /// - a dedicated `resetToken` credential,
    /// - a generic `token` field (older deployments),
    /// - a bare acknowledgment, in which case the code itself doubles as
    ///   the credential.
    ///
    /// A response that lands on a different origin than the configured
    /// base means the account is handled by an external identity provider
    /// and becomes [`OtpOutcome::RedirectToProvider`] without touching the
    /// body.
    pub async fn verify_otp(&self, code: &str) -> Result<OtpOutcome, ApiError> {
        let code = code.trim();
        validate::otp_code(code)?;

        let raw = self
            .api
            .send(
                Method::GET,
                &format!("/verify-otp?token={code}"),
                None,
                Auth::Anonymous,
            )
            .await?;

        if !self.api.same_origin(&raw.url) {
            info!(provider = %raw.url, "verification redirected to an external identity provider");
            return Ok(OtpOutcome::RedirectToProvider { location: raw.url });
        }

        if !raw.status.is_success() {
            return Err(ApiError::from_response(raw.status, &raw.body));
        }

        let response: VerifyOtpResponse = parse_success_body(&raw.body)?;
        let reset_token = [response.reset_token, response.token]
            .into_iter()
            .flatten()
            .find(|t| !t.trim().is_empty())
            .unwrap_or_else(|| code.to_string());

        debug!("verification code accepted");
        Ok(OtpOutcome::Verified { reset_token })
    }

    /// Submit the new password under the recovery credential.
    ///
    /// The strength check runs locally first. A 401 from the backend means
    /// the credential is spent or expired and maps to its own error so the
    /// caller can say something more useful than "request failed".
    pub async fn reset_password(
        &self,
        reset_token: &str,
        new_password: &str,
    ) -> Result<String, ApiError> {
        validate::new_password(new_password)?;

        let fields = vec![
            ("token".to_string(), reset_token.to_string()),
            ("newPassword".to_string(), new_password.to_string()),
        ];
        let raw = self
            .api
            .send(
                Method::POST,
                "/reset-password",
                Some(Payload::Form(fields)),
                Auth::Anonymous,
            )
            .await?;

        if raw.status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::AuthorizationExpired);
        }
        if !raw.status.is_success() {
            return Err(ApiError::from_response(raw.status, &raw.body));
        }

        let response: MessageResponse = parse_success_body(&raw.body)?;
        info!("password reset completed");
        Ok(non_empty(response.message).unwrap_or_else(|| MSG_PASSWORD_CHANGED.to_string()))
    }
}

/// Classify a failure into the one line shown to the user.
///
/// Pure and timer-free; how long the message stays on screen is the
/// presentation layer's business. Server wording is deliberately not
/// echoed for the code path - the classes below are what users can act on.
pub fn failure_message(err: &ApiError) -> String {
    match err {
        ApiError::Validation(message) => message.clone(),
        ApiError::AuthorizationExpired => err.to_string(),
        ApiError::MalformedResponse(_) => INVALID_RESPONSE_MESSAGE.to_string(),
        ApiError::Network(_) => MSG_NETWORK_UNREACHABLE.to_string(),
        ApiError::Request { message, .. } => {
            if message == INVALID_RESPONSE_MESSAGE {
                return message.clone();
            }
            let lower = message.to_lowercase();
            if lower.contains("expired") {
                MSG_OTP_EXPIRED.to_string()
            } else if lower.contains("invalid")
                || lower.contains("incorrect")
                || lower.contains("wrong")
                || lower.contains("not match")
            {
                MSG_OTP_INVALID.to_string()
            } else {
                MSG_GENERIC_FAILURE.to_string()
            }
        }
    }
}

fn non_empty(message: Option<String>) -> Option<String> {
    message.filter(|m| !m.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use wiremock::matchers::{body_json, body_string, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::auth::MemoryStore;

    use super::*;

    fn flow_for(server: &MockServer) -> RecoveryFlow {
        let store = Arc::new(MemoryStore::new());
        RecoveryFlow::new(ApiClient::new(&server.uri(), store).unwrap())
    }

    #[tokio::test]
    async fn bad_email_never_reaches_the_network() {
        let server = MockServer::start().await;
        let flow = flow_for(&server);

        let err = flow.request_otp("not-an-email").await.unwrap_err();

        assert!(matches!(err, ApiError::Validation(_)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn request_otp_prefers_the_server_acknowledgment() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/forgot-password"))
            .and(body_json(json!({"email": "driver@paddock.test"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"message": "Code sent to inbox"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let flow = flow_for(&server);
        let message = flow.request_otp("  driver@paddock.test  ").await.unwrap();
        assert_eq!(message, "Code sent to inbox");
    }

    #[tokio::test]
    async fn request_otp_falls_back_to_a_generic_confirmation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/forgot-password"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let flow = flow_for(&server);
        let message = flow.request_otp("driver@paddock.test").await.unwrap();
        assert_eq!(message, MSG_OTP_SENT);
    }

    #[tokio::test]
    async fn request_otp_surfaces_server_failures_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/forgot-password"))
            .respond_with(
                ResponseTemplate::new(429)
                    .set_body_json(json!({"message": "Too many requests, slow down"})),
            )
            .mount(&server)
            .await;

        let flow = flow_for(&server);
        let err = flow.request_otp("driver@paddock.test").await.unwrap_err();
        assert_eq!(err.to_string(), "Too many requests, slow down");
    }

    #[tokio::test]
    async fn malformed_codes_never_reach_the_network() {
        let server = MockServer::start().await;
        let flow = flow_for(&server);

        for code in ["", "12345", "1234567", "12e456", "banana"] {
            let err = flow.verify_otp(code).await.unwrap_err();
            assert!(matches!(err, ApiError::Validation(_)), "accepted {code:?}");
        }
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn verify_prefers_the_dedicated_reset_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/verify-otp"))
            .and(query_param("token", "123456"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"message": "ok", "resetToken": "R-dedicated", "token": "R-generic"}),
            ))
            .mount(&server)
            .await;

        let flow = flow_for(&server);
        let outcome = flow.verify_otp("123456").await.unwrap();
        assert_eq!(
            outcome,
            OtpOutcome::Verified {
                reset_token: "R-dedicated".to_string()
            }
        );
    }

    #[tokio::test]
    async fn verify_falls_back_to_the_generic_token_field() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/verify-otp"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"resetToken": "", "token": "R-generic"})),
            )
            .mount(&server)
            .await;

        let flow = flow_for(&server);
        let outcome = flow.verify_otp("123456").await.unwrap();
        assert_eq!(
            outcome,
            OtpOutcome::Verified {
                reset_token: "R-generic".to_string()
            }
        );
    }

    #[tokio::test]
    async fn verify_falls_back_to_the_submitted_code() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/verify-otp"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"message": "Code accepted"})),
            )
            .mount(&server)
            .await;

        let flow = flow_for(&server);
        let outcome = flow.verify_otp(" 654321 ").await.unwrap();
        assert_eq!(
            outcome,
            OtpOutcome::Verified {
                reset_token: "654321".to_string()
            }
        );
    }

    #[tokio::test]
    async fn verify_detects_a_redirect_to_an_external_provider() {
        let backend = MockServer::start().await;
        let provider = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/session/start"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("<html>provider sign-in</html>"),
            )
            .mount(&provider)
            .await;
        Mock::given(method("GET"))
            .and(path("/verify-otp"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("location", format!("{}/session/start", provider.uri())),
            )
            .mount(&backend)
            .await;

        let flow = flow_for(&backend);
        let outcome = flow.verify_otp("123456").await.unwrap();

        match outcome {
            OtpOutcome::RedirectToProvider { location } => {
                assert_eq!(location.path(), "/session/start");
                assert!(location.as_str().starts_with(&provider.uri()));
            }
            other => panic!("expected provider redirect, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn same_origin_redirects_are_followed_and_parsed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/verify-otp"))
            .respond_with(
                ResponseTemplate::new(302).insert_header("location", "/verify-otp/result"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/verify-otp/result"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"resetToken": "R-followed"})),
            )
            .mount(&server)
            .await;

        let flow = flow_for(&server);
        let outcome = flow.verify_otp("123456").await.unwrap();
        assert_eq!(
            outcome,
            OtpOutcome::Verified {
                reset_token: "R-followed".to_string()
            }
        );
    }

    #[tokio::test]
    async fn verify_failure_classifies_for_the_user() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/verify-otp"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"message": "OTP has expired"})),
            )
            .mount(&server)
            .await;

        let flow = flow_for(&server);
        let err = flow.verify_otp("123456").await.unwrap_err();
        assert_eq!(failure_message(&err), MSG_OTP_EXPIRED);
    }

    #[tokio::test]
    async fn weak_passwords_never_reach_the_network() {
        let server = MockServer::start().await;
        let flow = flow_for(&server);

        for password in ["short1", "lettersonly", "12345678"] {
            let err = flow.reset_password("R-1", password).await.unwrap_err();
            assert!(matches!(err, ApiError::Validation(_)));
        }
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reset_password_submits_the_credential_as_a_form() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/reset-password"))
            .and(body_string("token=R-1&newPassword=formula1x"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"message": "Password updated"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let flow = flow_for(&server);
        let message = flow.reset_password("R-1", "formula1x").await.unwrap();
        assert_eq!(message, "Password updated");
    }

    #[tokio::test]
    async fn reset_password_falls_back_to_a_generic_confirmation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/reset-password"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let flow = flow_for(&server);
        let message = flow.reset_password("R-1", "formula1x").await.unwrap();
        assert_eq!(message, MSG_PASSWORD_CHANGED);
    }

    #[tokio::test]
    async fn spent_reset_credentials_map_to_authorization_expired() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/reset-password"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"message": "Unauthorized"})),
            )
            .mount(&server)
            .await;

        let flow = flow_for(&server);
        let err = flow.reset_password("R-spent", "formula1x").await.unwrap_err();

        assert!(matches!(err, ApiError::AuthorizationExpired));
        assert_ne!(failure_message(&err), MSG_GENERIC_FAILURE);
    }

    #[tokio::test]
    async fn html_error_pages_are_never_shown_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/forgot-password"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_string("<html><body><h1>Server Error</h1></body></html>"),
            )
            .mount(&server)
            .await;

        let flow = flow_for(&server);
        let err = flow.request_otp("driver@paddock.test").await.unwrap_err();

        assert_eq!(err.to_string(), INVALID_RESPONSE_MESSAGE);
        assert_eq!(failure_message(&err), INVALID_RESPONSE_MESSAGE);
    }

    #[tokio::test]
    async fn unreachable_server_classifies_as_network_trouble() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let store = Arc::new(MemoryStore::new());
        let flow = RecoveryFlow::new(
            ApiClient::new(&format!("http://127.0.0.1:{port}"), store).unwrap(),
        );

        let err = flow.request_otp("driver@paddock.test").await.unwrap_err();
        assert_eq!(failure_message(&err), MSG_NETWORK_UNREACHABLE);
    }

    #[test]
    fn classification_covers_the_message_table() {
        let cases = [
            ("Your OTP has expired", MSG_OTP_EXPIRED),
            ("Invalid verification code", MSG_OTP_INVALID),
            ("The code was incorrect", MSG_OTP_INVALID),
            ("Codes do not match our records", MSG_OTP_INVALID),
            ("Teapot refuses coffee", MSG_GENERIC_FAILURE),
        ];
        for (server_message, expected) in cases {
            let err = ApiError::Request {
                status: StatusCode::BAD_REQUEST,
                message: server_message.to_string(),
            };
            assert_eq!(failure_message(&err), expected, "for {server_message:?}");
        }
    }
}
