//! Session lifecycle: who is signed in and how that changes.
//!
//! `SessionManager` owns the process-wide session state. It starts
//! `Unknown`, resolves to `Authenticated` or `Anonymous` during
//! [`SessionManager::bootstrap`], and moves between those two through
//! login, registration and logout. The session token itself lives in the
//! credential store; this type decides when it is written and removed.

use std::sync::Arc;

use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError, Auth, Payload};
use crate::models::{Identity, NewAccount, ProfileUpdate};

use super::{CredentialStore, StoreKey};

/// Acknowledgment the backend sends when an account was actually created.
/// Any other 2xx message ("Email already in use", ...) means it was not.
pub const REGISTER_SUCCESS_MESSAGE: &str = "User registered successfully";

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
    #[serde(default)]
    #[allow(dead_code)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RegisterResponse {
    #[serde(default)]
    message: Option<String>,
}

/// What the process currently knows about the session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// Startup value, before rehydration has run
    Unknown,
    Authenticated(Identity),
    Anonymous,
}

impl SessionState {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            SessionState::Authenticated(identity) => Some(identity),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }
}

/// Process-wide session authority.
///
/// Mutating operations are serialized through an internal mutex so a login
/// racing a logout cannot interleave their store writes; accessors only
/// take the read side of the state lock.
pub struct SessionManager {
    api: ApiClient,
    store: Arc<dyn CredentialStore>,
    state: RwLock<SessionState>,
    write_gate: Mutex<()>,
}

impl SessionManager {
    pub fn new(api: ApiClient, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            api,
            store,
            state: RwLock::new(SessionState::Unknown),
            write_gate: Mutex::new(()),
        }
    }

    pub async fn state(&self) -> SessionState {
        self.state.read().await.clone()
    }

    pub async fn identity(&self) -> Option<Identity> {
        self.state.read().await.identity().cloned()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.state.read().await.is_authenticated()
    }

    /// Resolve the `Unknown` startup state from whatever the store holds.
    ///
    /// No stored token means `Anonymous`. A stored token is only trusted
    /// after the backend confirms it by returning the identity; any failure
    /// there removes the token and lands on `Anonymous`. Rehydration
    /// problems are logged, never surfaced - a stale token is an expected
    /// way for the app to start.
    pub async fn bootstrap(&self) -> SessionState {
        let _gate = self.write_gate.lock().await;

        if self.store.get(StoreKey::SessionToken).is_none() {
            debug!("no stored session token");
            return self.publish(SessionState::Anonymous).await;
        }

        match self.fetch_identity().await {
            Ok(identity) => {
                info!(user = %identity.display_name(), "session rehydrated");
                self.publish(SessionState::Authenticated(identity)).await
            }
            Err(e) => {
                warn!(error = %e, "stored session rejected, signing out");
                self.store.remove(StoreKey::SessionToken);
                self.publish(SessionState::Anonymous).await
            }
        }
    }

    /// Exchange credentials for a session.
    ///
    /// On success the token is in the store, the identity is cached and
    /// returned. On any failure the store is left without a token and the
    /// state is `Anonymous`.
    pub async fn login(&self, identifier: &str, password: &str) -> Result<Identity, ApiError> {
        let _gate = self.write_gate.lock().await;
        self.login_locked(identifier, password).await
    }

    async fn login_locked(&self, identifier: &str, password: &str) -> Result<Identity, ApiError> {
        let body = json!({
            "email": identifier,
            "password": password,
        });
        let response: LoginResponse = self
            .api
            .request(
                Method::POST,
                "/login",
                Some(Payload::Json(body)),
                Auth::Anonymous,
            )
            .await?;

        // The transport reads the token from the store, so it must be
        // persisted before the identity fetch that validates it.
        self.store.set(StoreKey::SessionToken, &response.token);

        match self.fetch_identity().await {
            Ok(identity) => {
                self.store.set(StoreKey::LastIdentifier, identifier);
                info!(user = %identity.display_name(), "signed in");
                self.publish(SessionState::Authenticated(identity.clone()))
                    .await;
                Ok(identity)
            }
            Err(e) => {
                // A token must not outlive a failed identity fetch.
                warn!(error = %e, "identity fetch after login failed");
                self.store.remove(StoreKey::SessionToken);
                self.publish(SessionState::Anonymous).await;
                Err(e)
            }
        }
    }

    /// Create an account, then sign in with the same credentials.
    ///
    /// The backend answers 2xx for both outcomes and distinguishes them in
    /// the message, so only the exact success acknowledgment proceeds to
    /// login.
    pub async fn register(
        &self,
        account: NewAccount,
        password: &str,
    ) -> Result<Identity, ApiError> {
        let _gate = self.write_gate.lock().await;

        let body = json!({
            "username": account.username,
            "email": account.email,
            "password": password,
        });
        let response: RegisterResponse = self
            .api
            .request(
                Method::POST,
                "/register",
                Some(Payload::Json(body)),
                Auth::Anonymous,
            )
            .await?;

        let message = response.message.unwrap_or_default();
        if message != REGISTER_SUCCESS_MESSAGE {
            debug!(message = %message, "registration not acknowledged");
            return Err(ApiError::Request {
                status: StatusCode::OK,
                message: if message.is_empty() {
                    "Registration failed".to_string()
                } else {
                    message
                },
            });
        }

        info!(user = %account.username, "account created, signing in");
        self.login_locked(&account.email, password).await
    }

    /// Drop the session: remove the token and forget the identity.
    ///
    /// Local only. The backend has no revocation endpoint, so nothing is
    /// sent over the wire and logout cannot fail.
    pub async fn logout(&self) {
        let _gate = self.write_gate.lock().await;
        self.store.remove(StoreKey::SessionToken);
        self.publish(SessionState::Anonymous).await;
        info!("signed out");
    }

    /// Update parts of the profile and republish the identity the server
    /// returns. Requires an authenticated session because the target URL
    /// carries the account email.
    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<Identity, ApiError> {
        let _gate = self.write_gate.lock().await;

        let email = self
            .identity()
            .await
            .map(|identity| identity.email)
            .ok_or_else(|| ApiError::Validation("Not signed in".to_string()))?;

        let payload = Payload::json(&update)?;
        let identity: Identity = self
            .api
            .request(
                Method::PUT,
                &format!("/user/{email}"),
                Some(payload),
                Auth::Bearer,
            )
            .await?;

        self.publish(SessionState::Authenticated(identity.clone()))
            .await;
        Ok(identity)
    }

    async fn fetch_identity(&self) -> Result<Identity, ApiError> {
        self.api.request(Method::GET, "/user", None, Auth::Bearer).await
    }

    async fn publish(&self, state: SessionState) -> SessionState {
        *self.state.write().await = state.clone();
        state
    }
}
