//! Paddock client core - sessions and account recovery for the Paddock
//! motorsport companion service.
//!
//! Front-ends (web, terminal) sit on top of four pieces:
//!
//! - [`api::ApiClient`]: authenticated transport with normalized errors
//! - [`auth::CredentialStore`]: durable storage for the session token
//! - [`auth::SessionManager`]: login, registration, logout, rehydration
//! - [`recovery::RecoveryFlow`]: OTP-based password recovery
//!
//! A typical setup wires them around one store and one client:
//!
//! ```no_run
//! use std::sync::Arc;
//! use paddock_core::api::ApiClient;
//! use paddock_core::auth::{KeyringStore, SessionManager};
//! use paddock_core::recovery::RecoveryFlow;
//!
//! # fn main() -> Result<(), paddock_core::api::ApiError> {
//! let store = Arc::new(KeyringStore::new());
//! let api = ApiClient::new("https://api.paddock.racing", store.clone())?;
//! let session = SessionManager::new(api.clone(), store);
//! let recovery = RecoveryFlow::new(api);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod recovery;

pub use api::{ApiClient, ApiError};
pub use auth::{CredentialStore, SessionManager, SessionState};
pub use config::Config;
pub use models::{Identity, NewAccount, Preferences, ProfileUpdate};
pub use recovery::{failure_message, OtpOutcome, RecoveryFlow};
