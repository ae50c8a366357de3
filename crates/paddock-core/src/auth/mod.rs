//! Session state and credential storage.
//!
//! This module provides:
//! - `SessionManager`: the process-wide authority on who is signed in
//! - `CredentialStore`: pluggable storage for the session token, with
//!   keychain, file and in-memory backends
//!
//! Tokens are opaque and never refreshed; a rejected token is simply
//! dropped and the session becomes anonymous.

pub mod credentials;
pub mod session;

pub use credentials::{
    mask_token, CredentialStore, FileStore, KeyringStore, MemoryStore, StoreKey,
};
pub use session::{SessionManager, SessionState, REGISTER_SUCCESS_MESSAGE};
