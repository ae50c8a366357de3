//! Data models for the Paddock account API.
//!
//! - `Identity`: the signed-in account as returned by the backend
//! - `Preferences`: per-account settings embedded in the identity
//! - `NewAccount` / `ProfileUpdate`: request-side shapes for registration
//!   and partial profile edits

pub mod identity;

pub use identity::{Identity, NewAccount, Preferences, ProfileUpdate};
