//! REST API transport for the Paddock backend.
//!
//! This module provides the `ApiClient` used by the session manager and
//! the recovery flow. All requests funnel through it: bearer injection,
//! payload encoding, and response normalization live here so the rest of
//! the crate deals in typed values and [`ApiError`] only.

pub mod client;
pub mod error;

pub use client::{ApiClient, Auth, Payload, RawResponse};
pub use error::ApiError;
