//! Account recovery: request a one-time code, verify it, reset the
//! password.
//!
//! The flow is a sequence the caller drives. Each step hands back exactly
//! what the next one needs, so there is no hidden state to reset between
//! attempts:
//!
//! 1. [`RecoveryFlow::request_otp`] - emails a code to the account
//! 2. [`RecoveryFlow::verify_otp`] - exchanges the code for a reset
//!    credential, or reports that an external identity provider owns the
//!    account
//! 3. [`RecoveryFlow::reset_password`] - submits the new password
//!
//! [`failure_message`] turns any step's error into the one line worth
//! showing a user.

pub mod flow;
pub mod validate;

pub use flow::{
    failure_message, OtpOutcome, RecoveryFlow, MSG_GENERIC_FAILURE, MSG_NETWORK_UNREACHABLE,
    MSG_OTP_EXPIRED, MSG_OTP_INVALID, MSG_OTP_SENT, MSG_PASSWORD_CHANGED,
};
