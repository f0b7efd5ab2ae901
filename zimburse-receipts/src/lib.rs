//! Receipt extraction for z-imburse claims.
//!
//! An uploaded receipt email goes through the external DKIM verifier, then a
//! vendor strategy turns the verified body and header into a [`ClaimRecord`]:
//!
//! ```text
//! raw .eml ──► EmailVerifier ──► VerifiedEmail ──► Vendor::extract ──► ClaimRecord
//! ```
//!
//! Strategies are pure functions over bytes. They locate an anchor substring,
//! scan forward or backward to a delimiter, and convert the text between into
//! exact micro-unit amounts and UTC dates.
//!
//! [`ClaimRecord`]: zimburse_common::ClaimRecord

pub mod anchor;
pub mod capsule;
pub mod date;
pub mod engine;
pub mod error;
pub mod header;
pub mod linode;
pub mod united;
pub mod vendor;
pub mod verifier;

pub use capsule::{break_into_capsules, deferred_capsules, CAPSULE_SIZE};
pub use engine::{extract_verified, Extraction, ReceiptEngine};
pub use error::{ExtractError, ParseError, VerificationError};
pub use united::DeferredBody;
pub use vendor::{ExtractedReceipt, Vendor};
pub use verifier::{EmailVerifier, VerifiedEmail, VerifyOptions};
