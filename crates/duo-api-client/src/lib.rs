//! Duo Admin API client.
//!
//! Every call is signed with the integration's secret key (HMAC-SHA512 over
//! a canonical request string) and returned to the caller unparsed. Callers
//! depend on the [`SignedCaller`] trait, [`DuoApiClient`] is the HTTP
//! implementation.

mod client;
mod error;
mod signing;
mod types;

pub use client::{ClientOptions, DuoApiClient, DEFAULT_TIMEOUT, USER_AGENT};
pub use error::ClientError;
pub use reqwest::Method;
pub use signing::{canonical_params, canonicalize, sign, DATE_FORMAT};
pub use types::*;
