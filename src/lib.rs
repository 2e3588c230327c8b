//! Alibaba Cloud STS (Security Token Service) SDK with credential caching.
//!
//! The centerpiece is [`CredentialCache`], which sits in front of a
//! role-assumption [`CredentialSource`] and hands back previously issued
//! temporary credentials while they remain valid for a caller-chosen window:
//!
//! - [`CredentialCache::get`]: cached credentials, refreshed on miss or near expiry
//! - [`default_key`]: the default cache key derivation (role, session, policy)
//!
//! The STS clients cover the calls the cache needs:
//!
//! - [`Client::assume_role`] / [`blocking::Client::assume_role`]: assume a RAM role
//! - [`Client::get_caller_identity`]: query the current caller identity
//!
//! # Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use rs_ali_sts_cache::{AccessKey, AssumeRoleRequest, CredentialCache, blocking};
//!
//! # fn example() -> rs_ali_sts_cache::Result<()> {
//! let client = blocking::Client::new(AccessKey::new(
//!     "your-access-key-id",
//!     "your-access-key-secret",
//! ))?;
//! let cache = CredentialCache::new(client);
//!
//! let request = AssumeRoleRequest::new("acs:ram::123456789012:role/example", "session")
//!     .with_duration_seconds(3600);
//!
//! let creds = cache.get(&request, Duration::from_secs(600))?;
//! println!("Temporary AK: {}", creds.access_key_id);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod credential;
pub mod error;
pub mod request;
pub mod response;

#[cfg(feature = "blocking")]
pub mod blocking;

mod exec;
mod sign;

pub use cache::{Clock, CredentialCache, CredentialSource, KeyFn, SystemClock, default_key};
pub use client::Client;
pub use config::ClientConfig;
pub use credential::AccessKey;
pub use error::{Result, StsError};
pub use request::{AssumeRoleRequest, role_arn};
pub use response::{AssumeRoleResponse, AssumedRoleUser, Credentials, GetCallerIdentityResponse};

// Compile-time assertions: key types must be Send + Sync for use across threads.
const _: () = {
    const fn assert_send_sync<T: Send + Sync>() {}
    let _ = assert_send_sync::<Client>;
    let _ = assert_send_sync::<StsError>;
    let _ = assert_send_sync::<AccessKey>;
    let _ = assert_send_sync::<Credentials>;
    #[cfg(feature = "blocking")]
    let _ = assert_send_sync::<CredentialCache<blocking::Client>>;
};
