//! # bo-auth — Permission Cache
//!
//! Memoizes the set of `PACKAGE.PROCEDURE` permissions granted to each
//! principal. Sets are fetched through the invocation engine's cursor
//! variant and kept for a fixed time-to-live (five minutes by default).
//!
//! ```text
//! get_permissions("user1")
//!   ├─ fresh entry for "USER1"? ──► shared Arc<CachedPermissionSet>
//!   └─ missing or stale ──► BO_AUTH.GET_USER_PERMISSIONS(P_USERNAME, P_CURSOR)
//!                          ──► {PACKAGE_NAME, PROCEDURE_NAME} rows
//!                          ──► replace entry wholesale
//! ```
//!
//! The backing map is a `DashMap`; no lock is held across the database
//! call. Two cold lookups racing for the same principal may both fetch; the
//! later insert wins and either way the stored set is complete.

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;

pub use cache::{CachedPermissionSet, PermissionCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, PermissionCacheConfig};
pub use error::AuthError;
