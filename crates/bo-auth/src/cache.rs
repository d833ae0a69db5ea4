//! Time-to-live permission cache keyed by principal.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bo_core::{CallRequest, CursorRow, DomainError, DriverError, RoutineName, SqlType, Value};
use bo_engine::ProcedureExecutor;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

use crate::clock::{Clock, SystemClock};
use crate::config::PermissionCacheConfig;
use crate::error::AuthError;

/// Permissions granted to one principal, as of `fetched_at`.
///
/// Never mutated after construction; a refetch replaces the whole set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CachedPermissionSet {
    /// Normalized principal the set belongs to.
    pub principal: String,
    /// Upper-cased `PACKAGE.PROCEDURE` strings.
    pub permissions: BTreeSet<String>,
    /// When the set was loaded.
    pub fetched_at: DateTime<Utc>,
}

impl CachedPermissionSet {
    /// Whether `permission` (`PACKAGE.PROCEDURE`, any case) is granted.
    pub fn contains(&self, permission: &str) -> bool {
        self.permissions
            .contains(&permission.trim().to_ascii_uppercase())
    }

    /// Whether calling `routine` is granted.
    pub fn allows(&self, routine: &RoutineName) -> bool {
        self.permissions.contains(&routine.permission_key())
    }

    /// Number of permissions.
    pub fn len(&self) -> usize {
        self.permissions.len()
    }

    /// Whether nothing is granted.
    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }

    /// Younger than `ttl` at `now`. A set stamped in the future counts as fresh.
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        match now.signed_duration_since(self.fetched_at).to_std() {
            Ok(age) => age < ttl,
            Err(_) => true,
        }
    }
}

/// Process-wide permission cache.
///
/// Share it behind an `Arc`; all methods take `&self`.
pub struct PermissionCache {
    executor: ProcedureExecutor,
    config: PermissionCacheConfig,
    clock: Arc<dyn Clock>,
    entries: DashMap<String, Arc<CachedPermissionSet>>,
    /// Bumped by every invalidation. A fetch that straddles a bump is not
    /// cached.
    epoch: AtomicU64,
}

impl std::fmt::Debug for PermissionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionCache")
            .field("config", &self.config)
            .field("entries", &self.entries.len())
            .finish_non_exhaustive()
    }
}

impl PermissionCache {
    /// Cache over `executor` using the wall clock.
    pub fn new(executor: ProcedureExecutor, config: PermissionCacheConfig) -> Self {
        Self::with_clock(executor, config, Arc::new(SystemClock))
    }

    /// Cache with an explicit time source.
    pub fn with_clock(
        executor: ProcedureExecutor,
        config: PermissionCacheConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            executor,
            config,
            clock,
            entries: DashMap::new(),
            epoch: AtomicU64::new(0),
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &PermissionCacheConfig {
        &self.config
    }

    /// Permission set for `principal`, fetched if missing or expired.
    ///
    /// Principals are matched after trimming and upper-casing. A blank
    /// principal is an invalid call and never reaches the database.
    ///
    /// A set whose lookup was still running when [`invalidate`] or
    /// [`invalidate_all`] was called is returned to this caller but not
    /// cached.
    ///
    /// [`invalidate`]: Self::invalidate
    /// [`invalidate_all`]: Self::invalidate_all
    pub async fn get_permissions(
        &self,
        principal: &str,
    ) -> Result<Arc<CachedPermissionSet>, DomainError> {
        let key = self.normalize(principal)?;
        let cached = self.entries.get(&key).map(|entry| Arc::clone(entry.value()));
        if let Some(set) = cached {
            if set.is_fresh(self.clock.now(), self.config.ttl) {
                tracing::trace!(principal = %key, "permission cache hit");
                return Ok(set);
            }
            tracing::debug!(principal = %key, fetched_at = %set.fetched_at, "permission set expired");
        }

        let epoch = self.epoch.load(Ordering::SeqCst);
        let set = Arc::new(self.fetch(&key).await?);
        if self.epoch.load(Ordering::SeqCst) != epoch {
            tracing::debug!(principal = %key, "invalidated during lookup; not cached");
            return Ok(set);
        }
        self.entries.insert(key.clone(), Arc::clone(&set));
        // An invalidation may have landed between the check and the insert.
        if self.epoch.load(Ordering::SeqCst) != epoch {
            self.entries
                .remove_if(&key, |_, cached| Arc::ptr_eq(cached, &set));
        }
        Ok(set)
    }

    /// Whether `principal` may call `routine`.
    pub async fn is_permitted(
        &self,
        principal: &str,
        routine: &RoutineName,
    ) -> Result<bool, DomainError> {
        Ok(self.get_permissions(principal).await?.allows(routine))
    }

    /// Refuse the call unless `principal` may call `routine`.
    pub async fn authorize(&self, principal: &str, routine: &RoutineName) -> Result<(), AuthError> {
        let set = self.get_permissions(principal).await?;
        if set.allows(routine) {
            return Ok(());
        }
        tracing::info!(principal = %set.principal, routine = %routine, "access denied");
        Err(AuthError::AccessDenied {
            principal: set.principal.clone(),
            permission: routine.permission_key(),
        })
    }

    /// Drop the entry for `principal`, if any.
    pub fn invalidate(&self, principal: &str) {
        if let Some(key) = normalize_principal(principal) {
            self.epoch.fetch_add(1, Ordering::SeqCst);
            if self.entries.remove(&key).is_some() {
                tracing::debug!(principal = %key, "permission set invalidated");
            }
        }
    }

    /// Drop every entry.
    pub fn invalidate_all(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        let evicted = self.entries.len();
        self.entries.clear();
        tracing::debug!(evicted, "permission cache cleared");
    }

    /// Number of cached principals, fresh or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn normalize(&self, principal: &str) -> Result<String, DomainError> {
        normalize_principal(principal).ok_or_else(|| {
            DomainError::invalid_call(&self.config.routine, "principal must not be blank")
        })
    }

    async fn fetch(&self, key: &str) -> Result<CachedPermissionSet, DomainError> {
        let routine = &self.config.routine;
        let req = CallRequest::builder(routine.package(), routine.procedure())
            .input("P_USERNAME", SqlType::Varchar, key)
            .cursor("P_CURSOR")
            .build()?;
        let rows = self
            .executor
            .call_cursor::<String>(&req, &permission_from_row)
            .await?;

        let set = CachedPermissionSet {
            principal: key.to_string(),
            permissions: rows.into_iter().collect(),
            fetched_at: self.clock.now(),
        };
        tracing::debug!(principal = %key, permissions = set.len(), "permission set loaded");
        Ok(set)
    }
}

fn normalize_principal(principal: &str) -> Option<String> {
    let trimmed = principal.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_ascii_uppercase())
}

fn permission_from_row(row: &CursorRow) -> Result<String, DriverError> {
    let column = |name: &str| {
        row.by_name(name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| DriverError::decode(name, "expected a non-empty name"))
    };
    Ok(format!("{}.{}", column("PACKAGE_NAME")?, column("PROCEDURE_NAME")?).to_ascii_uppercase())
}
