//! Permission cache configuration.

use std::time::Duration;

use bo_core::RoutineName;

/// How long sets live and which routine produces them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionCacheConfig {
    /// Age at which a cached set is refetched.
    pub ttl: Duration,
    /// Cursor procedure taking `P_USERNAME` and returning `P_CURSOR`.
    pub routine: RoutineName,
}

impl PermissionCacheConfig {
    /// Default time-to-live.
    pub const DEFAULT_TTL: Duration = Duration::from_secs(300);
    /// Default lookup package.
    pub const DEFAULT_PACKAGE: &'static str = "BO_AUTH";
    /// Default lookup procedure.
    pub const DEFAULT_PROCEDURE: &'static str = "GET_USER_PERMISSIONS";

    /// Defaults with a custom time-to-live.
    pub fn with_ttl(ttl: Duration) -> Result<Self, ConfigError> {
        Ok(Self {
            ttl,
            routine: default_routine()?,
        })
    }

    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `BO_PERMISSION_TTL_SECS` (default: 300)
    /// - `BO_PERMISSION_ROUTINE` (default: `BO_AUTH.GET_USER_PERMISSIONS`)
    pub fn from_env() -> Result<Self, ConfigError> {
        let ttl = match std::env::var("BO_PERMISSION_TTL_SECS") {
            Ok(raw) => Duration::from_secs(
                raw.trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidTtl(raw.clone()))?,
            ),
            Err(_) => Self::DEFAULT_TTL,
        };
        let routine = match std::env::var("BO_PERMISSION_ROUTINE") {
            Ok(raw) => {
                RoutineName::parse(&raw).map_err(|e| ConfigError::InvalidRoutine(e.to_string()))?
            }
            Err(_) => default_routine()?,
        };
        Ok(Self { ttl, routine })
    }
}

fn default_routine() -> Result<RoutineName, ConfigError> {
    RoutineName::new(
        PermissionCacheConfig::DEFAULT_PACKAGE,
        PermissionCacheConfig::DEFAULT_PROCEDURE,
    )
    .map_err(|e| ConfigError::InvalidRoutine(e.to_string()))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("BO_PERMISSION_TTL_SECS must be a whole number of seconds, got {0:?}")]
    InvalidTtl(String),
    #[error("invalid permission routine: {0}")]
    InvalidRoutine(String),
}
