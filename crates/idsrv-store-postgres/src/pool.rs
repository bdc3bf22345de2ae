//! Connection pools for the two storage contexts.

use std::time::Duration;

use sqlx_core::pool::PoolOptions;
use sqlx_postgres::{PgPool, Postgres};
use tracing::{debug, info, instrument};

use crate::config::PostgresConfig;
use crate::error::{PostgresError, Result};

/// Type alias for PostgreSQL pool options.
pub type PgPoolOptions = PoolOptions<Postgres>;

const DEFAULT_MAX_LIFETIME_SECS: u64 = 1800;

/// Pools of the configuration and operational contexts. Both point at the
/// same pool unless an operational URL is configured.
#[derive(Debug, Clone)]
pub struct StorePools {
    pub configuration: PgPool,
    pub operational: PgPool,
}

/// Pool sizing shared by both contexts.
///
/// # Errors
///
/// Returns `PostgresError::Config` if the pool cannot hold a connection or
/// the minimum exceeds the maximum.
pub fn pool_options(config: &PostgresConfig) -> Result<PgPoolOptions> {
    if config.pool_size == 0 {
        return Err(PostgresError::config("pool_size must be at least 1"));
    }
    let min_connections = config
        .min_connections
        .unwrap_or(config.pool_size / 4)
        .max(1);
    if min_connections > config.pool_size {
        return Err(PostgresError::config(format!(
            "min_connections ({min_connections}) exceeds pool_size ({})",
            config.pool_size
        )));
    }

    let options = PgPoolOptions::new()
        .max_connections(config.pool_size)
        .min_connections(min_connections)
        .acquire_timeout(Duration::from_millis(config.connect_timeout_ms))
        .max_lifetime(Duration::from_secs(
            config.max_lifetime_secs.unwrap_or(DEFAULT_MAX_LIFETIME_SECS),
        ))
        .idle_timeout(config.idle_timeout_ms.map(Duration::from_millis));
    Ok(options)
}

/// Connects the configuration pool and, when `operational_url` is set, a
/// second pool for grants.
#[instrument(skip_all, fields(url = %mask_password(&config.url)))]
pub async fn create_pools(config: &PostgresConfig) -> Result<StorePools> {
    let options = pool_options(config)?;
    info!(pool_size = config.pool_size, "Connecting configuration pool");
    let configuration = options.clone().connect(&config.url).await?;

    let operational = match &config.operational_url {
        Some(url) => {
            info!(url = %mask_password(url), "Connecting operational pool");
            options.connect(url).await?
        }
        None => {
            debug!("Operational context shares the configuration pool");
            configuration.clone()
        }
    };

    Ok(StorePools {
        configuration,
        operational,
    })
}

/// Masks the password in a database URL for logging.
pub(crate) fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.find('@')
        && let Some(colon_pos) = url[..at_pos].rfind(':')
    {
        let scheme_end = url.find("://").map(|p| p + 3).unwrap_or(0);
        if colon_pos > scheme_end {
            return format!("{}:****{}", &url[..colon_pos], &url[at_pos..]);
        }
    }
    url.to_string()
}
