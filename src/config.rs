//! Configuration management for the collaboration server.
//!
//! Every option can be given on the command line or through an environment
//! variable with the `COLLAB_` prefix:
//!
//! - `COLLAB_HOST` - Server bind address (default: 0.0.0.0)
//! - `COLLAB_PORT` - Server port (default: 3000)
//! - `COLLAB_CORS_ORIGINS` - Allowed CORS origins, comma separated (default: any)
//! - `COLLAB_SESSION_TTL_DAYS` - Session lifetime in days (default: 30)
//! - `COLLAB_MAX_BODY_BYTES` - Request body limit (default: 1 MiB)
//! - `COLLAB_PAGE_SIZE_MAX` - Largest project listing page (default: 20)
//!
//! # Example
//!
//! ```ignore
//! use clap::Parser;
//! use collab_server::config::Config;
//!
//! let config = Config::parse();
//! config.validate()?;
//! println!("Listening on {}", config.bind_address());
//! ```

use std::time::Duration;

use clap::Parser;

use crate::accounts::{PageLimits, DEFAULT_PAGE_SIZE};
use crate::server::routes::{RouterConfig, DEFAULT_MAX_BODY_BYTES};

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default session lifetime in days.
pub const DEFAULT_SESSION_TTL_DAYS: u64 = 30;

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Collaboration server - accounts, sessions and projects over HTTP.
#[derive(Parser, Debug, Clone)]
#[command(name = "collab-server")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "COLLAB_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "COLLAB_PORT")]
    pub port: u16,

    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "COLLAB_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    /// Maximum request body size in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_BODY_BYTES, env = "COLLAB_MAX_BODY_BYTES")]
    pub max_body_bytes: usize,

    // =========================================================================
    // Sessions and Listings
    // =========================================================================
    /// Session lifetime in days.
    #[arg(long, default_value_t = DEFAULT_SESSION_TTL_DAYS, env = "COLLAB_SESSION_TTL_DAYS")]
    pub session_ttl_days: u64,

    /// Largest page size accepted by project listings.
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE, env = "COLLAB_PAGE_SIZE_MAX")]
    pub page_size_max: usize,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.host.trim().is_empty() {
            return Err("Host must not be empty. Set --host or COLLAB_HOST".to_string());
        }

        if self.session_ttl_days == 0 {
            return Err("session_ttl_days must be greater than 0".to_string());
        }
        if self.session_ttl_days.checked_mul(SECONDS_PER_DAY).is_none() {
            return Err("session_ttl_days is too large".to_string());
        }

        if self.max_body_bytes == 0 {
            return Err("max_body_bytes must be greater than 0".to_string());
        }

        if self.page_size_max == 0 {
            return Err("page_size_max must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Session lifetime (call validate() first).
    pub fn session_lifetime(&self) -> Duration {
        Duration::from_secs(self.session_ttl_days.saturating_mul(SECONDS_PER_DAY))
    }

    pub fn page_limits(&self) -> PageLimits {
        PageLimits::new(self.page_size_max)
    }

    /// Router settings derived from this configuration.
    pub fn router_config(&self) -> RouterConfig {
        let mut router_config = RouterConfig::new()
            .with_max_body_bytes(self.max_body_bytes)
            .with_tracing(!self.no_tracing);

        if let Some(ref origins) = self.cors_origins {
            router_config = router_config.with_cors_origins(origins.clone());
        }

        router_config
    }
}

// =============================================================================
// Tests
// =============================================================================
