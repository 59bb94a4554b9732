//! authbridge - identity token broker
//!
//! Issues and refreshes signed identity tokens for a cluster control plane,
//! delegating credential checks to a pluggable identity provider and keeping
//! the provider configuration in the control plane's settings store.
//!
//! # Architecture
//!
//! - [`providers`]: the provider contract and the name registry
//! - [`settings`]: settings store backends and batch synchronization
//! - [`resolver`]: allow-list parsing and identity resolution
//! - [`manager`]: the active (provider, config) pair and its persistence
//! - [`token`]: claims assembly and RS256 signing
//! - [`http`]: axum handlers over the above
//!
//! # Example
//!
//! ```rust,no_run
//! use authbridge::utils::TestEnvironment;
//!
//! #[tokio::main]
//! async fn main() -> authbridge::Result<()> {
//!     let env = TestEnvironment::new();
//!     env.manager.update_config(TestEnvironment::static_config(true)).await?;
//!
//!     let token = env.tokens.create_token("alice-code").await?;
//!     println!("{}", token);
//!     Ok(())
//! }
//! ```

// Core modules
pub mod constants;
pub mod error;
pub mod model;

// Identity and configuration
pub mod manager;
pub mod providers;
pub mod resolver;
pub mod settings;
pub mod token;

// Infrastructure
pub mod config;
pub mod telemetry;

// Interface layers
pub mod cli;
pub mod http;

// Utilities
pub mod utils;

// Re-exports for convenience
pub use error::{AuthBridgeError, Result};
pub use manager::ConfigManager;
pub use model::{AuthConfig, Identity, ProviderToken};
pub use providers::{IdentityProvider, ProviderRegistry};
pub use token::{TokenClaims, TokenService, TokenSigner};

/// Initialize logging for the application
///
/// `level` of "debug" switches the default filter to debug; `RUST_LOG`
/// still wins when set. Logs go to `log_file` (appended) or stderr.
pub fn init_logging(level: Option<&str>, log_file: Option<&std::path::Path>) -> Result<()> {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let default_filter = match level {
        Some("debug") => constants::DEBUG_LOG_FILTER.to_string(),
        Some(level) => format!("authbridge={}", level),
        None => constants::DEFAULT_LOG_FILTER.to_string(),
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());
    let registry = tracing_subscriber::registry().with(filter);

    let result = match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(std::sync::Mutex::new(file)),
                )
                .try_init()
        }
        None => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init(),
    };

    if let Err(e) = result {
        eprintln!("Logging already initialized: {}", e);
    }
    Ok(())
}
