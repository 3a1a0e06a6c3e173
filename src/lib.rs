//! OAuth Redirect Gateway
//!
//! A small multi-tenant HTTP service that terminates the redirect leg
//! of the OAuth 2.0 Authorization Code grant on behalf of browser-only
//! single-page applications: it receives the authorization-server
//! redirect, exchanges the code for a token using a server-held client
//! secret, and sends the browser back to the SPA with the token
//! encoded in the URL fragment.
//!
//! # Modules
//!
//! - [`envelope`] — the state envelope and response/error codecs.
//! - [`config`] — the configuration data model and decoder.
//! - [`registry`] — tenant lookup and redirect-back host policy.
//! - [`loader`] — the periodic config poll loop and atomic snapshot publication.
//! - [`listener`] — the HTTP listener bind/rebind/unbind state machine.
//! - [`server`] — request classification and the token-exchange, error-redirect, and simulator handlers.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod envelope;
pub mod error;
pub mod listener;
pub mod loader;
pub mod registry;
pub mod server;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Sets up global `tracing` logging with an `EnvFilter` (overridable
/// via `RUST_LOG`) and a selectable text/JSON formatter.
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => {
            subscriber.with(fmt::layer().json()).init();
        }
        _ => {
            subscriber.with(fmt::layer()).init();
        }
    }

    Ok(())
}
