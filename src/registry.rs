//! Tenant registry: indexed lookup and redirect-back host policy (§4.C).

use std::collections::HashMap;

use url::Url;

use crate::config::TenantConfig;
use crate::error::{Error, Result};

/// The key tenants are indexed by: `(clientId, tokenUri)`.
type TenantKey = (String, String);

/// In-memory mapping `(clientId, tokenUri) -> TenantConfig`.
///
/// Built once per successful config reload and never mutated; a reload
/// produces a brand-new `TenantRegistry` that replaces the old one
/// wholesale (see [`crate::loader`]). Old registries stay alive exactly
/// as long as the in-flight requests holding an `Arc` to them.
#[derive(Debug, Clone, Default)]
pub struct TenantRegistry {
    tenants: HashMap<TenantKey, TenantConfig>,
}

impl TenantRegistry {
    /// Folds a list of tenants into a registry. When `(clientId,
    /// tokenUri)` collides, the last entry in document order wins.
    #[must_use]
    pub fn build(remote: Vec<TenantConfig>) -> Self {
        let mut tenants = HashMap::with_capacity(remote.len());
        for tenant in remote {
            tenants.insert((tenant.client_id.clone(), tenant.token_uri.clone()), tenant);
        }
        Self { tenants }
    }

    /// O(1) lookup by `(clientId, tokenUri)`.
    #[must_use]
    pub fn lookup(&self, client_id: &str, token_uri: &str) -> Option<&TenantConfig> {
        self.tenants.get(&(client_id.to_string(), token_uri.to_string()))
    }

    /// Number of tenants currently registered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tenants.len()
    }

    /// Whether the registry holds no tenants.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tenants.is_empty()
    }
}

/// Checks that `redirect_back_uri` is permitted by `tenant`'s
/// `redirectBackHosts` allow-list: the host (and port, if non-default)
/// must match one entry exactly (case-insensitive on host), and if
/// that entry requires SSL, the scheme must be `https`.
///
/// # Errors
///
/// Returns [`Error::UnknownBackHost`] if no entry matches the host, or
/// [`Error::SchemeRequired`] if the matching entry requires `https`
/// and the URL uses `http`.
pub fn authorize_back_host(tenant: &TenantConfig, redirect_back_uri: &Url) -> Result<()> {
    let host = host_port_string(redirect_back_uri);

    let matched = tenant
        .redirect_back_hosts
        .iter()
        .find(|entry| entry.host.eq_ignore_ascii_case(&host));

    let Some(entry) = matched else {
        return Err(Error::UnknownBackHost(host));
    };

    if entry.ssl && redirect_back_uri.scheme() != "https" {
        return Err(Error::SchemeRequired(host));
    }

    Ok(())
}

/// Renders a URL's authority as `host[:port]`, omitting the port when
/// it's the scheme's default (mirroring how `redirectBackHosts`
/// entries are parsed in §4.B).
fn host_port_string(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}
