//! Configuration data model and decoder (§3, §4.B).
//!
//! The decoder is pure: `parse` takes bytes and returns a
//! [`ConfigDocument`] or an [`Error::ConfigDecode`]. Diffing against a
//! previous document and acting on the result is the config loader's
//! job (see [`crate::loader`]).

use serde_json::Value;

use crate::error::{Error, Result};

/// One `{host, ssl}` entry in a tenant's redirect-back allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectBackHost {
    /// `host[:port]`, matched case-insensitively.
    pub host: String,
    /// Whether `redirectBackUri` must use `https`.
    pub ssl: bool,
}

/// One remote OAuth tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantConfig {
    /// The tenant's token endpoint.
    pub token_uri: String,
    /// OAuth client id.
    pub client_id: String,
    /// OAuth client secret. Never logged, never echoed in a response.
    pub client_secret: String,
    /// Allow-list of hosts the browser may be redirected back to.
    pub redirect_back_hosts: Vec<RedirectBackHost>,
}

/// Process-wide settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalConfig {
    /// The port the HTTP listener should be bound to. `<= 0` (encoded
    /// here as `0`) means "listener off".
    pub http_port: u16,
    /// How often, in seconds, to poll the config file. `0` disables polling.
    pub config_sample_period: u64,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            http_port: 3000,
            config_sample_period: 2,
        }
    }
}

/// A fully decoded configuration file: local settings plus tenants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigDocument {
    /// Process-wide settings, defaulted if no local element was present.
    pub local: LocalConfig,
    /// Remote tenants, in document order.
    pub remote: Vec<TenantConfig>,
}

/// Parses a configuration document from raw JSON bytes.
///
/// # Errors
///
/// Returns [`Error::ConfigDecode`] if the bytes are not a JSON array,
/// if an array element doesn't match any of the comment/local/tenant
/// shapes, if a tenant element is missing a required field, if more
/// than one local element is present, or if a `redirectBackHosts`
/// entry fails to parse.
pub fn parse(bytes: &[u8]) -> Result<ConfigDocument> {
    let elements: Vec<Value> = serde_json::from_slice(bytes)
        .map_err(|e| Error::ConfigDecode(format!("top-level document is not a JSON array: {e}")))?;

    let mut local: Option<LocalConfig> = None;
    let mut remote = Vec::new();

    for element in elements {
        let Value::Object(map) = element else {
            return Err(Error::ConfigDecode(
                "config array element must be an object".to_string(),
            ));
        };

        if map.contains_key("comment") {
            continue;
        }

        let is_tenant_shaped = map.contains_key("tokenUri")
            || map.contains_key("clientId")
            || map.contains_key("clientSecret")
            || map.contains_key("redirectBackHosts");

        if is_tenant_shaped {
            remote.push(parse_tenant(&map)?);
            continue;
        }

        let is_local_shaped = map.contains_key("port") || map.contains_key("configSamplePeriod");
        if is_local_shaped {
            if local.is_some() {
                return Err(Error::ConfigDecode("Multiple local configurations".to_string()));
            }
            local = Some(parse_local(&map)?);
            continue;
        }

        return Err(Error::ConfigDecode(
            "config array element matches neither local nor tenant shape".to_string(),
        ));
    }

    Ok(ConfigDocument {
        local: local.unwrap_or_default(),
        remote,
    })
}

fn parse_local(map: &serde_json::Map<String, Value>) -> Result<LocalConfig> {
    let default = LocalConfig::default();
    let http_port = match map.get("port") {
        Some(v) => v
            .as_u64()
            .and_then(|p| u16::try_from(p).ok())
            .ok_or_else(|| Error::ConfigDecode("port must be a u16".to_string()))?,
        None => default.http_port,
    };
    let config_sample_period = match map.get("configSamplePeriod") {
        Some(v) => v.as_u64().ok_or_else(|| {
            Error::ConfigDecode("configSamplePeriod must be a non-negative integer".to_string())
        })?,
        None => default.config_sample_period,
    };
    Ok(LocalConfig {
        http_port,
        config_sample_period,
    })
}

fn parse_tenant(map: &serde_json::Map<String, Value>) -> Result<TenantConfig> {
    let token_uri = required_string(map, "tokenUri")?;
    let client_id = required_string(map, "clientId")?;
    let client_secret = required_string(map, "clientSecret")?;
    let hosts_raw = map
        .get("redirectBackHosts")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::ConfigDecode("tenant missing redirectBackHosts".to_string()))?;

    let mut redirect_back_hosts = Vec::with_capacity(hosts_raw.len());
    for entry in hosts_raw {
        let s = entry.as_str().ok_or_else(|| {
            Error::ConfigDecode("redirectBackHosts entries must be strings".to_string())
        })?;
        redirect_back_hosts.push(parse_back_host(s)?);
    }

    Ok(TenantConfig {
        token_uri,
        client_id,
        client_secret,
        redirect_back_hosts,
    })
}

fn required_string(map: &serde_json::Map<String, Value>, key: &str) -> Result<String> {
    map.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::ConfigDecode(format!("tenant missing required field: {key}")))
}

/// Parses one `redirectBackHosts` entry: `https://host[:port]...` sets
/// `ssl=true`, `http://host[:port]...` sets `ssl=false`, and a bare
/// `host[:port]` (no scheme) also sets `ssl=false`.
fn parse_back_host(raw: &str) -> Result<RedirectBackHost> {
    if let Some(rest) = raw.strip_prefix("https://") {
        Ok(RedirectBackHost {
            host: authority_host_port(rest)?,
            ssl: true,
        })
    } else if let Some(rest) = raw.strip_prefix("http://") {
        Ok(RedirectBackHost {
            host: authority_host_port(rest)?,
            ssl: false,
        })
    } else if raw.is_empty() {
        Err(Error::ConfigDecode("redirectBackHosts entry is empty".to_string()))
    } else {
        Ok(RedirectBackHost {
            host: raw.to_string(),
            ssl: false,
        })
    }
}

/// Extracts `host[:port]` from the authority portion of a URL
/// (everything after `scheme://`), dropping any path/query/fragment.
fn authority_host_port(authority_and_rest: &str) -> Result<String> {
    let authority = authority_and_rest
        .split(['/', '?', '#'])
        .next()
        .unwrap_or(authority_and_rest);
    if authority.is_empty() {
        return Err(Error::ConfigDecode("redirectBackHosts entry has no host".to_string()));
    }
    Ok(authority.to_string())
}
