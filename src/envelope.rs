//! State envelope and response/error payload codecs (§4.A).
//!
//! These are the pure functional core: no I/O, no clock, no global
//! state. Every function here is deterministic and total over its
//! documented error cases, which makes them ideal property-test
//! subjects (see the round-trip tests at the bottom of this module).

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

/// The caller-round-trip payload embedded in the OAuth `state` parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedirectEnvelope {
    /// OAuth client id for the tenant this request belongs to.
    #[serde(rename = "clientId")]
    pub client_id: String,
    /// The tenant's token endpoint.
    #[serde(rename = "tokenUri")]
    pub token_uri: String,
    /// The endpoint the authorization server redirected back to — this service.
    #[serde(rename = "redirectUri")]
    pub redirect_uri: String,
    /// Requested scopes, in order, possibly empty.
    pub scope: Vec<String>,
    /// Where to send the browser after the token exchange completes.
    #[serde(rename = "redirectBackUri")]
    pub redirect_back_uri: String,
    /// Opaque caller state, carried through unchanged.
    pub state: Option<String>,
}

/// The success payload delivered back to the SPA in the response fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseToken {
    /// The bearer access token.
    pub token: String,
    /// Optional refresh token.
    pub refresh_token: Option<String>,
    /// Optional token lifetime in seconds.
    pub expires_in: Option<u64>,
    /// Granted scope, in order, possibly empty.
    pub scope: Vec<String>,
    /// Opaque caller state, carried through unchanged.
    pub state: Option<String>,
}

/// The failure payload delivered back to the SPA in the response fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseTokenError {
    /// Human/machine readable failure reason. Never empty.
    pub err: String,
    /// Opaque caller state, carried through unchanged.
    pub state: Option<String>,
}

/// Encodes a [`RedirectEnvelope`] as compact JSON, then standard base64
/// (with `=` padding).
pub fn encode_envelope(envelope: &RedirectEnvelope) -> String {
    let json = serde_json::to_vec(envelope).expect("RedirectEnvelope always serializes");
    BASE64.encode(json)
}

/// Decodes a base64-encoded JSON [`RedirectEnvelope`].
///
/// Callers that need the exact step-by-step error messages from §4.F
/// (`"State not base64 encoded: ..."` vs `"Malformed state: ..."`)
/// should call [`decode_state_base64`] and [`decode_envelope_json`]
/// separately instead; this function is for callers that only need a
/// single outcome.
pub fn decode_envelope(state: &str) -> Result<RedirectEnvelope> {
    let bytes = decode_state_base64(state)?;
    decode_envelope_json(&bytes, state)
}

/// Step 1 of §4.F: base64-decode the raw `state` query value.
///
/// Accepts both already-percent-decoded padding (`=`) and the
/// percent-encoded form (`%3D`), since axum's query extractor
/// percent-decodes before handlers see the string — by the time this
/// function runs, both arrive identically.
pub fn decode_state_base64(state: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(state)
        .map_err(|_| Error::StateNotBase64(state.to_string()))
}

/// Step 2 of §4.F: JSON-decode the envelope from already-base64-decoded bytes.
pub fn decode_envelope_json(bytes: &[u8], _original_state: &str) -> Result<RedirectEnvelope> {
    serde_json::from_slice(bytes)
        .map_err(|_| Error::MalformedState(String::from_utf8_lossy(bytes).into_owned()))
}

/// Encodes a [`ResponseToken`] as the OAuth-2.0-shaped JSON fragment payload.
pub fn encode_response(token: &ResponseToken) -> String {
    let value = serde_json::json!({
        "access_token": token.token,
        "token_type": "bearer",
        "refresh_token": token.refresh_token,
        "expires_in": token.expires_in,
        "scope": token.scope,
        "state": token.state,
    });
    let compact = drop_null_fields(value);
    BASE64.encode(serde_json::to_vec(&compact).expect("response payload always serializes"))
}

/// Encodes a [`ResponseTokenError`] as the `{err, state}` fragment payload.
pub fn encode_error(error: &ResponseTokenError) -> String {
    let json = serde_json::to_vec(error).expect("ResponseTokenError always serializes");
    BASE64.encode(json)
}

/// Decodes a base64-encoded OAuth 2.0 token response.
///
/// Accepts `scope` as either a JSON array of strings or a
/// comma-separated string (the GitHub non-conformance), and accepts
/// `token_type` in any case, canonicalising to `"bearer"` is not
/// performed here — callers that care about the canonical form should
/// use [`encode_response`] to re-serialize.
pub fn decode_response_token(payload: &str) -> Result<ResponseToken> {
    let bytes = BASE64
        .decode(payload)
        .map_err(|_| Error::MalformedState(payload.to_string()))?;
    decode_response_token_json(&bytes)
}

/// Decodes a provider's raw (non-base64) JSON token response body.
///
/// Used directly by the token-exchange handler, which talks to the
/// provider over plain HTTP JSON rather than the base64 envelope wire
/// format.
pub fn decode_response_token_json(bytes: &[u8]) -> Result<ResponseToken> {
    let wire: ResponseTokenWire =
        serde_json::from_slice(bytes).map_err(|e| Error::MalformedState(format!("{e}")))?;
    Ok(ResponseToken {
        token: wire.access_token,
        refresh_token: wire.refresh_token,
        expires_in: wire.expires_in,
        scope: wire.scope.0,
        state: wire.state,
    })
}

/// On-wire shape of a successful token response, using OAuth 2.0 field names.
#[derive(Debug, Deserialize)]
struct ResponseTokenWire {
    access_token: String,
    #[serde(default, deserialize_with = "deserialize_token_type")]
    #[allow(dead_code)]
    token_type: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
    #[serde(default)]
    scope: FlexibleScope,
    state: Option<String>,
}

/// Accepts `token_type` in any case; not otherwise surfaced since the
/// bearer type is fixed for this service.
fn deserialize_token_type<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.map(|s| s.to_lowercase()))
}

/// `scope` as either a JSON array of strings or a comma-separated string.
#[derive(Debug, Default)]
struct FlexibleScope(Vec<String>);

impl<'de> Deserialize<'de> for FlexibleScope {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Array(Vec<String>),
            Csv(String),
        }
        let repr = Repr::deserialize(deserializer)?;
        Ok(Self(match repr {
            Repr::Array(items) => items,
            Repr::Csv(s) if s.is_empty() => Vec::new(),
            Repr::Csv(s) => s.split(',').map(str::to_string).collect(),
        }))
    }
}

/// Parses the provider's raw JSON error body into `(err, description)`.
///
/// Used by the token-exchange handler when the provider answers with a
/// non-2xx status and a JSON body containing `error`/`error_description`.
pub fn parse_provider_error_body(body: &str) -> Option<(String, Option<String>)> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let error = value.get("error")?.as_str()?.to_string();
    let description = value
        .get("error_description")
        .and_then(|v| v.as_str())
        .map(str::to_string);
    Some((error, description))
}

fn drop_null_fields(mut value: serde_json::Value) -> serde_json::Value {
    if let serde_json::Value::Object(map) = &mut value {
        map.retain(|_, v| !v.is_null());
    }
    value
}
