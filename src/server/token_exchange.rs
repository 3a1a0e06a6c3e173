//! Token-exchange handler (§4.F): the core of the service.

use std::sync::Arc;
use std::time::Duration;

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use reqwest::StatusCode as ProviderStatus;
use std::collections::HashMap;
use tracing::warn;
use url::Url;

use crate::envelope::{self, ResponseTokenError};
use crate::error::{Error, ProviderFailure};
use crate::registry;

use super::AppState;

/// Bound on the outbound provider POST, applied at the `reqwest::Client`
/// level (`AppState::new`) rather than per-request, so it also covers
/// TLS handshake and connect time, not just the read.
pub(crate) const PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs the full seven-step token-exchange flow described in §4.F and
/// always terminates in either a 4xx (steps 1–6 failed before we had a
/// `redirectBackUri` we trust, or before we had a tenant to trust) or a
/// 302 redirect carrying a fragment-encoded success/error payload.
pub async fn handle(state: &Arc<AppState>, params: &HashMap<String, String>) -> Response {
    // Dispatch already guaranteed both keys are present.
    let code = params.get("code").expect("dispatch checked for code");
    let state_raw = params.get("state").expect("dispatch checked for state");

    // Step 1: base64-decode state.
    let bytes = match envelope::decode_state_base64(state_raw) {
        Ok(b) => b,
        Err(e) => return bad_request(e.to_string()),
    };

    // Step 2: JSON-decode envelope.
    let env = match envelope::decode_envelope_json(&bytes, state_raw) {
        Ok(e) => e,
        Err(e) => return bad_request(e.to_string()),
    };

    // Step 3: parse redirectBackUri.
    let mut back_url = match Url::parse(&env.redirect_back_uri) {
        Ok(u) => u,
        Err(_) => {
            return bad_request(Error::BadRedirectBackUri(env.redirect_back_uri.clone()).to_string());
        }
    };

    // Step 4: registry lookup.
    let snapshot = state.live.get();
    let tenant = match snapshot.registry.lookup(&env.client_id, &env.token_uri) {
        Some(t) => t.clone(),
        None => {
            let e = Error::UnknownTenant {
                client_id: env.client_id.clone(),
                token_uri: env.token_uri.clone(),
            };
            warn!(client_id = %env.client_id, token_uri = %env.token_uri, "{e}");
            return not_found(e.to_string());
        }
    };

    // Step 5: authorize back-host.
    if let Err(e) = registry::authorize_back_host(&tenant, &back_url) {
        warn!(error = %e, "redirectBack host rejected");
        return not_found(e.to_string());
    }

    // Step 6: parse redirectUri / tokenUri.
    let (Ok(redirect_uri), Ok(token_uri)) =
        (Url::parse(&env.redirect_uri), Url::parse(&env.token_uri))
    else {
        return not_found(Error::BadProviderUri.to_string());
    };

    // Step 7: POST to the provider and always redirect with a fragment payload.
    let fragment = exchange_token(
        &state.http_client,
        &tenant.client_id,
        &tenant.client_secret,
        &token_uri,
        code,
        &redirect_uri,
        &env.scope,
        env.state,
    )
    .await;

    back_url.set_fragment(Some(&fragment));
    (
        StatusCode::FOUND,
        [(header::LOCATION, back_url.to_string())],
    )
        .into_response()
}

/// Performs the outbound provider POST and returns the fragment
/// payload (success or error) to append to `redirectBackUri`.
///
/// This never returns an `Err`: every failure mode (timeout, network,
/// bad status, undecodable body) is folded into a `ResponseTokenError`
/// fragment, because a valid envelope means the SPA must get *some*
/// fragment-encoded result (§7).
#[allow(clippy::too_many_arguments)]
async fn exchange_token(
    client: &reqwest::Client,
    client_id: &str,
    client_secret: &str,
    token_uri: &Url,
    code: &str,
    redirect_uri: &Url,
    envelope_scope: &[String],
    caller_state: Option<String>,
) -> String {
    match send_token_request(client, client_id, client_secret, token_uri, code, redirect_uri).await
    {
        Ok((status, body)) if status.is_success() => {
            match envelope::decode_response_token_json(body.as_bytes()) {
                Ok(mut token) => {
                    if token.scope.is_empty() {
                        token.scope = envelope_scope.to_vec();
                    }
                    token.state = caller_state;
                    envelope::encode_response(&token)
                }
                Err(_) => error_fragment(
                    ProviderFailure::DecoderError("invalid token response body".to_string())
                        .to_string(),
                    caller_state,
                ),
            }
        }
        Ok((status, body)) => {
            let err = match envelope::parse_provider_error_body(&body) {
                Some((_, Some(description))) => description,
                Some((error, None)) => error,
                None => ProviderFailure::BadStatus(status.as_u16()).to_string(),
            };
            error_fragment(err, caller_state)
        }
        Err(failure) => error_fragment(failure.to_string(), caller_state),
    }
}

async fn send_token_request(
    client: &reqwest::Client,
    client_id: &str,
    client_secret: &str,
    token_uri: &Url,
    code: &str,
    redirect_uri: &Url,
) -> Result<(ProviderStatus, String), ProviderFailure> {
    if token_uri.scheme() != "http" && token_uri.scheme() != "https" {
        return Err(ProviderFailure::BadUrl(token_uri.to_string()));
    }

    let mut form = vec![
        ("grant_type", "authorization_code".to_string()),
        ("code", code.to_string()),
        ("redirect_uri", redirect_uri.to_string()),
    ];

    let mut request = client
        .post(token_uri.clone())
        .header(header::ACCEPT, "application/json");

    if client_secret.is_empty() {
        form.push(("client_id", client_id.to_string()));
    } else {
        request = request.basic_auth(client_id, Some(client_secret));
    }

    let response = match request.form(&form).send().await {
        Err(e) if e.is_timeout() => return Err(ProviderFailure::Timeout),
        Err(_) => return Err(ProviderFailure::NetworkError),
        Ok(response) => response,
    };

    let status = response.status();
    match response.text().await {
        Ok(body) => Ok((status, body)),
        Err(_) => Err(ProviderFailure::DecoderError(
            "failed to read response body".to_string(),
        )),
    }
}

fn error_fragment(err: String, state: Option<String>) -> String {
    envelope::encode_error(&ResponseTokenError { err, state })
}

fn bad_request(message: impl Into<String>) -> Response {
    (StatusCode::BAD_REQUEST, message.into()).into_response()
}

fn not_found(message: impl Into<String>) -> Response {
    (StatusCode::NOT_FOUND, message.into()).into_response()
}
