//! Error redirect handler (§4.G).

use std::collections::HashMap;

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use url::Url;

use crate::envelope::{self, ResponseTokenError};

use super::dispatch::bad_request;

/// Turns a provider error callback (`?error=...&state=...`) into a
/// fragment-encoded redirect, falling back to 400 if the envelope
/// can't be recovered at all.
pub fn handle(params: &HashMap<String, String>) -> Response {
    let Some(state_raw) = params.get("state") else {
        return bad_request();
    };

    let Ok(bytes) = envelope::decode_state_base64(state_raw) else {
        return bad_request();
    };
    let Ok(env) = envelope::decode_envelope_json(&bytes, state_raw) else {
        return bad_request();
    };
    let Ok(mut back_url) = Url::parse(&env.redirect_back_uri) else {
        return bad_request();
    };

    let err = params
        .get("error")
        .cloned()
        .unwrap_or_else(|| "Missing code/state".to_string());

    let payload = ResponseTokenError {
        err,
        state: env.state,
    };
    back_url.set_fragment(Some(&envelope::encode_error(&payload)));

    (
        StatusCode::FOUND,
        [(header::LOCATION, back_url.to_string())],
    )
        .into_response()
}
