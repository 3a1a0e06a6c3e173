//! Authorization-server simulator used by integration tests (§4.H).

use std::collections::HashMap;

use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::json;
use url::Url;

const NO_STORE_HEADERS: [(header::HeaderName, &str); 2] =
    [(header::CACHE_CONTROL, "no-store"), (header::PRAGMA, "no-cache")];

/// Fake `/authorize` endpoint: always approves, redirecting straight
/// back to `redirect_uri` with a fixed code.
pub fn authorize_endpoint(params: &HashMap<String, String>) -> Response {
    let Some(redirect_uri) = params.get("redirect_uri") else {
        return invalid_request("missing redirect_uri");
    };
    let Ok(mut target) = Url::parse(redirect_uri) else {
        return invalid_request("redirect_uri does not parse");
    };
    let state = params.get("state").cloned().unwrap_or_default();

    target
        .query_pairs_mut()
        .append_pair("code", "xyzzy")
        .append_pair("state", &state);

    (
        StatusCode::FOUND,
        [(header::LOCATION, target.to_string())],
    )
        .into_response()
}

/// Fake token endpoint: accepts credentials either in the form body or
/// as HTTP Basic, and fails deliberately for `client_id == "fail"` so
/// integration tests can exercise the provider-error path (S6).
pub fn token_endpoint(body: &[u8], headers: &HeaderMap) -> Response {
    let form: HashMap<String, String> = match serde_urlencoded::from_bytes(body) {
        Ok(form) => form,
        Err(_) => return invalid_request("malformed form body"),
    };

    let Some(grant_type) = form.get("grant_type") else {
        return invalid_request("missing grant_type");
    };
    if grant_type != "authorization_code" {
        return invalid_request("unsupported grant_type");
    }
    match form.get("code") {
        Some(code) if !code.is_empty() => {}
        _ => return invalid_request("missing code"),
    }

    let client_id = basic_auth_client_id(headers).or_else(|| form.get("client_id").cloned());

    let Some(client_id) = client_id else {
        return invalid_request("missing client_id");
    };

    if client_id == "fail" {
        return with_cache_headers(
            StatusCode::UNAUTHORIZED,
            json!({"error": "invalid_client", "error_description": "Client authentication failed."}),
        );
    }

    with_cache_headers(
        StatusCode::OK,
        json!({
            "access_token": "yourTokenSir",
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "aRefreshToken",
        }),
    )
}

fn basic_auth_client_id(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = BASE64.decode(encoded).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (client_id, _secret) = text.split_once(':')?;
    Some(client_id.to_string())
}

fn invalid_request(reason: &str) -> Response {
    with_cache_headers(
        StatusCode::BAD_REQUEST,
        json!({"error": "invalid_request", "error_description": reason}),
    )
}

fn with_cache_headers(status: StatusCode, body: serde_json::Value) -> Response {
    (status, NO_STORE_HEADERS, axum::Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn authorize_always_approves() {
        let mut params = HashMap::new();
        params.insert("client_id".to_string(), "cid".to_string());
        params.insert("redirect_uri".to_string(), "https://s/cb".to_string());
        params.insert("state".to_string(), "B".to_string());

        let response = authorize_endpoint(&params);
        assert_eq!(response.status(), StatusCode::FOUND);
        let location = response.headers().get(header::LOCATION).unwrap().to_str().unwrap();
        assert!(location.starts_with("https://s/cb?"));
        assert!(location.contains("code=xyzzy"));
        assert!(location.contains("state=B"));
    }

    #[test]
    fn token_endpoint_fails_client_id_fail() {
        let body = b"client_id=fail&client_secret=s&grant_type=authorization_code&code=xyzzy";
        let response = token_endpoint(body, &HeaderMap::new());
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL).unwrap(),
            "no-store"
        );
    }

    #[test]
    fn token_endpoint_succeeds_for_other_clients() {
        let body = b"client_id=cid&client_secret=sec&grant_type=authorization_code&code=xyzzy";
        let response = token_endpoint(body, &HeaderMap::new());
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn token_endpoint_accepts_basic_auth_credentials() {
        let body = b"grant_type=authorization_code&code=xyzzy";
        let mut headers = HeaderMap::new();
        let creds = BASE64.encode("cid:sec");
        headers.insert(
            header::AUTHORIZATION,
            format!("Basic {creds}").parse().unwrap(),
        );
        let response = token_endpoint(body, &headers);
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn token_endpoint_rejects_missing_code() {
        let body = b"client_id=cid&grant_type=authorization_code";
        let response = token_endpoint(body, &HeaderMap::new());
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
