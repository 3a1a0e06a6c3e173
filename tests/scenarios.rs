//! End-to-end scenarios (S1–S6) driven against the router directly via
//! `tower::ServiceExt::oneshot`, with the simulator bound to a real
//! ephemeral TCP port standing in as the token provider — the only leg
//! of these scenarios that has to cross a real socket.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use oauth_redirect_gateway::config::{RedirectBackHost, TenantConfig};
use oauth_redirect_gateway::loader::{LiveConfig, Snapshot};
use oauth_redirect_gateway::registry::TenantRegistry;
use oauth_redirect_gateway::server::{AppState, build_router};
use tower::ServiceExt;

fn envelope_state(token_uri: &str, redirect_back_uri: &str) -> String {
    let json = serde_json::json!({
        "clientId": "cid",
        "tokenUri": token_uri,
        "redirectUri": "https://s/cb",
        "scope": ["r"],
        "redirectBackUri": redirect_back_uri,
        "state": "u",
    });
    BASE64.encode(serde_json::to_vec(&json).unwrap())
}

fn tenant(token_uri: &str, client_id: &str, ssl: bool) -> TenantConfig {
    TenantConfig {
        token_uri: token_uri.to_string(),
        client_id: client_id.to_string(),
        client_secret: "sec".to_string(),
        redirect_back_hosts: vec![RedirectBackHost {
            host: "x.test".to_string(),
            ssl,
        }],
    }
}

fn router_with_tenants(tenants: Vec<TenantConfig>) -> Router {
    let live = LiveConfig::new(Snapshot {
        registry: Arc::new(TenantRegistry::build(tenants)),
        port: 3000,
    });
    build_router(AppState::new(live))
}

/// Starts a throwaway instance of this same service to act as the
/// token provider: its POST `/` handler is the simulator (§4.H), which
/// is exactly what a real provider stub needs to be for these tests.
async fn spawn_provider() -> SocketAddr {
    let router = router_with_tenants(vec![]);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });
    addr
}

async fn decode_fragment(location: &str) -> (String, serde_json::Value) {
    let (base, fragment) = location.split_once('#').expect("redirect must carry a fragment");
    let bytes = BASE64.decode(fragment).unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    (base.to_string(), json)
}

#[tokio::test]
async fn s1_happy_path() {
    let provider_addr = spawn_provider().await;
    let token_uri = format!("http://{provider_addr}/");
    let router = router_with_tenants(vec![tenant(&token_uri, "cid", true)]);

    let state = envelope_state(&token_uri, "https://x.test/app");
    let request = Request::builder()
        .method("GET")
        .uri(format!("/?code=C&state={state}"))
        .body(Body::empty())
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);

    let location = response
        .headers()
        .get("location")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    let (base, payload) = decode_fragment(&location).await;
    assert_eq!(base, "https://x.test/app");
    assert_eq!(payload["access_token"], "yourTokenSir");
    assert_eq!(payload["token_type"], "bearer");
    assert_eq!(payload["state"], "u");
    // Simulator doesn't echo scope, so the envelope's scope is substituted.
    assert_eq!(payload["scope"], serde_json::json!(["r"]));
}

#[tokio::test]
async fn s2_scheme_policy_rejects_http_when_ssl_required() {
    let router = router_with_tenants(vec![tenant("https://p/t", "cid", true)]);
    let state = envelope_state("https://p/t", "http://x.test/app");

    let request = Request::builder()
        .method("GET")
        .uri(format!("/?code=C&state={state}"))
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("https protocol required"), "body was: {text}");
}

#[tokio::test]
async fn s3_unknown_tenant() {
    let router = router_with_tenants(vec![]);
    let state = envelope_state("https://p/t", "https://x.test/app");

    let request = Request::builder()
        .method("GET")
        .uri(format!("/?code=C&state={state}"))
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.starts_with("Unknown (clientId, tokenUri)"), "body was: {text}");
}

#[tokio::test]
async fn s4_provider_error_surfaces_as_redirect_with_err() {
    let provider_addr = spawn_provider().await;
    let token_uri = format!("http://{provider_addr}/");
    // client_id "fail" makes the simulator respond 401 invalid_client.
    let router = router_with_tenants(vec![tenant(&token_uri, "fail", true)]);

    let json = serde_json::json!({
        "clientId": "fail", "tokenUri": token_uri, "redirectUri": "https://s/cb",
        "scope": ["r"], "redirectBackUri": "https://x.test/app", "state": "u",
    });
    let state = BASE64.encode(serde_json::to_vec(&json).unwrap());

    let request = Request::builder()
        .method("GET")
        .uri(format!("/?code=C&state={state}"))
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    let location = response.headers().get("location").unwrap().to_str().unwrap().to_string();
    let (base, payload) = decode_fragment(&location).await;
    assert_eq!(base, "https://x.test/app");
    assert_eq!(payload["err"], "Client authentication failed.");
    assert_eq!(payload["state"], "u");
}

#[tokio::test]
async fn s5_provider_access_denied_callback() {
    let router = router_with_tenants(vec![tenant("https://p/t", "cid", true)]);
    let state = envelope_state("https://p/t", "https://x.test/app");

    let request = Request::builder()
        .method("GET")
        .uri(format!("/?error=access_denied&state={state}"))
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    let location = response.headers().get("location").unwrap().to_str().unwrap().to_string();
    let (base, payload) = decode_fragment(&location).await;
    assert_eq!(base, "https://x.test/app");
    assert_eq!(payload["err"], "access_denied");
    assert_eq!(payload["state"], "u");
}

#[tokio::test]
async fn s6_simulator_token_endpoint_fails_for_fail_client() {
    let router = router_with_tenants(vec![]);
    let body = "client_id=fail&client_secret=s&grant_type=authorization_code&code=xyzzy";

    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json_bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let payload: serde_json::Value = serde_json::from_slice(&json_bytes).unwrap();
    assert_eq!(payload["error"], "invalid_client");
}

#[tokio::test]
async fn bad_request_fallback_for_unrecognized_query() {
    let router = router_with_tenants(vec![]);
    let request = Request::builder()
        .method("GET")
        .uri("/?foo=bar")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
