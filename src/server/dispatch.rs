//! Request classification (§4.E).
//!
//! Exactly one route is registered; this handler is the whole
//! dispatch table. Classification looks only at method and the query
//! keys named below — extra keys are ignored, and headers are not
//! consulted except by the simulator's HTTP Basic check.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::error::Error;

use super::{AppState, error_redirect, simulator, token_exchange};

/// Classifies and routes a request to one of the four handlers.
pub async fn handle(
    State(state): State<Arc<AppState>>,
    method: Method,
    Query(params): Query<HashMap<String, String>>,
    headers: axum::http::HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    if method == Method::POST {
        return simulator::token_endpoint(&body, &headers).into_response();
    }

    if params.contains_key("code") && params.contains_key("state") {
        return token_exchange::handle(&state, &params).await.into_response();
    }

    if params.contains_key("client_id") && params.contains_key("redirect_uri") && params.contains_key("state") {
        return simulator::authorize_endpoint(&params).into_response();
    }

    if params.contains_key("error") && params.contains_key("state") {
        return error_redirect::handle(&params).into_response();
    }

    bad_request()
}

pub(super) fn bad_request() -> Response {
    (StatusCode::BAD_REQUEST, Error::BadRequest.to_string()).into_response()
}
