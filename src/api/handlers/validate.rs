use super::cas_request;
use crate::cas::{CasState, validate};
use axum::{
    extract::{ConnectInfo, Extension, RawQuery},
    http::{HeaderMap, HeaderValue, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use std::{net::SocketAddr, sync::Arc};
use tracing::error;

#[utoipa::path(
    get,
    path = "/validate",
    params(
        ("ticket" = String, Query, description = "Service ticket"),
        ("service" = String, Query, description = "Service the ticket was issued for"),
        ("renew" = Option<bool>, Query, description = "Only accept tickets from fresh credentials"),
    ),
    responses(
        (
            status = 200,
            description = "`yes\\n<username>\\n` or `no\\n\\n`",
            body = String,
            content_type = "text/plain"
        ),
    ),
    tag = "validate"
)]
// axum handler for GET /validate
pub async fn validate(
    state: Extension<Arc<CasState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Response {
    let request = cas_request(peer, headers, query.as_deref(), &[]);
    match validate::validate(&state, &request).await {
        Ok(username) => (
            StatusCode::OK,
            [(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"))],
            validate::validation_body(username.as_deref()),
        )
            .into_response(),
        Err(err) => {
            error!("Service ticket validation failed: {err:#}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
