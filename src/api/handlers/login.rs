use super::{cas_request, respond};
use crate::cas::{CasState, acceptor, flow, validate};
use axum::{
    body::Bytes,
    extract::{ConnectInfo, Extension, RawQuery},
    http::HeaderMap,
    response::Response,
};
use std::{net::SocketAddr, sync::Arc};

// axum handler for GET /login
pub async fn login_page(
    state: Extension<Arc<CasState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Response {
    let request = cas_request(peer, headers, query.as_deref(), &[]);
    let outcome = flow::login_requestor(&state, &request).await;
    respond(&state, request.service(), outcome)
}

// axum handler for POST /login
pub async fn login_submit(
    state: Extension<Arc<CasState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Response {
    let request = cas_request(peer, headers, query.as_deref(), &body);
    let outcome = acceptor::login_acceptor(&state, &request).await;
    respond(&state, request.service(), outcome)
}

// axum handler for GET /logout
pub async fn logout(
    state: Extension<Arc<CasState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Response {
    let request = cas_request(peer, headers, query.as_deref(), &[]);
    let outcome = validate::logout(&state, &request).await;
    respond(&state, request.service(), outcome)
}
