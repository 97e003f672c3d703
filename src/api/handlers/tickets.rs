use super::cas_request;
use crate::cas::{CasState, TicketApiError, rest};
use axum::{
    body::Bytes,
    extract::{ConnectInfo, Extension, Path, RawQuery},
    http::{HeaderMap, HeaderValue, StatusCode, header::LOCATION},
    response::{IntoResponse, Response},
};
use std::{net::SocketAddr, sync::Arc};
use tracing::error;

impl IntoResponse for TicketApiError {
    fn into_response(self) -> Response {
        self.status().into_response()
    }
}

#[utoipa::path(
    post,
    path = "/v1/tickets",
    request_body(
        content = String,
        content_type = "application/x-www-form-urlencoded",
        description = "`username` and `password` fields"
    ),
    responses(
        (status = 201, description = "Granting ticket created; see the Location header",
            headers(("Location" = String, description = "Granting ticket resource"))),
        (status = 400, description = "Missing username or password"),
        (status = 403, description = "Credentials rejected"),
    ),
    tag = "tickets"
)]
// axum handler for POST /v1/tickets
pub async fn create_granting_ticket(
    state: Extension<Arc<CasState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Result<Response, TicketApiError> {
    let request = cas_request(peer, headers, query.as_deref(), &body);
    let location = rest::issue_granting_ticket(&state, &request).await?;

    match HeaderValue::from_str(&location) {
        Ok(location) => Ok((StatusCode::CREATED, [(LOCATION, location)]).into_response()),
        Err(err) => {
            error!("Invalid granting ticket location: {err}");
            Ok(StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/tickets/{ticket}",
    params(
        ("ticket" = String, Path, description = "Granting ticket ID"),
        ("service" = String, Query, description = "Service the ticket is for"),
    ),
    request_body(
        content = String,
        content_type = "application/x-www-form-urlencoded",
        description = "Optional form fields, e.g. `service`"
    ),
    responses(
        (status = 200, description = "Service ticket", body = String, content_type = "text/plain"),
        (status = 400, description = "Missing service"),
        (status = 403, description = "Unknown, expired or foreign granting ticket"),
    ),
    tag = "tickets"
)]
// axum handler for POST /v1/tickets/:ticket
pub async fn create_service_ticket(
    state: Extension<Arc<CasState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Path(ticket): Path<String>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Result<String, TicketApiError> {
    let request = cas_request(peer, headers, query.as_deref(), &body);
    rest::issue_service_ticket(&state, &ticket, &request).await
}

#[utoipa::path(
    delete,
    path = "/v1/tickets/{ticket}",
    params(("ticket" = String, Path, description = "Granting ticket ID")),
    responses((status = 200, description = "Granting ticket destroyed or already gone")),
    tag = "tickets"
)]
// axum handler for DELETE /v1/tickets/:ticket
pub async fn destroy_granting_ticket(
    state: Extension<Arc<CasState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Path(ticket): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, TicketApiError> {
    let request = cas_request(peer, headers, None, &[]);
    rest::destroy_granting_ticket(&state, &ticket, &request).await?;
    Ok(StatusCode::OK)
}
