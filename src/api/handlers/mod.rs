pub mod health;
pub mod login;
pub mod tickets;
pub mod validate;

// common functions for the handlers
use crate::cas::{
    CasRequest, CasState, LoginResponse,
    render::LOGIN_VIEW,
    request::form_params,
    state::internal_error_page,
};
use axum::{
    body::Body,
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_TYPE, LOCATION, SET_COOKIE},
    },
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use tracing::error;

/// Build the core request from the connection peer, headers, query string
/// and an optional urlencoded body.
pub(crate) fn cas_request(
    peer: SocketAddr,
    headers: HeaderMap,
    query: Option<&str>,
    body: &[u8],
) -> CasRequest {
    CasRequest::new(peer.ip().to_canonical())
        .with_headers(headers)
        .with_params(form_params(query, body))
}

/// Turn a browser flow outcome into an HTTP response. Infrastructure errors
/// become an error page, never a dropped connection.
pub(crate) fn respond(
    state: &CasState,
    service: &str,
    outcome: anyhow::Result<LoginResponse>,
) -> Response {
    let outcome = outcome.or_else(|err| {
        error!("Login flow failed: {err:#}");
        internal_error_page(state, service)
    });

    match outcome {
        Ok(response) => render(state, response),
        Err(err) => {
            error!("Failed to build error page: {err:#}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn render(state: &CasState, response: LoginResponse) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));

    if let Some(cookie) = response.cookie() {
        match HeaderValue::from_str(&state.cookie_header(cookie)) {
            Ok(value) => {
                headers.insert(SET_COOKIE, value);
            }
            Err(err) => {
                error!("Failed to build session cookie: {err}");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        }
    }

    match response {
        LoginResponse::Redirect { location, .. } => match HeaderValue::from_str(&location) {
            Ok(value) => {
                headers.insert(LOCATION, value);
                (StatusCode::FOUND, headers, Body::empty()).into_response()
            }
            Err(err) => {
                error!("Invalid redirect location: {err}");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        },
        LoginResponse::Page { status, page, .. } => {
            match state.renderer().render(LOGIN_VIEW, &page) {
                Ok(html) => {
                    headers.insert(
                        CONTENT_TYPE,
                        HeaderValue::from_static("text/html; charset=utf-8"),
                    );
                    (status, headers, html).into_response()
                }
                Err(err) => {
                    error!("Failed to render login page: {err:#}");
                    StatusCode::INTERNAL_SERVER_ERROR.into_response()
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    #[test]
    fn mapped_ipv4_peers_are_canonical() -> anyhow::Result<()> {
        let peer: SocketAddr = "[::ffff:192.0.2.9]:51000".parse()?;
        let request = cas_request(peer, HeaderMap::new(), Some("service=a"), b"lt=LT-1");
        assert_eq!(
            request.remote_addr,
            IpAddr::V4(Ipv4Addr::new(192, 0, 2, 9))
        );
        assert_eq!(request.service(), "a");
        assert_eq!(request.param("lt"), "LT-1");
        Ok(())
    }
}
