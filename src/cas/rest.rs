//! REST ticket operations for non-browser clients. No cookies are involved;
//! the caller keeps the granting ticket ID itself.

use axum::http::StatusCode;
use std::fmt;
use tracing::{error, info, warn};
use url::Url;

use super::{authenticator::Verification, request::CasRequest, state::CasState};

#[derive(Debug)]
pub enum TicketApiError {
    MissingParameters,
    Forbidden,
    Store(anyhow::Error),
}

impl TicketApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingParameters => StatusCode::BAD_REQUEST,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for TicketApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingParameters => f.write_str("missing required parameters"),
            Self::Forbidden => f.write_str("forbidden"),
            Self::Store(err) => write!(f, "ticket store failure: {err:#}"),
        }
    }
}

impl std::error::Error for TicketApiError {}

impl From<anyhow::Error> for TicketApiError {
    fn from(err: anyhow::Error) -> Self {
        error!("Ticket API failure: {err:#}");
        Self::Store(err)
    }
}

/// Authenticate `username`/`password` and create a granting ticket.
/// Returns the ticket resource location.
///
/// # Errors
/// `MissingParameters` when either field is empty, `Forbidden` when the
/// credentials are rejected.
pub async fn issue_granting_ticket(
    state: &CasState,
    request: &CasRequest,
) -> Result<String, TicketApiError> {
    if request.param("username").is_empty() || request.param("password").is_empty() {
        return Err(TicketApiError::MissingParameters);
    }

    match state
        .primary_authenticator()?
        .verify(request)
        .await
        .checked()
    {
        Verification::Accepted(username) => {
            let tgt = state
                .mint_granting_ticket(&username, request.remote_addr)
                .await?;
            info!(
                username = %tgt.username,
                remote_addr = %request.remote_addr,
                "granting ticket created over REST"
            );
            Ok(state.granting_ticket_url(&tgt.id))
        }
        Verification::Rejected(attempted) => {
            let attempted = attempted.unwrap_or_default();
            warn!(
                remote_addr = %request.remote_addr,
                username = %attempted,
                "REST credentials rejected"
            );
            state.record_failed_login(request.remote_addr, &attempted);
            Err(TicketApiError::Forbidden)
        }
    }
}

/// Mint a service ticket off granting ticket `id` for `request.service()`.
/// The ticket is checked in-process without being consumed, so the target
/// service can still validate it once.
///
/// # Errors
/// `MissingParameters` when the ticket ID is empty or the service is not an
/// absolute URL, `Forbidden`
/// when the granting ticket is unknown, expired or bound to another address.
pub async fn issue_service_ticket(
    state: &CasState,
    id: &str,
    request: &CasRequest,
) -> Result<String, TicketApiError> {
    let service = request.service();
    if id.is_empty() || service.is_empty() {
        return Err(TicketApiError::MissingParameters);
    }
    if let Err(err) = Url::parse(service) {
        warn!(
            remote_addr = %request.remote_addr,
            service,
            "REST service address rejected: {err}"
        );
        return Err(TicketApiError::MissingParameters);
    }

    let Some(tgt) = state.find_granting_ticket(id, request.remote_addr).await? else {
        warn!(remote_addr = %request.remote_addr, "REST granting ticket rejected");
        state.record_failed_login(request.remote_addr, "");
        return Err(TicketApiError::Forbidden);
    };

    let st = state.mint_service_ticket(&tgt.id, service, true).await?;
    if !state.check_service_ticket(&st).await? {
        warn!(
            remote_addr = %request.remote_addr,
            service,
            "service ticket failed validation"
        );
        state.record_failed_login(request.remote_addr, "");
        return Err(TicketApiError::Forbidden);
    }
    Ok(st.id)
}

/// Destroy granting ticket `id` if it belongs to the caller's address.
/// Deleting an absent ticket is not an error.
///
/// # Errors
/// `Store` when the backend fails.
pub async fn destroy_granting_ticket(
    state: &CasState,
    id: &str,
    request: &CasRequest,
) -> Result<(), TicketApiError> {
    if state
        .store()
        .delete_granting_ticket(id, request.remote_addr)
        .await?
    {
        info!(remote_addr = %request.remote_addr, "granting ticket destroyed over REST");
    }
    Ok(())
}
