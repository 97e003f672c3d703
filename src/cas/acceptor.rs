//! Login acceptor: handles the submitted login form.

use anyhow::Result;
use axum::http::StatusCode;
use std::{fmt, time::SystemTime};
use tracing::{info, instrument, warn};

use super::{
    authenticator::Verification,
    request::CasRequest,
    state::{CasState, LoginResponse, SessionCookie, danger},
    ticket::{LoginTicket, Ticket},
};

pub const CREDENTIALS_INCORRECT: &str = "The credentials you provided were incorrect.";

/// Why a submitted login ticket was refused. The ticket is gone in every case.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoginTicketRejection {
    /// Never issued, already used, or mistyped.
    Incorrect,
    Expired,
    /// Issued for a different service.
    WrongContext,
}

impl LoginTicketRejection {
    pub const fn message(self) -> &'static str {
        match self {
            Self::Incorrect => "Form submission token was incorrect.",
            Self::Expired => "Form submission token has expired.",
            Self::WrongContext => "Form submission token reused in another context.",
        }
    }
}

impl fmt::Display for LoginTicketRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Consume the login ticket and check it against the submitted service.
///
/// # Errors
/// Returns an error if the ticket store fails.
pub async fn redeem_login_ticket(
    state: &CasState,
    id: &str,
    service: &str,
) -> Result<Result<LoginTicket, LoginTicketRejection>> {
    if id.is_empty() {
        return Ok(Err(LoginTicketRejection::Incorrect));
    }
    let Some(lt) = state.store().consume_login_ticket(id).await? else {
        return Ok(Err(LoginTicketRejection::Incorrect));
    };
    if lt.is_expired_at(SystemTime::now()) {
        return Ok(Err(LoginTicketRejection::Expired));
    }
    if lt.service != service {
        return Ok(Err(LoginTicketRejection::WrongContext));
    }
    Ok(Ok(lt))
}

/// Handle a login form submission.
///
/// # Errors
/// Returns an error if the ticket store fails or the primary authenticator is
/// missing.
#[instrument(skip_all, fields(remote_addr = %request.remote_addr))]
pub async fn login_acceptor(state: &CasState, request: &CasRequest) -> Result<LoginResponse> {
    let service = request.service();

    if let Err(rejection) = redeem_login_ticket(state, request.param("lt"), service).await? {
        warn!(remote_addr = %request.remote_addr, service, "login ticket rejected: {rejection}");
        state.record_failed_login(request.remote_addr, "");
        return forbidden(state, service, rejection.message()).await;
    }

    let username = match state
        .primary_authenticator()?
        .verify(request)
        .await
        .checked()
    {
        Verification::Accepted(username) => username,
        Verification::Rejected(attempted) => {
            let attempted = attempted.unwrap_or_default();
            warn!(
                remote_addr = %request.remote_addr,
                username = %attempted,
                "credentials rejected"
            );
            state.record_failed_login(request.remote_addr, &attempted);
            return forbidden(state, service, CREDENTIALS_INCORRECT).await;
        }
    };

    let tgt = state
        .mint_granting_ticket(&username, request.remote_addr)
        .await?;
    info!(username = %tgt.username, remote_addr = %request.remote_addr, "login succeeded");

    let response = if service.is_empty() {
        state.info_page(StatusCode::OK, service, &tgt.username, None)?
    } else {
        state.redirect_to_service(&tgt.id, service, false).await?
    };
    Ok(response.with_cookie(SessionCookie::Set(tgt.id)))
}

async fn forbidden(state: &CasState, service: &str, message: &str) -> Result<LoginResponse> {
    state
        .form_page(StatusCode::FORBIDDEN, service, Some(danger(message)))
        .await
}
