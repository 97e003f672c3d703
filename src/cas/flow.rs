//! Login requestor: decides whether a `GET /login` is answered from an
//! existing session, by transparent authentication, or with the form.

use anyhow::Result;
use axum::http::StatusCode;
use tracing::{debug, instrument, warn};

use super::{
    authenticator::Verification,
    config::TrustMode,
    request::CasRequest,
    state::{CasState, LoginResponse, SessionCookie, danger},
};

pub const PRE_ESTABLISHED_SESSION_REQUIRED: &str =
    "This service requires a pre-established SSO session.";

/// Records at most one failed login for the request it was created for.
pub(crate) struct FailureRecorder<'a> {
    state: &'a CasState,
    request: &'a CasRequest,
    recorded: bool,
}

impl<'a> FailureRecorder<'a> {
    pub(crate) fn new(state: &'a CasState, request: &'a CasRequest) -> Self {
        Self {
            state,
            request,
            recorded: false,
        }
    }

    pub(crate) fn record(&mut self, identity: &str) {
        if !self.recorded {
            self.state
                .record_failed_login(self.request.remote_addr, identity);
            self.recorded = true;
        }
    }
}

/// Answer a login page request.
///
/// # Errors
/// Returns an error if the ticket store fails.
#[instrument(skip_all, fields(remote_addr = %request.remote_addr))]
pub async fn login_requestor(state: &CasState, request: &CasRequest) -> Result<LoginResponse> {
    let service = request.service();
    let mut failures = FailureRecorder::new(state, request);
    let trust_mode = state.config().trust_mode();

    if trust_mode == TrustMode::Always
        && let Some(username) = trust(state, request).await
    {
        let tgt = state
            .mint_granting_ticket(&username, request.remote_addr)
            .await?;
        return Ok(state
            .info_page(StatusCode::OK, service, &tgt.username, None)?
            .with_cookie(SessionCookie::Set(tgt.id)));
    }

    if let Some(cookie) = request.session_cookie()
        && !request.flag("renew")
    {
        match state
            .find_granting_ticket(&cookie, request.remote_addr)
            .await?
        {
            Some(tgt) if !service.is_empty() => {
                debug!(username = %tgt.username, service, "resuming session");
                return state.redirect_to_service(&tgt.id, service, true).await;
            }
            Some(tgt) => {
                return state.info_page(StatusCode::OK, service, &tgt.username, None);
            }
            None => {
                warn!(
                    remote_addr = %request.remote_addr,
                    "session cookie did not match a valid granting ticket"
                );
                failures.record("");
            }
        }
    }

    if request.flag("gateway") && !service.is_empty() {
        if trust_mode.allows_gateway()
            && let Some(username) = trust(state, request).await
        {
            let tgt = state
                .mint_granting_ticket(&username, request.remote_addr)
                .await?;
            return Ok(state
                .redirect_to_service(&tgt.id, service, true)
                .await?
                .with_cookie(SessionCookie::Set(tgt.id)));
        }

        warn!(
            remote_addr = %request.remote_addr,
            service,
            trust_mode = %trust_mode,
            "gateway request without a session"
        );
        failures.record("");
        return state.info_page(
            StatusCode::FORBIDDEN,
            service,
            "",
            Some(danger(PRE_ESTABLISHED_SESSION_REQUIRED)),
        );
    }

    state.form_page(StatusCode::OK, service, None).await
}

async fn trust(state: &CasState, request: &CasRequest) -> Option<String> {
    let authenticator = state.trust_authenticator()?;
    match authenticator.verify(request).await.checked() {
        Verification::Accepted(username) => Some(username),
        Verification::Rejected(_) => None,
    }
}
