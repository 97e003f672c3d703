//! CAS 1.0 service validation, browser logout and expired-ticket reaping.

use anyhow::Result;
use axum::http::StatusCode;
use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use super::{
    render::{MessageKind, PageMessage},
    request::CasRequest,
    state::{CasState, LoginResponse, SessionCookie},
    store::TicketStore,
};

pub const LOGGED_OUT: &str = "You have been signed out.";

/// Plain-text CAS 1.0 reply body.
pub fn validation_body(outcome: Option<&str>) -> String {
    match outcome {
        Some(username) => format!("yes\n{username}\n"),
        None => "no\n\n".to_string(),
    }
}

/// Consume the service ticket in `ticket` for `service`; returns the
/// username on success.
///
/// # Errors
/// Returns an error if the ticket store fails.
#[instrument(skip_all, fields(remote_addr = %request.remote_addr))]
pub async fn validate(state: &CasState, request: &CasRequest) -> Result<Option<String>> {
    let outcome = state
        .validate_service_ticket(
            request.param("ticket"),
            request.service(),
            request.flag("renew"),
        )
        .await?;
    match outcome {
        Ok(username) => {
            debug!(username = %username, service = request.service(), "service ticket validated");
            Ok(Some(username))
        }
        Err(reason) => {
            warn!(remote_addr = %request.remote_addr, ?reason, "service ticket validation failed");
            state.record_failed_login(request.remote_addr, "");
            Ok(None)
        }
    }
}

/// End the browser session: delete the caller's granting ticket, clear the
/// cookie and offer a fresh form.
///
/// # Errors
/// Returns an error if the ticket store fails.
pub async fn logout(state: &CasState, request: &CasRequest) -> Result<LoginResponse> {
    if let Some(id) = request.session_cookie()
        && state
            .store()
            .delete_granting_ticket(&id, request.remote_addr)
            .await?
    {
        info!(remote_addr = %request.remote_addr, "session ended");
    }

    let message = PageMessage {
        kind: MessageKind::Success,
        text: LOGGED_OUT.to_string(),
    };
    Ok(state
        .form_page(StatusCode::OK, request.service(), Some(message))
        .await?
        .with_cookie(SessionCookie::Clear))
}

/// Purge expired tickets every `interval` until the task is aborted.
pub fn spawn_reaper(store: Arc<dyn TicketStore>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match store.purge_expired(SystemTime::now()).await {
                Ok(0) => {}
                Ok(purged) => debug!(purged, "expired tickets purged"),
                Err(err) => error!("Failed to purge expired tickets: {err:#}"),
            }
        }
    })
}
