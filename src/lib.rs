//! # casd (Central Authentication Service)
//!
//! `casd` is a CAS-style single sign-on server. A user authenticates once and
//! the server hands out short-lived tickets that let independent web services
//! trust that authentication.
//!
//! ## Tickets
//!
//! - **Login Ticket (`LT-`):** single-use token embedded in every login form.
//!   It is consumed atomically on submission, whatever the outcome.
//! - **Ticket-Granting Ticket (`TGT-`):** the SSO session, carried by the
//!   `CASTGC` cookie and bound to the client IP that obtained it.
//! - **Service Ticket (`ST-`):** one-time credential minted for a single
//!   service and handed over through a redirect or the REST API.
//!
//! Consumption of `LT` and `ST` values is a single store operation
//! (`DELETE ... RETURNING` on PostgreSQL, `remove` under a lock in memory), so
//! two concurrent submissions of the same value can never both succeed.
//!
//! ## Surfaces
//!
//! - `GET /login`, `POST /login`, `GET /logout` for browsers.
//! - `POST /v1/tickets`, `POST /v1/tickets/{ticket}`, `DELETE /v1/tickets/{ticket}`
//!   for machine clients.
//! - `GET /validate` (CAS 1.0) for services.

pub mod api;
pub mod cas;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
