//! Ticket lifecycle and login logic, independent of the HTTP framing.

pub mod acceptor;
pub mod authenticator;
pub mod config;
pub mod failed_login;
pub mod flow;
pub mod render;
pub mod request;
pub mod rest;
pub mod state;
pub mod store;
pub mod ticket;
pub mod validate;

pub use acceptor::{LoginTicketRejection, login_acceptor};
pub use config::{CasConfig, TrustMode};
pub use flow::login_requestor;
pub use request::CasRequest;
pub use rest::TicketApiError;
pub use state::{CasState, LoginResponse, SessionCookie};
