//! Ticket store contract and its backends.
//!
//! Three logical collections (login, granting, service tickets). Lookups return
//! tickets even when expired; callers compare the deadline against the current
//! time before trusting a ticket.
//!
//! `consume_*` methods are lookup-and-delete in a single indivisible operation.
//! Implementations must never express them as a separate find followed by a
//! delete.

mod memory;
mod postgres;

pub use memory::MemoryTicketStore;
pub use postgres::PgTicketStore;
pub(crate) use postgres::to_unix_millis;

use anyhow::Result;
use std::{future::Future, net::IpAddr, pin::Pin, time::SystemTime};

use super::ticket::{LoginTicket, ServiceTicket, TicketGrantingTicket};

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

pub trait TicketStore: Send + Sync {
    /// Backend name reported by `/health`.
    fn name(&self) -> &'static str;

    /// Round-trip to the backend.
    fn ping(&self) -> StoreFuture<'_, ()>;

    fn create_login_ticket<'a>(&'a self, ticket: &'a LoginTicket) -> StoreFuture<'a, ()>;

    /// Atomically remove and return the login ticket, if present.
    fn consume_login_ticket<'a>(&'a self, id: &'a str) -> StoreFuture<'a, Option<LoginTicket>>;

    fn create_granting_ticket<'a>(
        &'a self,
        ticket: &'a TicketGrantingTicket,
    ) -> StoreFuture<'a, ()>;

    /// Non-destructive lookup; `client_ip` narrows the match to the issuing address.
    fn find_granting_ticket<'a>(
        &'a self,
        id: &'a str,
        client_ip: Option<IpAddr>,
    ) -> StoreFuture<'a, Option<TicketGrantingTicket>>;

    /// Delete the granting ticket matching both ID and client IP.
    /// Returns whether a ticket was removed.
    fn delete_granting_ticket<'a>(
        &'a self,
        id: &'a str,
        client_ip: IpAddr,
    ) -> StoreFuture<'a, bool>;

    fn create_service_ticket<'a>(&'a self, ticket: &'a ServiceTicket) -> StoreFuture<'a, ()>;

    fn find_service_ticket<'a>(&'a self, id: &'a str)
    -> StoreFuture<'a, Option<ServiceTicket>>;

    /// Atomically remove and return the service ticket, if present.
    fn consume_service_ticket<'a>(
        &'a self,
        id: &'a str,
    ) -> StoreFuture<'a, Option<ServiceTicket>>;

    /// Remove every ticket whose deadline is at or before `now`.
    fn purge_expired(&self, now: SystemTime) -> StoreFuture<'_, u64>;
}
