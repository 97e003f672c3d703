//! In-process ticket store.

use std::{collections::HashMap, net::IpAddr, time::SystemTime};
use tokio::sync::Mutex;

use super::{StoreFuture, TicketStore};
use crate::cas::ticket::{LoginTicket, ServiceTicket, Ticket, TicketGrantingTicket};

#[derive(Default)]
struct Collections {
    login: HashMap<String, LoginTicket>,
    granting: HashMap<String, TicketGrantingTicket>,
    service: HashMap<String, ServiceTicket>,
}

/// Ticket store kept in memory; suitable for a single instance.
///
/// All collections share one lock, so `consume_*` is a `remove` performed
/// while no other request can observe the ticket.
#[derive(Default)]
pub struct MemoryTicketStore {
    collections: Mutex<Collections>,
}

impl MemoryTicketStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Debug for MemoryTicketStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTicketStore").finish_non_exhaustive()
    }
}

impl TicketStore for MemoryTicketStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }

    fn create_login_ticket<'a>(&'a self, ticket: &'a LoginTicket) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut collections = self.collections.lock().await;
            collections.login.insert(ticket.id.clone(), ticket.clone());
            Ok(())
        })
    }

    fn consume_login_ticket<'a>(&'a self, id: &'a str) -> StoreFuture<'a, Option<LoginTicket>> {
        Box::pin(async move {
            let mut collections = self.collections.lock().await;
            Ok(collections.login.remove(id))
        })
    }

    fn create_granting_ticket<'a>(
        &'a self,
        ticket: &'a TicketGrantingTicket,
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut collections = self.collections.lock().await;
            collections
                .granting
                .insert(ticket.id.clone(), ticket.clone());
            Ok(())
        })
    }

    fn find_granting_ticket<'a>(
        &'a self,
        id: &'a str,
        client_ip: Option<IpAddr>,
    ) -> StoreFuture<'a, Option<TicketGrantingTicket>> {
        Box::pin(async move {
            let collections = self.collections.lock().await;
            Ok(collections
                .granting
                .get(id)
                .filter(|tgt| client_ip.is_none_or(|ip| tgt.client_ip == ip))
                .cloned())
        })
    }

    fn delete_granting_ticket<'a>(
        &'a self,
        id: &'a str,
        client_ip: IpAddr,
    ) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let mut collections = self.collections.lock().await;
            let matches = collections
                .granting
                .get(id)
                .is_some_and(|tgt| tgt.client_ip == client_ip);
            if matches {
                collections.granting.remove(id);
            }
            Ok(matches)
        })
    }

    fn create_service_ticket<'a>(&'a self, ticket: &'a ServiceTicket) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut collections = self.collections.lock().await;
            collections.service.insert(ticket.id.clone(), ticket.clone());
            Ok(())
        })
    }

    fn find_service_ticket<'a>(
        &'a self,
        id: &'a str,
    ) -> StoreFuture<'a, Option<ServiceTicket>> {
        Box::pin(async move {
            let collections = self.collections.lock().await;
            Ok(collections.service.get(id).cloned())
        })
    }

    fn consume_service_ticket<'a>(
        &'a self,
        id: &'a str,
    ) -> StoreFuture<'a, Option<ServiceTicket>> {
        Box::pin(async move {
            let mut collections = self.collections.lock().await;
            Ok(collections.service.remove(id))
        })
    }

    fn purge_expired(&self, now: SystemTime) -> StoreFuture<'_, u64> {
        Box::pin(async move {
            let mut collections = self.collections.lock().await;
            let before =
                collections.login.len() + collections.granting.len() + collections.service.len();
            collections.login.retain(|_, t| !t.is_expired_at(now));
            collections.granting.retain(|_, t| !t.is_expired_at(now));
            collections.service.retain(|_, t| !t.is_expired_at(now));
            let after =
                collections.login.len() + collections.granting.len() + collections.service.len();
            Ok(u64::try_from(before - after).unwrap_or(u64::MAX))
        })
    }
}
