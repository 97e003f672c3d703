//! Failed-login accounting.
//!
//! Every rejected authentication or ticket check is reported exactly once,
//! keyed by remote address and the attempted identity (empty when unknown).
//! Throttling based on these counters happens elsewhere.

use sqlx::PgPool;
use std::{
    collections::HashMap,
    net::IpAddr,
    sync::{Mutex, PoisonError},
    time::SystemTime,
};
use tracing::{Instrument, error, info_span, warn};

use super::store::to_unix_millis;

/// Fire-and-forget sink; durability is the implementation's concern.
pub trait FailedLoginSink: Send + Sync {
    fn record(&self, remote_addr: IpAddr, identity: &str);
}

/// Counters kept in memory, logged as they change.
#[derive(Debug, Default)]
pub struct MemoryFailedLogins {
    attempts: Mutex<HashMap<(IpAddr, String), u64>>,
}

impl MemoryFailedLogins {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total failures recorded for an address, across identities.
    pub fn count(&self, remote_addr: IpAddr) -> u64 {
        let attempts = self.attempts.lock().unwrap_or_else(PoisonError::into_inner);
        attempts
            .iter()
            .filter(|((addr, _), _)| *addr == remote_addr)
            .map(|(_, count)| *count)
            .sum()
    }

    pub fn count_for(&self, remote_addr: IpAddr, identity: &str) -> u64 {
        let attempts = self.attempts.lock().unwrap_or_else(PoisonError::into_inner);
        attempts
            .get(&(remote_addr, identity.to_string()))
            .copied()
            .unwrap_or(0)
    }
}

impl FailedLoginSink for MemoryFailedLogins {
    fn record(&self, remote_addr: IpAddr, identity: &str) {
        let mut attempts = self.attempts.lock().unwrap_or_else(PoisonError::into_inner);
        let count = attempts
            .entry((remote_addr, identity.to_string()))
            .or_insert(0);
        *count += 1;
        warn!(%remote_addr, identity, attempts = *count, "failed login");
    }
}

/// Upserts counters into the `failed_logins` table from a background task.
#[derive(Clone, Debug)]
pub struct PgFailedLogins {
    pool: PgPool,
}

impl PgFailedLogins {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl FailedLoginSink for PgFailedLogins {
    fn record(&self, remote_addr: IpAddr, identity: &str) {
        warn!(%remote_addr, identity, "failed login");
        let pool = self.pool.clone();
        let identity = identity.to_string();
        tokio::spawn(async move {
            let query = r"
                INSERT INTO failed_logins (remote_addr, username, attempts, last_attempt_at)
                VALUES ($1, $2, 1, $3)
                ON CONFLICT (remote_addr, username)
                DO UPDATE SET attempts = failed_logins.attempts + 1,
                              last_attempt_at = EXCLUDED.last_attempt_at
            ";
            let span = info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "INSERT",
                db.statement = query
            );
            if let Err(err) = sqlx::query(query)
                .bind(remote_addr.to_string())
                .bind(identity)
                .bind(to_unix_millis(SystemTime::now()))
                .execute(&pool)
                .instrument(span)
                .await
            {
                error!("Failed to record failed login: {err}");
            }
        });
    }
}
