//! PostgreSQL ticket store.
//!
//! Timestamps are stored as unix milliseconds (`BIGINT`). Consumption uses a
//! single `DELETE ... RETURNING` statement.

use anyhow::{Context, Result, anyhow};
use sqlx::{PgPool, Row, postgres::PgRow};
use std::{
    net::IpAddr,
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use tracing::{Instrument, info_span};

use super::{StoreFuture, TicketStore};
use crate::cas::ticket::{LoginTicket, ServiceTicket, TicketGrantingTicket};

const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

#[derive(Clone, Debug)]
pub struct PgTicketStore {
    pool: PgPool,
}

impl PgTicketStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the ticket and failed-login tables if they do not exist yet.
    ///
    /// # Errors
    /// Returns an error if any schema statement fails.
    pub async fn ensure_schema(&self) -> Result<()> {
        for (index, statement) in split_sql_statements(SCHEMA_SQL).iter().enumerate() {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .with_context(|| format!("failed to execute schema statement {}", index + 1))?;
        }
        Ok(())
    }
}

fn query_span(operation: &'static str, statement: &'static str) -> tracing::Span {
    info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

pub(crate) fn to_unix_millis(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
}

fn from_unix_millis(millis: i64) -> SystemTime {
    UNIX_EPOCH + Duration::from_millis(u64::try_from(millis).unwrap_or(0))
}

fn split_sql_statements(sql: &str) -> Vec<String> {
    sql.split(';')
        .map(|statement| {
            statement
                .lines()
                .filter(|line| !line.trim_start().starts_with("--"))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .map(|statement| statement.trim().to_string())
        .filter(|statement| !statement.is_empty())
        .collect()
}

fn login_ticket_from_row(row: &PgRow) -> Result<LoginTicket> {
    Ok(LoginTicket {
        id: row.try_get("id")?,
        service: row.try_get("service")?,
        created_at: from_unix_millis(row.try_get("created_at")?),
        expires_at: from_unix_millis(row.try_get("expires_at")?),
    })
}

fn granting_ticket_from_row(row: &PgRow) -> Result<TicketGrantingTicket> {
    let client_ip: String = row.try_get("client_ip")?;
    Ok(TicketGrantingTicket {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        client_ip: client_ip
            .parse()
            .map_err(|err| anyhow!("invalid client_ip {client_ip:?}: {err}"))?,
        created_at: from_unix_millis(row.try_get("created_at")?),
        expires_at: from_unix_millis(row.try_get("expires_at")?),
    })
}

fn service_ticket_from_row(row: &PgRow) -> Result<ServiceTicket> {
    Ok(ServiceTicket {
        id: row.try_get("id")?,
        granting_ticket: row.try_get("granting_ticket")?,
        service: row.try_get("service")?,
        from_session: row.try_get("from_session")?,
        created_at: from_unix_millis(row.try_get("created_at")?),
        expires_at: from_unix_millis(row.try_get("expires_at")?),
    })
}

impl TicketStore for PgTicketStore {
    fn name(&self) -> &'static str {
        "postgresql"
    }

    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let query = "SELECT 1";
            sqlx::query(query)
                .execute(&self.pool)
                .instrument(query_span("SELECT", query))
                .await
                .context("failed to ping database")?;
            Ok(())
        })
    }

    fn create_login_ticket<'a>(&'a self, ticket: &'a LoginTicket) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let query = r"
                INSERT INTO login_tickets (id, service, created_at, expires_at)
                VALUES ($1, $2, $3, $4)
            ";
            sqlx::query(query)
                .bind(&ticket.id)
                .bind(&ticket.service)
                .bind(to_unix_millis(ticket.created_at))
                .bind(to_unix_millis(ticket.expires_at))
                .execute(&self.pool)
                .instrument(query_span("INSERT", query))
                .await
                .context("failed to insert login ticket")?;
            Ok(())
        })
    }

    fn consume_login_ticket<'a>(&'a self, id: &'a str) -> StoreFuture<'a, Option<LoginTicket>> {
        Box::pin(async move {
            let query = r"
                DELETE FROM login_tickets
                WHERE id = $1
                RETURNING id, service, created_at, expires_at
            ";
            let row = sqlx::query(query)
                .bind(id)
                .fetch_optional(&self.pool)
                .instrument(query_span("DELETE", query))
                .await
                .context("failed to consume login ticket")?;
            row.as_ref().map(login_ticket_from_row).transpose()
        })
    }

    fn create_granting_ticket<'a>(
        &'a self,
        ticket: &'a TicketGrantingTicket,
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let query = r"
                INSERT INTO granting_tickets (id, username, client_ip, created_at, expires_at)
                VALUES ($1, $2, $3, $4, $5)
            ";
            sqlx::query(query)
                .bind(&ticket.id)
                .bind(&ticket.username)
                .bind(ticket.client_ip.to_string())
                .bind(to_unix_millis(ticket.created_at))
                .bind(to_unix_millis(ticket.expires_at))
                .execute(&self.pool)
                .instrument(query_span("INSERT", query))
                .await
                .context("failed to insert granting ticket")?;
            Ok(())
        })
    }

    fn find_granting_ticket<'a>(
        &'a self,
        id: &'a str,
        client_ip: Option<IpAddr>,
    ) -> StoreFuture<'a, Option<TicketGrantingTicket>> {
        Box::pin(async move {
            let query = r"
                SELECT id, username, client_ip, created_at, expires_at
                FROM granting_tickets
                WHERE id = $1 AND ($2::TEXT IS NULL OR client_ip = $2)
            ";
            let row = sqlx::query(query)
                .bind(id)
                .bind(client_ip.map(|ip| ip.to_string()))
                .fetch_optional(&self.pool)
                .instrument(query_span("SELECT", query))
                .await
                .context("failed to lookup granting ticket")?;
            row.as_ref().map(granting_ticket_from_row).transpose()
        })
    }

    fn delete_granting_ticket<'a>(
        &'a self,
        id: &'a str,
        client_ip: IpAddr,
    ) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let query = "DELETE FROM granting_tickets WHERE id = $1 AND client_ip = $2";
            let result = sqlx::query(query)
                .bind(id)
                .bind(client_ip.to_string())
                .execute(&self.pool)
                .instrument(query_span("DELETE", query))
                .await
                .context("failed to delete granting ticket")?;
            Ok(result.rows_affected() > 0)
        })
    }

    fn create_service_ticket<'a>(&'a self, ticket: &'a ServiceTicket) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let query = r"
                INSERT INTO service_tickets
                    (id, granting_ticket, service, from_session, created_at, expires_at)
                VALUES ($1, $2, $3, $4, $5, $6)
            ";
            sqlx::query(query)
                .bind(&ticket.id)
                .bind(&ticket.granting_ticket)
                .bind(&ticket.service)
                .bind(ticket.from_session)
                .bind(to_unix_millis(ticket.created_at))
                .bind(to_unix_millis(ticket.expires_at))
                .execute(&self.pool)
                .instrument(query_span("INSERT", query))
                .await
                .context("failed to insert service ticket")?;
            Ok(())
        })
    }

    fn find_service_ticket<'a>(
        &'a self,
        id: &'a str,
    ) -> StoreFuture<'a, Option<ServiceTicket>> {
        Box::pin(async move {
            let query = r"
                SELECT id, granting_ticket, service, from_session, created_at, expires_at
                FROM service_tickets
                WHERE id = $1
            ";
            let row = sqlx::query(query)
                .bind(id)
                .fetch_optional(&self.pool)
                .instrument(query_span("SELECT", query))
                .await
                .context("failed to lookup service ticket")?;
            row.as_ref().map(service_ticket_from_row).transpose()
        })
    }

    fn consume_service_ticket<'a>(
        &'a self,
        id: &'a str,
    ) -> StoreFuture<'a, Option<ServiceTicket>> {
        Box::pin(async move {
            let query = r"
                DELETE FROM service_tickets
                WHERE id = $1
                RETURNING id, granting_ticket, service, from_session, created_at, expires_at
            ";
            let row = sqlx::query(query)
                .bind(id)
                .fetch_optional(&self.pool)
                .instrument(query_span("DELETE", query))
                .await
                .context("failed to consume service ticket")?;
            row.as_ref().map(service_ticket_from_row).transpose()
        })
    }

    fn purge_expired(&self, now: SystemTime) -> StoreFuture<'_, u64> {
        Box::pin(async move {
            let now = to_unix_millis(now);
            let queries = [
                "DELETE FROM login_tickets WHERE expires_at <= $1",
                "DELETE FROM granting_tickets WHERE expires_at <= $1",
                "DELETE FROM service_tickets WHERE expires_at <= $1",
            ];
            let mut purged = 0;
            for query in queries {
                let result = sqlx::query(query)
                    .bind(now)
                    .execute(&self.pool)
                    .instrument(query_span("DELETE", query))
                    .await
                    .context("failed to purge expired tickets")?;
                purged += result.rows_affected();
            }
            Ok(purged)
        })
    }
}
