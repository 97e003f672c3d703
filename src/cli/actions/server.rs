use crate::{
    api,
    cas::{
        CasConfig, CasState, TrustMode,
        authenticator::{
            AuthenticatorRegistry, REMOTE_AUTHENTICATOR, RemoteAuthenticator, TRUST_AUTHENTICATOR,
            TrustAuthenticator,
        },
        failed_login::{FailedLoginSink, MemoryFailedLogins, PgFailedLogins},
        render::HtmlRenderer,
        store::{MemoryTicketStore, PgTicketStore, TicketStore},
        validate::spawn_reaper,
    },
};
use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::PgPoolOptions;
use std::{net::IpAddr, sync::Arc, time::Duration};
use tracing::{info, warn};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: Option<SecretString>,
    pub url: String,
    pub site_name: String,
    pub authenticator: String,
    pub auth_url: Option<String>,
    pub trust_mode: TrustMode,
    pub trust_header: String,
    pub trust_proxies: Vec<IpAddr>,
    pub login_ticket_ttl: Duration,
    pub granting_ticket_ttl: Duration,
    pub service_ticket_ttl: Duration,
    pub reap_interval: Duration,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database is unreachable, the configured
/// authenticator is unavailable, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let (store, failed_logins) = backends(args.dsn.as_ref()).await?;

    let state = Arc::new(CasState::new(
        config(&args),
        store.clone(),
        authenticators(&args)?,
        failed_logins,
        Arc::new(HtmlRenderer),
    )?);

    info!(
        store = store.name(),
        authenticator = %args.authenticator,
        trust_mode = %args.trust_mode,
        "CAS context ready"
    );

    let reaper = spawn_reaper(store, args.reap_interval);
    let result = api::serve(args.port, state).await;
    reaper.abort();

    result
}

fn config(args: &Args) -> CasConfig {
    CasConfig::new(args.url.clone())
        .with_site_name(args.site_name.clone())
        .with_authenticator(args.authenticator.clone())
        .with_trust_mode(args.trust_mode)
        .with_login_ticket_ttl(args.login_ticket_ttl)
        .with_granting_ticket_ttl(args.granting_ticket_ttl)
        .with_service_ticket_ttl(args.service_ticket_ttl)
}

fn authenticators(args: &Args) -> Result<AuthenticatorRegistry> {
    let mut registry = AuthenticatorRegistry::new().with(
        TRUST_AUTHENTICATOR,
        Arc::new(TrustAuthenticator::new(
            &args.trust_header,
            args.trust_proxies.clone(),
        )),
    );

    if let Some(url) = &args.auth_url {
        registry.register(REMOTE_AUTHENTICATOR, Arc::new(RemoteAuthenticator::new(url)?));
    }

    if args.trust_mode != TrustMode::Off && args.trust_proxies.is_empty() {
        warn!("Trust authentication is enabled but no trusted proxies are configured");
    }

    Ok(registry)
}

async fn backends(
    dsn: Option<&SecretString>,
) -> Result<(Arc<dyn TicketStore>, Arc<dyn FailedLoginSink>)> {
    let Some(dsn) = dsn else {
        warn!("No DSN configured, tickets are kept in memory and lost on restart");
        let store: Arc<dyn TicketStore> = Arc::new(MemoryTicketStore::new());
        let failed_logins: Arc<dyn FailedLoginSink> = Arc::new(MemoryFailedLogins::new());
        return Ok((store, failed_logins));
    };

    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(dsn.expose_secret())
        .await
        .context("Failed to connect to database")?;

    let pg_store = PgTicketStore::new(pool.clone());
    pg_store
        .ensure_schema()
        .await
        .context("Failed to prepare ticket tables")?;

    let store: Arc<dyn TicketStore> = Arc::new(pg_store);
    let failed_logins: Arc<dyn FailedLoginSink> = Arc::new(PgFailedLogins::new(pool));
    Ok((store, failed_logins))
}
