//! Request-independent context shared by the login flow, the acceptor and the
//! REST API, plus the ticket operations built on top of the store.

use anyhow::{Context, Result, anyhow};
use axum::http::StatusCode;
use std::{net::IpAddr, sync::Arc, time::SystemTime};
use tracing::debug;
use url::Url;

use super::{
    authenticator::{Authenticator, AuthenticatorRegistry},
    config::CasConfig,
    failed_login::FailedLoginSink,
    render::{LoginPage, MessageKind, PageMessage, PageSession, Renderer},
    request::SESSION_COOKIE_NAME,
    store::TicketStore,
    ticket::{LoginTicket, ServiceTicket, Ticket, TicketGrantingTicket},
};

/// Cookie change attached to a browser response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionCookie {
    Set(String),
    Clear,
}

/// Outcome of a browser-facing request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoginResponse {
    Page {
        status: StatusCode,
        page: LoginPage,
        cookie: Option<SessionCookie>,
    },
    Redirect {
        location: String,
        cookie: Option<SessionCookie>,
    },
}

impl LoginResponse {
    #[must_use]
    pub fn with_cookie(self, new_cookie: SessionCookie) -> Self {
        match self {
            Self::Page { status, page, .. } => Self::Page {
                status,
                page,
                cookie: Some(new_cookie),
            },
            Self::Redirect { location, .. } => Self::Redirect {
                location,
                cookie: Some(new_cookie),
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Page { status, .. } => *status,
            Self::Redirect { .. } => StatusCode::FOUND,
        }
    }

    pub fn cookie(&self) -> Option<&SessionCookie> {
        match self {
            Self::Page { cookie, .. } | Self::Redirect { cookie, .. } => cookie.as_ref(),
        }
    }
}

/// Why a service ticket did not validate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServiceTicketRejection {
    Unknown,
    Expired,
    WrongService,
    SessionEnded,
    NotRenewed,
}

/// Everything the core needs, constructed once at startup and passed to the
/// handlers explicitly.
pub struct CasState {
    config: CasConfig,
    store: Arc<dyn TicketStore>,
    authenticators: AuthenticatorRegistry,
    failed_logins: Arc<dyn FailedLoginSink>,
    renderer: Arc<dyn Renderer>,
}

impl std::fmt::Debug for CasState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CasState")
            .field("config", &self.config)
            .field("store", &self.store.name())
            .field("authenticators", &self.authenticators)
            .finish_non_exhaustive()
    }
}

impl CasState {
    /// # Errors
    /// Returns an error if the configured primary authenticator is not registered.
    pub fn new(
        config: CasConfig,
        store: Arc<dyn TicketStore>,
        authenticators: AuthenticatorRegistry,
        failed_logins: Arc<dyn FailedLoginSink>,
        renderer: Arc<dyn Renderer>,
    ) -> Result<Self> {
        if !authenticators.contains(config.authenticator()) {
            return Err(anyhow!(
                "authenticator '{}' is not available (registered: {})",
                config.authenticator(),
                authenticators.names().join(", ")
            ));
        }
        Ok(Self {
            config,
            store,
            authenticators,
            failed_logins,
            renderer,
        })
    }

    #[must_use]
    pub fn config(&self) -> &CasConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &dyn TicketStore {
        self.store.as_ref()
    }

    #[must_use]
    pub fn renderer(&self) -> &dyn Renderer {
        self.renderer.as_ref()
    }

    /// The configured primary authenticator.
    ///
    /// # Errors
    /// Returns an error if it disappeared from the registry.
    pub fn primary_authenticator(&self) -> Result<Arc<dyn Authenticator>> {
        self.authenticators
            .get(self.config.authenticator())
            .ok_or_else(|| {
                anyhow!(
                    "authenticator '{}' is not available",
                    self.config.authenticator()
                )
            })
    }

    pub fn trust_authenticator(&self) -> Option<Arc<dyn Authenticator>> {
        self.authenticators.trust()
    }

    pub fn record_failed_login(&self, remote_addr: IpAddr, identity: &str) {
        self.failed_logins.record(remote_addr, identity);
    }

    /// Mint and persist a login ticket scoped to `service`.
    ///
    /// # Errors
    /// Returns an error if the ticket cannot be generated or stored.
    pub async fn mint_login_ticket(&self, service: &str) -> Result<LoginTicket> {
        let lt = LoginTicket::new(service, self.config.login_ticket_ttl())?;
        self.store.create_login_ticket(&lt).await?;
        Ok(lt)
    }

    /// Mint and persist a granting ticket for an authenticated identity.
    ///
    /// # Errors
    /// Returns an error if the ticket cannot be generated or stored.
    pub async fn mint_granting_ticket(
        &self,
        username: &str,
        client_ip: IpAddr,
    ) -> Result<TicketGrantingTicket> {
        let tgt =
            TicketGrantingTicket::new(username, client_ip, self.config.granting_ticket_ttl())?;
        self.store.create_granting_ticket(&tgt).await?;
        debug!(username, %client_ip, "granting ticket issued");
        Ok(tgt)
    }

    /// Mint and persist a service ticket off a granting ticket.
    ///
    /// # Errors
    /// Returns an error if the ticket cannot be generated or stored.
    pub async fn mint_service_ticket(
        &self,
        granting_ticket: &str,
        service: &str,
        from_session: bool,
    ) -> Result<ServiceTicket> {
        let st = ServiceTicket::new(
            granting_ticket,
            service,
            from_session,
            self.config.service_ticket_ttl(),
        )?;
        self.store.create_service_ticket(&st).await?;
        debug!(service, from_session, "service ticket issued");
        Ok(st)
    }

    /// Look up a granting ticket presented by `client_ip`; expired tickets
    /// and tickets issued to another address are reported as absent.
    ///
    /// # Errors
    /// Returns an error if the store fails.
    pub async fn find_granting_ticket(
        &self,
        id: &str,
        client_ip: IpAddr,
    ) -> Result<Option<TicketGrantingTicket>> {
        if id.is_empty() {
            return Ok(None);
        }
        let tgt = self.store.find_granting_ticket(id, Some(client_ip)).await?;
        Ok(tgt.filter(|tgt| tgt.is_valid_for(client_ip, SystemTime::now())))
    }

    /// Non-destructive check that a freshly minted service ticket is stored
    /// and usable for its service.
    ///
    /// # Errors
    /// Returns an error if the store fails.
    pub async fn check_service_ticket(&self, st: &ServiceTicket) -> Result<bool> {
        let stored = self.store.find_service_ticket(&st.id).await?;
        Ok(stored.is_some_and(|stored| {
            stored.granting_ticket == st.granting_ticket
                && stored.is_valid_for(&st.service, SystemTime::now())
        }))
    }

    /// One-time validation by the target service: consumes the ticket and
    /// returns the authenticated username.
    ///
    /// # Errors
    /// Returns an error if the store fails.
    pub async fn validate_service_ticket(
        &self,
        id: &str,
        service: &str,
        renew: bool,
    ) -> Result<Result<String, ServiceTicketRejection>> {
        if id.is_empty() {
            return Ok(Err(ServiceTicketRejection::Unknown));
        }
        let Some(st) = self.store.consume_service_ticket(id).await? else {
            return Ok(Err(ServiceTicketRejection::Unknown));
        };
        let now = SystemTime::now();
        if st.is_expired_at(now) {
            return Ok(Err(ServiceTicketRejection::Expired));
        }
        if st.service != service {
            return Ok(Err(ServiceTicketRejection::WrongService));
        }
        if renew && st.from_session {
            return Ok(Err(ServiceTicketRejection::NotRenewed));
        }
        let tgt = self
            .store
            .find_granting_ticket(&st.granting_ticket, None)
            .await?
            .filter(|tgt| !tgt.is_expired_at(now));
        Ok(tgt
            .map(|tgt| tgt.username)
            .ok_or(ServiceTicketRejection::SessionEnded))
    }

    /// Login page with a form backed by a freshly stored login ticket.
    ///
    /// # Errors
    /// Returns an error if the login ticket cannot be stored.
    pub async fn form_page(
        &self,
        status: StatusCode,
        service: &str,
        message: Option<PageMessage>,
    ) -> Result<LoginResponse> {
        let lt = self.mint_login_ticket(service).await?;
        Ok(LoginResponse::Page {
            status,
            page: self.page(lt, service, "", message, true),
            cookie: None,
        })
    }

    /// Informational page; carries an expired placeholder login ticket that
    /// is never stored.
    ///
    /// # Errors
    /// Returns an error if the placeholder cannot be generated.
    pub fn info_page(
        &self,
        status: StatusCode,
        service: &str,
        username: &str,
        message: Option<PageMessage>,
    ) -> Result<LoginResponse> {
        let lt = LoginTicket::placeholder()?;
        Ok(LoginResponse::Page {
            status,
            page: self.page(lt, service, username, message, false),
            cookie: None,
        })
    }

    /// Redirect to `service` carrying a new service ticket.
    ///
    /// An unparseable service URL yields a 400 page and no ticket.
    ///
    /// # Errors
    /// Returns an error if the ticket cannot be generated or stored.
    pub async fn redirect_to_service(
        &self,
        granting_ticket: &str,
        service: &str,
        from_session: bool,
    ) -> Result<LoginResponse> {
        let Ok(mut target) = Url::parse(service) else {
            return self.info_page(
                StatusCode::BAD_REQUEST,
                "",
                "",
                Some(danger("The requested service address is invalid.")),
            );
        };
        let st = self
            .mint_service_ticket(granting_ticket, service, from_session)
            .await?;
        target.query_pairs_mut().append_pair("ticket", &st.id);
        Ok(LoginResponse::Redirect {
            location: target.to_string(),
            cookie: None,
        })
    }

    fn page(
        &self,
        lt: LoginTicket,
        service: &str,
        username: &str,
        message: Option<PageMessage>,
        show_form: bool,
    ) -> LoginPage {
        LoginPage {
            site: self.config.site_name().to_string(),
            session: PageSession {
                service: service.to_string(),
                username: username.to_string(),
            },
            message,
            show_form,
            login_ticket: lt.id,
        }
    }

    /// `Set-Cookie` value for a session cookie change.
    pub fn cookie_header(&self, cookie: &SessionCookie) -> String {
        let mut header = match cookie {
            SessionCookie::Set(value) => format!(
                "{SESSION_COOKIE_NAME}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
                self.config.granting_ticket_ttl().as_secs()
            ),
            SessionCookie::Clear => {
                format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
            }
        };
        if self.config.cookie_secure() {
            header.push_str("; Secure");
        }
        header
    }

    /// Location of a granting ticket resource in the REST API.
    pub fn granting_ticket_url(&self, id: &str) -> String {
        format!("{}/v1/tickets/{id}", self.config.base_url())
    }
}

pub(crate) fn danger(text: &str) -> PageMessage {
    PageMessage {
        kind: MessageKind::Danger,
        text: text.to_string(),
    }
}

/// Store errors surfaced to the browser.
///
/// # Errors
/// Returns an error if even the placeholder page cannot be built.
pub fn internal_error_page(state: &CasState, service: &str) -> Result<LoginResponse> {
    state
        .info_page(
            StatusCode::INTERNAL_SERVER_ERROR,
            service,
            "",
            Some(danger("The authentication service is temporarily unavailable.")),
        )
        .context("failed to build error page")
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::cas::{
        authenticator::{TRUST_AUTHENTICATOR, Verification, VerifyFuture},
        config::TrustMode,
        failed_login::MemoryFailedLogins,
        render::HtmlRenderer,
        request::CasRequest,
        store::MemoryTicketStore,
    };

    pub(crate) const PRIMARY: &str = "static";

    /// Accepts `username`/`password` pairs equal to `alice`/`secret`.
    pub(crate) struct StaticAuthenticator;

    impl Authenticator for StaticAuthenticator {
        fn verify<'a>(&'a self, request: &'a CasRequest) -> VerifyFuture<'a> {
            Box::pin(async move {
                let username = request.param("username").to_string();
                if username == "alice" && request.param("password") == "secret" {
                    Verification::Accepted(username)
                } else {
                    Verification::Rejected((!username.is_empty()).then_some(username))
                }
            })
        }
    }

    /// Trust backend with a fixed answer.
    pub(crate) struct FixedTrust(pub(crate) Option<&'static str>);

    impl Authenticator for FixedTrust {
        fn verify<'a>(&'a self, _request: &'a CasRequest) -> VerifyFuture<'a> {
            let verification = self.0.map_or(Verification::Rejected(None), |user| {
                Verification::Accepted(user.to_string())
            });
            Box::pin(async move { verification })
        }
    }

    pub(crate) struct Harness {
        pub(crate) state: CasState,
        pub(crate) store: Arc<MemoryTicketStore>,
        pub(crate) failures: Arc<MemoryFailedLogins>,
    }

    pub(crate) fn harness(mode: TrustMode, trust: Option<&'static str>) -> Result<Harness> {
        let store = Arc::new(MemoryTicketStore::new());
        let failures = Arc::new(MemoryFailedLogins::new());
        let registry = AuthenticatorRegistry::new()
            .with(PRIMARY, Arc::new(StaticAuthenticator))
            .with(TRUST_AUTHENTICATOR, Arc::new(FixedTrust(trust)));
        let config = CasConfig::new("https://cas.example.com".to_string())
            .with_authenticator(PRIMARY.to_string())
            .with_trust_mode(mode);
        let state = CasState::new(
            config,
            store.clone(),
            registry,
            failures.clone(),
            Arc::new(HtmlRenderer),
        )?;
        Ok(Harness {
            state,
            store,
            failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::harness;
    use super::*;
    use crate::cas::{
        config::TrustMode, failed_login::MemoryFailedLogins, render::HtmlRenderer,
        store::MemoryTicketStore,
    };
    use std::net::Ipv4Addr;

    const CLIENT: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1));

    #[test]
    fn unknown_primary_authenticator_is_rejected() {
        let result = CasState::new(
            CasConfig::default().with_authenticator("ldap".to_string()),
            Arc::new(MemoryTicketStore::new()),
            AuthenticatorRegistry::new(),
            Arc::new(MemoryFailedLogins::new()),
            Arc::new(HtmlRenderer),
        );
        assert!(result.is_err());
        if let Err(err) = result {
            assert!(err.to_string().contains("ldap"));
        }
    }

    #[test]
    fn cookie_header_sets_and_clears() -> Result<()> {
        let h = harness(TrustMode::Off, None)?;
        let set = h.state.cookie_header(&SessionCookie::Set("TGT-1".to_string()));
        assert_eq!(
            set,
            "CASTGC=TGT-1; Path=/; HttpOnly; SameSite=Lax; Max-Age=28800; Secure"
        );
        let clear = h.state.cookie_header(&SessionCookie::Clear);
        assert!(clear.starts_with("CASTGC=; "));
        assert!(clear.contains("Max-Age=0"));
        Ok(())
    }

    #[tokio::test]
    async fn expired_granting_ticket_is_absent() -> Result<()> {
        let h = harness(TrustMode::Off, None)?;
        let tgt = TicketGrantingTicket::new("alice", CLIENT, std::time::Duration::ZERO)?;
        h.store.create_granting_ticket(&tgt).await?;
        assert!(h.state.find_granting_ticket(&tgt.id, CLIENT).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn service_ticket_validates_exactly_once() -> Result<()> {
        let h = harness(TrustMode::Off, None)?;
        let tgt = h.state.mint_granting_ticket("alice", CLIENT).await?;
        let st = h
            .state
            .mint_service_ticket(&tgt.id, "https://app.example.com", true)
            .await?;

        assert!(h.state.check_service_ticket(&st).await?);
        assert_eq!(
            h.state
                .validate_service_ticket(&st.id, "https://app.example.com", false)
                .await?,
            Ok("alice".to_string())
        );
        assert_eq!(
            h.state
                .validate_service_ticket(&st.id, "https://app.example.com", false)
                .await?,
            Err(ServiceTicketRejection::Unknown)
        );
        Ok(())
    }

    #[tokio::test]
    async fn service_ticket_rejections() -> Result<()> {
        let h = harness(TrustMode::Off, None)?;
        let tgt = h.state.mint_granting_ticket("alice", CLIENT).await?;

        let st = h.state.mint_service_ticket(&tgt.id, "https://a", true).await?;
        assert_eq!(
            h.state.validate_service_ticket(&st.id, "https://b", false).await?,
            Err(ServiceTicketRejection::WrongService)
        );

        let st = h.state.mint_service_ticket(&tgt.id, "https://a", true).await?;
        assert_eq!(
            h.state.validate_service_ticket(&st.id, "https://a", true).await?,
            Err(ServiceTicketRejection::NotRenewed)
        );

        let st = h.state.mint_service_ticket(&tgt.id, "https://a", false).await?;
        h.store.delete_granting_ticket(&tgt.id, CLIENT).await?;
        assert_eq!(
            h.state.validate_service_ticket(&st.id, "https://a", true).await?,
            Err(ServiceTicketRejection::SessionEnded)
        );

        let expired = ServiceTicket::new(&tgt.id, "https://a", false, std::time::Duration::ZERO)?;
        h.store.create_service_ticket(&expired).await?;
        assert_eq!(
            h.state.validate_service_ticket(&expired.id, "https://a", false).await?,
            Err(ServiceTicketRejection::Expired)
        );
        Ok(())
    }

    #[tokio::test]
    async fn invalid_service_url_mints_nothing() -> Result<()> {
        let h = harness(TrustMode::Off, None)?;
        let response = h.state.redirect_to_service("TGT-x", "not a url", true).await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let later = SystemTime::now() + std::time::Duration::from_secs(3600);
        assert_eq!(h.store.purge_expired(later).await?, 0);
        Ok(())
    }
}
