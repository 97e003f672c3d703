//! Static server configuration.

use std::{fmt, str::FromStr, time::Duration};

use super::authenticator::REMOTE_AUTHENTICATOR;

const DEFAULT_BASE_URL: &str = "http://localhost:8080";
const DEFAULT_SITE_NAME: &str = "Central Authentication Service";
const DEFAULT_LOGIN_TICKET_TTL_SECONDS: u64 = 5 * 60;
const DEFAULT_GRANTING_TICKET_TTL_SECONDS: u64 = 8 * 60 * 60;
const DEFAULT_SERVICE_TICKET_TTL_SECONDS: u64 = 60;

/// When the `trust` authenticator is consulted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TrustMode {
    #[default]
    Off,
    /// Only for `gateway=true` requests naming a service.
    OnGateway,
    /// Before anything else on every login page request.
    Always,
}

impl TrustMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::OnGateway => "on-gateway",
            Self::Always => "always",
        }
    }

    pub const fn allows_gateway(self) -> bool {
        matches!(self, Self::OnGateway | Self::Always)
    }
}

impl FromStr for TrustMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "on-gateway" => Ok(Self::OnGateway),
            "always" => Ok(Self::Always),
            other => Err(format!(
                "invalid trust authentication mode: {other} (expected off, on-gateway or always)"
            )),
        }
    }
}

impl fmt::Display for TrustMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug)]
pub struct CasConfig {
    base_url: String,
    site_name: String,
    authenticator: String,
    trust_mode: TrustMode,
    login_ticket_ttl: Duration,
    granting_ticket_ttl: Duration,
    service_ticket_ttl: Duration,
}

impl Default for CasConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL.to_string())
    }
}

impl CasConfig {
    #[must_use]
    pub fn new(base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            site_name: DEFAULT_SITE_NAME.to_string(),
            authenticator: REMOTE_AUTHENTICATOR.to_string(),
            trust_mode: TrustMode::Off,
            login_ticket_ttl: Duration::from_secs(DEFAULT_LOGIN_TICKET_TTL_SECONDS),
            granting_ticket_ttl: Duration::from_secs(DEFAULT_GRANTING_TICKET_TTL_SECONDS),
            service_ticket_ttl: Duration::from_secs(DEFAULT_SERVICE_TICKET_TTL_SECONDS),
        }
    }

    #[must_use]
    pub fn with_site_name(mut self, site_name: String) -> Self {
        self.site_name = site_name;
        self
    }

    #[must_use]
    pub fn with_authenticator(mut self, name: String) -> Self {
        self.authenticator = name;
        self
    }

    #[must_use]
    pub fn with_trust_mode(mut self, mode: TrustMode) -> Self {
        self.trust_mode = mode;
        self
    }

    #[must_use]
    pub fn with_login_ticket_ttl(mut self, ttl: Duration) -> Self {
        self.login_ticket_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_granting_ticket_ttl(mut self, ttl: Duration) -> Self {
        self.granting_ticket_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_service_ticket_ttl(mut self, ttl: Duration) -> Self {
        self.service_ticket_ttl = ttl;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn site_name(&self) -> &str {
        &self.site_name
    }

    #[must_use]
    pub fn authenticator(&self) -> &str {
        &self.authenticator
    }

    #[must_use]
    pub fn trust_mode(&self) -> TrustMode {
        self.trust_mode
    }

    #[must_use]
    pub fn login_ticket_ttl(&self) -> Duration {
        self.login_ticket_ttl
    }

    #[must_use]
    pub fn granting_ticket_ttl(&self) -> Duration {
        self.granting_ticket_ttl
    }

    #[must_use]
    pub fn service_ticket_ttl(&self) -> Duration {
        self.service_ticket_ttl
    }

    /// Only mark cookies secure when the server is published over HTTPS.
    pub(crate) fn cookie_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}
