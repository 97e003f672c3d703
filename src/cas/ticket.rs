//! Ticket model: the three ticket kinds, ID generation and validity.

use anyhow::{Context, Result};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{RngCore, rngs::OsRng};
use std::{
    net::IpAddr,
    time::{Duration, SystemTime},
};

pub const LOGIN_TICKET_PREFIX: &str = "LT";
pub const GRANTING_TICKET_PREFIX: &str = "TGT";
pub const SERVICE_TICKET_PREFIX: &str = "ST";

const TICKET_ENTROPY_BYTES: usize = 32;

/// Create an opaque ticket ID: `<prefix>-<32 random bytes, base64url>`.
///
/// The value is safe to place in cookies, query strings and URL paths.
pub fn generate_ticket_id(prefix: &str) -> Result<String> {
    let mut bytes = [0u8; TICKET_ENTROPY_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate ticket id")?;
    Ok(format!("{prefix}-{}", Base64UrlUnpadded::encode_string(&bytes)))
}

/// `created_at + ttl`, refusing lifetimes that overflow the clock.
fn deadline(created_at: SystemTime, ttl: Duration) -> Result<SystemTime> {
    created_at
        .checked_add(ttl)
        .context("ticket lifetime overflows")
}

/// Common view over every ticket kind.
pub trait Ticket {
    fn expires_at(&self) -> SystemTime;

    /// A ticket is usable strictly before its deadline.
    fn is_expired_at(&self, now: SystemTime) -> bool {
        now >= self.expires_at()
    }

    fn is_expired(&self) -> bool {
        self.is_expired_at(SystemTime::now())
    }
}

/// Anti-replay token proving a login form was rendered by this server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoginTicket {
    pub id: String,
    pub service: String,
    pub created_at: SystemTime,
    pub expires_at: SystemTime,
}

impl LoginTicket {
    /// # Errors
    /// Returns an error if the random source fails or `ttl` overflows the clock.
    pub fn new(service: &str, ttl: Duration) -> Result<Self> {
        let created_at = SystemTime::now();
        Ok(Self {
            id: generate_ticket_id(LOGIN_TICKET_PREFIX)?,
            service: service.to_string(),
            created_at,
            expires_at: deadline(created_at, ttl)?,
        })
    }

    /// Already-expired ticket that is never stored; used only to render
    /// informational pages.
    ///
    /// # Errors
    /// Returns an error if the random source fails.
    pub fn placeholder() -> Result<Self> {
        Self::new("", Duration::ZERO)
    }
}

impl Ticket for LoginTicket {
    fn expires_at(&self) -> SystemTime {
        self.expires_at
    }
}

/// SSO session credential, bound to the client IP that obtained it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TicketGrantingTicket {
    pub id: String,
    pub username: String,
    pub client_ip: IpAddr,
    pub created_at: SystemTime,
    pub expires_at: SystemTime,
}

impl TicketGrantingTicket {
    /// # Errors
    /// Returns an error if the random source fails or `ttl` overflows the clock.
    pub fn new(username: &str, client_ip: IpAddr, ttl: Duration) -> Result<Self> {
        let created_at = SystemTime::now();
        Ok(Self {
            id: generate_ticket_id(GRANTING_TICKET_PREFIX)?,
            username: username.to_string(),
            client_ip,
            created_at,
            expires_at: deadline(created_at, ttl)?,
        })
    }

    /// Exists, not expired, and presented from the issuing address.
    pub fn is_valid_for(&self, client_ip: IpAddr, now: SystemTime) -> bool {
        !self.is_expired_at(now) && self.client_ip == client_ip
    }
}

impl Ticket for TicketGrantingTicket {
    fn expires_at(&self) -> SystemTime {
        self.expires_at
    }
}

/// One-time credential for a single service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceTicket {
    pub id: String,
    pub granting_ticket: String,
    pub service: String,
    /// `true` when minted from a pre-existing session rather than fresh credentials.
    pub from_session: bool,
    pub created_at: SystemTime,
    pub expires_at: SystemTime,
}

impl ServiceTicket {
    /// # Errors
    /// Returns an error if the random source fails or `ttl` overflows the clock.
    pub fn new(
        granting_ticket: &str,
        service: &str,
        from_session: bool,
        ttl: Duration,
    ) -> Result<Self> {
        let created_at = SystemTime::now();
        Ok(Self {
            id: generate_ticket_id(SERVICE_TICKET_PREFIX)?,
            granting_ticket: granting_ticket.to_string(),
            service: service.to_string(),
            from_session,
            created_at,
            expires_at: deadline(created_at, ttl)?,
        })
    }

    pub fn is_valid_for(&self, service: &str, now: SystemTime) -> bool {
        !self.is_expired_at(now) && self.service == service
    }
}

impl Ticket for ServiceTicket {
    fn expires_at(&self) -> SystemTime {
        self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    const CLIENT: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 10));

    #[test]
    fn ticket_ids_are_prefixed_and_unique() -> Result<()> {
        let first = generate_ticket_id(LOGIN_TICKET_PREFIX)?;
        let second = generate_ticket_id(LOGIN_TICKET_PREFIX)?;
        assert!(first.starts_with("LT-"));
        assert_ne!(first, second);

        let encoded = first.trim_start_matches("LT-");
        let decoded = Base64UrlUnpadded::decode_vec(encoded).map_err(anyhow::Error::msg)?;
        assert_eq!(decoded.len(), TICKET_ENTROPY_BYTES);
        Ok(())
    }

    #[test]
    fn ticket_ids_are_url_safe() -> Result<()> {
        let id = generate_ticket_id(SERVICE_TICKET_PREFIX)?;
        assert!(
            id.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
        Ok(())
    }

    #[test]
    fn placeholder_login_ticket_is_expired() -> Result<()> {
        let lt = LoginTicket::placeholder()?;
        assert!(lt.is_expired());
        assert!(lt.service.is_empty());
        Ok(())
    }

    #[test]
    fn expiry_is_strict() -> Result<()> {
        let lt = LoginTicket::new("https://app.example.com", Duration::from_secs(60))?;
        assert!(!lt.is_expired_at(lt.created_at));
        assert!(lt.is_expired_at(lt.expires_at));
        assert!(lt.is_expired_at(lt.expires_at + Duration::from_secs(1)));
        Ok(())
    }

    #[test]
    fn granting_ticket_is_bound_to_client_ip() -> Result<()> {
        let tgt = TicketGrantingTicket::new("alice", CLIENT, Duration::from_secs(60))?;
        let now = SystemTime::now();
        assert!(tgt.is_valid_for(CLIENT, now));
        assert!(!tgt.is_valid_for(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 11)), now));
        assert!(!tgt.is_valid_for(CLIENT, tgt.expires_at));
        Ok(())
    }

    #[test]
    fn service_ticket_is_bound_to_service() -> Result<()> {
        let st = ServiceTicket::new(
            "TGT-x",
            "https://a.example.com",
            true,
            Duration::from_secs(10),
        )?;
        let now = SystemTime::now();
        assert!(st.is_valid_for("https://a.example.com", now));
        assert!(!st.is_valid_for("https://b.example.com", now));
        assert!(st.from_session);
        Ok(())
    }

    #[test]
    fn overflowing_lifetime_is_an_error() -> Result<()> {
        let result = TicketGrantingTicket::new("alice", CLIENT, Duration::MAX);
        assert!(result.is_err());
        if let Err(err) = result {
            assert!(err.to_string().contains("ticket lifetime overflows"));
        }
        assert!(LoginTicket::new("", Duration::from_secs(u64::MAX)).is_err());
        assert!(ServiceTicket::new("TGT-x", "svc", false, Duration::MAX).is_err());

        let lt = LoginTicket::new("", Duration::from_secs(28_800))?;
        assert_eq!(
            lt.expires_at.duration_since(lt.created_at)?,
            Duration::from_secs(28_800)
        );
        Ok(())
    }
}
