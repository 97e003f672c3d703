//! Pluggable credential verification.
//!
//! Backends implement [`Authenticator`] and are registered by name when the
//! process starts. The login flow and the REST API pick the primary backend by
//! its configured name; the reserved name [`TRUST_AUTHENTICATOR`] denotes the
//! transparent backend used for gateway and always-trust modes.

mod remote;
mod trust;

pub use remote::RemoteAuthenticator;
pub use trust::{DEFAULT_TRUST_HEADER, TrustAuthenticator};

use std::{collections::HashMap, future::Future, pin::Pin, sync::Arc};
use tracing::warn;

use super::request::CasRequest;

pub const TRUST_AUTHENTICATOR: &str = "trust";
pub const REMOTE_AUTHENTICATOR: &str = "remote";

/// Result of a credential check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verification {
    /// Authenticated identity.
    Accepted(String),
    /// Rejected; carries the attempted identity when the request named one.
    Rejected(Option<String>),
}

impl Verification {
    /// Downgrade an accepted identity that is empty or contains control
    /// characters. Identities are echoed verbatim in line-based replies.
    #[must_use]
    pub fn checked(self) -> Self {
        match self {
            Self::Accepted(identity)
                if identity.is_empty() || identity.chars().any(char::is_control) =>
            {
                warn!(identity = ?identity, "authenticator accepted an unusable identity");
                Self::Rejected(None)
            }
            other => other,
        }
    }
}

pub type VerifyFuture<'a> = Pin<Box<dyn Future<Output = Verification> + Send + 'a>>;

/// A credential-verification backend.
///
/// Backend failures (unreachable service, malformed reply) are logged by the
/// implementation and reported as [`Verification::Rejected`].
pub trait Authenticator: Send + Sync {
    fn verify<'a>(&'a self, request: &'a CasRequest) -> VerifyFuture<'a>;
}

/// Name-keyed set of authenticators, built once at startup.
#[derive(Clone, Default)]
pub struct AuthenticatorRegistry {
    authenticators: HashMap<String, Arc<dyn Authenticator>>,
}

impl AuthenticatorRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, name: &str, authenticator: Arc<dyn Authenticator>) -> Self {
        self.register(name, authenticator);
        self
    }

    pub fn register(&mut self, name: &str, authenticator: Arc<dyn Authenticator>) {
        self.authenticators.insert(name.to_string(), authenticator);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Authenticator>> {
        self.authenticators.get(name).cloned()
    }

    pub fn trust(&self) -> Option<Arc<dyn Authenticator>> {
        self.get(TRUST_AUTHENTICATOR)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.authenticators.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.authenticators.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for AuthenticatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticatorRegistry")
            .field("authenticators", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    struct Fixed(Verification);

    impl Authenticator for Fixed {
        fn verify<'a>(&'a self, _request: &'a CasRequest) -> VerifyFuture<'a> {
            let verification = self.0.clone();
            Box::pin(async move { verification })
        }
    }

    #[test]
    fn control_characters_are_never_accepted() {
        assert_eq!(
            Verification::Accepted("alice".into()).checked(),
            Verification::Accepted("alice".into())
        );
        assert_eq!(
            Verification::Accepted("alice\nyes".into()).checked(),
            Verification::Rejected(None)
        );
        assert_eq!(
            Verification::Accepted("bob\r".into()).checked(),
            Verification::Rejected(None)
        );
        assert_eq!(
            Verification::Accepted(String::new()).checked(),
            Verification::Rejected(None)
        );
        assert_eq!(
            Verification::Rejected(Some("eve".into())).checked(),
            Verification::Rejected(Some("eve".into()))
        );
    }

    #[tokio::test]
    async fn registry_resolves_by_name() {
        let registry = AuthenticatorRegistry::new()
            .with("fixed", Arc::new(Fixed(Verification::Accepted("bob".into()))))
            .with(
                TRUST_AUTHENTICATOR,
                Arc::new(Fixed(Verification::Rejected(None))),
            );

        assert!(registry.contains("fixed"));
        assert!(!registry.contains("ldap"));
        assert_eq!(registry.names(), vec!["fixed", "trust"]);

        let request = CasRequest::new(IpAddr::V4(Ipv4Addr::LOCALHOST));
        let fixed = registry.get("fixed");
        assert!(fixed.is_some());
        if let Some(fixed) = fixed {
            assert_eq!(
                fixed.verify(&request).await,
                Verification::Accepted("bob".into())
            );
        }
        let trust = registry.trust();
        assert!(trust.is_some());
        if let Some(trust) = trust {
            assert_eq!(trust.verify(&request).await, Verification::Rejected(None));
        }
    }
}
