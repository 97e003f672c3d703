//! Transparent authentication from ambient request context.

use regex::Regex;
use std::net::IpAddr;
use tracing::{debug, warn};

use super::{Authenticator, Verification, VerifyFuture};
use crate::cas::request::CasRequest;

pub const DEFAULT_TRUST_HEADER: &str = "x-remote-user";

/// Accepts the identity asserted in a header, but only when the request comes
/// from one of the configured trusted addresses (typically an authenticating
/// reverse proxy).
#[derive(Clone, Debug)]
pub struct TrustAuthenticator {
    header: String,
    trusted: Vec<IpAddr>,
}

impl TrustAuthenticator {
    #[must_use]
    pub fn new(header: &str, trusted: Vec<IpAddr>) -> Self {
        Self {
            header: header.to_ascii_lowercase(),
            trusted,
        }
    }

    fn asserted_identity(&self, request: &CasRequest) -> Option<String> {
        let value = request.headers.get(self.header.as_str())?.to_str().ok()?.trim();
        valid_username(value).then(|| value.to_string())
    }
}

fn valid_username(username: &str) -> bool {
    Regex::new(r"^[A-Za-z0-9._@-]{1,128}$").is_ok_and(|re| re.is_match(username))
}

impl Authenticator for TrustAuthenticator {
    fn verify<'a>(&'a self, request: &'a CasRequest) -> VerifyFuture<'a> {
        Box::pin(async move {
            if !self.trusted.contains(&request.remote_addr) {
                debug!(remote_addr = %request.remote_addr, "trust: address not trusted");
                return Verification::Rejected(None);
            }

            match self.asserted_identity(request) {
                Some(username) => Verification::Accepted(username),
                None => {
                    warn!(
                        remote_addr = %request.remote_addr,
                        header = %self.header,
                        "trust: missing or malformed identity header"
                    );
                    Verification::Rejected(None)
                }
            }
        })
    }
}
