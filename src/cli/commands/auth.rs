use crate::cas::{
    TrustMode,
    authenticator::{DEFAULT_TRUST_HEADER, REMOTE_AUTHENTICATOR},
};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::net::IpAddr;

pub const ARG_AUTHENTICATOR: &str = "authenticator";
pub const ARG_AUTH_URL: &str = "auth-url";
pub const ARG_TRUST_AUTHENTICATION: &str = "trust-authentication";
pub const ARG_TRUST_HEADER: &str = "trust-header";
pub const ARG_TRUST_PROXY: &str = "trust-proxy";

#[derive(Debug, Clone)]
pub struct Options {
    pub authenticator: String,
    pub auth_url: Option<String>,
    pub trust_mode: TrustMode,
    pub trust_header: String,
    pub trust_proxies: Vec<IpAddr>,
}

impl Options {
    /// Parse authentication arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the `remote` authenticator is selected without an
    /// endpoint to call.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let authenticator = matches
            .get_one::<String>(ARG_AUTHENTICATOR)
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| REMOTE_AUTHENTICATOR.to_string());
        let auth_url = matches
            .get_one::<String>(ARG_AUTH_URL)
            .cloned()
            .filter(|v| !v.trim().is_empty());

        if authenticator == REMOTE_AUTHENTICATOR && auth_url.is_none() {
            return Err(anyhow::anyhow!(
                "missing required argument: --{ARG_AUTH_URL} \
                 (required by the {REMOTE_AUTHENTICATOR} authenticator)"
            ));
        }

        Ok(Self {
            authenticator,
            auth_url,
            trust_mode: matches
                .get_one::<TrustMode>(ARG_TRUST_AUTHENTICATION)
                .copied()
                .unwrap_or_default(),
            trust_header: matches
                .get_one::<String>(ARG_TRUST_HEADER)
                .cloned()
                .unwrap_or_else(|| DEFAULT_TRUST_HEADER.to_string()),
            trust_proxies: matches
                .get_many::<IpAddr>(ARG_TRUST_PROXY)
                .map(|ips| ips.copied().collect())
                .unwrap_or_default(),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_AUTHENTICATOR)
                .long(ARG_AUTHENTICATOR)
                .help("Name of the authenticator used for form and REST logins")
                .env("CASD_AUTHENTICATOR")
                .default_value(REMOTE_AUTHENTICATOR),
        )
        .arg(
            Arg::new(ARG_AUTH_URL)
                .long(ARG_AUTH_URL)
                .help("Credential verification endpoint, example: https://auth.tld/verify")
                .env("CASD_AUTH_URL"),
        )
        .arg(
            Arg::new(ARG_TRUST_AUTHENTICATION)
                .long(ARG_TRUST_AUTHENTICATION)
                .help("When to trust a front proxy's identity header: off, on-gateway, always")
                .env("CASD_TRUST_AUTHENTICATION")
                .default_value("off")
                .value_parser(|value: &str| value.parse::<TrustMode>()),
        )
        .arg(
            Arg::new(ARG_TRUST_HEADER)
                .long(ARG_TRUST_HEADER)
                .help("Header carrying the username asserted by a trusted proxy")
                .env("CASD_TRUST_HEADER")
                .default_value(DEFAULT_TRUST_HEADER),
        )
        .arg(
            Arg::new(ARG_TRUST_PROXY)
                .long(ARG_TRUST_PROXY)
                .help("Proxy address allowed to assert identities (repeatable or comma separated)")
                .env("CASD_TRUST_PROXIES")
                .action(ArgAction::Append)
                .value_delimiter(',')
                .value_parser(clap::value_parser!(IpAddr)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn command() -> Command {
        with_args(Command::new("casd"))
    }

    #[test]
    fn remote_requires_url() {
        temp_env::with_vars(
            [
                ("CASD_AUTHENTICATOR", None::<&str>),
                ("CASD_AUTH_URL", None::<&str>),
            ],
            || {
                let matches = command().get_matches_from(vec!["casd"]);
                let result = Options::parse(&matches);
                assert!(result.is_err());
                if let Err(err) = result {
                    assert!(err.to_string().contains("--auth-url"));
                }
            },
        );
    }

    #[test]
    fn trust_only_needs_no_url() {
        temp_env::with_vars(
            [
                ("CASD_AUTHENTICATOR", Some("trust")),
                ("CASD_AUTH_URL", None::<&str>),
                ("CASD_TRUST_AUTHENTICATION", Some("always")),
                ("CASD_TRUST_PROXIES", Some("10.0.0.1,10.0.0.2")),
                ("CASD_TRUST_HEADER", None::<&str>),
            ],
            || {
                let matches = command().get_matches_from(vec!["casd"]);
                let options = Options::parse(&matches);
                assert!(options.is_ok());
                if let Ok(options) = options {
                    assert_eq!(options.authenticator, "trust");
                    assert_eq!(options.trust_mode, TrustMode::Always);
                    assert_eq!(options.trust_header, DEFAULT_TRUST_HEADER);
                    assert_eq!(
                        options.trust_proxies,
                        vec![
                            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
                            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)),
                        ]
                    );
                }
            },
        );
    }

    #[test]
    fn flags_override_defaults() {
        temp_env::with_vars(
            [
                ("CASD_AUTHENTICATOR", None::<&str>),
                ("CASD_TRUST_AUTHENTICATION", None::<&str>),
                ("CASD_TRUST_PROXIES", None::<&str>),
            ],
            || {
                let matches = command().get_matches_from(vec![
                    "casd",
                    "--auth-url",
                    "https://auth.example.com/verify",
                    "--trust-authentication",
                    "on-gateway",
                    "--trust-proxy",
                    "::1",
                    "--trust-header",
                    "x-forwarded-user",
                ]);
                let options = Options::parse(&matches);
                assert!(options.is_ok());
                if let Ok(options) = options {
                    assert_eq!(options.authenticator, REMOTE_AUTHENTICATOR);
                    assert_eq!(
                        options.auth_url.as_deref(),
                        Some("https://auth.example.com/verify")
                    );
                    assert_eq!(options.trust_mode, TrustMode::OnGateway);
                    assert_eq!(options.trust_header, "x-forwarded-user");
                    assert_eq!(options.trust_proxies.len(), 1);
                }
            },
        );
    }

    #[test]
    fn invalid_trust_mode_is_rejected() {
        temp_env::with_vars([("CASD_TRUST_AUTHENTICATION", None::<&str>)], || {
            let result = command().try_get_matches_from(vec![
                "casd",
                "--trust-authentication",
                "sometimes",
            ]);
            assert_eq!(
                result.map(|_| ()).map_err(|e| e.kind()),
                Err(clap::error::ErrorKind::ValueValidation)
            );
        });
    }
}
