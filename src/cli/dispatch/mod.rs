//! Map validated CLI matches to the action to run.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{ARG_DSN, ARG_PORT, ARG_SITE_NAME, ARG_URL, auth, tickets};
use anyhow::{Context, Result};
use secrecy::SecretString;
use url::Url;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .filter(|dsn| !dsn.trim().is_empty())
        .map(|dsn| SecretString::from(dsn.clone()));

    let url = matches
        .get_one::<String>(ARG_URL)
        .cloned()
        .context("missing required argument: --url")?;
    Url::parse(&url).with_context(|| format!("invalid --{ARG_URL}: {url}"))?;

    let site_name = matches
        .get_one::<String>(ARG_SITE_NAME)
        .cloned()
        .unwrap_or_default();

    let auth_opts = auth::Options::parse(matches)?;
    let ticket_opts = tickets::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        url,
        site_name,
        authenticator: auth_opts.authenticator,
        auth_url: auth_opts.auth_url,
        trust_mode: auth_opts.trust_mode,
        trust_header: auth_opts.trust_header,
        trust_proxies: auth_opts.trust_proxies,
        login_ticket_ttl: ticket_opts.login_ticket_ttl,
        granting_ticket_ttl: ticket_opts.granting_ticket_ttl,
        service_ticket_ttl: ticket_opts.service_ticket_ttl,
        reap_interval: ticket_opts.reap_interval,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cas::TrustMode;

    const VARS: [&str; 6] = [
        "CASD_DSN",
        "CASD_URL",
        "CASD_AUTHENTICATOR",
        "CASD_AUTH_URL",
        "CASD_TRUST_AUTHENTICATION",
        "CASD_SITE_NAME",
    ];

    #[test]
    fn builds_server_action() {
        temp_env::with_vars(VARS.map(|var| (var, None::<&str>)), || {
            let matches = crate::cli::commands::new().get_matches_from(vec![
                "casd",
                "--auth-url",
                "https://auth.example.com/verify",
                "--trust-authentication",
                "on-gateway",
            ]);
            let action = handler(&matches);
            assert!(action.is_ok());
            if let Ok(Action::Server(args)) = action {
                assert_eq!(args.port, 8080);
                assert!(args.dsn.is_none());
                assert_eq!(args.url, "http://localhost:8080");
                assert_eq!(args.trust_mode, TrustMode::OnGateway);
                assert_eq!(args.site_name, "Central Authentication Service");
            }
        });
    }

    #[test]
    fn invalid_url_is_rejected() {
        temp_env::with_vars(VARS.map(|var| (var, None::<&str>)), || {
            let matches = crate::cli::commands::new().get_matches_from(vec![
                "casd",
                "--auth-url",
                "https://auth.example.com/verify",
                "--url",
                "not a url",
            ]);
            let result = handler(&matches);
            assert!(result.is_err());
            if let Err(err) = result {
                assert!(err.to_string().contains("invalid --url"));
            }
        });
    }

    #[test]
    fn dsn_is_redacted_in_debug() {
        temp_env::with_vars(
            [
                ("CASD_DSN", Some("postgres://user:hunter2@db/casd")),
                ("CASD_AUTH_URL", Some("https://auth.example.com/verify")),
                ("CASD_URL", None),
                ("CASD_AUTHENTICATOR", None),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec!["casd"]);
                let action = handler(&matches);
                assert!(action.is_ok());
                if let Ok(action) = action {
                    assert!(!format!("{action:?}").contains("hunter2"));
                }
            },
        );
    }
}
