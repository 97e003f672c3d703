use clap::{Arg, ArgMatches, Command};
use std::time::Duration;

pub const ARG_LOGIN_TICKET_TTL: &str = "login-ticket-ttl-seconds";
pub const ARG_GRANTING_TICKET_TTL: &str = "granting-ticket-ttl-seconds";
pub const ARG_SERVICE_TICKET_TTL: &str = "service-ticket-ttl-seconds";
pub const ARG_REAP_INTERVAL: &str = "reap-interval-seconds";

/// Largest accepted lifetime; keeps ticket deadlines representable as
/// signed unix milliseconds.
pub const MAX_SECONDS: u64 = i64::MAX.unsigned_abs() / 1_000_000;

#[derive(Debug, Clone)]
pub struct Options {
    pub login_ticket_ttl: Duration,
    pub granting_ticket_ttl: Duration,
    pub service_ticket_ttl: Duration,
    pub reap_interval: Duration,
}

impl Options {
    /// Parse ticket lifetime arguments from matches.
    ///
    /// # Errors
    /// Returns an error if a lifetime or the reap interval is zero or above
    /// [`MAX_SECONDS`].
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let read_seconds = |id: &str| -> anyhow::Result<Duration> {
            let seconds = matches
                .get_one::<u64>(id)
                .copied()
                .filter(|seconds| *seconds > 0)
                .ok_or_else(|| anyhow::anyhow!("--{id} must be greater than zero"))?;
            if seconds > MAX_SECONDS {
                anyhow::bail!("--{id} must not exceed {MAX_SECONDS}");
            }
            Ok(Duration::from_secs(seconds))
        };

        Ok(Self {
            login_ticket_ttl: read_seconds(ARG_LOGIN_TICKET_TTL)?,
            granting_ticket_ttl: read_seconds(ARG_GRANTING_TICKET_TTL)?,
            service_ticket_ttl: read_seconds(ARG_SERVICE_TICKET_TTL)?,
            reap_interval: read_seconds(ARG_REAP_INTERVAL)?,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_LOGIN_TICKET_TTL)
                .long(ARG_LOGIN_TICKET_TTL)
                .help("Login ticket lifetime in seconds")
                .env("CASD_LOGIN_TICKET_TTL_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_GRANTING_TICKET_TTL)
                .long(ARG_GRANTING_TICKET_TTL)
                .help("SSO session (granting ticket) lifetime in seconds")
                .env("CASD_GRANTING_TICKET_TTL_SECONDS")
                .default_value("28800")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_SERVICE_TICKET_TTL)
                .long(ARG_SERVICE_TICKET_TTL)
                .help("Service ticket lifetime in seconds")
                .env("CASD_SERVICE_TICKET_TTL_SECONDS")
                .default_value("60")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_REAP_INTERVAL)
                .long(ARG_REAP_INTERVAL)
                .help("How often expired tickets are purged, in seconds")
                .env("CASD_REAP_INTERVAL_SECONDS")
                .default_value("60")
                .value_parser(clap::value_parser!(u64)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARS: [&str; 4] = [
        "CASD_LOGIN_TICKET_TTL_SECONDS",
        "CASD_GRANTING_TICKET_TTL_SECONDS",
        "CASD_SERVICE_TICKET_TTL_SECONDS",
        "CASD_REAP_INTERVAL_SECONDS",
    ];

    #[test]
    fn defaults() {
        temp_env::with_vars(VARS.map(|var| (var, None::<&str>)), || {
            let matches = with_args(Command::new("casd")).get_matches_from(vec!["casd"]);
            let options = Options::parse(&matches);
            assert!(options.is_ok());
            if let Ok(options) = options {
                assert_eq!(options.login_ticket_ttl, Duration::from_secs(300));
                assert_eq!(options.granting_ticket_ttl, Duration::from_secs(28_800));
                assert_eq!(options.service_ticket_ttl, Duration::from_secs(60));
                assert_eq!(options.reap_interval, Duration::from_secs(60));
            }
        });
    }

    #[test]
    fn env_overrides() {
        temp_env::with_vars(
            [
                ("CASD_LOGIN_TICKET_TTL_SECONDS", Some("120")),
                ("CASD_GRANTING_TICKET_TTL_SECONDS", Some("3600")),
                ("CASD_SERVICE_TICKET_TTL_SECONDS", Some("10")),
                ("CASD_REAP_INTERVAL_SECONDS", Some("5")),
            ],
            || {
                let matches = with_args(Command::new("casd")).get_matches_from(vec!["casd"]);
                let options = Options::parse(&matches);
                assert!(options.is_ok());
                if let Ok(options) = options {
                    assert_eq!(options.login_ticket_ttl, Duration::from_secs(120));
                    assert_eq!(options.granting_ticket_ttl, Duration::from_secs(3600));
                    assert_eq!(options.service_ticket_ttl, Duration::from_secs(10));
                    assert_eq!(options.reap_interval, Duration::from_secs(5));
                }
            },
        );
    }

    #[test]
    fn zero_is_rejected() {
        temp_env::with_vars(VARS.map(|var| (var, None::<&str>)), || {
            let matches = with_args(Command::new("casd")).get_matches_from(vec![
                "casd",
                "--service-ticket-ttl-seconds",
                "0",
            ]);
            let result = Options::parse(&matches);
            assert!(result.is_err());
            if let Err(err) = result {
                assert!(err.to_string().contains("--service-ticket-ttl-seconds"));
            }
        });
    }

    #[test]
    fn oversized_lifetime_is_rejected() {
        temp_env::with_vars(
            [
                ("CASD_LOGIN_TICKET_TTL_SECONDS", None),
                ("CASD_GRANTING_TICKET_TTL_SECONDS", Some("18446744073709551615")),
                ("CASD_SERVICE_TICKET_TTL_SECONDS", None),
                ("CASD_REAP_INTERVAL_SECONDS", None),
            ],
            || {
                let matches = with_args(Command::new("casd")).get_matches_from(vec!["casd"]);
                let result = Options::parse(&matches);
                assert!(result.is_err());
                if let Err(err) = result {
                    assert!(err.to_string().contains("--granting-ticket-ttl-seconds"));
                }
            },
        );
    }

    #[test]
    fn largest_lifetime_is_accepted() {
        let max = MAX_SECONDS.to_string();
        temp_env::with_vars(VARS.map(|var| (var, None::<&str>)), || {
            let matches = with_args(Command::new("casd")).get_matches_from(vec![
                "casd",
                "--login-ticket-ttl-seconds",
                max.as_str(),
            ]);
            let options = Options::parse(&matches);
            assert!(options.is_ok());
            if let Ok(options) = options {
                assert_eq!(options.login_ticket_ttl, Duration::from_secs(MAX_SECONDS));
            }
        });
    }
}
