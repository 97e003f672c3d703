//! Credential check delegated to an HTTP verification endpoint.

use anyhow::{Context, Result};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use std::time::Duration;
use tracing::{error, instrument, warn};

use super::{Authenticator, Verification, VerifyFuture};
use crate::cas::request::CasRequest;

/// POSTs `{"username", "password"}` to the configured URL; any 2xx reply
/// accepts the username.
#[derive(Clone, Debug)]
pub struct RemoteAuthenticator {
    url: String,
    client: Client,
}

impl RemoteAuthenticator {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .timeout(Duration::from_secs(5))
            .build()
            .context("failed to build reqwest client")?;
        Ok(Self {
            url: url.to_string(),
            client,
        })
    }

    #[instrument(skip(self, password), fields(url = %self.url))]
    async fn check(&self, username: &str, password: &SecretString) -> bool {
        let body = json!({
            "username": username,
            "password": password.expose_secret(),
        });

        match self.client.post(&self.url).json(&body).send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!("credential check rejected: {}", response.status());
                false
            }
            Err(e) => {
                error!("Error verifying credentials: {:?}", e);
                false
            }
        }
    }
}

impl Authenticator for RemoteAuthenticator {
    fn verify<'a>(&'a self, request: &'a CasRequest) -> VerifyFuture<'a> {
        Box::pin(async move {
            let username = request.param("username").trim();
            let password = SecretString::from(request.param("password").to_string());
            if username.is_empty() || password.expose_secret().is_empty() {
                return Verification::Rejected((!username.is_empty()).then(|| username.to_string()));
            }

            if self.check(username, &password).await {
                Verification::Accepted(username.to_string())
            } else {
                Verification::Rejected(Some(username.to_string()))
            }
        })
    }
}
