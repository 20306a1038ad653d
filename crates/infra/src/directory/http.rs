//! HTTP client for the external identity directory.
//!
//! The service signs in with its own account, caches the bearer token, and
//! refreshes it once when a call comes back `401`. Transport failures and
//! `5xx` responses are retried a bounded number of times with a short
//! backoff; every request carries a per-call timeout.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::instrument;

use kinship_core::{FamilyId, UserId, UserProfile};
use kinship_membership::{DirectoryError, IdentityDirectory};

const BASE_BACKOFF: Duration = Duration::from_millis(50);
const MAX_BACKOFF_SHIFT: u32 = 6;

#[derive(Debug, Clone)]
pub struct HttpDirectoryConfig {
    pub base_url: String,
    pub service_email: String,
    pub service_password: String,
    pub timeout: Duration,
    /// Extra attempts after the first one.
    pub retries: u32,
}

#[derive(Serialize)]
struct SignInRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct SignInResponse {
    token: String,
}

#[derive(Serialize)]
struct AttachRequest {
    family_id: FamilyId,
}

pub struct HttpIdentityDirectory {
    client: Client,
    config: HttpDirectoryConfig,
    token: RwLock<Option<String>>,
}

impl HttpIdentityDirectory {
    pub fn new(mut config: HttpDirectoryConfig) -> Result<Self, DirectoryError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| DirectoryError::Unavailable(format!("http client: {e}")))?;
        config.base_url = config.base_url.trim_end_matches('/').to_string();
        Ok(Self {
            client,
            config,
            token: RwLock::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    async fn sign_in(&self) -> Result<String, DirectoryError> {
        let response = self
            .client
            .post(self.url("/auth/sign-in"))
            .json(&SignInRequest {
                email: &self.config.service_email,
                password: &self.config.service_password,
            })
            .send()
            .await
            .map_err(|e| DirectoryError::Unavailable(format!("sign-in: {e}")))?;

        if !response.status().is_success() {
            return Err(DirectoryError::Rejected(format!(
                "sign-in returned status {}",
                response.status()
            )));
        }

        let body: SignInResponse = response
            .json()
            .await
            .map_err(|e| DirectoryError::Rejected(format!("sign-in body: {e}")))?;
        tracing::debug!("signed in to identity directory");
        Ok(body.token)
    }

    async fn token(&self, refresh: bool) -> Result<String, DirectoryError> {
        if !refresh {
            if let Some(token) = self.token.read().await.as_ref() {
                return Ok(token.clone());
            }
        }
        let mut slot = self.token.write().await;
        if !refresh {
            if let Some(token) = slot.as_ref() {
                return Ok(token.clone());
            }
        }
        let token = self.sign_in().await?;
        *slot = Some(token.clone());
        Ok(token)
    }

    /// Send an authorized request, handling token refresh and retries.
    async fn send<F>(&self, build: F) -> Result<Response, DirectoryError>
    where
        F: Fn(&Client) -> RequestBuilder + Send + Sync,
    {
        let mut refreshed = false;
        let mut attempt = 0;
        loop {
            let outcome = match self.token(false).await {
                Ok(token) => build(&self.client)
                    .bearer_auth(token)
                    .send()
                    .await
                    .map_err(|e| DirectoryError::Unavailable(e.to_string())),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(response) if response.status() == StatusCode::UNAUTHORIZED && !refreshed => {
                    refreshed = true;
                    self.token(true).await?;
                    continue;
                }
                Ok(response) if response.status().is_server_error() && attempt < self.config.retries => {
                    tracing::warn!(status = %response.status(), attempt, "identity directory error, retrying");
                }
                Ok(response) => return Ok(response),
                Err(DirectoryError::Unavailable(reason)) if attempt < self.config.retries => {
                    tracing::warn!(%reason, attempt, "identity directory unreachable, retrying");
                }
                Err(e) => return Err(e),
            }

            tokio::time::sleep(backoff(attempt)).await;
            attempt += 1;
        }
    }
}

/// Delay before retry `attempt` (0-based), doubling up to a fixed ceiling.
fn backoff(attempt: u32) -> Duration {
    BASE_BACKOFF * 2u32.pow(attempt.min(MAX_BACKOFF_SHIFT))
}

fn unexpected(status: StatusCode) -> DirectoryError {
    if status.is_server_error() {
        DirectoryError::Unavailable(format!("status {status}"))
    } else {
        DirectoryError::Rejected(format!("status {status}"))
    }
}

#[async_trait]
impl IdentityDirectory for HttpIdentityDirectory {
    #[instrument(skip(self), err)]
    async fn resolve_user(&self, user: UserId) -> Result<UserProfile, DirectoryError> {
        let url = self.url(&format!("/users/{user}"));
        let response = self.send(|c| c.get(&url)).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(DirectoryError::UserNotFound(user)),
            s if s.is_success() => response
                .json()
                .await
                .map_err(|e| DirectoryError::Rejected(format!("profile body: {e}"))),
            s => Err(unexpected(s)),
        }
    }

    #[instrument(skip(self), err)]
    async fn attach_family(&self, user: UserId, family: FamilyId) -> Result<(), DirectoryError> {
        let url = self.url(&format!("/users/{user}/families"));
        let body = AttachRequest { family_id: family };
        let response = self.send(|c| c.post(&url).json(&body)).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(DirectoryError::UserNotFound(user)),
            s if s.is_success() => Ok(()),
            s => Err(unexpected(s)),
        }
    }

    #[instrument(skip(self), err)]
    async fn detach_family(&self, user: UserId, family: FamilyId) -> Result<(), DirectoryError> {
        let url = self.url(&format!("/users/{user}/families/{family}"));
        let response = self.send(|c| c.delete(&url)).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(DirectoryError::UserNotFound(user)),
            s if s.is_success() => Ok(()),
            s => Err(unexpected(s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_url: &str) -> HttpDirectoryConfig {
        HttpDirectoryConfig {
            base_url: base_url.to_string(),
            service_email: "svc@example.com".to_string(),
            service_password: "secret".to_string(),
            timeout: Duration::from_millis(200),
            retries: 1,
        }
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let dir = HttpIdentityDirectory::new(config("http://directory.local/")).unwrap();
        assert_eq!(dir.url("/users/1"), "http://directory.local/users/1");
    }

    #[test]
    fn backoff_doubles_then_levels_off() {
        assert_eq!(backoff(0), Duration::from_millis(50));
        assert_eq!(backoff(1), Duration::from_millis(100));
        assert_eq!(backoff(MAX_BACKOFF_SHIFT), Duration::from_millis(3200));
        assert_eq!(backoff(40), backoff(MAX_BACKOFF_SHIFT));
        assert_eq!(backoff(u32::MAX), Duration::from_millis(3200));
    }

    #[test]
    fn server_errors_are_unavailable_client_errors_rejected() {
        assert!(matches!(
            unexpected(StatusCode::BAD_GATEWAY),
            DirectoryError::Unavailable(_)
        ));
        assert!(matches!(
            unexpected(StatusCode::BAD_REQUEST),
            DirectoryError::Rejected(_)
        ));
    }

    #[tokio::test]
    async fn unreachable_directory_reports_unavailable() {
        // Nothing listens on port 1.
        let dir = HttpIdentityDirectory::new(config("http://127.0.0.1:1")).unwrap();
        let err = dir.resolve_user(UserId::new(1)).await.unwrap_err();
        assert!(matches!(err, DirectoryError::Unavailable(_)));
    }
}
