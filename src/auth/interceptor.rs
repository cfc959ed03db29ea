//! Interceptor that refreshes expired session tokens and waits out rate
//! limits.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info, warn};

use crate::http::{
    FailureContext, HttpClient, Interceptor, ResponseResult, Sleeper, TokioSleeper,
    rate_limit_delay,
};
use crate::session::{SharedSession, TOKEN_HEADER, parse_session_token};

const UNAUTHORIZED: u16 = 401;
const TOO_MANY_REQUESTS: u16 = 429;

/// Resolves 401 and 429 responses on a tenant client.
///
/// - 401 on a request that was not retried yet: log in again with the stored
///   credentials, install the new token and re-issue the request once.
/// - 429: sleep for `Retry-After` plus a margin and re-issue the request. Not
///   limited to one attempt.
///
/// Everything else is left to the caller.
pub struct AuthInterceptor {
    session: SharedSession,
    sleeper: Arc<dyn Sleeper>,
}

impl AuthInterceptor {
    pub fn new(session: SharedSession) -> Self {
        Self::with_sleeper(session, Arc::new(TokioSleeper))
    }

    pub fn with_sleeper(session: SharedSession, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { session, sleeper }
    }

    /// Logs in again without going through the interceptor chain, then
    /// stores the token in the session and the client defaults.
    async fn refresh_token(&self, client: &HttpClient) -> Result<String> {
        let session = self
            .session
            .get()
            .context("No session established yet, cannot log in again")?;

        let response = client
            .send(&session.login_request())
            .await
            .context("Failed to send login request")?;
        let token = parse_session_token(response).context("Login for token refresh failed")?;

        self.session.update_token(&token);
        client.set_default_header(TOKEN_HEADER, token.clone());

        Ok(token)
    }

    async fn retry_unauthorized(
        &self,
        client: &HttpClient,
        failure: &FailureContext,
    ) -> Result<Option<ResponseResult>> {
        let mut retry = failure.request.clone();
        retry.retried = true;

        let token = match self.refresh_token(client).await {
            Ok(token) => token,
            Err(e) => {
                warn!("Session token refresh failed: {:#}", e);
                return Ok(None);
            }
        };
        info!("Session token refreshed, retrying {}", retry.path);

        retry.headers.insert(TOKEN_HEADER.to_string(), token);
        client.execute(retry).await.map(Some)
    }

    async fn retry_rate_limited(
        &self,
        client: &HttpClient,
        failure: &FailureContext,
    ) -> Result<Option<ResponseResult>> {
        let delay = rate_limit_delay(&failure.response);
        warn!(
            "Rate limited on {}, retrying in {}s...",
            failure.request.path,
            delay.as_secs()
        );

        self.sleeper.sleep(delay).await;
        client.execute(failure.request.clone()).await.map(Some)
    }
}

#[async_trait]
impl Interceptor for AuthInterceptor {
    async fn on_error(
        &self,
        client: &HttpClient,
        failure: &FailureContext,
    ) -> Result<Option<ResponseResult>> {
        match failure.response.status_code {
            UNAUTHORIZED if !failure.request.retried => {
                self.retry_unauthorized(client, failure).await
            }
            UNAUTHORIZED => {
                debug!(
                    "{} still unauthorized after token refresh",
                    failure.request.path
                );
                Ok(None)
            }
            TOO_MANY_REQUESTS => self.retry_rate_limited(client, failure).await,
            _ => Ok(None),
        }
    }
}
