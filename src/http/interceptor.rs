//! Outcome handlers run by [`HttpClient`] after each response.
//!
//! Success handlers are observers: every one of them runs. Error handlers are
//! resolvers: they run in registration order and the first one that produces
//! a replacement response ends the walk.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use super::client::HttpClient;
use super::request::RequestSpec;
use super::response::ResponseResult;

/// The request that failed together with the response it got.
#[derive(Debug, Clone)]
pub struct FailureContext {
    pub request: RequestSpec,
    pub response: ResponseResult,
}

/// A handler invoked after a request completes.
///
/// Both methods default to doing nothing, so an implementation only fills in
/// the outcome it cares about.
#[async_trait]
pub trait Interceptor: Send + Sync {
    /// Called with every 200 response.
    async fn on_success(&self, _response: &ResponseResult) {}

    /// Called with every non-200 response. `client` is the client that issued
    /// the request and may be used to re-issue it. Returning `Some` replaces
    /// the outcome of the original call.
    async fn on_error(
        &self,
        _client: &HttpClient,
        _failure: &FailureContext,
    ) -> Result<Option<ResponseResult>> {
        Ok(None)
    }
}

/// Ordered, immutable list of interceptors owned by one client.
#[derive(Clone, Default)]
pub struct InterceptorChain {
    entries: Vec<Arc<dyn Interceptor>>,
}

impl InterceptorChain {
    pub fn new(entries: Vec<Arc<dyn Interceptor>>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) async fn notify_success(&self, response: &ResponseResult) {
        for entry in &self.entries {
            entry.on_success(response).await;
        }
    }

    pub(crate) async fn resolve_error(
        &self,
        client: &HttpClient,
        failure: &FailureContext,
    ) -> Result<Option<ResponseResult>> {
        for entry in &self.entries {
            if let Some(replacement) = entry.on_error(client, failure).await? {
                return Ok(Some(replacement));
            }
        }
        Ok(None)
    }
}

impl std::fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("len", &self.entries.len())
            .finish()
    }
}
