//! HTTP client with default headers, response normalization and interceptors.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use anyhow::{Context, Result};
use log::debug;
use reqwest::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use reqwest::{Client, Url};

use super::error::TransportError;
use super::interceptor::{FailureContext, Interceptor, InterceptorChain};
use super::request::{Headers, RequestSpec};
use super::response::ResponseResult;

const USER_AGENT: &str = "rollcall-cli";

/// Base URL and headers applied to every request of one client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientDefaults {
    pub base_url: Option<String>,
    pub headers: Headers,
}

/// HTTP client that never fails on an HTTP status.
///
/// Non-200 responses come back as [`ResponseResult`] values after the
/// registered interceptors had a chance to replace them. Only transport
/// failures are returned as errors.
pub struct HttpClient {
    client: Client,
    defaults: RwLock<ClientDefaults>,
    interceptors: InterceptorChain,
}

impl HttpClient {
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Returns a reference to the underlying reqwest Client.
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Returns a snapshot of the current defaults.
    pub fn defaults(&self) -> ClientDefaults {
        self.defaults
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn base_url(&self) -> Option<String> {
        self.defaults().base_url
    }

    pub fn default_headers(&self) -> Headers {
        self.defaults().headers
    }

    /// Adds or replaces one default header. Other defaults are kept.
    pub fn set_default_header(&self, name: impl Into<String>, value: impl Into<String>) {
        self.defaults
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .headers
            .insert(name.into(), value.into());
    }

    pub fn interceptors(&self) -> &InterceptorChain {
        &self.interceptors
    }

    /// Executes the request and runs the interceptor chain on the outcome.
    ///
    /// A 200 response is shown to every success handler. Any other status is
    /// offered to the error handlers; the first replacement they return
    /// becomes the result, otherwise the original response is returned.
    #[tracing::instrument(skip(self, spec), fields(method = spec.method.as_str(), path = %spec.path))]
    pub async fn execute(&self, spec: RequestSpec) -> Result<ResponseResult> {
        let response = self.send(&spec).await?;

        if response.is_success() {
            self.interceptors.notify_success(&response).await;
            return Ok(response);
        }

        debug!(
            "{} {} returned HTTP {}",
            spec.method.as_str(),
            spec.path,
            response.status_code
        );

        let failure = FailureContext {
            request: spec,
            response,
        };

        match self.interceptors.resolve_error(self, &failure).await? {
            Some(replacement) => Ok(replacement),
            None => Ok(failure.response),
        }
    }

    /// Single round trip without interceptors.
    pub async fn send(&self, spec: &RequestSpec) -> Result<ResponseResult> {
        let defaults = self.defaults();
        let url = build_url(defaults.base_url.as_deref(), spec)?;
        let headers = merge_headers(&defaults.headers, &spec.headers);

        debug!("{} {}...", spec.method.as_str(), url);

        let mut request = self.client.request(spec.method.into(), url.clone());

        for (name, value) in &headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .with_context(|| format!("Invalid header name: {}", name))?;
            let mut value = HeaderValue::from_str(value)
                .with_context(|| format!("Invalid value for header {}", name))?;
            if is_secret_header(name.as_str()) {
                value.set_sensitive(true);
            }
            request = request.header(name, value);
        }

        if let Some(body) = &spec.body {
            let text = serde_json::to_string(body).context("Failed to serialize request body")?;
            request = request
                .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
                .body(text);
        }

        let transport_error = |source: reqwest::Error| TransportError {
            method: spec.method.as_str(),
            url: url.to_string(),
            source,
        };

        let response = request.send().await.map_err(transport_error)?;

        let status_code = response.status().as_u16();
        let response_headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let raw_text = response.text().await.map_err(transport_error)?;

        Ok(ResponseResult::from_parts(
            status_code,
            raw_text,
            response_headers,
        ))
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.base_url())
            .field("interceptors", &self.interceptors)
            .finish()
    }
}

/// Builder for [`HttpClient`]. The interceptor list is fixed once built.
#[derive(Default)]
pub struct HttpClientBuilder {
    client: Option<Client>,
    defaults: ClientDefaults,
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl HttpClientBuilder {
    /// Reuses an existing reqwest Client instead of building one.
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.defaults.base_url = Some(base_url.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults.headers.insert(name.into(), value.into());
        self
    }

    pub fn interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn build(self) -> Result<HttpClient> {
        let client = match self.client {
            Some(client) => client,
            None => build_reqwest_client()?,
        };

        Ok(HttpClient {
            client,
            defaults: RwLock::new(self.defaults),
            interceptors: InterceptorChain::new(self.interceptors),
        })
    }
}

/// Builds the reqwest Client shared by every request, with the CLI's
/// user agent.
pub fn build_reqwest_client() -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .context("Failed to build HTTP client")
}

/// Joins base URL and path with exactly one `/` and appends the query.
pub fn build_url(base_url: Option<&str>, spec: &RequestSpec) -> Result<Url> {
    let joined = match base_url {
        Some(base) => format!(
            "{}/{}",
            base.trim_end_matches('/'),
            spec.path.trim_start_matches('/')
        ),
        None => spec.path.clone(),
    };

    let mut url = Url::parse(&joined).with_context(|| format!("Invalid request URL: {}", joined))?;

    let pairs = spec.query_pairs();
    if !pairs.is_empty() {
        url.query_pairs_mut().extend_pairs(pairs);
    }

    Ok(url)
}

/// Overlays call headers on the defaults; the call wins on equal keys.
pub fn merge_headers(defaults: &Headers, overrides: &Headers) -> Headers {
    let mut merged = defaults.clone();
    merged.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

fn is_secret_header(name: &str) -> bool {
    matches!(name, "authorization" | "token")
}

/// Shortens a secret for log output.
pub(crate) fn mask(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "********".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}****{}", head, tail)
}
