//! HTTP client module with interceptors, response normalization and backoff.

mod client;
mod error;
mod interceptor;
mod request;
mod response;
mod retry;

pub(crate) use client::mask;
pub use client::{
    ClientDefaults, HttpClient, HttpClientBuilder, build_reqwest_client, build_url, merge_headers,
};
pub use error::{HttpStatusError, TransportError};
pub use interceptor::{FailureContext, Interceptor, InterceptorChain};
pub use request::{Headers, Method, QueryValue, RequestSpec};
pub use response::ResponseResult;
pub use retry::{
    RATE_LIMIT_MARGIN_SECS, Sleeper, TokioSleeper, rate_limit_delay, retry_after_secs,
};

#[cfg(test)]
pub use retry::MockSleeper;
