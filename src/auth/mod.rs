//! Authentication helpers: password digest and the token-refresh interceptor.

mod interceptor;
mod password;

pub use interceptor::AuthInterceptor;
pub use password::hash_password;
