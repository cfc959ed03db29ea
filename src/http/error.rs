//! Error types surfaced by the HTTP layer.

/// A failure below the HTTP layer: unreachable host, refused connection,
/// timeout, or a body that could not be read.
#[derive(Debug)]
pub struct TransportError {
    pub method: &'static str,
    pub url: String,
    pub source: reqwest::Error,
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Transport error on {} {}: {}", self.method, self.url, self.source)
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// A non-200 response that a caller chose to treat as fatal.
#[derive(Debug)]
pub struct HttpStatusError {
    pub status: u16,
    pub body: String,
}

impl std::fmt::Display for HttpStatusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            401 => write!(f, "Unauthorized (HTTP 401): {}", self.body),
            429 => write!(f, "Rate limit exceeded (HTTP 429): {}", self.body),
            status => write!(f, "HTTP {} error: {}", status, self.body),
        }
    }
}

impl std::error::Error for HttpStatusError {}
