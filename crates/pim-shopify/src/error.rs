use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShopifyError {
    /// Connection, TLS, or timeout failure before a response was received.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{method} {url} rejected with HTTP {status}: {body}")]
    Rejected {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// The body parsed but a required field (such as an assigned id) is missing.
    #[error("malformed response for {context}: {reason}")]
    MalformedResponse { context: String, reason: String },

    #[error("invalid base URL \"{base_url}\": {reason}")]
    InvalidBaseUrl { base_url: String, reason: String },
}

impl ShopifyError {
    /// HTTP status of a rejected request, if the server answered at all.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            ShopifyError::Rejected { status, .. } => Some(*status),
            ShopifyError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
