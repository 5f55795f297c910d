use failure::Fail;

/// Every way a call against the plate API can fail.
///
/// The `Display` output is what the views show to the user.
#[derive(Debug, Clone, PartialEq, Fail)]
pub enum ApiError {
    /// Network unreachable, DNS, timeout, connection reset.
    #[fail(display = "Cannot reach API: {}", _0)]
    Transport(String),
    /// Non-2xx status; the body text is kept for diagnostics.
    #[fail(display = "HTTP {}: {}", status, body)]
    Protocol { status: u16, body: String },
    /// The backend answered `success: false`.
    #[fail(display = "{}", _0)]
    Application(String),
    /// The body was not the envelope we expect.
    #[fail(display = "Malformed response: {}", _0)]
    Malformed(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        ApiError::Transport(e.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::Malformed(e.to_string())
    }
}

#[derive(Debug, Fail)]
pub enum ConfigError {
    #[fail(display = "Invalid API origin '{}': {}", _0, _1)]
    InvalidOrigin(String, String),
    #[fail(display = "Invalid value '{}' for {}", _1, _0)]
    InvalidNumber(&'static str, String),
}
