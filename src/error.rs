//! Error type shared by the executor and both client facades.

/// Errors returned by Nucleus client operations.
///
/// `Clone` so that one in-flight request can hand the same outcome to every
/// caller waiting on it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// The API call did not succeed: non-2xx status, transport failure or an
    /// undecodable response.
    #[error("{message}")]
    Api {
        message: String,
        status_code: Option<u16>,
        body: Option<String>,
    },

    /// Rejected locally before any network call was made.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Client configuration is unusable.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn api(message: impl Into<String>) -> Self {
        Error::Api {
            message: message.into(),
            status_code: None,
            body: None,
        }
    }

    /// HTTP status of a failed API call, when the server answered.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Api { status_code, .. } => *status_code,
            _ => None,
        }
    }

    /// Raw response body of a failed API call, when one was read.
    pub fn body(&self) -> Option<&str> {
        match self {
            Error::Api { body, .. } => body.as_deref(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Api {
            message: format!("request failed: {}", e),
            status_code: e.status().map(|s| s.as_u16()),
            body: None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::api(format!("failed to decode response: {}", e))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_exposes_status_and_body() {
        let err = Error::Api {
            message: "GET /projects failed with status 503".into(),
            status_code: Some(503),
            body: Some("{\"error\":\"maintenance\"}".into()),
        };
        assert_eq!(err.status_code(), Some(503));
        assert_eq!(err.body(), Some("{\"error\":\"maintenance\"}"));
        assert_eq!(err.to_string(), "GET /projects failed with status 503");
    }

    #[test]
    fn local_errors_have_no_status() {
        let err = Error::InvalidRequest("finding_number is empty".into());
        assert_eq!(err.status_code(), None);
        assert_eq!(err.body(), None);
        assert!(err.to_string().contains("finding_number"));
    }

    #[test]
    fn json_errors_become_api_errors() {
        let parse = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err = Error::from(parse);
        assert!(matches!(err, Error::Api { status_code: None, .. }));
        assert!(err.to_string().starts_with("failed to decode response"));
    }
}
