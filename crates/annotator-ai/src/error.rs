use std::error::Error;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum AiError {
    Http(Arc<reqwest::Error>),
    Json(Arc<serde_json::Error>),
    Url(url::ParseError),
    InvalidConfig(String),
    Timeout,
    UnexpectedResponse(String),
}

impl From<reqwest::Error> for AiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(Arc::new(err))
        }
    }
}

impl From<serde_json::Error> for AiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(Arc::new(err))
    }
}

impl From<url::ParseError> for AiError {
    fn from(err: url::ParseError) -> Self {
        Self::Url(err)
    }
}

impl fmt::Display for AiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // reqwest messages embed the request URL; keep only the status.
            AiError::Http(err) => match err.status() {
                Some(status) => write!(f, "http error: status {status}"),
                None => f.write_str("http error: request failed"),
            },
            AiError::Json(err) => write!(f, "json error: {err}"),
            AiError::Url(err) => write!(f, "url error: {err}"),
            AiError::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            AiError::Timeout => f.write_str("request timed out"),
            AiError::UnexpectedResponse(msg) => write!(f, "unexpected response: {msg}"),
        }
    }
}

impl Error for AiError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AiError::Url(err) => Some(err),
            AiError::Json(err) => Some(err.as_ref()),
            AiError::Http(_) | AiError::InvalidConfig(_) | AiError::Timeout | AiError::UnexpectedResponse(_) => None,
        }
    }
}
