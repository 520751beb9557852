pub type Result<T> = std::result::Result<T, LoadError>;

/// Failure reported by a [`crate::Fetcher`] (transport error or non-success status).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}{message}", status_prefix(.status))]
pub struct NetworkError {
    pub message: String,
    pub status: Option<u16>,
}

fn status_prefix(status: &Option<u16>) -> String {
    status.map(|s| format!("HTTP {s}: ")).unwrap_or_default()
}

impl NetworkError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: Some(status),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed SVG: {message}")]
pub struct ParseError {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchCause {
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to load SVG from `{url}`: {cause}")]
pub struct FetchError {
    pub url: String,
    pub cause: FetchCause,
}

impl FetchError {
    pub fn new(url: impl Into<String>, cause: impl Into<FetchCause>) -> Self {
        Self {
            url: url.into(),
            cause: cause.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransformError {
    #[error("symbol `{fragment_id}` not found in SVG document")]
    SymbolNotFound { fragment_id: String },
}

/// Why a load attempt ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("no SVG URL supplied")]
    MissingUrl,

    #[error("inline SVG is not supported by the insertion target")]
    UnsupportedEnvironment,

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("symbol `{fragment_id}` not found in SVG document")]
    SymbolNotFound { fragment_id: String },

    #[error("post-load hook did not return an element")]
    InvalidTransform,
}

impl From<TransformError> for LoadError {
    fn from(value: TransformError) -> Self {
        match value {
            TransformError::SymbolNotFound { fragment_id } => Self::SymbolNotFound { fragment_id },
        }
    }
}

/// Error raised by a [`crate::ScriptExecutor`]. Never turned into a load failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("script error: {message}")]
pub struct ScriptError {
    pub message: String,
}

impl ScriptError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OptionsError {
    #[error("invalid inline SVG options JSON: {0}")]
    Json(#[from] serde_json::Error),
}
