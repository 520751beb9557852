use crate::error::NetworkError;
use futures::future::BoxFuture;
use std::path::{Path, PathBuf};

/// Retrieves SVG markup by URL.
///
/// Implementations decide transport, timeouts and redirects. A non-success response must be
/// reported as a [`NetworkError`] rather than returned as text.
pub trait Fetcher: Send + Sync {
    fn fetch_text<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<String, NetworkError>>;
}

/// Reads `file://` URLs and plain paths from the local filesystem.
///
/// Relative paths resolve against `base_dir` when one is set.
#[derive(Debug, Clone, Default)]
pub struct FileFetcher {
    base_dir: Option<PathBuf>,
}

impl FileFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    fn resolve_path(&self, url: &str) -> Result<PathBuf, NetworkError> {
        if url.starts_with("file:") {
            let parsed = url::Url::parse(url)
                .map_err(|e| NetworkError::new(format!("invalid file URL `{url}`: {e}")))?;
            return parsed
                .to_file_path()
                .map_err(|()| NetworkError::new(format!("not a local file URL: `{url}`")));
        }
        if let Ok(parsed) = url::Url::parse(url) {
            // Single-letter schemes are Windows drive letters, not URLs.
            if parsed.scheme().len() > 1 {
                return Err(NetworkError::new(format!(
                    "unsupported URL scheme `{}` for `{url}`",
                    parsed.scheme()
                )));
            }
        }
        let path = Path::new(url);
        Ok(match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        })
    }
}

impl Fetcher for FileFetcher {
    fn fetch_text<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<String, NetworkError>> {
        Box::pin(async move {
            let path = self.resolve_path(url)?;
            std::fs::read_to_string(&path).map_err(|err| {
                let status = match err.kind() {
                    std::io::ErrorKind::NotFound => Some(404),
                    std::io::ErrorKind::PermissionDenied => Some(403),
                    _ => None,
                };
                NetworkError {
                    message: format!("{}: {err}", path.display()),
                    status,
                }
            })
        })
    }
}
