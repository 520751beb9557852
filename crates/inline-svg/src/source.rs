/// One load attempt's view of the requested URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRequest {
    /// Document URL, without the `#fragment`.
    pub url: String,
    /// Symbol id when the URL addresses a fragment (`sprite.svg#icon`).
    pub fragment_id: Option<String>,
    pub use_cache: bool,
}

impl SourceRequest {
    /// Splits `raw` at the first `#`. Returns `None` when there is no document part to fetch.
    ///
    /// An empty fragment (`icons.svg#`) addresses the whole document.
    pub fn parse(raw: &str, use_cache: bool) -> Option<Self> {
        let raw = raw.trim();
        let (url, fragment) = match raw.split_once('#') {
            Some((url, fragment)) => (url, Some(fragment)),
            None => (raw, None),
        };
        if url.is_empty() {
            return None;
        }
        Some(Self {
            url: url.to_string(),
            fragment_id: fragment.filter(|f| !f.is_empty()).map(str::to_string),
            use_cache,
        })
    }
}
