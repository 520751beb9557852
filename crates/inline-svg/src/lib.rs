#![forbid(unsafe_code)]

//! Fetch, cache and transform SVG documents for inline insertion (headless).
//!
//! Design goals:
//! - at most one fetch per URL in flight, shared by every loader holding the same [`SvgCache`]
//! - the cached parse is never mutated; each consumer transforms its own copy
//! - runtime-agnostic async APIs (no specific executor required)
//!
//! The embedding environment supplies the collaborators: a [`Fetcher`] for markup, an
//! [`InsertionSink`] that places finished content, and optionally a [`LoadObserver`] and a
//! [`ScriptExecutor`].

pub mod cache;
pub mod document;
pub mod error;
pub mod fetch;
pub mod loader;
pub mod options;
pub mod sink;
pub mod source;
pub mod transform;

pub use cache::{CacheStats, SvgCache};
pub use document::{SvgDocument, SvgElement, SvgNode};
pub use error::{
    FetchCause, FetchError, LoadError, NetworkError, OptionsError, ParseError, Result,
    ScriptError, TransformError,
};
pub use fetch::{FileFetcher, Fetcher};
pub use loader::{LoadOutcome, SvgLoader, SvgLoaderBuilder};
pub use options::{EvalScripts, InlineSvgOptions, LoadRequest, SvgLoadedHook};
pub use sink::{
    InsertionContext, InsertionSink, LoadObserver, NoopObserver, NoopScriptExecutor, Placement,
    ScriptExecutor,
};
pub use source::SourceRequest;

#[cfg(test)]
mod tests;
