//! Collaborators supplied by the embedding environment.

use crate::document::SvgElement;
use crate::error::{LoadError, ScriptError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub replace_contents: bool,
    pub prepend: bool,
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            replace_contents: true,
            prepend: false,
        }
    }
}

/// Identifies the loader and request a piece of content belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertionContext<'a> {
    pub loader_id: u64,
    /// URL as requested, including any `#fragment`.
    pub url: &'a str,
    /// `true` when `content` is the fallback image rather than the loaded SVG.
    pub fallback: bool,
}

/// Places finished content into a host.
pub trait InsertionSink: Send + Sync {
    type Host: Send + Sync;

    /// Whether the target can display inline vector content at all.
    fn supports_inline_svg(&self) -> bool {
        true
    }

    fn insert(
        &self,
        ctx: &InsertionContext<'_>,
        host: &Self::Host,
        content: &SvgElement,
        placement: Placement,
    );

    /// Wraps `content` in a host component instead of inserting the raw element.
    fn insert_via_component(
        &self,
        ctx: &InsertionContext<'_>,
        host: &Self::Host,
        content: &SvgElement,
        placement: Placement,
    );
}

/// Notification channel for load results.
pub trait LoadObserver: Send + Sync {
    fn on_svg_inserted(&self, _element: &SvgElement) {}

    fn on_svg_failed(&self, _error: &LoadError) {}

    /// Script errors do not fail the load; by default they are only logged.
    fn on_script_error(&self, url: &str, error: &ScriptError) {
        tracing::error!(url, %error, "embedded SVG script failed");
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl LoadObserver for NoopObserver {}

/// Runs script text stripped from loaded SVGs.
pub trait ScriptExecutor: Send + Sync {
    fn execute(&self, url: &str, source: &str) -> Result<(), ScriptError>;
}

/// Accepts every script and runs nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopScriptExecutor;

impl ScriptExecutor for NoopScriptExecutor {
    fn execute(&self, _url: &str, _source: &str) -> Result<(), ScriptError> {
        Ok(())
    }
}
