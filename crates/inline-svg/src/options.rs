use crate::document::SvgElement;
use crate::error::OptionsError;
use crate::sink::Placement;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

/// When embedded `<script>` content is handed to the script executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvalScripts {
    /// Every load.
    #[default]
    Always,
    /// First load of each URL per loader.
    Once,
    Never,
}

impl FromStr for EvalScripts {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "always" => Ok(Self::Always),
            "once" => Ok(Self::Once),
            "never" => Ok(Self::Never),
            _ => Err(()),
        }
    }
}

/// Per-request configuration.
///
/// Serialized with the camelCase keys used by declarative inline-SVG bindings
/// (`cacheSVG`, `removeSVGAttributes`, `evalScripts`, ...), so existing JSON configs load as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InlineSvgOptions {
    /// Replace the host's existing children instead of adding next to them.
    pub replace_contents: bool,
    /// When not replacing, insert before the existing children.
    pub prepend: bool,
    /// Route through [`crate::InsertionSink::insert_via_component`].
    pub inject_component: bool,
    #[serde(rename = "cacheSVG")]
    pub cache_svg: bool,
    /// Attribute names stripped from the root element.
    #[serde(rename = "removeSVGAttributes")]
    pub remove_svg_attributes: Vec<String>,
    pub force_eval_styles: bool,
    pub eval_scripts: EvalScripts,
    pub fallback_img_url: Option<String>,
}

impl Default for InlineSvgOptions {
    fn default() -> Self {
        Self {
            replace_contents: true,
            prepend: false,
            inject_component: false,
            cache_svg: true,
            remove_svg_attributes: Vec::new(),
            force_eval_styles: false,
            eval_scripts: EvalScripts::Always,
            fallback_img_url: None,
        }
    }
}

impl InlineSvgOptions {
    pub fn from_json_str(text: &str) -> Result<Self, OptionsError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn placement(&self) -> Placement {
        Placement {
            replace_contents: self.replace_contents,
            prepend: self.prepend,
        }
    }
}

/// Post-load hook. Its return value replaces the working element; `None` fails the load.
pub type SvgLoadedHook = Arc<dyn Fn(SvgElement) -> Option<SvgElement> + Send + Sync>;

#[derive(Clone, Default)]
pub struct LoadRequest {
    pub url: String,
    pub options: InlineSvgOptions,
    pub on_svg_loaded: Option<SvgLoadedHook>,
}

impl LoadRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_options(mut self, options: InlineSvgOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_hook(
        mut self,
        hook: impl Fn(SvgElement) -> Option<SvgElement> + Send + Sync + 'static,
    ) -> Self {
        self.on_svg_loaded = Some(Arc::new(hook));
        self
    }
}

impl std::fmt::Debug for LoadRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadRequest")
            .field("url", &self.url)
            .field("options", &self.options)
            .field("on_svg_loaded", &self.on_svg_loaded.is_some())
            .finish()
    }
}
