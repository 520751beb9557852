//! Pure transforms applied to a consumer-owned copy of a parsed SVG.

use crate::document::{SvgElement, SvgNode};
use crate::error::TransformError;

const SVG_NS: &str = "http://www.w3.org/2000/svg";

/// Builds a standalone `<svg>` from the `<symbol id=fragment_id>` of a sprite document.
///
/// Symbols inside any `<defs>` block (at any depth) win; otherwise the first matching symbol
/// anywhere in the tree is used. The wrapper carries the root's namespace declarations, the
/// symbol's `viewBox` and `preserveAspectRatio`, and a copy of the symbol's content.
pub fn extract_symbol(root: &SvgElement, fragment_id: &str) -> Result<SvgElement, TransformError> {
    let is_match =
        |el: &SvgElement| el.local_name() == "symbol" && el.attr("id") == Some(fragment_id);

    let symbol = find_in_defs(root, &is_match)
        .or_else(|| root.find(&is_match))
        .ok_or_else(|| TransformError::SymbolNotFound {
            fragment_id: fragment_id.to_string(),
        })?;

    let mut svg = SvgElement::new("svg");
    for (k, v) in &root.attrs {
        if k == "xmlns" || k.starts_with("xmlns:") {
            svg.set_attr(k.as_str(), v.as_str());
        }
    }
    if svg.attr("xmlns").is_none() {
        svg.attrs.shift_insert(0, "xmlns".to_string(), SVG_NS.to_string());
    }
    for key in ["viewBox", "preserveAspectRatio"] {
        if let Some(v) = symbol.attr(key) {
            svg.set_attr(key, v);
        }
    }
    svg.children = symbol.children.clone();
    Ok(svg)
}

fn find_in_defs<'a>(
    el: &'a SvgElement,
    pred: &impl Fn(&SvgElement) -> bool,
) -> Option<&'a SvgElement> {
    el.elements().find_map(|child| {
        if child.local_name() == "defs" {
            child.find(pred)
        } else {
            find_in_defs(child, pred)
        }
    })
}

/// Removes each named attribute from `root` itself. Descendants are left alone.
pub fn remove_attributes<S: AsRef<str>>(root: &mut SvgElement, names: &[S]) {
    for name in names {
        root.remove_attr(name.as_ref());
    }
}

/// Rewrites the text of every `<style>` element with itself.
///
/// Some renderers only apply style text that was set after insertion; collapsing the text and
/// CDATA children into one fresh text node has the same effect on an owned tree.
pub fn force_style_reevaluation(root: &mut SvgElement) {
    root.visit_mut(&mut |el| {
        if el.local_name() != "style" || el.children.is_empty() {
            return;
        }
        let css = el.text();
        el.children = vec![SvgNode::Text(css)];
    });
}

/// Whether a `<script type=...>` value denotes evaluable script content.
pub fn is_evaluable_script_type(script_type: Option<&str>) -> bool {
    matches!(
        script_type.map(str::trim),
        None | Some("") | Some("application/ecmascript") | Some("application/javascript")
    )
}

/// Removes every evaluable `<script>` from the tree and returns their texts in document order.
pub fn strip_scripts(root: &mut SvgElement) -> Vec<String> {
    let mut out = Vec::new();
    strip_scripts_into(root, &mut out);
    out
}

fn strip_scripts_into(el: &mut SvgElement, out: &mut Vec<String>) {
    let children = std::mem::take(&mut el.children);
    el.children.reserve(children.len());
    for child in children {
        match child {
            SvgNode::Element(mut c) => {
                if c.local_name() == "script" && is_evaluable_script_type(c.attr("type")) {
                    out.push(c.text());
                    continue;
                }
                strip_scripts_into(&mut c, out);
                el.children.push(SvgNode::Element(c));
            }
            other => el.children.push(other),
        }
    }
}
