//! Selector rule table.
//!
//! # Responsibilities
//! - Hold the legacy asset selectors removed from served pages
//! - Hold the addons script literal and the searchtools patch
//! - Build the `<head>` markup appended for a request
//!
//! # Design Decisions
//! - The table is a process-wide constant, built once and never mutated
//! - Selectors are compiled at startup so a typo fails the boot, not a request

use std::borrow::Cow;
use std::sync::LazyLock;

use lol_html::Selector;

use crate::transform::context::RequestContext;
use crate::transform::error::TransformError;

/// Addons script appended to `<head>`.
pub const SCRIPT_ADDONS: &str =
    r#"<script async type="text/javascript" src="/_/static/javascript/readthedocs-addons.js"></script>"#;

/// Old flyout, analytics and doc-embed scripts.
pub const REMOVAL_SCRIPTS: [&str; 6] = [
    r#"script[src="/_/static/javascript/readthedocs-analytics.js"]"#,
    r#"script[src="/_/static/javascript/readthedocs-doc-embed.js"]"#,
    r#"script[src="/_/static/core/js/readthedocs-doc-embed.js"]"#,
    r#"script[src="https://assets.readthedocs.org/static/javascript/readthedocs-analytics.js"]"#,
    r#"script[src="https://assets.readthedocs.org/static/javascript/readthedocs-doc-embed.js"]"#,
    r#"script[src="https://assets.readthedocs.org/static/core/js/readthedocs-doc-embed.js"]"#,
];

/// Doc-embed and badge-only stylesheets, direct and proxied.
pub const REMOVAL_LINKS: [&str; 4] = [
    r#"link[href="/_/static/css/readthedocs-doc-embed.css"]"#,
    r#"link[href="https://assets.readthedocs.org/static/css/readthedocs-doc-embed.css"]"#,
    r#"link[href="https://assets.readthedocs.org/static/css/badge_only.css"]"#,
    r#"link[href="/_/static/css/badge_only.css"]"#,
];

/// Theme version warnings and the flyout container.
pub const REMOVAL_ELEMENTS: [&str; 4] = [
    // sphinx-rtd-theme
    "[role=main] > div:first-child > div:first-child.admonition.warning",
    // furo
    "[role=main] > div:first-child.admonition.warning",
    // sphinx-book-theme
    "#main-content > div > div > article > div:first-child.admonition.warning",
    "div.rst-versions",
];

/// Path suffix of the only JavaScript asset that gets patched.
pub const SEARCHTOOLS_SUFFIX: &str = "_static/searchtools.js";

/// Restores Sphinx search initialization removed by `readthedocs-sphinx-ext`.
pub const SEARCHTOOLS_PATCH: TextPatchRule = TextPatchRule {
    pattern: "/* Search initialization removed for Read the Docs */",
    replacement: r#"
/* Search initialization manipulated by Read the Docs using Cloudflare Workers */
/* See https://github.com/readthedocs/addons/issues/219 for more information */

function initializeSearch() {
  Search.init();
}

if (document.readyState !== "loading") {
  initializeSearch();
}
else {
  document.addEventListener("DOMContentLoaded", initializeSearch);
}"#,
};

/// What happens to an element matched by a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementAction {
    /// Drop the element and everything inside it.
    Remove,
    /// Append raw markup as the last child of the first element matched.
    Append(String),
}

/// One selector with its action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRule {
    pub selector: Cow<'static, str>,
    pub action: ElementAction,
}

impl ElementRule {
    pub fn remove(selector: impl Into<Cow<'static, str>>) -> Self {
        Self {
            selector: selector.into(),
            action: ElementAction::Remove,
        }
    }

    pub fn append(selector: impl Into<Cow<'static, str>>, markup: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            action: ElementAction::Append(markup.into()),
        }
    }

    /// Compile the selector into its matcher form.
    pub fn compile(&self) -> Result<Selector, TransformError> {
        self.selector
            .parse::<Selector>()
            .map_err(|e| TransformError::Selector {
                selector: self.selector.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Ordered list of element rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteRuleSet {
    rules: Vec<ElementRule>,
}

impl RewriteRuleSet {
    pub fn new(rules: Vec<ElementRule>) -> Self {
        Self { rules }
    }

    /// Every legacy removal selector, scripts first, then links, then elements.
    pub fn legacy_removals() -> Self {
        let rules = REMOVAL_SCRIPTS
            .iter()
            .chain(REMOVAL_LINKS.iter())
            .chain(REMOVAL_ELEMENTS.iter())
            .map(|s| ElementRule::remove(*s))
            .collect();
        Self { rules }
    }

    pub fn push(&mut self, rule: ElementRule) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[ElementRule] {
        &self.rules
    }

    /// Compile every selector, failing on the first invalid one.
    pub fn validate(&self) -> Result<(), TransformError> {
        for rule in &self.rules {
            rule.compile()?;
        }
        Ok(())
    }
}

/// Shared removal table.
pub static LEGACY_REMOVALS: LazyLock<RewriteRuleSet> = LazyLock::new(RewriteRuleSet::legacy_removals);

/// Compile the static tables once at startup.
pub fn validate_rule_table() -> Result<usize, TransformError> {
    LEGACY_REMOVALS.validate()?;
    ElementRule::append("head", SCRIPT_ADDONS).compile()?;
    Ok(LEGACY_REMOVALS.rules().len() + 1)
}

/// A literal substring replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextPatchRule {
    pub pattern: &'static str,
    pub replacement: &'static str,
}

/// Markup appended to `<head>`: the addons script, then the metadata tags.
///
/// Metadata is skipped entirely unless both project and version slugs are set.
pub fn head_markup(ctx: &RequestContext) -> String {
    let mut markup = String::from(SCRIPT_ADDONS);
    if ctx.project_slug.is_empty() || ctx.version_slug.is_empty() {
        return markup;
    }

    let status = ctx.http_status.to_string();
    let embedded = if ctx.load_when_embedded { "true" } else { "false" };
    let metas = [
        ("readthedocs-project-slug", ctx.project_slug.as_str()),
        ("readthedocs-version-slug", ctx.version_slug.as_str()),
        ("readthedocs-resolver-filename", ctx.resolver_filename.as_str()),
        ("readthedocs-http-status", status.as_str()),
        ("readthedocs-load-addons-when-embedded", embedded),
    ];
    for (name, content) in metas {
        markup.push_str(&format!(
            r#"<meta name="{}" content="{}" />"#,
            name,
            escape_attribute(content)
        ));
    }
    markup
}

fn escape_attribute(value: &str) -> Cow<'_, str> {
    if !value.contains(['&', '"', '<', '>']) {
        return Cow::Borrowed(value);
    }
    let mut escaped = String::with_capacity(value.len() + 8);
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            other => escaped.push(other),
        }
    }
    Cow::Owned(escaped)
}
