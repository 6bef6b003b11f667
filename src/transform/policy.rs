//! Transform decision policy.
//!
//! # Design Decisions
//! - Pure function of the request context, first matching rule wins
//! - Force-addons and hosting-integrations are mutually exclusive for HTML;
//!   when both are set the page is left alone

use std::fmt;

use crate::transform::context::RequestContext;
use crate::transform::rules::SEARCHTOOLS_SUFFIX;

/// Which transform a response goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransformMode {
    None,
    RemoveLegacyAndInject,
    InjectOnly,
    PatchSearchTools,
}

impl TransformMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransformMode::None => "none",
            TransformMode::RemoveLegacyAndInject => "remove_legacy_and_inject",
            TransformMode::InjectOnly => "inject_only",
            TransformMode::PatchSearchTools => "patch_searchtools",
        }
    }
}

impl fmt::Display for TransformMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Choose the transform for a response.
pub fn decide(ctx: &RequestContext) -> TransformMode {
    let html = ctx.is_html();
    let javascript = ctx.is_javascript();

    if !html && !javascript {
        return TransformMode::None;
    }
    if html && ctx.force_addons && !ctx.hosting_integrations {
        return TransformMode::RemoveLegacyAndInject;
    }
    if html && !ctx.force_addons && ctx.hosting_integrations {
        return TransformMode::InjectOnly;
    }
    if javascript
        && (ctx.hosting_integrations || ctx.force_addons)
        && ctx.path.ends_with(SEARCHTOOLS_SUFFIX)
    {
        return TransformMode::PatchSearchTools;
    }
    TransformMode::None
}
