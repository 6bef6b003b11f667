//! Streaming HTML rewriter.
//!
//! # Responsibilities
//! - Compile a rule set into `lol_html` element handlers
//! - Feed the body through the rewriter chunk by chunk
//! - Surface handler failures as `TransformError`
//!
//! # Design Decisions
//! - Selector matching only, the markup is never searched with regexes
//! - Output grows as input is written; the document is never held as a tree
//! - Handler errors only show up from `write`/`end`, so callers must drive the
//!   whole input before trusting the output

use std::borrow::Cow;
use std::cell::Cell;

use axum::body::Bytes;
use lol_html::errors::RewritingError;
use lol_html::html_content::{ContentType, Element};
use lol_html::{ElementContentHandlers, HandlerResult, HtmlRewriter, Selector, Settings};

use crate::transform::context::RequestContext;
use crate::transform::error::TransformError;
use crate::transform::policy::TransformMode;
use crate::transform::rules::{head_markup, ElementAction, ElementRule, RewriteRuleSet, LEGACY_REMOVALS};

/// The element operations applied to one HTML response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewritePlan {
    rules: RewriteRuleSet,
    fault_injection: bool,
}

impl RewritePlan {
    pub fn new(rules: RewriteRuleSet) -> Self {
        Self {
            rules,
            fault_injection: false,
        }
    }

    /// Build the plan for an HTML mode. Returns `None` for non-HTML modes.
    pub fn for_mode(mode: TransformMode, ctx: &RequestContext) -> Option<Self> {
        let mut rules = match mode {
            TransformMode::RemoveLegacyAndInject => LEGACY_REMOVALS.clone(),
            TransformMode::InjectOnly => RewriteRuleSet::default(),
            TransformMode::None | TransformMode::PatchSearchTools => return None,
        };
        rules.push(ElementRule::append("head", head_markup(ctx)));

        Some(Self {
            rules,
            fault_injection: ctx.debug_throw_error,
        })
    }

    /// Fail on the first element visited.
    pub fn with_fault_injection(mut self, enabled: bool) -> Self {
        self.fault_injection = enabled;
        self
    }

    /// Run the chunks through the rewriter and return the complete output.
    pub fn rewrite<I>(&self, chunks: I) -> Result<Bytes, TransformError>
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        let mut handlers = Vec::with_capacity(self.rules.rules().len() + 1);
        for rule in self.rules.rules() {
            let selector = rule.compile()?;
            let action = &rule.action;
            let appended = Cell::new(false);
            handlers.push((
                Cow::Owned(selector),
                ElementContentHandlers::default().element(move |el| visit(action, &appended, el)),
            ));
        }
        if self.fault_injection {
            let any: Selector = ElementRule::remove("*").compile()?;
            handlers.push((
                Cow::Owned(any),
                ElementContentHandlers::default().element(|_el| {
                    Err(TransformError::FaultInjected.into())
                }),
            ));
        }

        let mut output = Vec::new();
        let mut rewriter = HtmlRewriter::new(
            Settings {
                element_content_handlers: handlers,
                ..Settings::default()
            },
            |c: &[u8]| output.extend_from_slice(c),
        );

        for chunk in chunks {
            rewriter.write(chunk.as_ref()).map_err(rewriting_error)?;
        }
        rewriter.end().map_err(rewriting_error)?;

        Ok(Bytes::from(output))
    }
}

/// `appended` is per rule and per rewrite: markup goes into the first live match only.
fn visit(action: &ElementAction, appended: &Cell<bool>, el: &mut Element<'_, '_>) -> HandlerResult {
    if el.removed() {
        return Ok(());
    }
    match action {
        ElementAction::Remove => {
            tracing::debug!(
                tag = %el.tag_name(),
                href = ?el.get_attribute("href"),
                src = ?el.get_attribute("src"),
                id = ?el.get_attribute("id"),
                class = ?el.get_attribute("class"),
                "Removing element"
            );
            el.remove();
        }
        ElementAction::Append(markup) => {
            if appended.replace(true) {
                tracing::debug!(tag = %el.tag_name(), "Skipping repeated append target");
            } else {
                el.append(markup, ContentType::Html);
            }
        }
    }
    Ok(())
}

fn rewriting_error(err: RewritingError) -> TransformError {
    match err {
        RewritingError::ContentHandlerError(inner) => match inner.downcast::<TransformError>() {
            Ok(e) => *e,
            Err(other) => TransformError::Rewrite(other.to_string()),
        },
        other => TransformError::Rewrite(other.to_string()),
    }
}
