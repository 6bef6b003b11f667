//! Response transformation subsystem.
//!
//! # Data Flow
//! ```text
//! origin response
//!     → context.rs (routing headers → RequestContext)
//!     → policy.rs (RequestContext → TransformMode)
//!     → rewriter.rs (HTML: remove legacy assets, append to <head>)
//!       or patch.rs (searchtools.js: literal replacement)
//!     → assembler.rs (materialize output, fall back to original on error)
//!     → client
//! ```
//!
//! # Design Decisions
//! - Rule tables in rules.rs are immutable and shared by every request
//! - A failed transform is never visible to the client; the worst outcome is
//!   the original page

pub mod assembler;
pub mod context;
pub mod error;
pub mod patch;
pub mod policy;
pub mod rewriter;
pub mod rules;

pub use assembler::ResponseAssembler;
pub use context::RequestContext;
pub use error::TransformError;
pub use policy::{decide, TransformMode};
pub use rewriter::RewritePlan;
pub use rules::{validate_rule_table, ElementAction, ElementRule, RewriteRuleSet, TextPatchRule};
