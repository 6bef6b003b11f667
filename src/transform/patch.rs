//! Literal text patching for the searchtools asset.

use std::borrow::Cow;

use axum::body::Bytes;

use crate::transform::rules::TextPatchRule;

impl TextPatchRule {
    /// Replace every occurrence of the pattern.
    pub fn apply<'a>(&self, text: &'a str) -> Cow<'a, str> {
        if text.contains(self.pattern) {
            Cow::Owned(text.replace(self.pattern, self.replacement))
        } else {
            Cow::Borrowed(text)
        }
    }

    /// Patch a raw body. Anything that is not UTF-8 is returned as it came.
    pub fn apply_bytes(&self, body: Bytes) -> Bytes {
        let patched = match std::str::from_utf8(&body) {
            Ok(text) => match self.apply(text) {
                Cow::Owned(patched) => patched,
                Cow::Borrowed(_) => return body,
            },
            Err(_) => return body,
        };
        Bytes::from(patched)
    }
}
