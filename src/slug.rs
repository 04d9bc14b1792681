//! Canonical label names.

use crate::context::LabelContext;

/// Trim `text` and turn every internal whitespace run into a single hyphen.
/// Case and all other characters are kept.
pub fn slug(text: &str) -> String {
    return text.split_whitespace().collect::<Vec<_>>().join("-");
}

/// The conventional name of a label with raw text `raw` in `context`.
///
/// A prefix already present is not repeated, so the transform is idempotent.
pub fn canonical_name(context: &LabelContext, raw: &str) -> String {
    let Some(prefix) = context.prefix() else {
        return slug(raw);
    };
    let body = raw.strip_prefix(prefix).unwrap_or(raw);
    return format!("{prefix}{}", slug(body));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FloatKind, SectioningLevel};

    #[test]
    fn slug_collapses_whitespace() {
        assert_eq!(slug("  some \t long\nlabel "), "some-long-label");
        assert_eq!(slug("Keep_Case:x"), "Keep_Case:x");
        assert_eq!(slug(""), "");
    }

    #[test]
    fn slug_is_idempotent() {
        for text in ["a b", " x  y ", "already-slugged", ""] {
            assert_eq!(slug(&slug(text)), slug(text));
        }
    }

    #[test]
    fn canonical_name_adds_prefix() {
        let section = LabelContext::Section(SectioningLevel::Section);
        assert_eq!(canonical_name(&section, "some-section"), "sec:some-section");
        assert_eq!(canonical_name(&section, "some label"), "sec:some-label");
    }

    #[test]
    fn canonical_name_keeps_existing_prefix() {
        let figure = LabelContext::Float(FloatKind::Figure);
        assert_eq!(canonical_name(&figure, "fig:a b"), "fig:a-b");
        assert_eq!(canonical_name(&figure, "fig:ok"), "fig:ok");
    }

    #[test]
    fn other_context_only_slugs() {
        assert_eq!(canonical_name(&LabelContext::Other, "free form"), "free-form");
    }

    #[test]
    fn canonical_name_is_idempotent() {
        let contexts = [
            LabelContext::Section(SectioningLevel::Chapter),
            LabelContext::Float(FloatKind::Listing),
            LabelContext::Other,
        ];
        for context in &contexts {
            for raw in ["some label", "lst: x", "ch:", "  "] {
                let once = canonical_name(context, raw);
                assert_eq!(canonical_name(context, &once), once);
            }
        }
    }
}
