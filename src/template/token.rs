//! Placeholder token classification.
//!
//! A raw `{{...}}` token parses into a (category, kind, index) triple:
//!
//! - no underscore: a PLAIN token, the whole name identifies it
//! - contains `_IMAGE_`: an IMAGE token, category is the text before the marker
//! - contains `_DESC_`: a DESC token, category is the text before the marker
//! - an underscore but neither marker: ambiguous, left untouched by rendering
//!
//! When the last underscore-separated segment is all digits it parses as the
//! token's index, e.g. `{{NATURAL_SITE_IMAGE_2}}` is the second image of the
//! `NATURAL_SITE` category.

const IMAGE_MARKER: &str = "_IMAGE_";
const DESC_MARKER: &str = "_DESC_";

/// What kind of substitution a token asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum TokenKind {
    /// An image placeholder hosted by a shape.
    Image,
    /// A description text placeholder.
    Desc,
    /// A bare text placeholder with no category structure.
    Plain,
}

/// A successfully classified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedToken {
    pub kind: TokenKind,

    /// Category prefix for IMAGE/DESC tokens; the whole token name for
    /// PLAIN tokens.
    pub category: String,

    /// Trailing numeric segment, when present.
    pub index: Option<u32>,
}

/// Classification result. Total over all inputs; tokens the grammar cannot
/// place are `Ambiguous`, never an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Token(ClassifiedToken),
    Ambiguous,
}

/// Classify a raw token, with or without its `{{` `}}` delimiters.
pub fn classify(raw: &str) -> Classification {
    let cleaned = raw
        .strip_prefix("{{")
        .and_then(|s| s.strip_suffix("}}"))
        .unwrap_or(raw);

    if !cleaned.contains('_') {
        return Classification::Token(ClassifiedToken {
            kind: TokenKind::Plain,
            category: cleaned.to_string(),
            index: None,
        });
    }

    let index = cleaned
        .rsplit('_')
        .next()
        .filter(|seg| !seg.is_empty() && seg.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|seg| seg.parse().ok());

    if let Some(pos) = cleaned.find(IMAGE_MARKER) {
        return Classification::Token(ClassifiedToken {
            kind: TokenKind::Image,
            category: cleaned[..pos].to_string(),
            index,
        });
    }
    if let Some(pos) = cleaned.find(DESC_MARKER) {
        return Classification::Token(ClassifiedToken {
            kind: TokenKind::Desc,
            category: cleaned[..pos].to_string(),
            index,
        });
    }

    // An underscore but neither marker. The grammar defines no category or
    // kind here, so the token stays literal and is reported as ambiguous.
    Classification::Ambiguous
}
