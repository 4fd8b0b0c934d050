//! XML text escaping helpers.
//!
//! Replacement text supplied by callers is arbitrary and must be escaped
//! before being spliced into slide markup; entity references read from a
//! template must be resolved back to characters before placeholder
//! matching.

use aho_corasick::AhoCorasick;
use once_cell::sync::Lazy;

static ESCAPER: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::builder()
        .build(["&", "<", ">", "\"", "'"])
        .expect("failed to build XML escaper")
});

/// Escape the five XML special characters.
#[inline]
pub fn escape_xml(s: &str) -> String {
    ESCAPER.replace_all(s, &["&amp;", "&lt;", "&gt;", "&quot;", "&apos;"])
}

/// Resolve a general entity reference (the name between `&` and `;`).
///
/// Handles the five predefined entities plus decimal and hexadecimal
/// character references; anything else is unknown.
pub fn resolve_entity(entity: &str) -> Option<String> {
    match entity {
        "amp" => return Some("&".to_string()),
        "lt" => return Some("<".to_string()),
        "gt" => return Some(">".to_string()),
        "quot" => return Some("\"".to_string()),
        "apos" => return Some("'".to_string()),
        _ => {},
    }

    let code = if let Some(hex) = entity.strip_prefix("#x") {
        u32::from_str_radix(hex, 16).ok()
    } else if let Some(dec) = entity.strip_prefix('#') {
        dec.parse().ok()
    } else {
        None
    };
    code.and_then(char::from_u32).map(|c| c.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_special_characters() {
        assert_eq!(
            escape_xml(r#"<a & "b"> 'c'"#),
            "&lt;a &amp; &quot;b&quot;&gt; &apos;c&apos;"
        );
        assert_eq!(escape_xml("plain text"), "plain text");
    }

    #[test]
    fn resolves_predefined_and_numeric_entities() {
        assert_eq!(resolve_entity("amp").as_deref(), Some("&"));
        assert_eq!(resolve_entity("apos").as_deref(), Some("'"));
        assert_eq!(resolve_entity("#233").as_deref(), Some("é"));
        assert_eq!(resolve_entity("#xE9").as_deref(), Some("é"));
        assert_eq!(resolve_entity("copy"), None);
    }
}
