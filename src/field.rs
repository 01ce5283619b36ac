//! Field instruction handling.
//!
//! RTF fields are `{\field{\*\fldinst INSTRUCTION}{\fldrslt RESULT}}`
//! groups. The instruction names the field type; only `HYPERLINK` becomes a
//! dedicated document element, with its target extracted here. Other field
//! kinds keep their result text as ordinary runs.

/// Recognized field kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Hyperlink,
    Page,
    Date,
    Reference,
    Toc,
    Unknown,
}

/// Classify a field instruction by its leading keyword.
pub fn classify_instruction(instruction: &str) -> FieldKind {
    let trimmed = instruction.trim_start();
    if trimmed.starts_with("HYPERLINK") {
        FieldKind::Hyperlink
    } else if trimmed.starts_with("PAGE") {
        FieldKind::Page
    } else if trimmed.starts_with("DATE") || trimmed.starts_with("TIME") {
        FieldKind::Date
    } else if trimmed.starts_with("REF") {
        FieldKind::Reference
    } else if trimmed.starts_with("TOC") {
        FieldKind::Toc
    } else {
        FieldKind::Unknown
    }
}

/// Extract the target from a `HYPERLINK` instruction.
///
/// Instructions look like `HYPERLINK "https://example.com" \o "tooltip"`;
/// the target may also be unquoted. Switches such as `\l` (bookmark link)
/// may precede the target and are skipped.
pub fn hyperlink_target(instruction: &str) -> Option<&str> {
    let rest = instruction.trim_start().strip_prefix("HYPERLINK")?;

    // Quoted target
    if let Some(open) = memchr::memchr(b'"', rest.as_bytes()) {
        let after = &rest[open + 1..];
        if let Some(close) = memchr::memchr(b'"', after.as_bytes()) {
            return Some(&after[..close]);
        }
        return None;
    }

    // Unquoted: first token that is not a backslash switch
    rest.split_whitespace().find(|part| !part.starts_with('\\'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(
            classify_instruction(r#"HYPERLINK "https://example.com""#),
            FieldKind::Hyperlink
        );
        assert_eq!(classify_instruction(" PAGE "), FieldKind::Page);
        assert_eq!(classify_instruction("TOC \\o"), FieldKind::Toc);
        assert_eq!(classify_instruction("XE index"), FieldKind::Unknown);
    }

    #[test]
    fn test_quoted_target() {
        assert_eq!(
            hyperlink_target(r#"HYPERLINK "https://example.com/a b""#),
            Some("https://example.com/a b")
        );
    }

    #[test]
    fn test_quoted_target_with_tooltip() {
        assert_eq!(
            hyperlink_target(r#"HYPERLINK "https://example.com" \o "Click here""#),
            Some("https://example.com")
        );
    }

    #[test]
    fn test_unquoted_target() {
        assert_eq!(
            hyperlink_target("HYPERLINK https://example.com extra"),
            Some("https://example.com")
        );
    }

    #[test]
    fn test_switch_before_unquoted_target() {
        assert_eq!(
            hyperlink_target("HYPERLINK \\l anchor"),
            Some("anchor")
        );
    }

    #[test]
    fn test_unterminated_quote() {
        assert_eq!(hyperlink_target(r#"HYPERLINK "https://broken"#), None);
    }

    #[test]
    fn test_not_a_hyperlink() {
        assert_eq!(hyperlink_target("PAGE"), None);
    }
}
