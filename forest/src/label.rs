//! Item labels of the form `"<identity>=<suffix>"`.
//!
//! Only the identity part (text before the first `=`) carries meaning. The
//! suffix tells apart several reference vectors of the same identity and is
//! never interpreted.

/// Separator between the identity and the suffix.
pub const LABEL_SEPARATOR: char = '=';

/// Builds a label from an identity and an optional suffix.
/// An empty suffix yields the bare identity.
pub fn make_label(identity: &str, suffix: &str) -> String {
    if suffix.is_empty() {
        identity.to_string()
    } else {
        format!("{identity}{LABEL_SEPARATOR}{suffix}")
    }
}

/// Returns the identity part of a label.
pub fn identity_of(label: &str) -> &str {
    match label.split_once(LABEL_SEPARATOR) {
        Some((id, _)) => id,
        None => label,
    }
}

/// Returns the suffix of a label, if it has one.
pub fn suffix_of(label: &str) -> Option<&str> {
    label.split_once(LABEL_SEPARATOR).map(|(_, suffix)| suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn make_label_with_suffix() {
        assert_eq!(make_label("abc", "img1.jpg"), "abc=img1.jpg");
    }

    #[test]
    fn make_label_without_suffix() {
        assert_eq!(make_label("abc", ""), "abc");
    }

    #[test]
    fn identity_splits_at_first_separator() {
        assert_eq!(identity_of("abc=def=ghi"), "abc");
        assert_eq!(suffix_of("abc=def=ghi"), Some("def=ghi"));
    }

    #[test]
    fn identity_without_separator() {
        assert_eq!(identity_of("abc"), "abc");
        assert_eq!(suffix_of("abc"), None);
    }

    #[test]
    fn empty_identity() {
        assert_eq!(identity_of("=x"), "");
    }
}
