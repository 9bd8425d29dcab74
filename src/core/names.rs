//! CG-002: Deterministic identifier generation.
//!
//! Every producer derives resource identifiers from semantic paths through
//! these functions, so two producers naming the same resource agree without
//! talking to each other. No counters, no hidden state.

/// Identifier used for an empty path.
pub const ROOT: &str = "root";

/// Maximum length of a cloud-side name.
const AWS_NAME_LIMIT: usize = 64;

/// Split segments into lowercase alphanumeric tokens.
fn tokens<S: AsRef<str>>(parts: &[S]) -> Vec<String> {
    parts
        .iter()
        .flat_map(|part| {
            part.as_ref()
                .split(|c: char| !c.is_ascii_alphanumeric())
                .filter(|t| !t.is_empty())
                .map(str::to_ascii_lowercase)
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Identifier legal in the emitted artifact language: `[a-z0-9_]`, never
/// empty, never starting with a digit.
pub fn tf<S: AsRef<str>>(parts: &[S]) -> String {
    let joined = tokens(parts).join("_");
    if joined.is_empty() {
        return ROOT.to_string();
    }
    if joined.starts_with(|c: char| c.is_ascii_digit()) {
        return format!("_{}", joined);
    }
    joined
}

/// Cloud-side resource name: `[a-z0-9-]`, at most 64 characters.
pub fn aws<S: AsRef<str>>(parts: &[S]) -> String {
    let joined = tokens(parts).join("-");
    if joined.is_empty() {
        return ROOT.to_string();
    }
    let mut name: String = joined.chars().take(AWS_NAME_LIMIT).collect();
    while name.ends_with('-') {
        name.pop();
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_cg002_tf_joins_segments() {
        assert_eq!(tf(&["a", "b"]), "a_b");
        assert_eq!(tf(&["Shop-API", "cors", "options"]), "shop_api_cors_options");
    }

    #[test]
    fn test_cg002_tf_stable() {
        assert_eq!(tf(&["a", "b"]), tf(&["a", "b"]));
    }

    #[test]
    fn test_cg002_tf_empty_is_root() {
        let empty: [&str; 0] = [];
        assert_eq!(tf(&empty), ROOT);
        assert_eq!(tf(&["", "/"]), ROOT);
    }

    #[test]
    fn test_cg002_tf_leading_digit() {
        assert_eq!(tf(&["1st", "route"]), "_1st_route");
    }

    #[test]
    fn test_cg002_tf_accepts_owned_strings() {
        let parts = vec!["users".to_string(), "id_param".to_string()];
        assert_eq!(tf(&parts), "users_id_param");
    }

    #[test]
    fn test_cg002_aws_hyphenated_and_capped() {
        assert_eq!(aws(&["Shop", "users handler"]), "shop-users-handler");
        let long = "x".repeat(100);
        assert_eq!(aws(&[long.as_str()]).len(), 64);
        let empty: [&str; 0] = [];
        assert_eq!(aws(&empty), ROOT);
    }

    #[test]
    fn test_cg002_aws_no_trailing_hyphen_after_cap() {
        let part = format!("{}-{}", "a".repeat(63), "b");
        let name = aws(&[part.as_str()]);
        assert!(!name.ends_with('-'));
    }

    proptest! {
        #[test]
        fn prop_tf_never_empty_and_legal(parts in proptest::collection::vec(".{0,12}", 0..5)) {
            let id = tf(&parts);
            prop_assert!(!id.is_empty());
            prop_assert!(id.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'));
            prop_assert!(!id.starts_with(|c: char| c.is_ascii_digit()));
            prop_assert_eq!(id, tf(&parts));
        }
    }
}
