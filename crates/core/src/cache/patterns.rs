//! Glob matching for cache key patterns.
//!
//! Only `*` is special: it matches any run of characters, including none.
//! This is the subset of Redis `MATCH` syntax the invalidation policy emits,
//! so in-process caches can honor the same patterns.

/// Checks if a cache key matches a glob pattern.
///
/// # Examples
///
/// ```
/// use lexikon_core::cache::pattern_matches;
///
/// assert!(pattern_matches("prod:entry:42", "prod:entry:42"));
/// assert!(pattern_matches("prod:entries:list:*", "prod:entries:list:limit=20&offset=0"));
/// assert!(pattern_matches("prod:entry:*:comments:*", "prod:entry:42:comments:0:20"));
/// assert!(!pattern_matches("prod:entry:*", "test:entry:42"));
/// ```
pub fn pattern_matches(pattern: &str, key: &str) -> bool {
    let mut segments = pattern.split('*');
    // split always yields at least one segment
    let head = segments.next().unwrap_or_default();
    let Some(mut rest) = key.strip_prefix(head) else {
        return false;
    };

    let middle: Vec<&str> = segments.collect();
    let Some((tail, inner)) = middle.split_last() else {
        // No wildcard at all
        return rest.is_empty();
    };

    for segment in inner.iter().filter(|s| !s.is_empty()) {
        match rest.find(segment) {
            Some(pos) => rest = &rest[pos + segment.len()..],
            None => return false,
        }
    }

    rest.ends_with(tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "00000000-0000-0000-0000-000000000000";

    #[test]
    fn test_exact_match() {
        assert!(pattern_matches("dev:entry:1", "dev:entry:1"));
        assert!(!pattern_matches("dev:entry:1", "dev:entry:12"));
        assert!(!pattern_matches("dev:entry:12", "dev:entry:1"));
    }

    #[test]
    fn test_trailing_wildcard() {
        assert!(pattern_matches("dev:entries:list:*", "dev:entries:list:"));
        assert!(pattern_matches(
            "dev:entries:list:*",
            "dev:entries:list:limit=20&offset=0&order=desc&sort=updated_at"
        ));
        assert!(!pattern_matches("dev:entries:list:*", "dev:entry:1"));
    }

    #[test]
    fn test_leading_and_inner_wildcards() {
        assert!(pattern_matches("*:likes", &format!("dev:entry:{ID}:likes")));
        assert!(pattern_matches(
            "dev:entry:*:comments:*",
            &format!("dev:entry:{ID}:comments:0:20")
        ));
        assert!(!pattern_matches(
            "dev:entry:*:comments:*",
            &format!("dev:entry:{ID}:likes")
        ));
    }

    #[test]
    fn test_env_prefix_isolates_namespaces() {
        assert!(pattern_matches("dev:entry:*", &format!("dev:entry:{ID}")));
        assert!(!pattern_matches("dev:entry:*", &format!("prod:entry:{ID}")));
    }

    #[test]
    fn test_segments_do_not_overlap() {
        // "ab" cannot be reused for both prefix and suffix
        assert!(!pattern_matches("ab*ab", "ab"));
        assert!(pattern_matches("ab*ab", "abab"));
        assert!(pattern_matches("a*b*c", "a-b-c"));
        assert!(!pattern_matches("a*b*c", "a-c-b"));
    }

    #[test]
    fn test_only_wildcards_and_empty() {
        assert!(pattern_matches("*", ""));
        assert!(pattern_matches("**", "anything"));
        assert!(pattern_matches("", ""));
        assert!(!pattern_matches("", "x"));
    }
}
