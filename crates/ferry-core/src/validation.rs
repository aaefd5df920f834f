//! Input validation helpers
//!
//! Format checks that run before any session is requested. These complement
//! the `validator` derive constraints on the request models.

use regex::Regex;
use std::sync::OnceLock;

/// Accepts both dashed (`REQ-1001`) and undashed (`REQ0012345`) request
/// identifiers, plus incident references.
fn approval_reference_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(REQ|INC)-?[0-9]{4,10}$").expect("approval reference pattern is a valid regex")
    })
}

/// Check an approval reference against the expected external format.
pub fn is_valid_approval_reference(value: &str) -> bool {
    approval_reference_pattern().is_match(value)
}

/// Object keys must be relative and must not escape the container.
pub fn is_valid_object_key(value: &str) -> bool {
    !value.is_empty() && !value.starts_with('/') && !value.split('/').any(|seg| seg == "..")
}

/// Remote paths are destination-absolute or relative, but never traversing.
pub fn is_valid_remote_path(value: &str) -> bool {
    !value.is_empty() && !value.split('/').any(|seg| seg == "..")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_dashed_and_undashed_references() {
        assert!(is_valid_approval_reference("REQ-1001"));
        assert!(is_valid_approval_reference("REQ0012345"));
        assert!(is_valid_approval_reference("INC-20041"));
    }

    #[test]
    fn rejects_malformed_references() {
        assert!(!is_valid_approval_reference(""));
        assert!(!is_valid_approval_reference("REQ"));
        assert!(!is_valid_approval_reference("TASK-1001"));
        assert!(!is_valid_approval_reference("REQ-1001extra"));
        assert!(!is_valid_approval_reference("req-1001"));
    }

    #[test]
    fn object_key_traversal_rejected() {
        assert!(is_valid_object_key("reports/q3/summary.csv"));
        assert!(!is_valid_object_key("/etc/passwd"));
        assert!(!is_valid_object_key("a/../b"));
        assert!(!is_valid_object_key(""));
    }

    #[test]
    fn remote_path_traversal_rejected() {
        assert!(is_valid_remote_path("/incoming/reports"));
        assert!(is_valid_remote_path("incoming"));
        assert!(!is_valid_remote_path("incoming/../../etc"));
    }
}
