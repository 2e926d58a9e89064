//! Schema versioning and compatibility.

/// Current schema version for the pattern database and unconfirmed store.
///
/// Follows semver: MAJOR.MINOR.PATCH
/// - MAJOR: Breaking changes (field removals, type changes)
/// - MINOR: Additive changes (new optional fields)
/// - PATCH: Bug fixes, documentation
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Parse the major component of a version string.
fn major(version: &str) -> Option<u32> {
    version.trim().split('.').next()?.parse::<u32>().ok()
}

/// Check if a schema version is compatible with current.
pub fn is_compatible(version: &str) -> bool {
    let current_major = major(SCHEMA_VERSION).unwrap_or(0);
    match major(version) {
        Some(other) => other == current_major,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_major_compatible() {
        assert!(is_compatible("1.0.0"));
        assert!(is_compatible("1.1.0"));
        assert!(is_compatible("1"));
    }

    #[test]
    fn test_different_major_incompatible() {
        assert!(!is_compatible("0.9.0"));
        assert!(!is_compatible("2.0.0"));
        assert!(!is_compatible("latest"));
    }
}
