use crate::error::{OnboardError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const ONBOARD_DIR: &str = ".onboard";
pub const PROGRESS_DIR: &str = ".onboard/progress";
pub const PROFILES_DIR: &str = ".onboard/profiles";

pub const CONFIG_FILE: &str = ".onboard/config.yaml";
pub const TAXONOMY_FILE: &str = ".onboard/taxonomy.yaml";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn onboard_dir(root: &Path) -> PathBuf {
    root.join(ONBOARD_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn taxonomy_path(root: &Path) -> PathBuf {
    root.join(TAXONOMY_FILE)
}

pub fn progress_dir(root: &Path) -> PathBuf {
    root.join(PROGRESS_DIR)
}

pub fn profiles_dir(root: &Path) -> PathBuf {
    root.join(PROFILES_DIR)
}

/// Progress record for one (user, role) pair.
pub fn progress_path(root: &Path, user: &str, role: &str) -> PathBuf {
    progress_dir(root).join(user).join(format!("{role}.yaml"))
}

/// Accumulated profile data for one (user, role) pair.
pub fn profile_path(root: &Path, user: &str, role: &str) -> PathBuf {
    profiles_dir(root).join(user).join(format!("{role}.yaml"))
}

// ---------------------------------------------------------------------------
// Slug validation
// ---------------------------------------------------------------------------

static SLUG_RE: OnceLock<Regex> = OnceLock::new();

fn slug_re() -> &'static Regex {
    SLUG_RE.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9_\-]*[a-z0-9]$|^[a-z0-9]$").unwrap())
}

/// Validate an identifier used in taxonomy ids, user ids and file paths.
/// Lowercase alphanumeric plus `-` and `_`, no leading/trailing separator,
/// at most 64 characters.
pub fn validate_slug(slug: &str) -> Result<()> {
    if slug.is_empty() || slug.len() > 64 || !slug_re().is_match(slug) {
        return Err(OnboardError::InvalidSlug(slug.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_slugs() {
        for slug in ["account_setup", "mid-level", "a", "user-42", "x1"] {
            validate_slug(slug).unwrap_or_else(|_| panic!("expected valid: {slug}"));
        }
    }

    #[test]
    fn invalid_slugs() {
        for slug in [
            "",
            "-leading-dash",
            "trailing-dash-",
            "_leading_underscore",
            "has spaces",
            "UPPER",
            "dotted.name",
        ] {
            assert!(validate_slug(slug).is_err(), "expected invalid: {slug}");
        }
    }

    #[test]
    fn overlong_slug_rejected() {
        let slug = "a".repeat(65);
        assert!(validate_slug(&slug).is_err());
        let slug = "a".repeat(64);
        assert!(validate_slug(&slug).is_ok());
    }

    #[test]
    fn path_helpers() {
        let root = Path::new("/tmp/proj");
        assert_eq!(
            config_path(root),
            PathBuf::from("/tmp/proj/.onboard/config.yaml")
        );
        assert_eq!(
            progress_path(root, "alice", "developer"),
            PathBuf::from("/tmp/proj/.onboard/progress/alice/developer.yaml")
        );
        assert_eq!(
            profile_path(root, "alice", "developer"),
            PathBuf::from("/tmp/proj/.onboard/profiles/alice/developer.yaml")
        );
    }
}
