use onboard_core::paths;
use std::path::{Path, PathBuf};

/// Resolve the workspace root directory.
///
/// Priority:
/// 1. `--root` flag / `ONBOARD_ROOT` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `.onboard/`
/// 3. Walk upward from `cwd` looking for `.git/`
/// 4. Fall back to `cwd`
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_up(&cwd, paths::ONBOARD_DIR)
        .or_else(|| find_up(&cwd, ".git"))
        .unwrap_or(cwd)
}

/// Walk from `start` to the filesystem root, returning the first directory
/// that contains `marker` as a subdirectory.
fn find_up(start: &Path, marker: &str) -> Option<PathBuf> {
    let mut dir = Some(start);
    while let Some(d) = dir {
        if d.join(marker).is_dir() {
            return Some(d.to_path_buf());
        }
        dir = d.parent();
    }
    None
}
