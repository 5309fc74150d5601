use crate::error::Result;
use crate::paths;
use crate::progress::OnboardingProgress;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ProgressStore
// ---------------------------------------------------------------------------

/// Storage seam for progress records, keyed by (user, role).
pub trait ProgressStore {
    fn load(&self, user: &str, role: &str) -> Result<Option<OnboardingProgress>>;
    fn save(&mut self, progress: &OnboardingProgress) -> Result<()>;
}

// ---------------------------------------------------------------------------
// FsProgressStore
// ---------------------------------------------------------------------------

/// Progress records as YAML files under `.onboard/progress/<user>/<role>.yaml`.
pub struct FsProgressStore {
    root: PathBuf,
}

impl FsProgressStore {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }
}

impl ProgressStore for FsProgressStore {
    fn load(&self, user: &str, role: &str) -> Result<Option<OnboardingProgress>> {
        let path = paths::progress_path(&self.root, user, role);
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&path)?;
        Ok(Some(serde_yaml::from_str(&data)?))
    }

    fn save(&mut self, progress: &OnboardingProgress) -> Result<()> {
        let path = paths::progress_path(&self.root, &progress.user_id, &progress.role_id);
        let yaml = serde_yaml::to_string(progress)?;
        crate::io::atomic_write(&path, yaml.as_bytes())
    }
}

// ---------------------------------------------------------------------------
// MemoryProgressStore
// ---------------------------------------------------------------------------

/// In-memory store for tests and embedding without a filesystem.
#[derive(Default)]
pub struct MemoryProgressStore {
    records: HashMap<(String, String), OnboardingProgress>,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressStore for MemoryProgressStore {
    fn load(&self, user: &str, role: &str) -> Result<Option<OnboardingProgress>> {
        Ok(self
            .records
            .get(&(user.to_string(), role.to_string()))
            .cloned())
    }

    fn save(&mut self, progress: &OnboardingProgress) -> Result<()> {
        self.records.insert(
            (progress.user_id.clone(), progress.role_id.clone()),
            progress.clone(),
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
