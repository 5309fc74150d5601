use crate::error::Result;
use crate::paths;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ProfileRecord
// ---------------------------------------------------------------------------

/// Accumulated profile data for one (user, role) pair, keyed by the stage
/// that collected it. Survives resets and step corrections so redone steps
/// can be prefilled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileRecord {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub steps: BTreeMap<String, Map<String, Value>>,
    pub updated_at: DateTime<Utc>,
}

fn default_version() -> u32 {
    1
}

impl Default for ProfileRecord {
    fn default() -> Self {
        Self {
            version: default_version(),
            steps: BTreeMap::new(),
            updated_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// ProfileStore
// ---------------------------------------------------------------------------

/// Storage seam for per-step profile data. The engine only ever reads and
/// writes whole step payloads; merging happens in `accumulated`.
pub trait ProfileStore {
    /// Replace the payload recorded for one step.
    fn write_step_data(
        &mut self,
        user: &str,
        role: &str,
        step_id: &str,
        data: &Map<String, Value>,
    ) -> Result<()>;

    /// Payload recorded for one step, if any.
    fn step_data(
        &self,
        user: &str,
        role: &str,
        step_id: &str,
    ) -> Result<Option<Map<String, Value>>>;

    /// Merge step payloads in chain order; later steps win on key
    /// collisions.
    fn accumulated(&self, user: &str, role: &str, chain: &[String]) -> Result<Map<String, Value>> {
        let mut merged = Map::new();
        for step_id in chain {
            if let Some(data) = self.step_data(user, role, step_id)? {
                for (key, value) in data {
                    merged.insert(key, value);
                }
            }
        }
        Ok(merged)
    }
}

// ---------------------------------------------------------------------------
// FsProfileStore
// ---------------------------------------------------------------------------

/// Profile data as YAML files under `.onboard/profiles/<user>/<role>.yaml`.
pub struct FsProfileStore {
    root: PathBuf,
}

impl FsProfileStore {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    fn load_record(&self, user: &str, role: &str) -> Result<Option<ProfileRecord>> {
        let path = paths::profile_path(&self.root, user, role);
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&path)?;
        Ok(Some(serde_yaml::from_str(&data)?))
    }
}

impl ProfileStore for FsProfileStore {
    fn write_step_data(
        &mut self,
        user: &str,
        role: &str,
        step_id: &str,
        data: &Map<String, Value>,
    ) -> Result<()> {
        let mut record = self.load_record(user, role)?.unwrap_or_default();
        record.steps.insert(step_id.to_string(), data.clone());
        record.updated_at = Utc::now();
        let path = paths::profile_path(&self.root, user, role);
        let yaml = serde_yaml::to_string(&record)?;
        crate::io::atomic_write(&path, yaml.as_bytes())
    }

    fn step_data(
        &self,
        user: &str,
        role: &str,
        step_id: &str,
    ) -> Result<Option<Map<String, Value>>> {
        Ok(self
            .load_record(user, role)?
            .and_then(|r| r.steps.get(step_id).cloned()))
    }
}

// ---------------------------------------------------------------------------
// MemoryProfileStore
// ---------------------------------------------------------------------------

/// In-memory store for tests and embedding without a filesystem.
#[derive(Default)]
pub struct MemoryProfileStore {
    records: HashMap<(String, String), BTreeMap<String, Map<String, Value>>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProfileStore for MemoryProfileStore {
    fn write_step_data(
        &mut self,
        user: &str,
        role: &str,
        step_id: &str,
        data: &Map<String, Value>,
    ) -> Result<()> {
        self.records
            .entry((user.to_string(), role.to_string()))
            .or_default()
            .insert(step_id.to_string(), data.clone());
        Ok(())
    }

    fn step_data(
        &self,
        user: &str,
        role: &str,
        step_id: &str,
    ) -> Result<Option<Map<String, Value>>> {
        Ok(self
            .records
            .get(&(user.to_string(), role.to_string()))
            .and_then(|steps| steps.get(step_id).cloned()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
