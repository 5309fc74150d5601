use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Top level of the taxonomy: the persona a user signs up as
/// (client, developer, agency).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Call-to-action text shown on the role picker ("I want to hire").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub sort_order: u32,
}

// ---------------------------------------------------------------------------
// RoleCategory
// ---------------------------------------------------------------------------

/// Specialization within a role ("startup-founder" under client,
/// "full-stack-developer" under developer). Owns either a single flow or
/// one flow per level, depending on whether levels exist for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleCategory {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub role_id: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub sort_order: u32,
    /// Free-form annotations carried through to API consumers untouched.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// RoleLevel
// ---------------------------------------------------------------------------

/// Experience tier within a category (junior, mid-level, senior). Only some
/// categories use levels; a category without levels has one level-independent
/// flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleLevel {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub category_id: String,
    #[serde(default)]
    pub sort_order: u32,
    #[serde(default, skip_serializing_if = "LevelRequirements::is_empty")]
    pub requirements: LevelRequirements,
}

/// Informal expectations for a level, displayed to users during selection.
/// Not evaluated by the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LevelRequirements {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub years_experience: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skills: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub education: Option<String>,
}

impl LevelRequirements {
    pub fn is_empty(&self) -> bool {
        self.years_experience.is_none() && self.skills.is_empty() && self.education.is_none()
    }
}

fn default_active() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
