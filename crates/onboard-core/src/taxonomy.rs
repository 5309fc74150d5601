use crate::error::{OnboardError, Result};
use crate::paths;
use crate::role::{Role, RoleCategory, RoleLevel};
use crate::stage::StageDefinition;
use crate::types::{CheckWarning, StageKind, WarnLevel};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

// ---------------------------------------------------------------------------
// Taxonomy
// ---------------------------------------------------------------------------

/// The full onboarding catalog: roles, their categories, optional levels,
/// and the stage definitions that make up each flow. Loaded from
/// `.onboard/taxonomy.yaml` and treated as read-only by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Taxonomy {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub categories: Vec<RoleCategory>,
    #[serde(default)]
    pub levels: Vec<RoleLevel>,
    #[serde(default)]
    pub stages: Vec<StageDefinition>,
}

fn default_version() -> u32 {
    1
}

impl Taxonomy {
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::taxonomy_path(root);
        if !path.exists() {
            return Err(OnboardError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let taxonomy: Taxonomy = serde_yaml::from_str(&data)?;
        Ok(taxonomy)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::taxonomy_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Resolver
    // -----------------------------------------------------------------------

    /// Look up an active role. Inactive roles resolve as if absent.
    pub fn role(&self, id: &str) -> Result<&Role> {
        self.roles
            .iter()
            .find(|r| r.id == id && r.active)
            .ok_or_else(|| OnboardError::RoleNotFound(id.to_string()))
    }

    /// Look up an active category.
    pub fn category(&self, id: &str) -> Result<&RoleCategory> {
        self.categories
            .iter()
            .find(|c| c.id == id && c.active)
            .ok_or_else(|| OnboardError::CategoryNotFound(id.to_string()))
    }

    /// Look up a level. Levels carry no active flag; they are hidden by
    /// deactivating their category.
    pub fn level(&self, id: &str) -> Result<&RoleLevel> {
        self.levels
            .iter()
            .find(|l| l.id == id)
            .ok_or_else(|| OnboardError::LevelNotFound(id.to_string()))
    }

    /// Active categories of a role, ordered by sort_order.
    pub fn categories_for(&self, role_id: &str) -> Result<Vec<&RoleCategory>> {
        self.role(role_id)?;
        let mut list: Vec<&RoleCategory> = self
            .categories
            .iter()
            .filter(|c| c.role_id == role_id && c.active)
            .collect();
        list.sort_by_key(|c| c.sort_order);
        Ok(list)
    }

    /// Levels of a category, ordered by sort_order. Empty when the category
    /// is level-independent.
    pub fn levels_for(&self, category_id: &str) -> Result<Vec<&RoleLevel>> {
        self.category(category_id)?;
        let mut list: Vec<&RoleLevel> = self
            .levels
            .iter()
            .filter(|l| l.category_id == category_id)
            .collect();
        list.sort_by_key(|l| l.sort_order);
        Ok(list)
    }

    /// Active stages for a (category, level) selection, ordered by
    /// sort_order. `level` must be None for level-independent categories
    /// and name one of the category's levels otherwise.
    pub fn stages_for(
        &self,
        category_id: &str,
        level: Option<&str>,
    ) -> Result<Vec<&StageDefinition>> {
        let category = self.category(category_id)?;
        if let Some(level_id) = level {
            let lvl = self.level(level_id)?;
            if lvl.category_id != category.id {
                return Err(OnboardError::InvalidSelection(format!(
                    "level '{}' does not belong to category '{}'",
                    level_id, category_id
                )));
            }
        }
        let mut list: Vec<&StageDefinition> = self
            .stages
            .iter()
            .filter(|s| s.active && s.category_id == category_id && s.level_id.as_deref() == level)
            .collect();
        list.sort_by_key(|s| s.sort_order);
        Ok(list)
    }

    /// Materialize the ordered flow for a selection and verify its chain:
    /// prev/next links must form a single sequence that agrees with
    /// sort_order.
    pub fn flow(&self, category_id: &str, level: Option<&str>) -> Result<Flow> {
        let category = self.category(category_id)?;
        let steps = self.stages_for(category_id, level)?;
        let name = match level {
            Some(l) => format!("{}/{}/{}", category.role_id, category.id, l),
            None => format!("{}/{}", category.role_id, category.id),
        };
        verify_chain(&name, &steps)?;
        Ok(Flow {
            name,
            steps: steps.into_iter().cloned().collect(),
        })
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<CheckWarning> {
        let mut warnings = Vec::new();
        let error = |message: String| CheckWarning {
            level: WarnLevel::Error,
            message,
        };
        let warn = |message: String| CheckWarning {
            level: WarnLevel::Warning,
            message,
        };

        // 1. Every id must be a valid slug.
        let all_ids = self
            .roles
            .iter()
            .map(|r| ("role", r.id.as_str()))
            .chain(self.categories.iter().map(|c| ("category", c.id.as_str())))
            .chain(self.levels.iter().map(|l| ("level", l.id.as_str())))
            .chain(self.stages.iter().map(|s| ("stage", s.id.as_str())));
        for (entity, id) in all_ids {
            if paths::validate_slug(id).is_err() {
                warnings.push(error(format!("{entity} id '{id}' is not a valid slug")));
            }
        }

        // 2. Duplicate ids. Role, category and level ids are global; stage
        //    ids only need to be unique within their own flow.
        for (entity, ids) in [
            ("role", self.roles.iter().map(|r| &r.id).collect::<Vec<_>>()),
            (
                "category",
                self.categories.iter().map(|c| &c.id).collect(),
            ),
            ("level", self.levels.iter().map(|l| &l.id).collect()),
        ] {
            let mut seen = HashSet::new();
            for id in ids {
                if !seen.insert(id) {
                    warnings.push(error(format!("duplicate {entity} id '{id}'")));
                }
            }
        }
        for ((category, level), stages) in self.flows_by_selection() {
            let mut seen = HashSet::new();
            for stage in &stages {
                if !seen.insert(&stage.id) {
                    warnings.push(error(format!(
                        "duplicate stage id '{}' in flow {}",
                        stage.id,
                        selection_name(category, level)
                    )));
                }
            }
        }

        // 3. Dangling references.
        for category in &self.categories {
            if !self.roles.iter().any(|r| r.id == category.role_id) {
                warnings.push(error(format!(
                    "category '{}' references unknown role '{}'",
                    category.id, category.role_id
                )));
            }
        }
        for level in &self.levels {
            if !self.categories.iter().any(|c| c.id == level.category_id) {
                warnings.push(error(format!(
                    "level '{}' references unknown category '{}'",
                    level.id, level.category_id
                )));
            }
        }
        for stage in &self.stages {
            if !self.categories.iter().any(|c| c.id == stage.category_id) {
                warnings.push(error(format!(
                    "stage '{}' references unknown category '{}'",
                    stage.id, stage.category_id
                )));
            }
            if let Some(level_id) = &stage.level_id {
                match self.levels.iter().find(|l| &l.id == level_id) {
                    None => warnings.push(error(format!(
                        "stage '{}' references unknown level '{}'",
                        stage.id, level_id
                    ))),
                    Some(l) if l.category_id != stage.category_id => warnings.push(error(format!(
                        "stage '{}' references level '{}' of a different category",
                        stage.id, level_id
                    ))),
                    Some(_) => {}
                }
            }
        }

        // 4. Chain integrity per flow.
        for ((category, level), stages) in self.flows_by_selection() {
            let name = selection_name(category, level);
            if let Err(e) = verify_chain(&name, &stages) {
                warnings.push(error(e.to_string()));
            }
            let mut seen_orders = HashSet::new();
            for stage in &stages {
                if !seen_orders.insert(stage.sort_order) {
                    warnings.push(warn(format!(
                        "flow {} has multiple stages with sort_order {}",
                        name, stage.sort_order
                    )));
                }
            }
        }

        // 5. Sort order collisions between sibling categories.
        for role in &self.roles {
            let mut seen = HashSet::new();
            for category in self
                .categories
                .iter()
                .filter(|c| c.role_id == role.id && c.active)
            {
                if !seen.insert(category.sort_order) {
                    warnings.push(warn(format!(
                        "role '{}' has categories sharing sort_order {}",
                        role.id, category.sort_order
                    )));
                }
            }
        }

        // 6. Requirements must be satisfiable within their flow.
        for ((category, level), stages) in self.flows_by_selection() {
            let name = selection_name(category, level);
            let stage_ids: HashSet<&str> = stages.iter().map(|s| s.id.as_str()).collect();
            let mut collected: HashSet<&str> = HashSet::new();
            for stage in &stages {
                for req in &stage.requirements {
                    if let Some(target) = req.referenced_stage() {
                        if !stage_ids.contains(target) {
                            warnings.push(error(format!(
                                "stage '{}' in flow {} requires unknown stage '{}'",
                                stage.id, name, target
                            )));
                        }
                    }
                    if let Some(field) = req.referenced_field() {
                        if !collected.contains(field)
                            && !stage.form_fields.iter().any(|f| f.name == field)
                        {
                            warnings.push(warn(format!(
                                "stage '{}' in flow {} reads field '{}' that no earlier stage collects",
                                stage.id, name, field
                            )));
                        }
                    }
                }
                if stage.kind == StageKind::Conditional && stage.requirements.is_empty() {
                    warnings.push(warn(format!(
                        "conditional stage '{}' in flow {} has no requirements (behaves like a required stage)",
                        stage.id, name
                    )));
                }
                for field in &stage.form_fields {
                    collected.insert(field.name.as_str());
                }
            }
        }

        // 7. Shape warnings: entities that resolve but go nowhere.
        for role in self.roles.iter().filter(|r| r.active) {
            if !self
                .categories
                .iter()
                .any(|c| c.role_id == role.id && c.active)
            {
                warnings.push(warn(format!("role '{}' has no active categories", role.id)));
            }
        }
        for category in self.categories.iter().filter(|c| c.active) {
            let levels: Vec<&RoleLevel> = self
                .levels
                .iter()
                .filter(|l| l.category_id == category.id)
                .collect();
            if levels.is_empty() {
                if !self
                    .stages
                    .iter()
                    .any(|s| s.active && s.category_id == category.id && s.level_id.is_none())
                {
                    warnings.push(warn(format!("category '{}' has no stages", category.id)));
                }
            } else {
                for level in levels {
                    if !self.stages.iter().any(|s| {
                        s.active
                            && s.category_id == category.id
                            && s.level_id.as_deref() == Some(level.id.as_str())
                    }) {
                        warnings.push(warn(format!(
                            "level '{}' of category '{}' has no stages",
                            level.id, category.id
                        )));
                    }
                }
            }
        }

        warnings
    }

    /// Group active stages into their (category, level) flows, each sorted
    /// by sort_order.
    fn flows_by_selection(&self) -> BTreeMap<(&str, Option<&str>), Vec<&StageDefinition>> {
        let mut flows: BTreeMap<(&str, Option<&str>), Vec<&StageDefinition>> = BTreeMap::new();
        for stage in self.stages.iter().filter(|s| s.active) {
            flows
                .entry((stage.category_id.as_str(), stage.level_id.as_deref()))
                .or_default()
                .push(stage);
        }
        for stages in flows.values_mut() {
            stages.sort_by_key(|s| s.sort_order);
        }
        flows
    }
}

fn selection_name(category: &str, level: Option<&str>) -> String {
    match level {
        Some(l) => format!("'{category}/{l}'"),
        None => format!("'{category}'"),
    }
}

fn verify_chain(flow_name: &str, steps: &[&StageDefinition]) -> Result<()> {
    let broken = |reason: String| OnboardError::BrokenChain {
        flow: flow_name.to_string(),
        reason,
    };
    let Some(first) = steps.first() else {
        return Ok(());
    };
    if let Some(prev) = &first.prev {
        return Err(broken(format!(
            "first stage '{}' links back to '{}'",
            first.id, prev
        )));
    }
    for pair in steps.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if a.next.as_deref() != Some(b.id.as_str()) {
            return Err(broken(format!(
                "stage '{}' does not link forward to '{}'",
                a.id, b.id
            )));
        }
        if b.prev.as_deref() != Some(a.id.as_str()) {
            return Err(broken(format!(
                "stage '{}' does not link back to '{}'",
                b.id, a.id
            )));
        }
    }
    if let Some(last) = steps.last() {
        if let Some(next) = &last.next {
            return Err(broken(format!(
                "last stage '{}' links forward to '{}'",
                last.id, next
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Flow
// ---------------------------------------------------------------------------

/// An ordered, chain-verified list of stages for one selection. Step
/// indices are 1-based throughout; index `len() + 1` is the terminal
/// position past the last step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flow {
    pub name: String,
    pub steps: Vec<StageDefinition>,
}

impl Flow {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Stage at a 1-based index.
    pub fn step_at(&self, index: u32) -> Option<&StageDefinition> {
        let i = index.checked_sub(1)? as usize;
        self.steps.get(i)
    }

    /// 1-based position of a stage id.
    pub fn position(&self, stage_id: &str) -> Option<u32> {
        self.steps
            .iter()
            .position(|s| s.id == stage_id)
            .map(|i| i as u32 + 1)
    }

    /// Ids of all stages strictly before a 1-based index, in chain order.
    pub fn earlier_ids(&self, index: u32) -> Vec<String> {
        self.steps
            .iter()
            .take(index.saturating_sub(1) as usize)
            .map(|s| s.id.clone())
            .collect()
    }

    pub fn stage_ids(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.id.clone()).collect()
    }
}

// ---------------------------------------------------------------------------
// Starter taxonomy
// ---------------------------------------------------------------------------

/// Seed taxonomy written by `onboard init`: a client flow, an agency flow,
/// and a leveled developer flow.
pub const STARTER_TAXONOMY: &str = r#"version: 1
roles:
  - id: client
    name: Client
    description: Hire vetted talent for your team
    button_label: I want to hire
    sort_order: 1
  - id: developer
    name: Developer
    description: Find engineering work that fits you
    button_label: I want to work
    sort_order: 2
  - id: agency
    name: Agency
    description: Offer your agency's services
    button_label: We build for clients
    sort_order: 3
categories:
  - id: startup-founder
    name: Startup Founder
    description: Early-stage company building a first team
    role_id: client
    sort_order: 1
  - id: full-stack-developer
    name: Full-Stack Developer
    role_id: developer
    sort_order: 1
  - id: web-development-agency
    name: Web Development Agency
    role_id: agency
    sort_order: 1
levels:
  - id: junior
    name: Junior
    category_id: full-stack-developer
    sort_order: 1
    requirements:
      years_experience: 1
  - id: mid-level
    name: Mid-Level
    category_id: full-stack-developer
    sort_order: 2
    requirements:
      years_experience: 3
  - id: senior
    name: Senior
    category_id: full-stack-developer
    sort_order: 3
    requirements:
      years_experience: 5
      skills: [architecture, mentoring]
stages:
  # client / startup-founder
  - id: organization
    name: Organization
    category_id: startup-founder
    sort_order: 1
    next: team
    form_fields:
      - name: org_name
        label: Company name
        required: true
      - name: org_size
        label: Company size
        kind: select
        required: true
        options: ["1-10", "11-50", "51-200", "200+"]
      - name: website
        label: Website
  - id: team
    name: Team
    category_id: startup-founder
    sort_order: 2
    prev: organization
    next: hiring_intent
    requirements:
      - kind: stage_complete
        stage: organization
    form_fields:
      - name: team_size
        label: Current team size
        kind: number
      - name: actively_hiring
        label: Are you hiring right now?
        kind: boolean
        required: true
  - id: hiring_intent
    name: Hiring Intent
    category_id: startup-founder
    sort_order: 3
    prev: team
    requirements:
      - kind: all_previous_complete
      - kind: field_truthy
        field: actively_hiring
    form_fields:
      - name: roles_needed
        label: Roles you need
        kind: multi_select
        required: true
        options: [frontend, backend, full-stack, devops, design]
      - name: timeline
        label: Hiring timeline
        kind: select
        options: [now, month, quarter]
  # developer / full-stack-developer / junior
  - id: account_setup
    name: Account Setup
    category_id: full-stack-developer
    level_id: junior
    sort_order: 1
    next: hard_skills
    form_fields:
      - name: full_name
        label: Full name
        required: true
      - name: email
        label: Email
        kind: email
        required: true
      - name: country
        label: Country
  - id: hard_skills
    name: Hard Skills
    category_id: full-stack-developer
    level_id: junior
    sort_order: 2
    prev: account_setup
    next: soft_skills_portfolio
    requirements:
      - kind: stage_complete
        stage: account_setup
    form_fields:
      - name: skills
        label: Skills
        kind: multi_select
        required: true
        options: [javascript, typescript, react, node, python, rust, go, sql]
      - name: years_experience
        label: Years of experience
        kind: number
        required: true
  - id: soft_skills_portfolio
    name: Soft Skills & Portfolio
    category_id: full-stack-developer
    level_id: junior
    sort_order: 3
    kind: optional
    prev: hard_skills
    next: work_preferences
    form_fields:
      - name: portfolio_url
        label: Portfolio URL
      - name: summary
        label: About you
  - id: work_preferences
    name: Work Preferences
    category_id: full-stack-developer
    level_id: junior
    sort_order: 4
    prev: soft_skills_portfolio
    requirements:
      - kind: stage_complete
        stage: hard_skills
    form_fields:
      - name: hourly_rate
        label: Hourly rate (USD)
        kind: number
        required: true
      - name: availability
        label: Availability
        kind: select
        required: true
        options: [full-time, part-time, contract]
      - name: remote_only
        label: Remote only
        kind: boolean
  # developer / full-stack-developer / mid-level
  - id: account_setup
    name: Account Setup
    category_id: full-stack-developer
    level_id: mid-level
    sort_order: 1
    next: hard_skills
    form_fields:
      - name: full_name
        label: Full name
        required: true
      - name: email
        label: Email
        kind: email
        required: true
      - name: country
        label: Country
  - id: hard_skills
    name: Hard Skills
    category_id: full-stack-developer
    level_id: mid-level
    sort_order: 2
    prev: account_setup
    next: soft_skills_portfolio
    requirements:
      - kind: stage_complete
        stage: account_setup
    form_fields:
      - name: skills
        label: Skills
        kind: multi_select
        required: true
        options: [javascript, typescript, react, node, python, rust, go, sql]
      - name: years_experience
        label: Years of experience
        kind: number
        required: true
  - id: soft_skills_portfolio
    name: Soft Skills & Portfolio
    category_id: full-stack-developer
    level_id: mid-level
    sort_order: 3
    kind: optional
    prev: hard_skills
    next: assessments
    form_fields:
      - name: portfolio_url
        label: Portfolio URL
      - name: summary
        label: About you
  - id: assessments
    name: Assessments
    category_id: full-stack-developer
    level_id: mid-level
    sort_order: 4
    prev: soft_skills_portfolio
    next: work_preferences
    requirements:
      - kind: stage_complete
        stage: hard_skills
      - kind: field_present
        field: skills
    form_fields:
      - name: assessment_slot
        label: Preferred assessment slot
        kind: select
        options: [morning, afternoon, evening]
  - id: work_preferences
    name: Work Preferences
    category_id: full-stack-developer
    level_id: mid-level
    sort_order: 5
    prev: assessments
    requirements:
      - kind: stage_complete
        stage: hard_skills
    form_fields:
      - name: hourly_rate
        label: Hourly rate (USD)
        kind: number
        required: true
      - name: availability
        label: Availability
        kind: select
        required: true
        options: [full-time, part-time, contract]
      - name: remote_only
        label: Remote only
        kind: boolean
  # developer / full-stack-developer / senior
  - id: account_setup
    name: Account Setup
    category_id: full-stack-developer
    level_id: senior
    sort_order: 1
    next: hard_skills
    form_fields:
      - name: full_name
        label: Full name
        required: true
      - name: email
        label: Email
        kind: email
        required: true
      - name: country
        label: Country
  - id: hard_skills
    name: Hard Skills
    category_id: full-stack-developer
    level_id: senior
    sort_order: 2
    prev: account_setup
    next: soft_skills_portfolio
    requirements:
      - kind: stage_complete
        stage: account_setup
    form_fields:
      - name: skills
        label: Skills
        kind: multi_select
        required: true
        options: [javascript, typescript, react, node, python, rust, go, sql]
      - name: years_experience
        label: Years of experience
        kind: number
        required: true
  - id: soft_skills_portfolio
    name: Soft Skills & Portfolio
    category_id: full-stack-developer
    level_id: senior
    sort_order: 3
    kind: optional
    prev: hard_skills
    next: assessments
    form_fields:
      - name: portfolio_url
        label: Portfolio URL
      - name: summary
        label: About you
  - id: assessments
    name: Assessments
    category_id: full-stack-developer
    level_id: senior
    sort_order: 4
    prev: soft_skills_portfolio
    next: work_preferences
    requirements:
      - kind: stage_complete
        stage: hard_skills
      - kind: field_present
        field: skills
    form_fields:
      - name: assessment_slot
        label: Preferred assessment slot
        kind: select
        options: [morning, afternoon, evening]
  - id: work_preferences
    name: Work Preferences
    category_id: full-stack-developer
    level_id: senior
    sort_order: 5
    prev: assessments
    requirements:
      - kind: stage_complete
        stage: hard_skills
    form_fields:
      - name: hourly_rate
        label: Hourly rate (USD)
        kind: number
        required: true
      - name: availability
        label: Availability
        kind: select
        required: true
        options: [full-time, part-time, contract]
      - name: remote_only
        label: Remote only
        kind: boolean
  # agency / web-development-agency
  - id: agency_profile
    name: Agency Profile
    category_id: web-development-agency
    sort_order: 1
    next: service_lines
    form_fields:
      - name: agency_name
        label: Agency name
        required: true
      - name: website
        label: Website
      - name: team_size
        label: Team size
        kind: number
  - id: service_lines
    name: Service Lines
    category_id: web-development-agency
    sort_order: 2
    prev: agency_profile
    requirements:
      - kind: stage_complete
        stage: agency_profile
    form_fields:
      - name: services
        label: Services offered
        kind: multi_select
        required: true
        options: [web, mobile, design, consulting]
"#;

/// Parse the starter taxonomy. Used by init scaffolding and as a fixture
/// across the workspace's tests.
pub fn starter() -> Result<Taxonomy> {
    Ok(serde_yaml::from_str(STARTER_TAXONOMY)?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
