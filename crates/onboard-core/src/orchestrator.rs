use crate::config::Config;
use crate::error::{OnboardError, Result};
use crate::paths;
use crate::profile::{FsProfileStore, ProfileStore};
use crate::progress::{OnboardingProgress, ProgressAction, DEFAULT_HISTORY_LIMIT};
use crate::requirement::{EvalContext, Requirement};
use crate::stage::StageDefinition;
use crate::store::{FsProgressStore, ProgressStore};
use crate::taxonomy::{Flow, Taxonomy};
use crate::types::{ProgressStatus, StageKind};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::path::Path;

// ---------------------------------------------------------------------------
// ProgressView
// ---------------------------------------------------------------------------

/// Read-only snapshot of where a user stands in a flow, including the
/// definition of the stage they are currently on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressView {
    pub status: ProgressStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<OnboardingProgress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_stage: Option<StageDefinition>,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// The only component allowed to mutate progress records. Owns every
/// transition: starting a flow, completing and correcting steps, skipping,
/// stepping back, and resetting. Stores are injected so the engine runs
/// against the filesystem, memory, or anything else implementing the
/// store traits.
pub struct Orchestrator<S: ProgressStore, P: ProfileStore> {
    taxonomy: Taxonomy,
    progress: S,
    profiles: P,
    history_limit: usize,
}

impl Orchestrator<FsProgressStore, FsProfileStore> {
    /// Filesystem-backed engine rooted at an initialized workspace.
    pub fn open(root: &Path) -> Result<Self> {
        let config = Config::load(root)?;
        let taxonomy = Taxonomy::load(root)?;
        Ok(Orchestrator::new(
            taxonomy,
            FsProgressStore::new(root),
            FsProfileStore::new(root),
        )
        .with_history_limit(config.flows.history_limit))
    }
}

impl<S: ProgressStore, P: ProfileStore> Orchestrator<S, P> {
    pub fn new(taxonomy: Taxonomy, progress: S, profiles: P) -> Self {
        Self {
            taxonomy,
            progress,
            profiles,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    // -----------------------------------------------------------------------
    // start
    // -----------------------------------------------------------------------

    /// Create (or restart) progress for a (user, role) pair. The selection
    /// must be coherent: the category belongs to the role, a level is given
    /// exactly when the category uses levels, and the resolved flow is
    /// non-empty.
    pub fn start(
        &mut self,
        user: &str,
        role_id: &str,
        category_id: &str,
        level_id: Option<&str>,
    ) -> Result<OnboardingProgress> {
        paths::validate_slug(user)?;
        paths::validate_slug(role_id)?;
        let role = self.taxonomy.role(role_id)?;
        let category = self.taxonomy.category(category_id)?;
        if category.role_id != role.id {
            return Err(OnboardError::InvalidSelection(format!(
                "category '{category_id}' does not belong to role '{role_id}'"
            )));
        }
        let levels = self.taxonomy.levels_for(category_id)?;
        match (levels.is_empty(), level_id) {
            (true, Some(level)) => {
                return Err(OnboardError::InvalidSelection(format!(
                    "category '{category_id}' does not use levels, but level '{level}' was given"
                )));
            }
            (false, None) => {
                return Err(OnboardError::InvalidSelection(format!(
                    "category '{category_id}' requires a level"
                )));
            }
            (false, Some(level)) => {
                let lvl = self.taxonomy.level(level)?;
                if lvl.category_id != category.id {
                    return Err(OnboardError::InvalidSelection(format!(
                        "level '{level}' does not belong to category '{category_id}'"
                    )));
                }
            }
            (true, None) => {}
        }
        let flow = self.taxonomy.flow(category_id, level_id)?;
        if flow.is_empty() {
            return Err(OnboardError::InvalidSelection(format!(
                "selection resolves to an empty flow for category '{category_id}'"
            )));
        }
        let progress = OnboardingProgress::start(
            user,
            role_id,
            category_id,
            level_id.map(str::to_string),
            flow.name.clone(),
            flow.len() as u32,
        );
        self.progress.save(&progress)?;
        Ok(progress)
    }

    // -----------------------------------------------------------------------
    // snapshot
    // -----------------------------------------------------------------------

    /// Where the user stands right now. Reports `not_started` instead of
    /// failing when no record exists.
    pub fn snapshot(&self, user: &str, role: &str) -> Result<ProgressView> {
        paths::validate_slug(user)?;
        paths::validate_slug(role)?;
        let Some(progress) = self.progress.load(user, role)? else {
            return Ok(ProgressView {
                status: ProgressStatus::NotStarted,
                progress: None,
                current_stage: None,
            });
        };
        let current_stage = if progress.status == ProgressStatus::InProgress {
            let flow = self.flow_for(&progress)?;
            flow.step_at(progress.current_step).cloned()
        } else {
            None
        };
        Ok(ProgressView {
            status: progress.status,
            current_stage,
            progress: Some(progress),
        })
    }

    // -----------------------------------------------------------------------
    // complete_step
    // -----------------------------------------------------------------------

    /// Submit output for a step. Three cases:
    ///
    /// * the step is the current one and not yet completed: validate the
    ///   form and the stage requirements, record the output, advance;
    /// * the step is already completed and the output is identical: no-op
    ///   (stepping forward over it when it is the current step);
    /// * the step is already completed and the output differs: a
    ///   correction. The payload is overwritten in place, then every later
    ///   completed stage whose requirements touch the changed fields (or a
    ///   stage evicted in the same pass) is re-evaluated, failures are
    ///   evicted from the completed set, and the index rewinds to the
    ///   earliest evicted stage.
    ///
    /// Nothing is persisted unless the whole transition succeeds.
    pub fn complete_step(
        &mut self,
        user: &str,
        role: &str,
        step_id: &str,
        output: Map<String, Value>,
    ) -> Result<OnboardingProgress> {
        let mut progress = self.load_progress(user, role)?;
        let flow = self.flow_for(&progress)?;
        let pos = flow
            .position(step_id)
            .ok_or_else(|| OnboardError::StageNotFound(step_id.to_string()))?;
        let already_completed = progress.completed.contains(step_id);
        if !already_completed && pos != progress.current_step {
            return Err(OnboardError::InvalidSelection(format!(
                "step '{}' is not the current step (expected step {})",
                step_id, progress.current_step
            )));
        }
        let stage = flow
            .step_at(pos)
            .ok_or_else(|| OnboardError::StageNotFound(step_id.to_string()))?;

        if already_completed {
            let previous = self.profiles.step_data(user, role, step_id)?;
            if previous.as_ref() == Some(&output) {
                if pos == progress.current_step {
                    // Reviewed without changes; just move forward over it.
                    Self::advance(&mut progress, &flow, self.history_limit)?;
                    self.progress.save(&progress)?;
                }
                return Ok(progress);
            }
            stage.validate_output(&output)?;
            let changed = changed_fields(previous.as_ref(), &output);
            self.profiles.write_step_data(user, role, step_id, &output)?;
            progress.record(
                ProgressAction::StepCorrected,
                pos,
                Some(step_id),
                self.history_limit,
            );
            self.cascade(&mut progress, &flow, pos, &changed, user, role)?;
            self.progress.save(&progress)?;
            return Ok(progress);
        }

        stage.validate_output(&output)?;
        let mut fields = self.profiles.accumulated(user, role, &flow.stage_ids())?;
        for (key, value) in &output {
            fields.insert(key.clone(), value.clone());
        }
        let earlier = flow.earlier_ids(pos);
        let ctx = EvalContext {
            fields: &fields,
            completed: &progress.completed,
            earlier_stages: &earlier,
        };
        if let Some(unmet) = stage.requirements.iter().find(|r| !r.is_met(&ctx)) {
            return Err(OnboardError::PrerequisiteNotMet {
                stage: stage.id.clone(),
                condition: unmet.describe(),
            });
        }

        progress.completed.insert(step_id.to_string());
        progress.record(
            ProgressAction::StepCompleted,
            pos,
            Some(step_id),
            self.history_limit,
        );
        Self::advance(&mut progress, &flow, self.history_limit)?;
        self.profiles.write_step_data(user, role, step_id, &output)?;
        self.progress.save(&progress)?;
        Ok(progress)
    }

    /// Re-evaluate completed stages after `edited_pos` and evict the ones
    /// whose requirements no longer hold. Walks the chain in order so an
    /// eviction can trigger further evictions downstream.
    fn cascade(
        &mut self,
        progress: &mut OnboardingProgress,
        flow: &Flow,
        edited_pos: u32,
        changed: &BTreeSet<String>,
        user: &str,
        role: &str,
    ) -> Result<()> {
        let accumulated = self.profiles.accumulated(user, role, &flow.stage_ids())?;
        let mut evicted: BTreeSet<String> = BTreeSet::new();
        let mut rewind: Option<u32> = None;

        for later in (edited_pos + 1)..=(flow.len() as u32) {
            let Some(later_stage) = flow.step_at(later) else {
                continue;
            };
            if !progress.completed.contains(&later_stage.id) {
                continue;
            }
            let triggered = later_stage.requirements.iter().any(|r| {
                r.referenced_field().is_some_and(|f| changed.contains(f))
                    || r.referenced_stage().is_some_and(|s| evicted.contains(s))
                    || (matches!(r, Requirement::AllPreviousComplete) && !evicted.is_empty())
            });
            if !triggered {
                continue;
            }
            let earlier = flow.earlier_ids(later);
            let broken = {
                let ctx = EvalContext {
                    fields: &accumulated,
                    completed: &progress.completed,
                    earlier_stages: &earlier,
                };
                later_stage.requirements.iter().any(|r| !r.is_met(&ctx))
            };
            if broken {
                progress.completed.remove(&later_stage.id);
                evicted.insert(later_stage.id.clone());
                rewind.get_or_insert(later);
                progress.record(
                    ProgressAction::StageEvicted,
                    later,
                    Some(&later_stage.id),
                    self.history_limit,
                );
            }
        }

        if let Some(index) = rewind {
            progress.current_step = index;
            progress.status = ProgressStatus::InProgress;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // skip_step
    // -----------------------------------------------------------------------

    /// Skip the current stage without recording output. Optional stages may
    /// always be skipped, conditional stages only while their requirements
    /// are unmet, required stages never. Skipping an already-completed
    /// stage just moves forward over it.
    pub fn skip_step(&mut self, user: &str, role: &str) -> Result<OnboardingProgress> {
        let mut progress = self.load_progress(user, role)?;
        if progress.is_completed() {
            return Err(OnboardError::InvalidSelection(
                "onboarding is already completed".to_string(),
            ));
        }
        let flow = self.flow_for(&progress)?;
        let stage = flow.step_at(progress.current_step).ok_or_else(|| {
            OnboardError::Storage(format!(
                "progress index {} out of range for flow '{}'",
                progress.current_step, flow.name
            ))
        })?;

        if progress.completed.contains(&stage.id) {
            Self::advance(&mut progress, &flow, self.history_limit)?;
            self.progress.save(&progress)?;
            return Ok(progress);
        }

        match stage.kind {
            StageKind::Required => {
                return Err(OnboardError::PrerequisiteNotMet {
                    stage: stage.id.clone(),
                    condition: "required stage cannot be skipped".to_string(),
                });
            }
            StageKind::Optional => {}
            StageKind::Conditional => {
                let fields = self.profiles.accumulated(user, role, &flow.stage_ids())?;
                let earlier = flow.earlier_ids(progress.current_step);
                let ctx = EvalContext {
                    fields: &fields,
                    completed: &progress.completed,
                    earlier_stages: &earlier,
                };
                if stage.requirements.iter().all(|r| r.is_met(&ctx)) {
                    return Err(OnboardError::PrerequisiteNotMet {
                        stage: stage.id.clone(),
                        condition: "stage requirements are satisfied; complete it instead"
                            .to_string(),
                    });
                }
            }
        }

        progress.record(
            ProgressAction::StepSkipped,
            progress.current_step,
            Some(&stage.id),
            self.history_limit,
        );
        Self::advance(&mut progress, &flow, self.history_limit)?;
        self.progress.save(&progress)?;
        Ok(progress)
    }

    // -----------------------------------------------------------------------
    // previous_step
    // -----------------------------------------------------------------------

    /// Move back one step for review. A no-op at step 1. Stepping back out
    /// of the terminal position reopens the flow.
    pub fn previous_step(&mut self, user: &str, role: &str) -> Result<OnboardingProgress> {
        let mut progress = self.load_progress(user, role)?;
        if progress.current_step <= 1 {
            return Ok(progress);
        }
        progress.current_step -= 1;
        if progress.status == ProgressStatus::Completed {
            progress.status = ProgressStatus::InProgress;
        }
        progress.touch();
        self.progress.save(&progress)?;
        Ok(progress)
    }

    // -----------------------------------------------------------------------
    // reset
    // -----------------------------------------------------------------------

    /// Clear the completed set and return to step 1. Profile data is kept
    /// so redone steps can be prefilled.
    pub fn reset(&mut self, user: &str, role: &str) -> Result<OnboardingProgress> {
        let mut progress = self.load_progress(user, role)?;
        progress.completed.clear();
        progress.current_step = 1;
        progress.status = ProgressStatus::InProgress;
        progress.record(ProgressAction::Reset, 1, None, self.history_limit);
        self.progress.save(&progress)?;
        Ok(progress)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn load_progress(&self, user: &str, role: &str) -> Result<OnboardingProgress> {
        paths::validate_slug(user)?;
        paths::validate_slug(role)?;
        self.progress
            .load(user, role)?
            .ok_or_else(|| OnboardError::ProgressNotFound {
                user: user.to_string(),
                role: role.to_string(),
            })
    }

    /// Resolve the flow a progress record was started against, refusing to
    /// operate when the taxonomy has drifted out from under the record.
    fn flow_for(&self, progress: &OnboardingProgress) -> Result<Flow> {
        let flow = self
            .taxonomy
            .flow(&progress.category_id, progress.level_id.as_deref())?;
        if flow.len() as u32 != progress.total_steps {
            return Err(OnboardError::Storage(format!(
                "flow '{}' now has {} steps but progress for '{}/{}' recorded {}",
                flow.name,
                flow.len(),
                progress.user_id,
                progress.role_id,
                progress.total_steps
            )));
        }
        Ok(flow)
    }

    /// Move the index forward one position. Crossing past the last step
    /// completes the flow, provided every required stage is in the
    /// completed set.
    fn advance(progress: &mut OnboardingProgress, flow: &Flow, limit: usize) -> Result<()> {
        progress.current_step += 1;
        if progress.current_step > progress.total_steps {
            if let Some(missing) = flow
                .steps
                .iter()
                .find(|s| s.kind == StageKind::Required && !progress.completed.contains(&s.id))
            {
                return Err(OnboardError::PrerequisiteNotMet {
                    stage: missing.id.clone(),
                    condition: format!("required stage '{}' has not been completed", missing.id),
                });
            }
            progress.status = ProgressStatus::Completed;
            progress.record(
                ProgressAction::FlowCompleted,
                progress.total_steps,
                None,
                limit,
            );
        } else {
            progress.touch();
        }
        Ok(())
    }
}

/// Keys whose values differ between the previously stored payload and the
/// replacement, including keys present on only one side.
fn changed_fields(old: Option<&Map<String, Value>>, new: &Map<String, Value>) -> BTreeSet<String> {
    let empty = Map::new();
    let old = old.unwrap_or(&empty);
    let mut changed = BTreeSet::new();
    for (key, value) in new {
        if old.get(key) != Some(value) {
            changed.insert(key.clone());
        }
    }
    for key in old.keys() {
        if !new.contains_key(key) {
            changed.insert(key.clone());
        }
    }
    changed
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::MemoryProfileStore;
    use crate::role::{Role, RoleCategory};
    use crate::stage::FormField;
    use crate::store::MemoryProgressStore;
    use crate::taxonomy::starter;
    use crate::types::FieldKind;
    use serde_json::json;

    type MemoryEngine = Orchestrator<MemoryProgressStore, MemoryProfileStore>;

    fn engine() -> MemoryEngine {
        Orchestrator::new(
            starter().unwrap(),
            MemoryProgressStore::new(),
            MemoryProfileStore::new(),
        )
    }

    fn engine_with(taxonomy: Taxonomy) -> MemoryEngine {
        Orchestrator::new(taxonomy, MemoryProgressStore::new(), MemoryProfileStore::new())
    }

    fn output(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn org_output() -> Map<String, Value> {
        output(&[("org_name", json!("Acme")), ("org_size", json!("1-10"))])
    }

    fn team_output(hiring: bool) -> Map<String, Value> {
        output(&[("actively_hiring", json!(hiring)), ("team_size", json!(4))])
    }

    fn intent_output() -> Map<String, Value> {
        output(&[
            ("roles_needed", json!(["backend"])),
            ("timeline", json!("now")),
        ])
    }

    fn account_output() -> Map<String, Value> {
        output(&[
            ("full_name", json!("Ada Lovelace")),
            ("email", json!("ada@example.dev")),
        ])
    }

    fn skills_output() -> Map<String, Value> {
        output(&[
            ("skills", json!(["rust", "sql"])),
            ("years_experience", json!(4)),
        ])
    }

    fn complete_client_flow(o: &mut MemoryEngine, user: &str) {
        o.start(user, "client", "startup-founder", None).unwrap();
        o.complete_step(user, "client", "organization", org_output())
            .unwrap();
        o.complete_step(user, "client", "team", team_output(true))
            .unwrap();
        o.complete_step(user, "client", "hiring_intent", intent_output())
            .unwrap();
    }

    /// Three-stage linear flow: `a` collects a boolean `flag`, `b` needs
    /// the flag truthy, `c` needs `b` completed.
    fn mini_taxonomy(b_kind: StageKind) -> Taxonomy {
        let stage = |id: &str, order: u32, kind: StageKind, prev: Option<&str>, next: Option<&str>| {
            StageDefinition {
                id: id.into(),
                name: id.into(),
                description: None,
                category_id: "c1".into(),
                level_id: None,
                sort_order: order,
                kind,
                requirements: vec![],
                form_fields: vec![],
                prev: prev.map(str::to_string),
                next: next.map(str::to_string),
                active: true,
            }
        };
        let mut a = stage("a", 1, StageKind::Required, None, Some("b"));
        a.form_fields.push(FormField {
            name: "flag".into(),
            label: "Flag".into(),
            kind: FieldKind::Boolean,
            required: true,
            options: vec![],
        });
        let mut b = stage("b", 2, b_kind, Some("a"), Some("c"));
        b.requirements.push(Requirement::FieldTruthy {
            field: "flag".into(),
        });
        let mut c = stage("c", 3, StageKind::Required, Some("b"), None);
        c.requirements.push(Requirement::StageComplete { stage: "b".into() });
        Taxonomy {
            version: 1,
            roles: vec![Role {
                id: "r1".into(),
                name: "R1".into(),
                description: None,
                button_label: None,
                icon: None,
                active: true,
                sort_order: 1,
            }],
            categories: vec![RoleCategory {
                id: "c1".into(),
                name: "C1".into(),
                description: None,
                role_id: "r1".into(),
                active: true,
                sort_order: 1,
                metadata: Default::default(),
            }],
            levels: vec![],
            stages: vec![a, b, c],
        }
    }

    // -- start ---------------------------------------------------------------

    #[test]
    fn start_creates_record_at_step_one() {
        let mut o = engine();
        let p = o.start("alice", "client", "startup-founder", None).unwrap();
        assert_eq!(p.current_step, 1);
        assert_eq!(p.total_steps, 3);
        assert_eq!(p.status, ProgressStatus::InProgress);
        assert_eq!(p.flow, "client/startup-founder");
        assert!(p.completed.is_empty());
    }

    #[test]
    fn start_requires_level_for_leveled_category() {
        let mut o = engine();
        let err = o
            .start("alice", "developer", "full-stack-developer", None)
            .unwrap_err();
        assert!(matches!(err, OnboardError::InvalidSelection(_)), "{err}");
    }

    #[test]
    fn start_rejects_level_on_level_independent_category() {
        let mut o = engine();
        let err = o
            .start("alice", "client", "startup-founder", Some("mid-level"))
            .unwrap_err();
        assert!(matches!(err, OnboardError::InvalidSelection(_)), "{err}");
    }

    #[test]
    fn start_rejects_category_of_another_role() {
        let mut o = engine();
        let err = o
            .start("alice", "client", "full-stack-developer", Some("mid-level"))
            .unwrap_err();
        assert!(matches!(err, OnboardError::InvalidSelection(_)), "{err}");
    }

    #[test]
    fn start_unknown_role_is_not_found() {
        let mut o = engine();
        let err = o.start("alice", "astronaut", "startup-founder", None).unwrap_err();
        assert!(matches!(err, OnboardError::RoleNotFound(_)));
    }

    #[test]
    fn start_again_resets_position() {
        let mut o = engine();
        o.start("alice", "client", "startup-founder", None).unwrap();
        o.complete_step("alice", "client", "organization", org_output())
            .unwrap();
        let p = o.start("alice", "client", "startup-founder", None).unwrap();
        assert_eq!(p.current_step, 1);
        assert!(p.completed.is_empty());
    }

    #[test]
    fn start_rejects_bad_user_slug() {
        let mut o = engine();
        let err = o
            .start("../escape", "client", "startup-founder", None)
            .unwrap_err();
        assert!(matches!(err, OnboardError::InvalidSlug(_)));
    }

    // -- complete_step -------------------------------------------------------

    #[test]
    fn complete_advances_and_records_output() {
        let mut o = engine();
        o.start("alice", "client", "startup-founder", None).unwrap();
        let p = o
            .complete_step("alice", "client", "organization", org_output())
            .unwrap();
        assert_eq!(p.current_step, 2);
        assert!(p.completed.contains("organization"));
        let stored = o
            .profiles
            .step_data("alice", "client", "organization")
            .unwrap()
            .unwrap();
        assert_eq!(stored.get("org_name"), Some(&json!("Acme")));
    }

    #[test]
    fn complete_out_of_order_rejected() {
        let mut o = engine();
        o.start("alice", "client", "startup-founder", None).unwrap();
        let err = o
            .complete_step("alice", "client", "team", team_output(true))
            .unwrap_err();
        assert!(matches!(err, OnboardError::InvalidSelection(_)), "{err}");
    }

    #[test]
    fn complete_unknown_step_not_found() {
        let mut o = engine();
        o.start("alice", "client", "startup-founder", None).unwrap();
        let err = o
            .complete_step("alice", "client", "onboarding_quiz", Map::new())
            .unwrap_err();
        assert!(matches!(err, OnboardError::StageNotFound(_)));
    }

    #[test]
    fn complete_without_progress_not_found() {
        let mut o = engine();
        let err = o
            .complete_step("ghost", "client", "organization", org_output())
            .unwrap_err();
        assert!(matches!(err, OnboardError::ProgressNotFound { .. }));
    }

    #[test]
    fn missing_required_field_rejected() {
        let mut o = engine();
        o.start("alice", "client", "startup-founder", None).unwrap();
        let err = o
            .complete_step(
                "alice",
                "client",
                "organization",
                output(&[("org_size", json!("1-10"))]),
            )
            .unwrap_err();
        match err {
            OnboardError::PrerequisiteNotMet { stage, condition } => {
                assert_eq!(stage, "organization");
                assert!(condition.contains("org_name"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unmet_requirement_rejected_and_state_untouched() {
        let mut o = engine();
        o.start("alice", "client", "startup-founder", None).unwrap();
        o.complete_step("alice", "client", "organization", org_output())
            .unwrap();
        o.complete_step("alice", "client", "team", team_output(false))
            .unwrap();

        let err = o
            .complete_step("alice", "client", "hiring_intent", intent_output())
            .unwrap_err();
        match &err {
            OnboardError::PrerequisiteNotMet { stage, condition } => {
                assert_eq!(stage, "hiring_intent");
                assert!(condition.contains("actively_hiring"), "{condition}");
            }
            other => panic!("unexpected error: {other}"),
        }

        // The failed attempt left no trace.
        let view = o.snapshot("alice", "client").unwrap();
        let p = view.progress.unwrap();
        assert_eq!(p.current_step, 3);
        assert_eq!(p.completed.len(), 2);
        assert!(o
            .profiles
            .step_data("alice", "client", "hiring_intent")
            .unwrap()
            .is_none());
    }

    #[test]
    fn full_flow_reaches_terminal_state() {
        let mut o = engine();
        complete_client_flow(&mut o, "alice");
        let view = o.snapshot("alice", "client").unwrap();
        assert_eq!(view.status, ProgressStatus::Completed);
        let p = view.progress.unwrap();
        assert_eq!(p.current_step, p.total_steps + 1);
        assert!(view.current_stage.is_none());
        assert!(p
            .history
            .iter()
            .any(|e| e.action == ProgressAction::FlowCompleted));
    }

    #[test]
    fn five_step_leveled_flow_reaches_terminal_state() {
        let mut o = engine();
        let p = o
            .start("ada", "developer", "full-stack-developer", Some("mid-level"))
            .unwrap();
        assert_eq!(p.current_step, 1);
        assert_eq!(p.total_steps, 5);

        o.complete_step("ada", "developer", "account_setup", account_output())
            .unwrap();
        o.complete_step("ada", "developer", "hard_skills", skills_output())
            .unwrap();
        o.complete_step(
            "ada",
            "developer",
            "soft_skills_portfolio",
            output(&[("portfolio_url", json!("https://ada.dev"))]),
        )
        .unwrap();
        // Needs hard_skills done and a skills answer in the profile.
        o.complete_step(
            "ada",
            "developer",
            "assessments",
            output(&[("assessment_slot", json!("morning"))]),
        )
        .unwrap();
        let p = o
            .complete_step(
                "ada",
                "developer",
                "work_preferences",
                output(&[
                    ("hourly_rate", json!(90)),
                    ("availability", json!("contract")),
                ]),
            )
            .unwrap();
        assert_eq!(p.status, ProgressStatus::Completed);
        assert_eq!(p.current_step, 6);
        assert_eq!(p.completed.len(), 5);
    }

    #[test]
    fn duplicate_submission_is_a_noop() {
        let mut o = engine();
        o.start("alice", "client", "startup-founder", None).unwrap();
        let first = o
            .complete_step("alice", "client", "organization", org_output())
            .unwrap();
        // Double-submit of a step that is no longer current, same payload.
        let second = o
            .complete_step("alice", "client", "organization", org_output())
            .unwrap();
        assert_eq!(second.current_step, first.current_step);
        assert_eq!(second.completed, first.completed);
        assert_eq!(second.history.len(), first.history.len());
    }

    #[test]
    fn resubmitting_current_completed_step_moves_forward() {
        let mut o = engine();
        o.start("alice", "client", "startup-founder", None).unwrap();
        o.complete_step("alice", "client", "organization", org_output())
            .unwrap();
        o.previous_step("alice", "client").unwrap();
        // Back on step 1, which is already completed. Same payload walks
        // forward without rewriting anything.
        let p = o
            .complete_step("alice", "client", "organization", org_output())
            .unwrap();
        assert_eq!(p.current_step, 2);
        assert_eq!(p.completed.len(), 1);
    }

    // -- corrections and cascading invalidation ------------------------------

    #[test]
    fn correction_without_dependents_keeps_position() {
        let mut o = engine();
        complete_client_flow(&mut o, "alice");
        // org_name feeds no requirement downstream.
        let mut corrected = org_output();
        corrected.insert("org_name".into(), json!("Acme Rebranded"));
        let p = o
            .complete_step("alice", "client", "organization", corrected)
            .unwrap();
        assert_eq!(p.status, ProgressStatus::Completed);
        assert_eq!(p.current_step, p.total_steps + 1);
        assert_eq!(p.completed.len(), 3);
        let stored = o
            .profiles
            .step_data("alice", "client", "organization")
            .unwrap()
            .unwrap();
        assert_eq!(stored.get("org_name"), Some(&json!("Acme Rebranded")));
    }

    #[test]
    fn correction_cascades_and_rewinds() {
        let mut o = engine();
        complete_client_flow(&mut o, "alice");
        // Flip the field hiring_intent depends on.
        let p = o
            .complete_step("alice", "client", "team", team_output(false))
            .unwrap();
        assert_eq!(p.status, ProgressStatus::InProgress);
        assert_eq!(p.current_step, 3);
        assert!(!p.completed.contains("hiring_intent"));
        assert!(p.completed.contains("organization"));
        assert!(p.completed.contains("team"));
        assert!(p
            .history
            .iter()
            .any(|e| e.action == ProgressAction::StageEvicted
                && e.stage_id.as_deref() == Some("hiring_intent")));
        // Evicted stage keeps its profile slice for prefilling.
        assert!(o
            .profiles
            .step_data("alice", "client", "hiring_intent")
            .unwrap()
            .is_some());
    }

    #[test]
    fn eviction_propagates_through_stage_dependencies() {
        let mut o = engine_with(mini_taxonomy(StageKind::Required));
        o.start("u", "r1", "c1", None).unwrap();
        o.complete_step("u", "r1", "a", output(&[("flag", json!(true))]))
            .unwrap();
        o.complete_step("u", "r1", "b", Map::new()).unwrap();
        o.complete_step("u", "r1", "c", Map::new()).unwrap();

        // Correcting a breaks b (field), which breaks c (stage).
        let p = o
            .complete_step("u", "r1", "a", output(&[("flag", json!(false))]))
            .unwrap();
        assert_eq!(p.completed.iter().collect::<Vec<_>>(), vec!["a"]);
        assert_eq!(p.current_step, 2, "rewinds to earliest evicted stage");
        assert_eq!(p.status, ProgressStatus::InProgress);
    }

    #[test]
    fn recompletion_after_cascade_restores_terminal_state() {
        let mut o = engine();
        complete_client_flow(&mut o, "alice");
        o.complete_step("alice", "client", "team", team_output(false))
            .unwrap();
        // Fix the field again and redo the evicted stage.
        o.complete_step("alice", "client", "team", team_output(true))
            .unwrap();
        let p = o
            .complete_step("alice", "client", "hiring_intent", intent_output())
            .unwrap();
        assert_eq!(p.status, ProgressStatus::Completed);
    }

    // -- previous_step -------------------------------------------------------

    #[test]
    fn previous_step_noop_at_first_step() {
        let mut o = engine();
        o.start("alice", "client", "startup-founder", None).unwrap();
        let p = o.previous_step("alice", "client").unwrap();
        assert_eq!(p.current_step, 1);
    }

    #[test]
    fn previous_step_reopens_completed_flow() {
        let mut o = engine();
        complete_client_flow(&mut o, "alice");
        let p = o.previous_step("alice", "client").unwrap();
        assert_eq!(p.current_step, 3);
        assert_eq!(p.status, ProgressStatus::InProgress);
        // Completion is re-established by walking forward again.
        let p = o
            .complete_step("alice", "client", "hiring_intent", intent_output())
            .unwrap();
        assert_eq!(p.status, ProgressStatus::Completed);
    }

    // -- skip_step -----------------------------------------------------------

    #[test]
    fn optional_stage_can_be_skipped() {
        let mut o = engine();
        o.start("dev", "developer", "full-stack-developer", Some("junior"))
            .unwrap();
        o.complete_step("dev", "developer", "account_setup", account_output())
            .unwrap();
        o.complete_step("dev", "developer", "hard_skills", skills_output())
            .unwrap();
        let p = o.skip_step("dev", "developer").unwrap();
        assert_eq!(p.current_step, 4);
        assert!(!p.completed.contains("soft_skills_portfolio"));
        assert!(p
            .history
            .iter()
            .any(|e| e.action == ProgressAction::StepSkipped));
    }

    #[test]
    fn required_stage_cannot_be_skipped() {
        let mut o = engine();
        o.start("alice", "client", "startup-founder", None).unwrap();
        let err = o.skip_step("alice", "client").unwrap_err();
        assert!(matches!(err, OnboardError::PrerequisiteNotMet { .. }));
    }

    #[test]
    fn conditional_stage_skippable_only_while_unmet() {
        let mut o = engine_with(mini_taxonomy(StageKind::Conditional));
        o.start("u", "r1", "c1", None).unwrap();
        o.complete_step("u", "r1", "a", output(&[("flag", json!(false))]))
            .unwrap();
        // flag is falsy, so b does not apply and may be skipped.
        let p = o.skip_step("u", "r1").unwrap();
        assert_eq!(p.current_step, 3);

        let mut o = engine_with(mini_taxonomy(StageKind::Conditional));
        o.start("u", "r1", "c1", None).unwrap();
        o.complete_step("u", "r1", "a", output(&[("flag", json!(true))]))
            .unwrap();
        let err = o.skip_step("u", "r1").unwrap_err();
        assert!(matches!(err, OnboardError::PrerequisiteNotMet { .. }), "{err}");
    }

    #[test]
    fn completing_conditional_stage_needs_requirements() {
        let mut o = engine_with(mini_taxonomy(StageKind::Conditional));
        o.start("u", "r1", "c1", None).unwrap();
        o.complete_step("u", "r1", "a", output(&[("flag", json!(false))]))
            .unwrap();
        let err = o.complete_step("u", "r1", "b", Map::new()).unwrap_err();
        assert!(matches!(err, OnboardError::PrerequisiteNotMet { .. }));
    }

    #[test]
    fn skipping_last_optional_stage_completes_flow() {
        let mut o = engine();
        o.start("dev", "developer", "full-stack-developer", Some("junior"))
            .unwrap();
        o.complete_step("dev", "developer", "account_setup", account_output())
            .unwrap();
        o.complete_step("dev", "developer", "hard_skills", skills_output())
            .unwrap();
        o.skip_step("dev", "developer").unwrap();
        let p = o
            .complete_step(
                "dev",
                "developer",
                "work_preferences",
                output(&[
                    ("hourly_rate", json!(60)),
                    ("availability", json!("contract")),
                ]),
            )
            .unwrap();
        assert_eq!(p.status, ProgressStatus::Completed);
        // The skipped optional stage never entered the completed set.
        assert!(!p.completed.contains("soft_skills_portfolio"));
    }

    #[test]
    fn skipping_last_stage_fails_when_required_stage_missing() {
        let dir = tempfile::TempDir::new().unwrap();
        Config::new("demo").save(dir.path()).unwrap();
        let mut taxonomy = mini_taxonomy(StageKind::Optional);
        for s in taxonomy.stages.iter_mut() {
            s.kind = StageKind::Optional;
            s.requirements.clear();
        }
        taxonomy.save(dir.path()).unwrap();

        let mut o = Orchestrator::open(dir.path()).unwrap();
        o.start("u", "r1", "c1", None).unwrap();
        o.skip_step("u", "r1").unwrap();
        o.skip_step("u", "r1").unwrap();

        // Retag stage a as required behind the record's back. The step
        // count is unchanged, so the record still resolves.
        let mut taxonomy = Taxonomy::load(dir.path()).unwrap();
        for s in taxonomy.stages.iter_mut().filter(|s| s.id == "a") {
            s.kind = StageKind::Required;
        }
        taxonomy.save(dir.path()).unwrap();

        let mut o = Orchestrator::open(dir.path()).unwrap();
        let err = o.skip_step("u", "r1").unwrap_err();
        assert!(
            matches!(&err, OnboardError::PrerequisiteNotMet { stage, .. } if stage == "a"),
            "{err}"
        );
        // The failed skip left nothing behind.
        let p = Orchestrator::open(dir.path())
            .unwrap()
            .snapshot("u", "r1")
            .unwrap()
            .progress
            .unwrap();
        assert_eq!(p.current_step, 3);
        assert_eq!(p.status, ProgressStatus::InProgress);
    }

    #[test]
    fn skip_after_completion_rejected() {
        let mut o = engine();
        complete_client_flow(&mut o, "alice");
        let err = o.skip_step("alice", "client").unwrap_err();
        assert!(matches!(err, OnboardError::InvalidSelection(_)));
    }

    // -- reset ---------------------------------------------------------------

    #[test]
    fn reset_clears_position_but_keeps_profile() {
        let mut o = engine();
        complete_client_flow(&mut o, "alice");
        let p = o.reset("alice", "client").unwrap();
        assert_eq!(p.current_step, 1);
        assert_eq!(p.status, ProgressStatus::InProgress);
        assert!(p.completed.is_empty());
        assert!(p.history.iter().any(|e| e.action == ProgressAction::Reset));
        // Collected data survives for prefilling.
        assert!(o
            .profiles
            .step_data("alice", "client", "organization")
            .unwrap()
            .is_some());
    }

    // -- snapshot ------------------------------------------------------------

    #[test]
    fn snapshot_before_start_reports_not_started() {
        let o = engine();
        let view = o.snapshot("nobody", "client").unwrap();
        assert_eq!(view.status, ProgressStatus::NotStarted);
        assert!(view.progress.is_none());
        assert!(view.current_stage.is_none());
    }

    #[test]
    fn snapshot_reports_current_stage_definition() {
        let mut o = engine();
        o.start("alice", "client", "startup-founder", None).unwrap();
        o.complete_step("alice", "client", "organization", org_output())
            .unwrap();
        let view = o.snapshot("alice", "client").unwrap();
        let stage = view.current_stage.unwrap();
        assert_eq!(stage.id, "team");
        assert!(!stage.form_fields.is_empty());
    }

    // -- configuration and drift ----------------------------------------------

    #[test]
    fn history_limit_is_applied() {
        let mut o = Orchestrator::new(
            starter().unwrap(),
            MemoryProgressStore::new(),
            MemoryProfileStore::new(),
        )
        .with_history_limit(2);
        complete_client_flow(&mut o, "alice");
        let view = o.snapshot("alice", "client").unwrap();
        assert_eq!(view.progress.unwrap().history.len(), 2);
    }

    #[test]
    fn taxonomy_drift_is_detected() {
        let dir = tempfile::TempDir::new().unwrap();
        Config::new("demo").save(dir.path()).unwrap();
        starter().unwrap().save(dir.path()).unwrap();

        let mut o = Orchestrator::open(dir.path()).unwrap();
        o.start("alice", "client", "startup-founder", None).unwrap();
        o.complete_step("alice", "client", "organization", org_output())
            .unwrap();

        // Shrink the flow behind the record's back.
        let mut taxonomy = Taxonomy::load(dir.path()).unwrap();
        taxonomy.stages.retain(|s| s.id != "hiring_intent");
        for s in taxonomy.stages.iter_mut().filter(|s| s.id == "team") {
            s.next = None;
        }
        taxonomy.save(dir.path()).unwrap();

        let mut o = Orchestrator::open(dir.path()).unwrap();
        let err = o
            .complete_step("alice", "client", "team", team_output(true))
            .unwrap_err();
        assert!(matches!(err, OnboardError::Storage(_)), "{err}");
    }

    #[test]
    fn changed_fields_diffs_both_directions() {
        let old = output(&[("a", json!(1)), ("b", json!(2))]);
        let new = output(&[("a", json!(1)), ("c", json!(3))]);
        let changed = changed_fields(Some(&old), &new);
        assert_eq!(
            changed.iter().collect::<Vec<_>>(),
            vec!["b", "c"],
            "removed and added keys both count"
        );
        assert!(changed_fields(Some(&old), &old).is_empty());
    }
}
