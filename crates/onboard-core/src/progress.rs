use crate::types::ProgressStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// History entries kept per progress record unless configured otherwise.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

// ---------------------------------------------------------------------------
// StepEvent
// ---------------------------------------------------------------------------

/// What happened to a progress record, kept as a capped audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressAction {
    Started,
    StepCompleted,
    StepCorrected,
    StepSkipped,
    StageEvicted,
    FlowCompleted,
    Reset,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepEvent {
    pub action: ProgressAction,
    pub step: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_id: Option<String>,
    pub at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// OnboardingProgress
// ---------------------------------------------------------------------------

/// One user's position in one role's onboarding flow. The record itself is
/// dumb data; every transition goes through the orchestrator.
///
/// `current_step` is 1-based. The terminal position `total_steps + 1` means
/// the flow has been finished, and is the only position at which `status`
/// is `completed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnboardingProgress {
    pub user_id: String,
    pub role_id: String,
    pub category_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level_id: Option<String>,
    /// Display name of the resolved flow, e.g. "client/startup-founder".
    pub flow: String,
    pub current_step: u32,
    pub total_steps: u32,
    #[serde(default)]
    pub completed: BTreeSet<String>,
    pub status: ProgressStatus,
    pub last_activity: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<StepEvent>,
}

impl OnboardingProgress {
    /// Fresh record positioned at step 1.
    pub fn start(
        user_id: &str,
        role_id: &str,
        category_id: &str,
        level_id: Option<String>,
        flow: String,
        total_steps: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.to_string(),
            role_id: role_id.to_string(),
            category_id: category_id.to_string(),
            level_id,
            flow,
            current_step: 1,
            total_steps,
            completed: BTreeSet::new(),
            status: ProgressStatus::InProgress,
            last_activity: now,
            history: vec![StepEvent {
                action: ProgressAction::Started,
                step: 1,
                stage_id: None,
                at: now,
            }],
        }
    }

    /// Index one past the last step.
    pub fn terminal_index(&self) -> u32 {
        self.total_steps + 1
    }

    pub fn is_completed(&self) -> bool {
        self.status == ProgressStatus::Completed
    }

    /// Append a history event, trim to `limit`, and touch `last_activity`.
    pub fn record(
        &mut self,
        action: ProgressAction,
        step: u32,
        stage_id: Option<&str>,
        limit: usize,
    ) {
        self.history.push(StepEvent {
            action,
            step,
            stage_id: stage_id.map(str::to_string),
            at: Utc::now(),
        });
        let len = self.history.len();
        if len > limit {
            self.history.drain(0..len - limit);
        }
        self.touch();
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
