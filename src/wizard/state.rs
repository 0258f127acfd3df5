//! Wizard state machine and the persisted progress snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::branch::{self, StepDefinition};
use super::model::{Category, WizardData, fields, step_ids};
use crate::error::{ConfigError, PersistenceError, Result, ValidationError};

/// Lifecycle of one wizard flow.
///
/// NotStarted → Active → Completed | Aborted. A restart returns any phase
/// to Active with fresh state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardPhase {
    NotStarted,
    Active,
    Completed,
    Aborted,
}

impl WizardPhase {
    pub fn can_transition_to(&self, target: WizardPhase) -> bool {
        use WizardPhase::*;
        matches!(
            (self, target),
            (NotStarted, Active) | (Active, Completed) | (Active, Aborted)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }
}

impl Default for WizardPhase {
    fn default() -> Self {
        Self::NotStarted
    }
}

impl std::fmt::Display for WizardPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NotStarted => "not_started",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
        };
        write!(f, "{s}")
    }
}

/// Snapshot written to durable storage after every successful mutation.
///
/// Serialized as `{"step": n, "data": {...}, "savedAt": ..., "flowId": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedProgress {
    pub step: usize,
    pub data: WizardData,
    #[serde(default = "Utc::now")]
    pub saved_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_id: Option<Uuid>,
}

impl PersistedProgress {
    pub fn new(step: usize, data: WizardData) -> Self {
        Self {
            step,
            data,
            saved_at: Utc::now(),
            flow_id: None,
        }
    }
}

/// In-memory state of the wizard. Only the controller mutates it.
#[derive(Debug, Clone, PartialEq)]
pub struct WizardState {
    pub flow_id: Uuid,
    pub phase: WizardPhase,
    pub current_step_index: usize,
    pub category: Option<Category>,
    pub accumulated_data: WizardData,
    pub submitting: bool,
}

impl Default for WizardState {
    fn default() -> Self {
        Self {
            flow_id: Uuid::new_v4(),
            phase: WizardPhase::NotStarted,
            current_step_index: 0,
            category: None,
            accumulated_data: WizardData::new(),
            submitting: false,
        }
    }
}

impl WizardState {
    /// Fresh active state at the category-selection step.
    pub fn fresh() -> Self {
        Self {
            phase: WizardPhase::Active,
            ..Self::default()
        }
    }

    /// Cleared state for a flow that has ended.
    pub fn ended(flow_id: Uuid, phase: WizardPhase) -> Self {
        Self {
            flow_id,
            phase,
            ..Self::default()
        }
    }

    /// Rebuild state from a persisted snapshot.
    ///
    /// The category (and therefore the sequence) is re-derived from the
    /// category namespace. An unknown category is a configuration error; an
    /// out-of-range step is reported as corrupt progress.
    pub fn from_progress(progress: PersistedProgress) -> Result<Self> {
        let category = match progress
            .data
            .get(step_ids::CATEGORY)
            .and_then(|ns| ns.get(fields::CATEGORY))
        {
            Some(value) => {
                let raw = value.as_str().ok_or_else(|| ConfigError::UnknownCategory {
                    value: value.to_string(),
                })?;
                Some(raw.parse::<Category>()?)
            }
            None => None,
        };

        let steps = sequence_for(category);
        if progress.step >= steps.len() {
            return Err(PersistenceError::Corrupt(format!(
                "step {} is outside a {}-step sequence",
                progress.step,
                steps.len()
            ))
            .into());
        }

        Ok(Self {
            flow_id: progress.flow_id.unwrap_or_else(Uuid::new_v4),
            phase: WizardPhase::Active,
            current_step_index: progress.step,
            category,
            accumulated_data: progress.data,
            submitting: false,
        })
    }

    pub fn to_progress(&self) -> PersistedProgress {
        PersistedProgress {
            step: self.current_step_index,
            data: self.accumulated_data.clone(),
            saved_at: Utc::now(),
            flow_id: Some(self.flow_id),
        }
    }

    /// The sequence in effect: resolved for the category, or just the
    /// selection step before one is chosen.
    pub fn steps(&self) -> &'static [StepDefinition] {
        sequence_for(self.category)
    }

    pub fn current_step(&self) -> Option<&'static StepDefinition> {
        self.steps().get(self.current_step_index)
    }

    pub fn last_index(&self) -> usize {
        self.steps().len().saturating_sub(1)
    }

    /// At the final step of a resolved sequence.
    pub fn is_last_step(&self) -> bool {
        self.category.is_some() && self.current_step_index == self.last_index()
    }

    /// First step of the sequence whose accumulated data does not validate.
    pub fn first_invalid_step(&self) -> Option<ValidationError> {
        self.steps().iter().find_map(|step| {
            let data = self
                .accumulated_data
                .get(step.id)
                .cloned()
                .unwrap_or_default();
            step.validate(&data).err()
        })
    }

    /// Ids of every step whose accumulated data does not validate.
    pub fn missing_steps(&self) -> Vec<String> {
        self.steps()
            .iter()
            .filter(|step| {
                let data = self
                    .accumulated_data
                    .get(step.id)
                    .cloned()
                    .unwrap_or_default();
                step.validate(&data).is_err()
            })
            .map(|step| step.id.to_string())
            .collect()
    }
}

fn sequence_for(category: Option<Category>) -> &'static [StepDefinition] {
    match category {
        Some(category) => branch::resolve(category),
        None => branch::unresolved(),
    }
}
