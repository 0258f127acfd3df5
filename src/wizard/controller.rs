//! WizardController: owns wizard state and drives step transitions,
//! validation, persistence, and finalization.
//!
//! State lives behind a `RwLock`. The lock is never held across the call to
//! the account service; `submitting` is what keeps other transitions out
//! while a commit is in flight. Commits run on their own task so a dropped
//! request still settles `submitting` and the phase.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::commit::{Completion, Credentials, FinalizationCommitter, RegisteredAccount};
use super::model::{Category, FinalRecord, StepData, fields, step_ids};
use super::persistence::PersistenceAdapter;
use super::state::{PersistedProgress, WizardPhase, WizardState};
use crate::error::{Error, FinalizationError, WizardError};

/// Messages from a step's render collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WizardEvent {
    StepCompleted { step_id: String, data: StepData },
    BackRequested,
}

/// Result of a successful `complete_step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    /// Index after the transition.
    pub step_index: usize,
    /// The completed step was the last one; `finalize` may be called.
    pub ready_to_finalize: bool,
}

/// Result of explicit abandonment.
#[derive(Debug, Clone, Serialize)]
pub struct Abandonment {
    /// Whatever could be assembled, always marked incomplete. `None` when no
    /// category had been chosen.
    pub record: Option<FinalRecord>,
    /// Set when the incomplete record was accepted by the account service.
    pub account: Option<RegisteredAccount>,
    /// Why the incomplete record was not committed, if it wasn't.
    pub commit_error: Option<String>,
}

/// What the render collaborator for the current step receives.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderContext {
    pub step_id: &'static str,
    pub title: &'static str,
    pub render_slot: &'static str,
    pub data: StepData,
    pub category: Option<Category>,
}

/// Read-only view of the wizard for the host UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WizardView {
    pub flow_id: Uuid,
    pub phase: WizardPhase,
    pub step_index: usize,
    pub total_steps: usize,
    pub steps: Vec<&'static str>,
    pub current: Option<RenderContext>,
    pub category: Option<Category>,
    pub submitting: bool,
    pub ready_to_finalize: bool,
}

pub struct WizardController {
    store: Arc<dyn PersistenceAdapter>,
    committer: Arc<FinalizationCommitter>,
    state: Arc<RwLock<WizardState>>,
    mounted: AtomicBool,
}

impl WizardController {
    pub fn new(store: Arc<dyn PersistenceAdapter>, committer: FinalizationCommitter) -> Self {
        Self {
            store,
            committer: Arc::new(committer),
            state: Arc::new(RwLock::new(WizardState::default())),
            mounted: AtomicBool::new(false),
        }
    }

    /// Load stored progress (once per controller) and start from it.
    pub async fn mount(&self) -> Result<WizardView, WizardError> {
        if self.mounted.swap(true, Ordering::SeqCst) {
            debug!("Wizard already mounted; keeping current state");
            return Ok(self.view().await);
        }
        let resumed = self.load_progress();
        self.start(resumed).await?;
        Ok(self.view().await)
    }

    /// Initialize state from `resumed`, or fresh defaults.
    ///
    /// Corrupt progress is discarded and the flow starts over. An unknown
    /// category fails closed: state is left unstarted and only `restart`
    /// recovers.
    pub async fn start(&self, resumed: Option<PersistedProgress>) -> Result<(), WizardError> {
        let mut state = self.state.write().await;
        if state.submitting {
            return Err(WizardError::Submitting);
        }

        let next = match resumed.map(WizardState::from_progress) {
            None => WizardState::fresh(),
            Some(Ok(restored)) => {
                info!(
                    flow_id = %restored.flow_id,
                    step = restored.current_step_index,
                    category = ?restored.category,
                    "Resuming onboarding from saved progress"
                );
                restored
            }
            Some(Err(Error::Config(e))) => {
                warn!(error = %e, "Saved onboarding progress has an invalid category");
                *state = WizardState::default();
                return Err(WizardError::Configuration(e));
            }
            Some(Err(e)) => {
                warn!(error = %e, "Discarding unusable onboarding progress");
                clear_progress(self.store.as_ref());
                WizardState::fresh()
            }
        };
        *state = next;
        Ok(())
    }

    /// Drop all progress and begin again at the category step.
    pub async fn restart(&self) -> Result<WizardView, WizardError> {
        {
            let mut state = self.state.write().await;
            if state.submitting {
                return Err(WizardError::Submitting);
            }
            clear_progress(self.store.as_ref());
            *state = WizardState::fresh();
            info!(flow_id = %state.flow_id, "Onboarding restarted");
        }
        Ok(self.view().await)
    }

    /// Apply an event from a render collaborator.
    pub async fn dispatch(&self, event: WizardEvent) -> Result<WizardView, WizardError> {
        match event {
            WizardEvent::StepCompleted { step_id, data } => {
                self.complete_step(&step_id, data).await?;
            }
            WizardEvent::BackRequested => {
                self.go_back().await?;
            }
        }
        Ok(self.view().await)
    }

    /// Validate and merge `partial` into the current step's namespace, then
    /// advance unless the step is the last one.
    pub async fn complete_step(
        &self,
        step_id: &str,
        partial: StepData,
    ) -> Result<StepOutcome, WizardError> {
        let mut state = self.state.write().await;
        ensure_transitionable(&state)?;

        let step = state.current_step().ok_or(WizardError::NotStarted)?;
        if step.id != step_id {
            return Err(WizardError::StepMismatch {
                expected: step.id.to_string(),
                received: step_id.to_string(),
            });
        }

        let mut merged = state
            .accumulated_data
            .get(step_id)
            .cloned()
            .unwrap_or_default();
        merged.extend(partial);

        if let Err(e) = step.validate(&merged) {
            debug!(step = step_id, error = %e, "Step validation failed");
            return Err(e.into());
        }

        if step_id == step_ids::CATEGORY {
            let chosen = category_of(&merged)?;
            match state.category {
                Some(current) if current != chosen => {
                    return Err(WizardError::CategoryLocked {
                        current: current.to_string(),
                        requested: chosen.to_string(),
                    });
                }
                Some(_) => {}
                None => {
                    info!(flow_id = %state.flow_id, category = %chosen, "Step sequence resolved");
                    state.category = Some(chosen);
                }
            }
        }

        state.accumulated_data.insert(step_id.to_string(), merged);

        let ready_to_finalize = state.is_last_step();
        if !ready_to_finalize {
            state.current_step_index += 1;
        }
        self.persist(&state);

        info!(
            flow_id = %state.flow_id,
            step = step_id,
            next_index = state.current_step_index,
            "Step completed"
        );

        Ok(StepOutcome {
            step_index: state.current_step_index,
            ready_to_finalize,
        })
    }

    /// Move back one step, keeping every namespace intact. No-op at step 0.
    pub async fn go_back(&self) -> Result<usize, WizardError> {
        let mut state = self.state.write().await;
        ensure_transitionable(&state)?;

        if state.current_step_index == 0 {
            debug!("Back requested at first step; ignoring");
            return Ok(0);
        }
        state.current_step_index -= 1;
        self.persist(&state);
        debug!(flow_id = %state.flow_id, step = state.current_step_index, "Moved back");
        Ok(state.current_step_index)
    }

    /// Commit the validated record to the account service.
    ///
    /// On failure the accumulated data and stored progress are untouched
    /// and `finalize` may be called again.
    pub async fn finalize(&self) -> Result<Completion, WizardError> {
        let (record, credentials, flow_id) = {
            let mut state = self.state.write().await;
            ensure_can_enter(&state, WizardPhase::Completed)?;

            let category = match state.category {
                Some(category) if state.is_last_step() => category,
                _ => {
                    return Err(WizardError::NotAtTerminalStep {
                        step_index: state.current_step_index,
                        last_index: state.last_index(),
                    });
                }
            };
            if let Some(invalid) = state.first_invalid_step() {
                return Err(invalid.into());
            }
            let credentials = Credentials::from_data(&state.accumulated_data)?;
            let record = FinalRecord::assemble(category, &state.accumulated_data, Vec::new());

            state.submitting = true;
            (record, credentials, state.flow_id)
        };

        info!(flow_id = %flow_id, "Submitting onboarding record");
        let committer = Arc::clone(&self.committer);
        let shared = Arc::clone(&self.state);
        let task = tokio::spawn(async move {
            let result = committer.commit(record, &credentials).await;

            let mut state = shared.write().await;
            state.submitting = false;
            match result {
                Ok(completion) => {
                    *state = WizardState::ended(flow_id, WizardPhase::Completed);
                    info!(
                        flow_id = %flow_id,
                        destination = %completion.destination,
                        "Onboarding completed"
                    );
                    Ok(completion)
                }
                Err(e) => {
                    warn!(flow_id = %flow_id, error = %e, "Onboarding commit failed");
                    Err(e.into())
                }
            }
        });
        self.join_commit(flow_id, task).await
    }

    /// Leave the flow without validation.
    ///
    /// Whatever has been accumulated is committed as an incomplete record
    /// when credentials exist. Progress is cleared regardless of the commit
    /// outcome.
    pub async fn abandon(&self) -> Result<Abandonment, WizardError> {
        let (prepared, flow_id) = {
            let mut state = self.state.write().await;
            ensure_can_enter(&state, WizardPhase::Aborted)?;

            let prepared = state.category.map(|category| {
                let missing = state.missing_steps();
                let record = FinalRecord::assemble(category, &state.accumulated_data, missing);
                let credentials = Credentials::from_data(&state.accumulated_data);
                (record, credentials)
            });
            state.submitting = true;
            (prepared, state.flow_id)
        };

        let committer = Arc::clone(&self.committer);
        let store = Arc::clone(&self.store);
        let shared = Arc::clone(&self.state);
        let task = tokio::spawn(async move {
            let outcome = match prepared {
                None => Abandonment {
                    record: None,
                    account: None,
                    commit_error: Some("No account type was chosen".to_string()),
                },
                Some((record, Err(e))) => Abandonment {
                    record: Some(record),
                    account: None,
                    commit_error: Some(e.user_message()),
                },
                Some((record, Ok(credentials))) => {
                    match committer.commit(record.clone(), &credentials).await {
                        Ok(completion) => Abandonment {
                            record: Some(record),
                            account: Some(completion.account),
                            commit_error: None,
                        },
                        Err(e) => Abandonment {
                            record: Some(record),
                            account: None,
                            commit_error: Some(e.user_message()),
                        },
                    }
                }
            };

            clear_progress(store.as_ref());
            let mut state = shared.write().await;
            *state = WizardState::ended(flow_id, WizardPhase::Aborted);

            warn!(
                flow_id = %flow_id,
                incomplete_record = outcome.record.is_some(),
                missing_steps = ?outcome.record.as_ref().map(|r| r.missing_steps.clone()),
                committed = outcome.account.is_some(),
                "Onboarding abandoned without validation"
            );
            Ok(outcome)
        });
        self.join_commit(flow_id, task).await
    }

    /// Render input for the current step.
    pub async fn render_context(&self) -> Option<RenderContext> {
        render_context_of(&*self.state.read().await)
    }

    pub async fn view(&self) -> WizardView {
        let state = self.state.read().await;
        let active = state.phase == WizardPhase::Active;
        WizardView {
            flow_id: state.flow_id,
            phase: state.phase,
            step_index: state.current_step_index,
            total_steps: if active { state.steps().len() } else { 0 },
            steps: if active {
                state.steps().iter().map(|s| s.id).collect()
            } else {
                Vec::new()
            },
            current: render_context_of(&state),
            category: state.category,
            submitting: state.submitting,
            ready_to_finalize: active
                && state.is_last_step()
                && state.first_invalid_step().is_none(),
        }
    }

    /// Clone of the current state.
    pub async fn snapshot(&self) -> WizardState {
        self.state.read().await.clone()
    }

    fn load_progress(&self) -> Option<PersistedProgress> {
        match self.store.load() {
            Ok(progress) => progress,
            Err(e) => {
                warn!(error = %e, "Failed to read onboarding progress; starting fresh");
                None
            }
        }
    }

    fn persist(&self, state: &WizardState) {
        if let Err(e) = self.store.save(&state.to_progress()) {
            warn!(flow_id = %state.flow_id, error = %e, "Failed to persist onboarding progress");
        }
    }

    /// Wait for a commit task. The task owns the `submitting` reset; this
    /// only steps in when the task itself died.
    async fn join_commit<T>(
        &self,
        flow_id: Uuid,
        task: JoinHandle<Result<T, WizardError>>,
    ) -> Result<T, WizardError> {
        match task.await {
            Ok(result) => result,
            Err(e) => {
                error!(flow_id = %flow_id, error = %e, "Commit task failed");
                self.state.write().await.submitting = false;
                Err(FinalizationError::Transport {
                    reason: format!("commit task failed: {e}"),
                }
                .into())
            }
        }
    }
}

fn clear_progress(store: &dyn PersistenceAdapter) {
    if let Err(e) = store.clear() {
        warn!(error = %e, "Failed to clear onboarding progress");
    }
}

fn ensure_transitionable(state: &WizardState) -> Result<(), WizardError> {
    if state.submitting {
        return Err(WizardError::Submitting);
    }
    if state.phase.is_terminal() {
        return Err(WizardError::Finished {
            phase: state.phase.to_string(),
        });
    }
    match state.phase {
        WizardPhase::Active => Ok(()),
        _ => Err(WizardError::NotStarted),
    }
}

/// Like `ensure_transitionable`, for moves that end the flow in `target`.
fn ensure_can_enter(state: &WizardState, target: WizardPhase) -> Result<(), WizardError> {
    ensure_transitionable(state)?;
    if state.phase.can_transition_to(target) {
        Ok(())
    } else {
        Err(WizardError::Finished {
            phase: state.phase.to_string(),
        })
    }
}

fn category_of(data: &StepData) -> Result<Category, WizardError> {
    let raw = data
        .get(fields::CATEGORY)
        .and_then(Value::as_str)
        .unwrap_or_default();
    raw.parse::<Category>().map_err(WizardError::Configuration)
}

fn render_context_of(state: &WizardState) -> Option<RenderContext> {
    if state.phase != WizardPhase::Active {
        return None;
    }
    let step = state.current_step()?;
    Some(RenderContext {
        step_id: step.id,
        title: step.title,
        render_slot: step.render_slot,
        data: state
            .accumulated_data
            .get(step.id)
            .cloned()
            .unwrap_or_default(),
        category: state.category,
    })
}
