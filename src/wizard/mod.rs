//! Registration wizard: a multi-step onboarding flow that branches on the
//! chosen account category.
//!
//! The controller validates each step, merges answers into per-step
//! namespaces, persists progress after every change so a returning user
//! resumes mid-flow, and finally commits one record to the account service.

pub mod branch;
pub mod commit;
pub mod controller;
pub mod model;
pub mod persistence;
pub mod routes;
pub mod state;
pub mod validate;

pub use branch::{StepDefinition, resolve};
pub use commit::{
    AccountService, Completion, FinalizationCommitter, HttpAccountService, RegisteredAccount,
};
pub use controller::{
    Abandonment, RenderContext, StepOutcome, WizardController, WizardEvent, WizardView,
};
pub use model::{Category, Destination, FinalRecord, Identity, RecordStatus, StepData, WizardData};
pub use persistence::{JsonFileStore, MemoryStore, PersistenceAdapter};
pub use routes::{WizardRouteState, wizard_routes};
pub use state::{PersistedProgress, WizardPhase, WizardState};
