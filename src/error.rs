//! Error types for the onboarding wizard.

use std::time::Duration;

use serde::Serialize;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Finalization error: {0}")]
    Finalization(#[from] FinalizationError),

    #[error("Wizard error: {0}")]
    Wizard(#[from] WizardError),
}

/// Configuration-related errors.
///
/// An unrecognized category is treated as a configuration error: the flow
/// cannot continue and only a restart is offered.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Unrecognized account category: {value:?}")]
    UnknownCategory { value: String },
}

/// Durable storage errors. Never fatal; callers log and continue.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Stored progress is corrupt: {0}")]
    Corrupt(String),
}

/// Errors raised while committing the final record to the account service.
#[derive(Debug, thiserror::Error)]
pub enum FinalizationError {
    #[error("{message}")]
    Rejected { message: String },

    #[error("Account service unreachable: {reason}")]
    Transport { reason: String },

    #[error("Account service did not respond within {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("Missing credentials: {0}")]
    MissingCredentials(String),
}

impl FinalizationError {
    /// Message suitable for a user-facing banner.
    pub fn user_message(&self) -> String {
        match self {
            Self::Rejected { message } => message.clone(),
            Self::Transport { .. } => {
                "We couldn't reach the account service. Please try again.".to_string()
            }
            Self::Timeout { .. } => {
                "Creating your account is taking too long. Please try again.".to_string()
            }
            Self::MissingCredentials(field) => {
                format!("Please provide your {field} before continuing.")
            }
        }
    }
}

/// A single unmet requirement on one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldFailure {
    pub field: String,
    pub message: String,
}

/// Validation failure for one step. Carries every failing field of the step,
/// at most one failure per field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{}", self.summary())]
pub struct ValidationError {
    pub step_id: String,
    pub failures: Vec<FieldFailure>,
}

impl ValidationError {
    /// Whether `field` has a failure recorded.
    pub fn has_field(&self, field: &str) -> bool {
        self.failures.iter().any(|f| f.field == field)
    }

    /// All failure messages joined into one human-readable sentence list.
    pub fn summary(&self) -> String {
        self.failures
            .iter()
            .map(|f| f.message.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Errors from driving the wizard state machine.
#[derive(Debug, thiserror::Error)]
pub enum WizardError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Step {received} is not the current step (expected {expected})")]
    StepMismatch { expected: String, received: String },

    #[error("A submission is already in progress")]
    Submitting,

    #[error("Finalize requires the last step (at {step_index}, last is {last_index})")]
    NotAtTerminalStep { step_index: usize, last_index: usize },

    #[error("Account type is already {current}; restart to choose {requested}")]
    CategoryLocked { current: String, requested: String },

    #[error("The wizard has already ended ({phase})")]
    Finished { phase: String },

    #[error("The wizard has not been started")]
    NotStarted,

    #[error(transparent)]
    Configuration(#[from] ConfigError),

    #[error(transparent)]
    Finalization(#[from] FinalizationError),
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_summary_joins_messages() {
        let err = ValidationError {
            step_id: "account".to_string(),
            failures: vec![
                FieldFailure {
                    field: "email".to_string(),
                    message: "Email is not a valid address".to_string(),
                },
                FieldFailure {
                    field: "password".to_string(),
                    message: "Password must contain a digit".to_string(),
                },
            ],
        };
        assert_eq!(
            err.to_string(),
            "Email is not a valid address; Password must contain a digit"
        );
        assert!(err.has_field("email"));
        assert!(!err.has_field("confirmPassword"));
    }

    #[test]
    fn finalization_user_message_passes_service_text_through() {
        let err = FinalizationError::Rejected {
            message: "Email already registered".to_string(),
        };
        assert_eq!(err.user_message(), "Email already registered");

        let timeout = FinalizationError::Timeout {
            timeout: Duration::from_secs(15),
        };
        assert!(timeout.user_message().contains("too long"));
    }
}
