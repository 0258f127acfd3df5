//! Wizard data models: categories, destinations, namespaced data, and the
//! final record handed to the account service.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;

/// Field values collected by one step.
pub type StepData = serde_json::Map<String, Value>;

/// Accumulated answers, namespaced by step id.
pub type WizardData = BTreeMap<String, StepData>;

/// Step ids. Each id is also the namespace its data lives under.
pub mod step_ids {
    pub const CATEGORY: &str = "category";
    pub const ACCOUNT: &str = "account";
    pub const PROFILE: &str = "profile";
    pub const RELATIONSHIP: &str = "relationship";
    pub const ORGANIZATION: &str = "organization";
    pub const CONTACT: &str = "contact";
    pub const CREDENTIALS: &str = "credentials";
    pub const VERIFICATION: &str = "verification";
}

/// Field names shared between steps, record assembly, and the commit path.
pub mod fields {
    pub const CATEGORY: &str = "category";
    pub const EMAIL: &str = "email";
    pub const PASSWORD: &str = "password";
    pub const CONFIRM_PASSWORD: &str = "confirmPassword";
    pub const FIRST_NAME: &str = "firstName";
    pub const LAST_NAME: &str = "lastName";
    pub const CONTACT_NAME: &str = "contactName";

    /// Fields never copied into record metadata.
    pub const SECRET: &[&str] = &[PASSWORD, CONFIRM_PASSWORD];
}

/// The kind of account being created. Chosen on the first step and fixed
/// for the rest of the flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Individual,
    Company,
    Therapist,
}

impl Category {
    pub const ALL: [Category; 3] = [Self::Individual, Self::Company, Self::Therapist];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Individual => "individual",
            Self::Company => "company",
            Self::Therapist => "therapist",
        }
    }

    /// Where the host router should send the user after a successful commit.
    pub fn destination(&self) -> Destination {
        match self {
            Self::Individual => Destination::IndividualDashboard,
            Self::Company => Destination::CompanyDashboard,
            Self::Therapist => Destination::TherapistDashboard,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Category {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "individual" => Ok(Self::Individual),
            "company" => Ok(Self::Company),
            "therapist" => Ok(Self::Therapist),
            other => Err(ConfigError::UnknownCategory {
                value: other.to_string(),
            }),
        }
    }
}

/// Post-registration destination identifiers, one per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Destination {
    IndividualDashboard,
    CompanyDashboard,
    TherapistDashboard,
}

impl Destination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IndividualDashboard => "individual-dashboard",
            Self::CompanyDashboard => "company-dashboard",
            Self::TherapistDashboard => "therapist-dashboard",
        }
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Who the account belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub email: String,
    pub name: String,
    pub category: Category,
}

/// Whether a record passed every step's validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Every step was completed and validated.
    Complete,
    /// Produced by abandonment; some steps were skipped or never validated.
    Incomplete,
}

/// The canonical record sent to the account service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalRecord {
    pub identity: Identity,
    pub metadata: StepData,
    pub status: RecordStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_steps: Vec<String>,
}

impl FinalRecord {
    /// Assemble a record from every namespace of `data`.
    ///
    /// Metadata is the flattened union of all namespaces minus secret
    /// fields. An empty `missing_steps` yields a complete record.
    pub fn assemble(category: Category, data: &WizardData, missing_steps: Vec<String>) -> Self {
        let email = field_str(data, step_ids::ACCOUNT, fields::EMAIL).unwrap_or_default();
        let name = display_name(category, data);

        let mut metadata = StepData::new();
        for values in data.values() {
            for (key, value) in values {
                if fields::SECRET.contains(&key.as_str()) {
                    continue;
                }
                metadata.insert(key.clone(), value.clone());
            }
        }
        metadata.insert(
            fields::CATEGORY.to_string(),
            Value::String(category.as_str().to_string()),
        );

        let status = if missing_steps.is_empty() {
            RecordStatus::Complete
        } else {
            RecordStatus::Incomplete
        };
        metadata.insert(
            "recordStatus".to_string(),
            serde_json::to_value(status).unwrap_or(Value::Null),
        );
        if !missing_steps.is_empty() {
            metadata.insert(
                "missingSteps".to_string(),
                Value::Array(missing_steps.iter().cloned().map(Value::String).collect()),
            );
        }

        Self {
            identity: Identity {
                email,
                name,
                category,
            },
            metadata,
            status,
            missing_steps,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status == RecordStatus::Complete
    }
}

/// Read a trimmed, non-empty string field from a namespace.
pub fn field_str(data: &WizardData, namespace: &str, field: &str) -> Option<String> {
    data.get(namespace)
        .and_then(|ns| ns.get(field))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn display_name(category: Category, data: &WizardData) -> String {
    match category {
        Category::Individual | Category::Therapist => {
            let first = field_str(data, step_ids::PROFILE, fields::FIRST_NAME);
            let last = field_str(data, step_ids::PROFILE, fields::LAST_NAME);
            [first, last]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" ")
        }
        Category::Company => {
            field_str(data, step_ids::CONTACT, fields::CONTACT_NAME).unwrap_or_default()
        }
    }
}
