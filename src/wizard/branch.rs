//! Step catalogue and category branching.
//!
//! `resolve` maps a category to its fixed, ordered step sequence. Every
//! sequence starts with the shared category-selection step so step indices
//! stay stable across resolution.

use super::model::{Category, StepData, step_ids};
use super::validate::{FieldCheck, FieldRule, validate_fields};
use crate::error::{ConfigError, ValidationError};

/// One page of the wizard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepDefinition {
    /// Step id, also the data namespace for its fields.
    pub id: &'static str,
    pub title: &'static str,
    /// Identifier of the render collaborator slot the host mounts for this step.
    pub render_slot: &'static str,
    pub required_fields: &'static [&'static str],
    pub rules: &'static [FieldRule],
}

impl StepDefinition {
    pub fn validate(&self, data: &StepData) -> Result<(), ValidationError> {
        validate_fields(self.id, self.required_fields, self.rules, data)
    }
}

const CATEGORY_VALUES: &[&str] = &["individual", "company", "therapist"];

const RELATIONSHIP_STATUSES: &[&str] = &[
    "single",
    "dating",
    "engaged",
    "married",
    "separated",
    "divorced",
];

const COMPANY_SIZES: &[&str] = &["1-10", "11-50", "51-200", "201-1000", "1000+"];

pub const CATEGORY_STEP: StepDefinition = StepDefinition {
    id: step_ids::CATEGORY,
    title: "Choose your account type",
    render_slot: "category-select",
    required_fields: &["category"],
    rules: &[FieldRule::new("category", FieldCheck::OneOf(CATEGORY_VALUES))],
};

const ACCOUNT_STEP: StepDefinition = StepDefinition {
    id: step_ids::ACCOUNT,
    title: "Create your login",
    render_slot: "account-form",
    required_fields: &["email", "password", "confirmPassword"],
    rules: &[
        FieldRule::new("email", FieldCheck::Email),
        FieldRule::new("password", FieldCheck::Password),
        FieldRule::new("confirmPassword", FieldCheck::Matches("password")),
    ],
};

const PROFILE_STEP: StepDefinition = StepDefinition {
    id: step_ids::PROFILE,
    title: "About you",
    render_slot: "profile-form",
    required_fields: &["firstName", "lastName"],
    rules: &[FieldRule::new("phone", FieldCheck::Phone)],
};

const RELATIONSHIP_STEP: StepDefinition = StepDefinition {
    id: step_ids::RELATIONSHIP,
    title: "Your relationship",
    render_slot: "relationship-form",
    required_fields: &["relationshipStatus", "goals"],
    rules: &[FieldRule::new(
        "relationshipStatus",
        FieldCheck::OneOf(RELATIONSHIP_STATUSES),
    )],
};

const ORGANIZATION_STEP: StepDefinition = StepDefinition {
    id: step_ids::ORGANIZATION,
    title: "Your organization",
    render_slot: "organization-form",
    required_fields: &["companyName", "companySize", "industry"],
    rules: &[FieldRule::new("companySize", FieldCheck::OneOf(COMPANY_SIZES))],
};

const CONTACT_STEP: StepDefinition = StepDefinition {
    id: step_ids::CONTACT,
    title: "Primary contact",
    render_slot: "contact-form",
    required_fields: &["contactName", "contactPhone"],
    rules: &[FieldRule::new("contactPhone", FieldCheck::Phone)],
};

const CREDENTIALS_STEP: StepDefinition = StepDefinition {
    id: step_ids::CREDENTIALS,
    title: "Professional credentials",
    render_slot: "credentials-form",
    required_fields: &[
        "licenseNumber",
        "licenseState",
        "specialization",
        "yearsOfExperience",
    ],
    rules: &[
        FieldRule::new("licenseNumber", FieldCheck::LicenseNumber),
        FieldRule::new(
            "yearsOfExperience",
            FieldCheck::IntegerRange { min: 0, max: 70 },
        ),
    ],
};

const VERIFICATION_STEP: StepDefinition = StepDefinition {
    id: step_ids::VERIFICATION,
    title: "Verification",
    render_slot: "verification-form",
    required_fields: &["agreeToTerms", "consentToBackgroundCheck"],
    rules: &[
        FieldRule::new("agreeToTerms", FieldCheck::Accepted),
        FieldRule::new("consentToBackgroundCheck", FieldCheck::Accepted),
    ],
};

static UNRESOLVED: &[StepDefinition] = &[CATEGORY_STEP];

static INDIVIDUAL: &[StepDefinition] =
    &[CATEGORY_STEP, ACCOUNT_STEP, PROFILE_STEP, RELATIONSHIP_STEP];

static COMPANY: &[StepDefinition] =
    &[CATEGORY_STEP, ACCOUNT_STEP, ORGANIZATION_STEP, CONTACT_STEP];

static THERAPIST: &[StepDefinition] = &[
    CATEGORY_STEP,
    ACCOUNT_STEP,
    PROFILE_STEP,
    CREDENTIALS_STEP,
    VERIFICATION_STEP,
];

/// The step sequence for a category.
pub fn resolve(category: Category) -> &'static [StepDefinition] {
    match category {
        Category::Individual => INDIVIDUAL,
        Category::Company => COMPANY,
        Category::Therapist => THERAPIST,
    }
}

/// Resolve from a raw category value. Unknown values fail closed.
pub fn resolve_str(raw: &str) -> Result<(Category, &'static [StepDefinition]), ConfigError> {
    let category: Category = raw.parse()?;
    Ok((category, resolve(category)))
}

/// Sequence in effect before a category is chosen: only the selection step.
pub fn unresolved() -> &'static [StepDefinition] {
    UNRESOLVED
}
