//! Per-step field validation.
//!
//! Each field fails fast on its first unmet rule; failures are aggregated
//! across all fields of the step into one `ValidationError`.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::model::StepData;
use crate::error::{FieldFailure, ValidationError};

/// Characters that satisfy the password special-character rule.
pub const SPECIAL_CHARACTERS: &str = "!@#$%^&*(),.?\":{}|<>";

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9][0-9 ()\-.]{6,19}$").unwrap());

static LICENSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9\-]{4,20}$").unwrap());

/// A structural check applied to one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldCheck {
    Email,
    Password,
    /// Must equal the named sibling field of the same step.
    Matches(&'static str),
    OneOf(&'static [&'static str]),
    Phone,
    LicenseNumber,
    /// Whole number within `min..=max`; accepts JSON numbers or numeric strings.
    IntegerRange { min: i64, max: i64 },
    /// Must be boolean `true`.
    Accepted,
}

/// Binds a check to a field name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule {
    pub field: &'static str,
    pub check: FieldCheck,
}

impl FieldRule {
    pub const fn new(field: &'static str, check: FieldCheck) -> Self {
        Self { field, check }
    }
}

/// The five independent password rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordRule {
    MinLength,
    Uppercase,
    Lowercase,
    Digit,
    Special,
}

impl PasswordRule {
    pub fn message(&self) -> String {
        match self {
            Self::MinLength => {
                format!("Password must be at least {MIN_PASSWORD_LENGTH} characters")
            }
            Self::Uppercase => "Password must contain an uppercase letter".to_string(),
            Self::Lowercase => "Password must contain a lowercase letter".to_string(),
            Self::Digit => "Password must contain a digit".to_string(),
            Self::Special => {
                format!("Password must contain one of {SPECIAL_CHARACTERS}")
            }
        }
    }
}

/// Every password rule `password` breaks, in rule order.
///
/// Step validation only reports the first; the full list backs strength
/// indicators in the host UI.
pub fn password_issues(password: &str) -> Vec<PasswordRule> {
    let mut issues = Vec::new();
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        issues.push(PasswordRule::MinLength);
    }
    if !password.chars().any(|c| c.is_uppercase()) {
        issues.push(PasswordRule::Uppercase);
    }
    if !password.chars().any(|c| c.is_lowercase()) {
        issues.push(PasswordRule::Lowercase);
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        issues.push(PasswordRule::Digit);
    }
    if !password.chars().any(|c| SPECIAL_CHARACTERS.contains(c)) {
        issues.push(PasswordRule::Special);
    }
    issues
}

pub fn is_valid_email(value: &str) -> bool {
    EMAIL_RE.is_match(value.trim())
}

/// Validate `data` against a step's required fields and field rules.
pub fn validate_fields(
    step_id: &str,
    required: &[&str],
    rules: &[FieldRule],
    data: &StepData,
) -> Result<(), ValidationError> {
    let mut fields: Vec<&str> = required.to_vec();
    for rule in rules {
        if !fields.contains(&rule.field) {
            fields.push(rule.field);
        }
    }

    let failures: Vec<FieldFailure> = fields
        .into_iter()
        .filter_map(|field| {
            let is_required = required.contains(&field);
            first_failure(field, is_required, rules, data).map(|message| FieldFailure {
                field: field.to_string(),
                message,
            })
        })
        .collect();

    if failures.is_empty() {
        Ok(())
    } else {
        Err(ValidationError {
            step_id: step_id.to_string(),
            failures,
        })
    }
}

fn first_failure(
    field: &str,
    is_required: bool,
    rules: &[FieldRule],
    data: &StepData,
) -> Option<String> {
    let value = data.get(field);
    if is_blank(value) {
        return is_required.then(|| format!("{} is required", label(field)));
    }
    let value = value?;

    rules
        .iter()
        .filter(|r| r.field == field)
        .find_map(|rule| check_value(field, rule.check, value, data))
}

fn check_value(field: &str, check: FieldCheck, value: &Value, data: &StepData) -> Option<String> {
    let text = value.as_str().map(str::trim);
    match check {
        FieldCheck::Email => match text {
            Some(s) if is_valid_email(s) => None,
            _ => Some(format!("{} is not a valid email address", label(field))),
        },
        FieldCheck::Password => match value.as_str() {
            Some(s) => password_issues(s).first().map(PasswordRule::message),
            None => Some(format!("{} must be text", label(field))),
        },
        FieldCheck::Matches(other) => {
            if data.get(other) == Some(value) {
                None
            } else {
                Some(format!("{} must match {}", label(field), label(other).to_lowercase()))
            }
        }
        FieldCheck::OneOf(allowed) => match text {
            Some(s) if allowed.contains(&s) => None,
            _ => Some(format!(
                "{} must be one of: {}",
                label(field),
                allowed.join(", ")
            )),
        },
        FieldCheck::Phone => match text {
            Some(s) if PHONE_RE.is_match(s) => None,
            _ => Some(format!("{} is not a valid phone number", label(field))),
        },
        FieldCheck::LicenseNumber => match text {
            Some(s) if LICENSE_RE.is_match(s) => None,
            _ => Some(format!(
                "{} must be 4-20 letters, digits, or dashes",
                label(field)
            )),
        },
        FieldCheck::IntegerRange { min, max } => {
            let parsed = match value {
                Value::Number(n) => n.as_i64(),
                Value::String(s) => s.trim().parse::<i64>().ok(),
                _ => None,
            };
            match parsed {
                Some(n) if (min..=max).contains(&n) => None,
                _ => Some(format!(
                    "{} must be a whole number between {min} and {max}",
                    label(field)
                )),
            }
        }
        FieldCheck::Accepted => match value {
            Value::Bool(true) => None,
            _ => Some(format!("{} must be accepted", label(field))),
        },
    }
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(_) => false,
    }
}

/// Turn a camelCase field name into a sentence-case label.
fn label(field: &str) -> String {
    let mut out = String::with_capacity(field.len() + 4);
    for (i, c) in field.chars().enumerate() {
        if i == 0 {
            out.extend(c.to_uppercase());
        } else if c.is_uppercase() {
            out.push(' ');
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ACCOUNT_RULES: &[FieldRule] = &[
        FieldRule::new("email", FieldCheck::Email),
        FieldRule::new("password", FieldCheck::Password),
        FieldRule::new("confirmPassword", FieldCheck::Matches("password")),
    ];
    const ACCOUNT_REQUIRED: &[&str] = &["email", "password", "confirmPassword"];

    fn data(value: Value) -> StepData {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn short_password_breaks_four_rules() {
        assert_eq!(
            password_issues("abc"),
            vec![
                PasswordRule::MinLength,
                PasswordRule::Uppercase,
                PasswordRule::Digit,
                PasswordRule::Special,
            ]
        );
    }

    #[test]
    fn strong_password_passes() {
        assert!(password_issues("Abcdef1!").is_empty());
    }

    #[test]
    fn each_password_rule_is_independent() {
        assert_eq!(password_issues("abcdef1!"), vec![PasswordRule::Uppercase]);
        assert_eq!(password_issues("ABCDEF1!"), vec![PasswordRule::Lowercase]);
        assert_eq!(password_issues("Abcdefg!"), vec![PasswordRule::Digit]);
        assert_eq!(password_issues("Abcdefg1"), vec![PasswordRule::Special]);
        assert_eq!(password_issues("Abc1!"), vec![PasswordRule::MinLength]);
    }

    #[test]
    fn step_reports_first_password_rule_only() {
        let err = validate_fields(
            "account",
            ACCOUNT_REQUIRED,
            ACCOUNT_RULES,
            &data(json!({
                "email": "sam@example.com",
                "password": "abc",
                "confirmPassword": "abc"
            })),
        )
        .unwrap_err();

        assert_eq!(err.failures.len(), 1);
        assert_eq!(err.failures[0].field, "password");
        assert_eq!(err.failures[0].message, PasswordRule::MinLength.message());
    }

    #[test]
    fn failures_aggregate_across_fields() {
        let err = validate_fields(
            "account",
            ACCOUNT_REQUIRED,
            ACCOUNT_RULES,
            &data(json!({
                "email": "not-an-email",
                "password": "Abcdef1!",
                "confirmPassword": "Abcdef1?"
            })),
        )
        .unwrap_err();

        assert!(err.has_field("email"));
        assert!(err.has_field("confirmPassword"));
        assert!(!err.has_field("password"));
        assert_eq!(
            err.to_string(),
            "Email is not a valid email address; Confirm password must match password"
        );
    }

    #[test]
    fn missing_required_fields_are_reported() {
        let err = validate_fields("account", ACCOUNT_REQUIRED, ACCOUNT_RULES, &data(json!({
            "email": "   "
        })))
        .unwrap_err();

        let fields: Vec<_> = err.failures.iter().map(|f| f.field.as_str()).collect();
        assert_eq!(fields, vec!["email", "password", "confirmPassword"]);
        assert_eq!(err.failures[0].message, "Email is required");
    }

    #[test]
    fn optional_fields_are_checked_only_when_present() {
        let rules = &[FieldRule::new("phone", FieldCheck::Phone)];
        let check = |value: Value| validate_fields("profile", &[], rules, &data(value));
        assert!(check(json!({})).is_ok());
        assert!(check(json!({"phone": "+1 555 123 4567"})).is_ok());
        assert!(check(json!({"phone": "call me"})).is_err());
    }

    #[test]
    fn integer_range_accepts_numbers_and_numeric_strings() {
        let rules = &[FieldRule::new(
            "yearsOfExperience",
            FieldCheck::IntegerRange { min: 0, max: 70 },
        )];
        let required = &["yearsOfExperience"];
        let check = |years: Value| {
            validate_fields("c", required, rules, &data(json!({"yearsOfExperience": years})))
        };
        assert!(check(json!(12)).is_ok());
        assert!(check(json!("7")).is_ok());
        assert!(check(json!(-1)).is_err());
        assert!(check(json!("lots")).is_err());
    }

    #[test]
    fn accepted_requires_literal_true() {
        let rules = &[FieldRule::new("agreeToTerms", FieldCheck::Accepted)];
        let required = &["agreeToTerms"];
        let check = |value: Value| validate_fields("v", required, rules, &data(value));
        assert!(check(json!({"agreeToTerms": true})).is_ok());
        let err = check(json!({"agreeToTerms": false})).unwrap_err();
        assert_eq!(err.failures[0].message, "Agree to terms must be accepted");
    }

    #[test]
    fn one_of_lists_allowed_values() {
        let rules = &[FieldRule::new(
            "category",
            FieldCheck::OneOf(&["individual", "company"]),
        )];
        let err = validate_fields(
            "category",
            &["category"],
            rules,
            &data(json!({"category": "couple"})),
        )
        .unwrap_err();
        assert_eq!(err.failures[0].message, "Category must be one of: individual, company");
    }

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("a@b.co"));
        assert!(is_valid_email(" user.name+tag@example.org "));
        assert!(!is_valid_email("user@localhost"));
        assert!(!is_valid_email("user name@example.com"));
    }
}
