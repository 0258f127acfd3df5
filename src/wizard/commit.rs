//! Finalization: hand the assembled record to the account service.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::model::{Destination, FinalRecord, StepData, WizardData, field_str, fields, step_ids};
use super::persistence::PersistenceAdapter;
use crate::error::FinalizationError;

/// Account created by the external service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredAccount {
    pub id: String,
    #[serde(default)]
    pub email: String,
}

/// External account-creation service.
#[async_trait]
pub trait AccountService: Send + Sync {
    async fn register(
        &self,
        email: &str,
        password: &SecretString,
        metadata: &StepData,
    ) -> Result<RegisteredAccount, FinalizationError>;
}

/// Login credentials pulled from the account namespace.
pub struct Credentials {
    pub email: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn from_data(data: &WizardData) -> Result<Self, FinalizationError> {
        let email = field_str(data, step_ids::ACCOUNT, fields::EMAIL)
            .ok_or_else(|| FinalizationError::MissingCredentials("email".to_string()))?;
        let password = data
            .get(step_ids::ACCOUNT)
            .and_then(|ns| ns.get(fields::PASSWORD))
            .and_then(Value::as_str)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| FinalizationError::MissingCredentials("password".to_string()))?;
        Ok(Self {
            email,
            password: SecretString::from(password.to_string()),
        })
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Result of a successful commit.
#[derive(Debug, Clone, Serialize)]
pub struct Completion {
    pub destination: Destination,
    pub account: RegisteredAccount,
    pub record: FinalRecord,
}

/// Calls the account service and clears stored progress on success.
pub struct FinalizationCommitter {
    service: Arc<dyn AccountService>,
    store: Arc<dyn PersistenceAdapter>,
    timeout: Duration,
}

impl FinalizationCommitter {
    pub fn new(
        service: Arc<dyn AccountService>,
        store: Arc<dyn PersistenceAdapter>,
        timeout: Duration,
    ) -> Self {
        Self {
            service,
            store,
            timeout,
        }
    }

    /// Register the account described by `record`.
    ///
    /// On failure nothing is cleared, so the caller can retry with the same
    /// record.
    pub async fn commit(
        &self,
        record: FinalRecord,
        credentials: &Credentials,
    ) -> Result<Completion, FinalizationError> {
        let call = self
            .service
            .register(&credentials.email, &credentials.password, &record.metadata);

        let account = match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(FinalizationError::Timeout {
                    timeout: self.timeout,
                });
            }
        };

        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear onboarding progress after commit");
        }

        let destination = record.identity.category.destination();
        info!(
            account_id = %account.id,
            category = %record.identity.category,
            complete = record.is_complete(),
            "Account registered"
        );

        Ok(Completion {
            destination,
            account,
            record,
        })
    }
}

/// Account service reached over HTTP.
pub struct HttpAccountService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAccountService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn register_url(&self) -> String {
        format!("{}/api/auth/register", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl AccountService for HttpAccountService {
    async fn register(
        &self,
        email: &str,
        password: &SecretString,
        metadata: &StepData,
    ) -> Result<RegisteredAccount, FinalizationError> {
        let body = serde_json::json!({
            "email": email,
            "password": password.expose_secret(),
            "metadata": metadata,
        });

        let resp = self
            .client
            .post(self.register_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| FinalizationError::Transport {
                reason: e.to_string(),
            })?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| FinalizationError::Transport {
            reason: e.to_string(),
        })?;

        if !status.is_success() {
            let message = error_message(&text)
                .unwrap_or_else(|| format!("Registration failed ({status})"));
            return Err(FinalizationError::Rejected { message });
        }

        serde_json::from_str(&text).map_err(|e| FinalizationError::Transport {
            reason: format!("Invalid response from account service: {e}"),
        })
    }
}

/// Pull a user-displayable message out of an error body.
///
/// Accepts `{"error": "..."}`, `{"error": {"message": "..."}}` and
/// `{"message": "..."}`.
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let candidate = match value.get("error") {
        Some(Value::String(s)) => Some(s.as_str()),
        Some(obj @ Value::Object(_)) => obj.get("message").and_then(Value::as_str),
        _ => value.get("message").and_then(Value::as_str),
    };
    candidate
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wizard::model::Category;
    use crate::wizard::persistence::MemoryStore;
    use crate::wizard::state::PersistedProgress;
    use serde_json::json;

    struct OkService;

    #[async_trait]
    impl AccountService for OkService {
        async fn register(
            &self,
            email: &str,
            _password: &SecretString,
            _metadata: &StepData,
        ) -> Result<RegisteredAccount, FinalizationError> {
            Ok(RegisteredAccount {
                id: "acct_1".to_string(),
                email: email.to_string(),
            })
        }
    }

    struct SlowService;

    #[async_trait]
    impl AccountService for SlowService {
        async fn register(
            &self,
            _email: &str,
            _password: &SecretString,
            _metadata: &StepData,
        ) -> Result<RegisteredAccount, FinalizationError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            unreachable!("timeout should fire first")
        }
    }

    fn account_data() -> WizardData {
        serde_json::from_value(json!({
            "category": {"category": "individual"},
            "account": {
                "email": "sam@example.com",
                "password": "Abcdef1!",
                "confirmPassword": "Abcdef1!"
            },
            "profile": {"firstName": "Sam", "lastName": "Lee"}
        }))
        .unwrap()
    }

    #[test]
    fn credentials_come_from_account_namespace() {
        let creds = Credentials::from_data(&account_data()).unwrap();
        assert_eq!(creds.email, "sam@example.com");
        assert_eq!(creds.password.expose_secret(), "Abcdef1!");
        assert!(!format!("{creds:?}").contains("Abcdef1!"));

        let err = Credentials::from_data(&WizardData::new()).unwrap_err();
        assert!(matches!(err, FinalizationError::MissingCredentials(ref f) if f == "email"));
    }

    #[tokio::test]
    async fn commit_clears_progress_and_picks_destination() {
        let store = Arc::new(MemoryStore::new());
        store.save(&PersistedProgress::new(3, account_data())).unwrap();

        let committer =
            FinalizationCommitter::new(Arc::new(OkService), store.clone(), Duration::from_secs(1));
        let data = account_data();
        let record = FinalRecord::assemble(Category::Individual, &data, Vec::new());
        let creds = Credentials::from_data(&data).unwrap();

        let completion = committer.commit(record, &creds).await.unwrap();
        assert_eq!(completion.destination, Destination::IndividualDashboard);
        assert_eq!(completion.account.email, "sam@example.com");
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn commit_times_out_without_clearing() {
        let store = Arc::new(MemoryStore::new());
        store.save(&PersistedProgress::new(3, account_data())).unwrap();

        let committer = FinalizationCommitter::new(
            Arc::new(SlowService),
            store.clone(),
            Duration::from_millis(50),
        );
        let data = account_data();
        let record = FinalRecord::assemble(Category::Individual, &data, Vec::new());
        let creds = Credentials::from_data(&data).unwrap();

        let err = committer.commit(record, &creds).await.unwrap_err();
        assert!(matches!(err, FinalizationError::Timeout { .. }));
        assert!(!store.is_empty());
    }

    #[test]
    fn error_message_shapes() {
        assert_eq!(
            error_message(r#"{"error": "Email already registered"}"#).as_deref(),
            Some("Email already registered")
        );
        assert_eq!(
            error_message(r#"{"error": {"message": "Weak password"}}"#).as_deref(),
            Some("Weak password")
        );
        assert_eq!(
            error_message(r#"{"message": "Try later"}"#).as_deref(),
            Some("Try later")
        );
        assert_eq!(error_message("<html>502</html>"), None);
        assert_eq!(error_message(r#"{"error": "  "}"#), None);
    }

    #[test]
    fn register_url_normalizes_trailing_slash() {
        let svc = HttpAccountService::new("http://accounts.local/");
        assert_eq!(svc.register_url(), "http://accounts.local/api/auth/register");
    }
}
