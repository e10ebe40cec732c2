//! Test doubles and harnesses.
//!
//! [`MockDriver`] stands in for the control plane: it answers statements
//! from scripted replies keyed by statement prefix and records everything it
//! was asked to run. [`ProviderTester`] drives a [`ProviderService`] through
//! plan/create/read/update/delete without a host.
//!
//! ```ignore
//! use deltastream_provider::testing::{MockDriver, ProviderTester};
//! use deltastream_provider::driver::ResultSet;
//! use serde_json::json;
//!
//! let driver = Arc::new(MockDriver::new());
//! driver.respond("LIST DATABASES", ResultSet::from_rows(&["Name"], vec![vec![json!("analytics")]]));
//!
//! let tester = ProviderTester::new(DeltaStreamProvider::with_driver(driver.clone()));
//! tester.configure(json!({"api_key": "k", "organization": "acme"})).await?;
//! let state = tester.create("deltastream_database", json!({"name": "analytics"})).await?;
//! ```

use std::sync::Mutex;

use serde_json::Value;

use crate::driver::{Driver, ResultSet, SessionContext};
use crate::error::ProviderError;
use crate::schema::{Diagnostic, DiagnosticSeverity, ProviderSchema};
use crate::service::ProviderService;
use crate::types::{ImportedResource, PlanResult};

/// One scripted answer.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Return these rows.
    Rows(ResultSet),
    /// Fail with this SQL state and message.
    Error {
        /// SQL state to report.
        sql_state: String,
        /// Message to report.
        message: String,
    },
}

impl MockReply {
    /// A failing reply.
    pub fn error(sql_state: &str, message: &str) -> Self {
        Self::Error {
            sql_state: sql_state.to_string(),
            message: message.to_string(),
        }
    }

    fn into_result(self) -> Result<ResultSet, ProviderError> {
        match self {
            Self::Rows(rs) => Ok(rs),
            Self::Error { sql_state, message } => {
                Err(ProviderError::from_sql_state(&sql_state, message))
            }
        }
    }
}

impl From<ResultSet> for MockReply {
    fn from(rs: ResultSet) -> Self {
        Self::Rows(rs)
    }
}

/// A statement the mock was asked to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Executed {
    /// Session it ran in.
    pub session: SessionContext,
    /// Statement text.
    pub statement: String,
}

#[derive(Debug, Default)]
struct Script {
    prefix: String,
    replies: Vec<MockReply>,
}

#[derive(Debug, Default)]
struct MockState {
    scripts: Vec<Script>,
    executed: Vec<Executed>,
}

/// A scripted [`Driver`].
///
/// Each statement is matched against the longest registered prefix. Replies
/// for a prefix are consumed in order and the last one repeats. Statements
/// with no matching prefix succeed with no rows.
#[derive(Debug, Default)]
pub struct MockDriver {
    state: Mutex<MockState>,
}

impl MockDriver {
    /// A mock with no scripts.
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }

    /// Answer statements starting with `prefix` with `replies`, in order.
    pub fn script(&self, prefix: &str, replies: Vec<MockReply>) -> &Self {
        self.with_state(|state| {
            state.scripts.retain(|s| s.prefix != prefix);
            state.scripts.push(Script {
                prefix: prefix.to_string(),
                replies,
            });
        });
        self
    }

    /// Always answer statements starting with `prefix` with `rs`.
    pub fn respond(&self, prefix: &str, rs: ResultSet) -> &Self {
        self.script(prefix, vec![MockReply::Rows(rs)])
    }

    /// Always fail statements starting with `prefix`.
    pub fn fail(&self, prefix: &str, sql_state: &str, message: &str) -> &Self {
        self.script(prefix, vec![MockReply::error(sql_state, message)])
    }

    /// Everything executed so far.
    pub fn executed(&self) -> Vec<Executed> {
        self.with_state(|state| state.executed.clone())
    }

    /// Statement texts executed so far.
    pub fn statements(&self) -> Vec<String> {
        self.with_state(|state| {
            state
                .executed
                .iter()
                .map(|e| e.statement.clone())
                .collect()
        })
    }

    /// Executed statements starting with `prefix`.
    pub fn statements_starting_with(&self, prefix: &str) -> Vec<String> {
        self.statements()
            .into_iter()
            .filter(|s| s.starts_with(prefix))
            .collect()
    }
}

#[async_trait::async_trait]
impl Driver for MockDriver {
    async fn execute(
        &self,
        session: &SessionContext,
        statement: &str,
    ) -> Result<ResultSet, ProviderError> {
        let reply = self.with_state(|state| {
            state.executed.push(Executed {
                session: session.clone(),
                statement: statement.to_string(),
            });

            let script = state
                .scripts
                .iter_mut()
                .filter(|s| statement.starts_with(&s.prefix))
                .max_by_key(|s| s.prefix.len())?;
            if script.replies.len() > 1 {
                Some(script.replies.remove(0))
            } else {
                script.replies.first().cloned()
            }
        });

        match reply {
            Some(reply) => reply.into_result(),
            None => Ok(ResultSet::empty()),
        }
    }
}

/// A harness that drives a [`ProviderService`] without a host.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    /// Create a new tester for the given provider.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Get a reference to the underlying provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Get the provider's schema.
    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    /// Get the list of resource type names.
    pub fn resource_types(&self) -> Vec<String> {
        self.provider.metadata().resources
    }

    /// Get the list of data source type names.
    pub fn data_source_types(&self) -> Vec<String> {
        self.provider.metadata().data_sources
    }

    /// Configure the provider, failing on error diagnostics.
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.configure(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Validate a resource config, failing on error diagnostics.
    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_resource_config(resource_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Validate a data source config, failing on error diagnostics.
    pub async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_data_source_config(data_source_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Plan a creation (no prior state).
    pub async fn plan_create(
        &self,
        resource_type: &str,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, None, proposed_state.clone(), proposed_state)
            .await
    }

    /// Plan an update.
    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(
                resource_type,
                Some(prior_state),
                proposed_state.clone(),
                proposed_state,
            )
            .await
    }

    /// Plan a deletion.
    pub async fn plan_delete(
        &self,
        resource_type: &str,
        prior_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), Value::Null, Value::Null)
            .await
    }

    /// Create a resource.
    pub async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.create(resource_type, planned_state).await
    }

    /// Read a resource.
    pub async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.read(resource_type, current_state).await
    }

    /// Update a resource.
    pub async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .update(resource_type, prior_state, planned_state)
            .await
    }

    /// Delete a resource.
    pub async fn delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, current_state).await
    }

    /// Import an existing object.
    pub async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        self.provider.import_resource(resource_type, id).await
    }

    /// Read a data source.
    pub async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .read_data_source(data_source_type, config)
            .await
    }

    /// Plan, create, then read back.
    pub async fn lifecycle_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let plan_result = self.plan_create(resource_type, config).await?;
        let created_state = self
            .create(resource_type, plan_result.planned_state)
            .await?;
        self.read(resource_type, created_state).await
    }

    /// Plan, update, then read back.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<Value, ProviderError> {
        let plan_result = self
            .plan_update(resource_type, prior_state.clone(), proposed_state)
            .await?;
        let updated_state = self
            .update(resource_type, prior_state, plan_result.planned_state)
            .await?;
        self.read(resource_type, updated_state).await
    }

    /// Plan a deletion, then delete.
    pub async fn lifecycle_delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        let _ = self
            .plan_delete(resource_type, current_state.clone())
            .await?;
        self.delete(resource_type, current_state).await
    }
}

/// Error type for harness calls that can fail with diagnostics.
#[derive(Debug)]
pub enum TestError {
    /// The operation returned error diagnostics.
    Diagnostics(Vec<Diagnostic>),
    /// The operation failed with a provider error.
    Provider(ProviderError),
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestError::Diagnostics(diags) => {
                writeln!(f, "Operation failed with {} diagnostic(s):", diags.len())?;
                for diag in diags {
                    write!(f, "  [{:?}] {}", diag.severity, diag.summary)?;
                    if let Some(detail) = &diag.detail {
                        write!(f, ": {}", detail)?;
                    }
                    if let Some(attr) = &diag.attribute {
                        write!(f, " (at {})", attr)?;
                    }
                    writeln!(f)?;
                }
                Ok(())
            }
            TestError::Provider(e) => write!(f, "Provider error: {}", e),
        }
    }
}

impl std::error::Error for TestError {}

impl From<ProviderError> for TestError {
    fn from(e: ProviderError) -> Self {
        TestError::Provider(e)
    }
}

fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<_> = diagnostics
        .into_iter()
        .filter(|d| matches!(d.severity, DiagnosticSeverity::Error))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

/// Assert that a plan has changes and does not replace.
///
/// # Panics
///
/// Panics if the plan has no changes or requires replacement.
pub fn assert_plan_creates(plan: &PlanResult) {
    assert!(
        !plan.changes.is_empty(),
        "Expected plan to have changes for create, but got no changes"
    );
    assert!(!plan.requires_replace, "Expected plan to create, not replace");
}

/// Assert that a plan has no changes.
///
/// # Panics
///
/// Panics if the plan has any changes.
pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(
        plan.changes.is_empty(),
        "Expected no changes, but got {} change(s): {:?}",
        plan.changes.len(),
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Assert that a plan requires replacement.
///
/// # Panics
///
/// Panics if the plan does not require replacement.
pub fn assert_plan_replaces(plan: &PlanResult) {
    assert!(
        plan.requires_replace,
        "Expected plan to require replacement, but it does not"
    );
}

/// Assert that a plan updates in place.
///
/// # Panics
///
/// Panics if the plan has no changes or requires replacement.
pub fn assert_plan_updates_in_place(plan: &PlanResult) {
    assert!(
        !plan.changes.is_empty(),
        "Expected plan to have changes, but got no changes"
    );
    assert!(
        !plan.requires_replace,
        "Expected plan to update in place, but it requires replacement"
    );
}

/// Assert that a plan changes the given attribute path.
///
/// # Panics
///
/// Panics if the plan does not change the path.
pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    assert!(
        plan.changes_attribute(path),
        "Expected plan to change attribute '{}'. Changed attributes: {:?}",
        path,
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Assert that diagnostics contain an error whose summary contains `substring`.
///
/// # Panics
///
/// Panics if no error diagnostic matches.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    let has_matching_error = diagnostics
        .iter()
        .any(|d| d.is_error() && d.summary.contains(substring));

    assert!(
        has_matching_error,
        "Expected an error containing '{}', but no matching error found. Errors: {:?}",
        substring,
        diagnostics
            .iter()
            .filter(|d| d.is_error())
            .map(|d| &d.summary)
            .collect::<Vec<_>>()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_mock_driver_longest_prefix_and_sequence() {
        let driver = MockDriver::new();
        driver.script(
            "DESCRIBE STORE",
            vec![
                ResultSet::from_rows(&["State"], vec![vec![json!("provisioning")]]).into(),
                ResultSet::from_rows(&["State"], vec![vec![json!("ready")]]).into(),
            ],
        );
        driver.fail("DESCRIBE STORE \"gone\"", "3D000", "store not found");

        let session = SessionContext::new("acme");
        let first = driver
            .execute(&session, "DESCRIBE STORE \"kafka\";")
            .await
            .unwrap();
        assert_eq!(first.first().unwrap().text("state").as_deref(), Some("provisioning"));

        for _ in 0..2 {
            let rs = driver
                .execute(&session, "DESCRIBE STORE \"kafka\";")
                .await
                .unwrap();
            assert_eq!(rs.first().unwrap().text("state").as_deref(), Some("ready"));
        }

        let err = driver
            .execute(&session, "DESCRIBE STORE \"gone\";")
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let rs = driver.execute(&session, "LIST STORES;").await.unwrap();
        assert!(rs.is_empty());

        assert_eq!(driver.statements().len(), 5);
        assert_eq!(driver.statements_starting_with("DESCRIBE").len(), 4);
        assert_eq!(driver.executed()[0].session.organization, "acme");
    }

    #[test]
    fn test_test_error_display() {
        let err = TestError::Diagnostics(vec![
            Diagnostic::error("Invalid store configuration").with_attribute("kafka"),
            Diagnostic::error("Missing uris").with_detail("uris is required"),
        ]);

        let display = format!("{}", err);
        assert!(display.contains("Invalid store configuration"));
        assert!(display.contains("(at kafka)"));
        assert!(display.contains("uris is required"));
    }

    #[test]
    fn test_assert_error_contains() {
        let diagnostics = vec![Diagnostic::error("Exactly one store block must be set")];
        assert_error_contains(&diagnostics, "store block");
    }

    #[test]
    #[should_panic(expected = "Expected plan to require replacement")]
    fn test_assert_plan_replaces_fails() {
        assert_plan_replaces(&PlanResult::no_change(json!({})));
    }
}
