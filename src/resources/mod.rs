//! Managed resource types.
//!
//! Each type follows the same lifecycle: decode the planned state, render a
//! statement, execute it, wait for the control plane to settle, and map the
//! catalog row back into state.

pub mod database;
pub mod entity;
pub mod namespace;
pub mod relation;
pub mod schema_registry;
pub mod store;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::client::Client;
use crate::driver::{ResultSet, SessionContext};
use crate::error::ProviderError;
use crate::schema::{Diagnostic, Schema};

/// A resource type managed by the provider.
#[async_trait::async_trait]
pub trait Resource: Send + Sync {
    /// Type name, e.g. `deltastream_store`.
    fn type_name(&self) -> &'static str;

    /// Attribute schema.
    fn schema(&self) -> Schema;

    /// Checks beyond what the schema expresses.
    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let _ = config;
        Vec::new()
    }

    /// Whether moving from `prior` to `proposed` needs a drop and re-create
    /// for reasons the per-attribute `force_new` flags cannot express.
    fn requires_replace(&self, prior: &Value, proposed: &Value) -> bool {
        let _ = (prior, proposed);
        false
    }

    /// Create the object and return its state.
    async fn create(&self, client: &Client, planned: Value) -> Result<Value, ProviderError>;

    /// Refresh state. Returns [`ProviderError::NotFound`] if the object is gone.
    async fn read(&self, client: &Client, current: Value) -> Result<Value, ProviderError>;

    /// Apply an in-place change.
    async fn update(
        &self,
        client: &Client,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let _ = (client, prior, planned);
        Err(ProviderError::Unimplemented(format!(
            "{} cannot be updated in place",
            self.type_name()
        )))
    }

    /// Drop the object and wait for it to disappear.
    async fn delete(&self, client: &Client, current: Value) -> Result<(), ProviderError>;

    /// Build state for an existing object from an import id.
    async fn import(&self, client: &Client, id: &str) -> Result<Value, ProviderError>;
}

/// Every resource type the provider manages.
pub fn all() -> Vec<Box<dyn Resource>> {
    vec![
        Box::new(database::DatabaseResource),
        Box::new(namespace::NamespaceResource),
        Box::new(store::StoreResource),
        Box::new(schema_registry::SchemaRegistryResource),
        Box::new(relation::RelationResource),
        Box::new(entity::EntityResource),
    ]
}

pub(crate) fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ProviderError> {
    Ok(serde_json::from_value(value)?)
}

pub(crate) fn encode<T: Serialize>(state: &T) -> Result<Value, ProviderError> {
    Ok(serde_json::to_value(state)?)
}

/// Run a catalog statement, treating a missing parent as an empty result.
pub(crate) async fn list_or_empty(
    client: &Client,
    session: &SessionContext,
    statement: &str,
) -> Result<ResultSet, ProviderError> {
    match client.execute(session, statement).await {
        Ok(rs) => Ok(rs),
        Err(e) if e.is_not_found() => Ok(ResultSet::empty()),
        Err(e) => Err(e),
    }
}

/// Run a describe statement, mapping "not found" to `None`.
pub(crate) async fn describe(
    client: &Client,
    session: &SessionContext,
    statement: &str,
) -> Result<Option<ResultSet>, ProviderError> {
    match client.execute(session, statement).await {
        Ok(rs) if rs.is_empty() => Ok(None),
        Ok(rs) => Ok(Some(rs)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Split an import id into exactly `n` non-empty `/`-separated parts.
pub(crate) fn split_import_id<'a>(
    id: &'a str,
    n: usize,
    format: &str,
) -> Result<Vec<&'a str>, ProviderError> {
    let parts: Vec<&str> = id.split('/').collect();
    if parts.len() != n || parts.iter().any(|p| p.trim().is_empty()) {
        return Err(ProviderError::InvalidRequest(format!(
            "invalid import id '{}', expected {}",
            id, format
        )));
    }
    Ok(parts)
}

/// Catalog states that mean an object failed to come up.
pub(crate) const FAILED_STATES: [&str; 3] = ["failed", "errored", "error"];

pub(crate) fn is_failed_state(state: &str) -> bool {
    FAILED_STATES
        .iter()
        .any(|s| s.eq_ignore_ascii_case(state))
}

#[cfg(test)]
pub(crate) fn test_client(driver: std::sync::Arc<crate::testing::MockDriver>) -> Client {
    use std::time::Duration;

    let config = crate::config::ProviderConfig::resolve(
        serde_json::json!({"api_key": "test", "organization": "acme"}),
        |_| None,
    )
    .expect("test config");
    Client::new(driver, &config).with_poll_policy(crate::retry::RetryPolicy::new(
        Duration::from_millis(1),
        Duration::from_millis(5),
        2.0,
        Duration::from_millis(250),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_import_id() {
        assert_eq!(
            split_import_id("analytics/raw", 2, "<database>/<namespace>").unwrap(),
            vec!["analytics", "raw"]
        );
        assert!(split_import_id("analytics", 2, "<database>/<namespace>").is_err());
        assert!(split_import_id("analytics/", 2, "<database>/<namespace>").is_err());
        assert!(split_import_id("a/b/c", 2, "<database>/<namespace>").is_err());
    }

    #[test]
    fn test_registry_has_unique_names() {
        let mut names: Vec<_> = all().iter().map(|r| r.type_name()).collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);
        assert!(names.contains(&"deltastream_relation"));
    }

    #[test]
    fn test_failed_states() {
        assert!(is_failed_state("Errored"));
        assert!(is_failed_state("failed"));
        assert!(!is_failed_state("ready"));
    }
}
