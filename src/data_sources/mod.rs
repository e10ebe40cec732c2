//! Read-only lookups.
//!
//! Singular data sources find one object and fail with
//! [`ProviderError::NotFound`] when it does not exist. Plural data sources
//! list every object in their scope and return them as a list block.

pub mod database;
pub mod entity;
pub mod namespace;
pub mod region;
pub mod relation;
pub mod schema_registry;
pub mod store;

use serde::Serialize;
use serde_json::Value;

use crate::client::Client;
use crate::error::ProviderError;
use crate::schema::{Attribute, Block, Diagnostic, Schema};

/// A data source type served by the provider.
#[async_trait::async_trait]
pub trait DataSource: Send + Sync {
    /// Type name, e.g. `deltastream_stores`.
    fn type_name(&self) -> &'static str;

    /// Attribute schema.
    fn schema(&self) -> Schema;

    /// Checks beyond what the schema expresses.
    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let _ = config;
        Vec::new()
    }

    /// Run the lookup and return the data source state.
    async fn read(&self, client: &Client, config: Value) -> Result<Value, ProviderError>;
}

/// Every data source type the provider serves.
pub fn all() -> Vec<Box<dyn DataSource>> {
    vec![
        Box::new(database::DatabaseDataSource),
        Box::new(database::DatabasesDataSource),
        Box::new(namespace::NamespaceDataSource),
        Box::new(namespace::NamespacesDataSource),
        Box::new(store::StoreDataSource),
        Box::new(store::StoresDataSource),
        Box::new(schema_registry::SchemaRegistryDataSource),
        Box::new(schema_registry::SchemaRegistriesDataSource),
        Box::new(relation::RelationDataSource),
        Box::new(relation::RelationsDataSource),
        Box::new(entity::EntitiesDataSource),
        Box::new(region::RegionsDataSource),
    ]
}

/// Add computed string attributes to a block.
pub(crate) fn computed_strings(block: Block, names: &[&str]) -> Block {
    names.iter().fold(block, |block, name| {
        block.with_attribute(*name, Attribute::computed_string())
    })
}

/// Required string attribute a data source config looks up by.
pub(crate) fn lookup_key<'a>(config: &'a Value, key: &str) -> Result<&'a str, ProviderError> {
    config
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ProviderError::Validation(format!("'{}' is required", key)))
}

/// Merge a found object over the config.
pub(crate) fn merge<T: Serialize>(config: Value, found: &T) -> Result<Value, ProviderError> {
    let mut out = match config {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    if let Value::Object(fields) = serde_json::to_value(found)? {
        out.extend(fields);
    }
    Ok(Value::Object(out))
}

/// Set `key` on the config to the listed items.
pub(crate) fn with_items<T: Serialize>(
    config: Value,
    key: &str,
    items: &[T],
) -> Result<Value, ProviderError> {
    let mut out = match config {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    out.insert(key.to_string(), serde_json::to_value(items)?);
    Ok(Value::Object(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    struct Found {
        name: &'static str,
        owner: &'static str,
    }

    #[test]
    fn test_merge_and_items() {
        let merged = merge(json!({"name": "analytics"}), &Found { name: "analytics", owner: "sysadmin" })
            .unwrap();
        assert_eq!(merged, json!({"name": "analytics", "owner": "sysadmin"}));

        let listed = with_items(json!({}), "databases", &[Found { name: "a", owner: "b" }]).unwrap();
        assert_eq!(listed["databases"][0]["owner"], "b");
    }

    #[test]
    fn test_lookup_key() {
        assert_eq!(lookup_key(&json!({"name": "x"}), "name").unwrap(), "x");
        assert!(matches!(
            lookup_key(&json!({"name": ""}), "name"),
            Err(ProviderError::Validation(_))
        ));
    }

    #[test]
    fn test_registry_names() {
        let names: Vec<_> = all().iter().map(|d| d.type_name()).collect();
        assert!(names.contains(&"deltastream_schema_registries"));
        assert!(names.contains(&"deltastream_regions"));
        assert_eq!(names.len(), 12);
    }
}
