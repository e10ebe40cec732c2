//! `deltastream_namespace` and `deltastream_namespaces`

use serde_json::Value;

use super::{computed_strings, lookup_key, merge, with_items, DataSource};
use crate::client::Client;
use crate::error::ProviderError;
use crate::resources::namespace::{self, NamespaceState};
use crate::schema::{Attribute, Block, NestedBlock, Schema};

/// Look up one namespace.
pub struct NamespaceDataSource;

#[async_trait::async_trait]
impl DataSource for NamespaceDataSource {
    fn type_name(&self) -> &'static str {
        "deltastream_namespace"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("database", Attribute::required_string())
            .with_attribute("name", Attribute::required_string())
            .with_attribute("owner", Attribute::computed_string())
            .with_attribute("created_at", Attribute::computed_string())
    }

    async fn read(&self, client: &Client, config: Value) -> Result<Value, ProviderError> {
        let database = lookup_key(&config, "database")?;
        let name = lookup_key(&config, "name")?;
        let rs = namespace::list(client, database).await?;
        let found = rs
            .find("name", name)
            .and_then(|row| NamespaceState::from_row(database, row))
            .ok_or_else(|| {
                ProviderError::NotFound(format!("namespace {}.{} not found", database, name))
            })?;
        merge(config, &found)
    }
}

/// List the namespaces of a database.
pub struct NamespacesDataSource;

#[async_trait::async_trait]
impl DataSource for NamespacesDataSource {
    fn type_name(&self) -> &'static str {
        "deltastream_namespaces"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("database", Attribute::required_string())
            .with_block(
                "namespaces",
                NestedBlock::list(computed_strings(
                    Block::new(),
                    &["database", "name", "owner", "created_at"],
                )),
            )
    }

    async fn read(&self, client: &Client, config: Value) -> Result<Value, ProviderError> {
        let database = lookup_key(&config, "database")?.to_string();
        let rs = namespace::list(client, &database).await?;
        let items: Vec<NamespaceState> = rs
            .rows()
            .filter_map(|row| NamespaceState::from_row(&database, row))
            .collect();
        with_items(config, "namespaces", &items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::ResultSet;
    use crate::resources::test_client;
    use crate::testing::MockDriver;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_lookup_and_listing() {
        let driver = Arc::new(MockDriver::new());
        driver.respond(
            "LIST SCHEMAS IN DATABASE \"analytics\"",
            ResultSet::from_rows(
                &["Name", "Owner", "Created At"],
                vec![
                    vec![json!("public"), json!("sysadmin"), json!("2024-01-01")],
                    vec![json!("raw"), json!("etl"), json!("2024-02-01")],
                ],
            ),
        );
        driver.fail("LIST SCHEMAS IN DATABASE \"missing\"", "3D000", "no such database");
        let client = test_client(driver);

        let raw = NamespaceDataSource
            .read(&client, json!({"database": "analytics", "name": "raw"}))
            .await
            .unwrap();
        assert_eq!(raw["owner"], "etl");

        let listed = NamespacesDataSource
            .read(&client, json!({"database": "analytics"}))
            .await
            .unwrap();
        assert_eq!(listed["namespaces"][1]["database"], "analytics");

        let empty = NamespacesDataSource
            .read(&client, json!({"database": "missing"}))
            .await
            .unwrap();
        assert_eq!(empty["namespaces"], json!([]));
    }
}
