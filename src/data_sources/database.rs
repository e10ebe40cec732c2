//! `deltastream_database` and `deltastream_databases`

use serde_json::Value;

use super::{computed_strings, lookup_key, merge, with_items, DataSource};
use crate::client::Client;
use crate::error::ProviderError;
use crate::resources::database::{self, DatabaseState};
use crate::schema::{Attribute, Block, NestedBlock, Schema};

fn database_block() -> Block {
    computed_strings(Block::new(), &["name", "owner", "created_at"])
        .with_attribute("is_default", Attribute::computed_bool())
}

/// Look up one database by name.
pub struct DatabaseDataSource;

#[async_trait::async_trait]
impl DataSource for DatabaseDataSource {
    fn type_name(&self) -> &'static str {
        "deltastream_database"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("name", Attribute::required_string())
            .with_attribute("owner", Attribute::computed_string())
            .with_attribute("is_default", Attribute::computed_bool())
            .with_attribute("created_at", Attribute::computed_string())
    }

    async fn read(&self, client: &Client, config: Value) -> Result<Value, ProviderError> {
        let name = lookup_key(&config, "name")?;
        let rs = database::list(client).await?;
        let found = rs
            .find("name", name)
            .and_then(DatabaseState::from_row)
            .ok_or_else(|| ProviderError::NotFound(format!("database {} not found", name)))?;
        merge(config, &found)
    }
}

/// List every database.
pub struct DatabasesDataSource;

#[async_trait::async_trait]
impl DataSource for DatabasesDataSource {
    fn type_name(&self) -> &'static str {
        "deltastream_databases"
    }

    fn schema(&self) -> Schema {
        Schema::v0().with_block("databases", NestedBlock::list(database_block()))
    }

    async fn read(&self, client: &Client, config: Value) -> Result<Value, ProviderError> {
        let rs = database::list(client).await?;
        let items: Vec<DatabaseState> = rs.rows().filter_map(DatabaseState::from_row).collect();
        with_items(config, "databases", &items)
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

    fn driver() -> Arc<MockDriver> {
        let driver = Arc::new(MockDriver::new());
        driver.respond(
            "LIST DATABASES",
            ResultSet::from_rows(
                &["Name", "Is Default", "Owner", "Created At"],
                vec![
                    vec![json!("analytics"), json!(true), json!("sysadmin"), json!("2024-01-01")],
                    vec![json!("staging"), json!(false), json!("dev"), json!("2024-02-01")],
                ],
            ),
        );
        driver
    }

    #[tokio::test]
    async fn test_singular_lookup() {
        let client = test_client(driver());

        let found = DatabaseDataSource
            .read(&client, json!({"name": "staging"}))
            .await
            .unwrap();
        assert_eq!(found["owner"], "dev");
        assert_eq!(found["is_default"], false);

        let err = DatabaseDataSource
            .read(&client, json!({"name": "prod"}))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_plural_listing() {
        let client = test_client(driver());
        let listed = DatabasesDataSource.read(&client, json!({})).await.unwrap();
        assert_eq!(listed["databases"].as_array().unwrap().len(), 2);
        assert_eq!(listed["databases"][0]["name"], "analytics");
    }
}
