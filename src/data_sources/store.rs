//! `deltastream_store` and `deltastream_stores`

use serde_json::Value;

use super::{computed_strings, lookup_key, merge, with_items, DataSource};
use crate::client::Client;
use crate::error::ProviderError;
use crate::resources::store::{self, StoreSummary};
use crate::schema::{Attribute, Block, NestedBlock, Schema};

const STORE_COLUMNS: [&str; 6] = ["type", "state", "uris", "owner", "created_at", "updated_at"];

/// Look up one store by name.
pub struct StoreDataSource;

#[async_trait::async_trait]
impl DataSource for StoreDataSource {
    fn type_name(&self) -> &'static str {
        "deltastream_store"
    }

    fn schema(&self) -> Schema {
        let mut schema = Schema::v0().with_attribute("name", Attribute::required_string());
        schema.block = computed_strings(schema.block, &STORE_COLUMNS);
        schema
    }

    async fn read(&self, client: &Client, config: Value) -> Result<Value, ProviderError> {
        let name = lookup_key(&config, "name")?;
        let found = store::describe_summary(client, &client.session(), name)
            .await?
            .ok_or_else(|| ProviderError::NotFound(format!("store {} not found", name)))?;
        merge(config, &found)
    }
}

/// List every store.
pub struct StoresDataSource;

#[async_trait::async_trait]
impl DataSource for StoresDataSource {
    fn type_name(&self) -> &'static str {
        "deltastream_stores"
    }

    fn schema(&self) -> Schema {
        let item = computed_strings(Block::new(), &["name"]);
        Schema::v0().with_block(
            "stores",
            NestedBlock::list(computed_strings(item, &STORE_COLUMNS)),
        )
    }

    async fn read(&self, client: &Client, config: Value) -> Result<Value, ProviderError> {
        let rs = store::list(client).await?;
        let items: Vec<StoreSummary> = rs.rows().filter_map(StoreSummary::from_row).collect();
        with_items(config, "stores", &items)
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

    fn rows() -> ResultSet {
        ResultSet::from_rows(
            &["Name", "Type", "State", "Uris", "Owner", "Created At", "Updated At"],
            vec![vec![
                json!("kafka_main"),
                json!("Kafka"),
                json!("ready"),
                json!("b1:9092"),
                json!("sysadmin"),
                json!("2024-01-01"),
                json!("2024-01-02"),
            ]],
        )
    }

    #[tokio::test]
    async fn test_store_lookup() {
        let driver = Arc::new(MockDriver::new());
        driver.respond("DESCRIBE STORE", rows());
        driver.fail("DESCRIBE STORE \"gone\"", "42704", "store not found");
        let client = test_client(driver);

        let found = StoreDataSource
            .read(&client, json!({"name": "kafka_main"}))
            .await
            .unwrap();
        assert_eq!(found["type"], "Kafka");
        assert_eq!(found["uris"], "b1:9092");

        let err = StoreDataSource
            .read(&client, json!({"name": "gone"}))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_stores_listing() {
        let driver = Arc::new(MockDriver::new());
        driver.respond("LIST STORES", rows());
        let client = test_client(driver);

        let listed = StoresDataSource.read(&client, json!({})).await.unwrap();
        assert_eq!(listed["stores"][0]["name"], "kafka_main");
        assert_eq!(listed["stores"][0]["state"], "ready");
    }

    #[test]
    fn test_schema_is_computed() {
        let schema = StoreDataSource.schema();
        assert!(schema.attribute("state").unwrap().flags.is_computed_only());
        assert!(schema.attribute("name").unwrap().flags.required);
    }
}
