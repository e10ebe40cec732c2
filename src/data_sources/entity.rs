//! `deltastream_entities`

use serde_json::Value;

use super::{lookup_key, with_items, DataSource};
use crate::client::Client;
use crate::error::ProviderError;
use crate::resources::entity::{self, EntitySummary};
use crate::schema::{Attribute, Block, NestedBlock, Schema};

/// List the entities of a store.
pub struct EntitiesDataSource;

#[async_trait::async_trait]
impl DataSource for EntitiesDataSource {
    fn type_name(&self) -> &'static str {
        "deltastream_entities"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("store", Attribute::required_string())
            .with_block(
                "entities",
                NestedBlock::list(
                    Block::new()
                        .with_attribute("store", Attribute::computed_string())
                        .with_attribute("name", Attribute::computed_string())
                        .with_attribute("is_leaf", Attribute::computed_bool()),
                ),
            )
    }

    async fn read(&self, client: &Client, config: Value) -> Result<Value, ProviderError> {
        let store = lookup_key(&config, "store")?.to_string();
        let rs = entity::list(client, &store).await?;
        let items: Vec<EntitySummary> = rs
            .rows()
            .filter_map(|row| EntitySummary::from_row(&store, row))
            .collect();
        with_items(config, "entities", &items)
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
    async fn test_entities_listing() {
        let driver = Arc::new(MockDriver::new());
        driver.respond(
            "LIST ENTITIES IN STORE \"kafka_main\"",
            ResultSet::from_rows(
                &["Name", "Is Leaf"],
                vec![
                    vec![json!("pageviews"), json!(true)],
                    vec![json!("users"), json!("false")],
                ],
            ),
        );
        let client = test_client(driver.clone());

        let listed = EntitiesDataSource
            .read(&client, json!({"store": "kafka_main"}))
            .await
            .unwrap();
        assert_eq!(listed["entities"][0]["name"], "pageviews");
        assert_eq!(listed["entities"][1]["is_leaf"], false);
        assert_eq!(listed["entities"][1]["store"], "kafka_main");
        assert_eq!(
            driver.executed()[0].session.store.as_deref(),
            Some("kafka_main")
        );
    }

    #[tokio::test]
    async fn test_missing_store_lists_nothing() {
        let driver = Arc::new(MockDriver::new());
        driver.fail("LIST ENTITIES", "42704", "store not found");
        let client = test_client(driver);

        let listed = EntitiesDataSource
            .read(&client, json!({"store": "gone"}))
            .await
            .unwrap();
        assert_eq!(listed["entities"], json!([]));
    }
}
