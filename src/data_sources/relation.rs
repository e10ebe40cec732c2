//! `deltastream_relation` and `deltastream_relations`

use serde_json::Value;

use super::{computed_strings, lookup_key, merge, with_items, DataSource};
use crate::client::Client;
use crate::error::ProviderError;
use crate::resources::relation::{self, RelationSummary};
use crate::schema::{Attribute, Block, NestedBlock, Schema};

const RELATION_COLUMNS: [&str; 6] = ["fqn", "type", "state", "owner", "created_at", "updated_at"];

/// Look up one relation in a namespace.
pub struct RelationDataSource;

#[async_trait::async_trait]
impl DataSource for RelationDataSource {
    fn type_name(&self) -> &'static str {
        "deltastream_relation"
    }

    fn schema(&self) -> Schema {
        let mut schema = Schema::v0()
            .with_attribute("database", Attribute::required_string())
            .with_attribute("namespace", Attribute::required_string())
            .with_attribute("name", Attribute::required_string());
        schema.block = computed_strings(schema.block, &RELATION_COLUMNS);
        schema
    }

    async fn read(&self, client: &Client, config: Value) -> Result<Value, ProviderError> {
        let database = lookup_key(&config, "database")?;
        let namespace = lookup_key(&config, "namespace")?;
        let name = lookup_key(&config, "name")?;
        let session = client
            .session()
            .with_database(database)
            .with_namespace(namespace);
        let found = relation::describe_summary(client, &session, database, namespace, name)
            .await?
            .ok_or_else(|| {
                ProviderError::NotFound(format!(
                    "relation {}.{}.{} not found",
                    database, namespace, name
                ))
            })?;
        merge(config, &found)
    }
}

/// List the relations of a namespace.
pub struct RelationsDataSource;

#[async_trait::async_trait]
impl DataSource for RelationsDataSource {
    fn type_name(&self) -> &'static str {
        "deltastream_relations"
    }

    fn schema(&self) -> Schema {
        let item = computed_strings(Block::new(), &["name"]);
        Schema::v0()
            .with_attribute("database", Attribute::required_string())
            .with_attribute("namespace", Attribute::required_string())
            .with_block(
                "relations",
                NestedBlock::list(computed_strings(item, &RELATION_COLUMNS)),
            )
    }

    async fn read(&self, client: &Client, config: Value) -> Result<Value, ProviderError> {
        let database = lookup_key(&config, "database")?.to_string();
        let namespace = lookup_key(&config, "namespace")?.to_string();
        let rs = relation::list(client, &database, &namespace).await?;
        let items: Vec<RelationSummary> = rs
            .rows()
            .filter_map(|row| RelationSummary::from_row(&database, &namespace, row))
            .collect();
        with_items(config, "relations", &items)
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
            &["Name", "Type", "State", "Owner"],
            vec![
                vec![json!("pageviews"), json!("Stream"), json!("running"), json!("etl")],
                vec![json!("users"), json!("Changelog"), json!("created"), json!("etl")],
            ],
        )
    }

    #[tokio::test]
    async fn test_relation_lookup() {
        let driver = Arc::new(MockDriver::new());
        driver.respond("DESCRIBE RELATION", rows());
        driver.fail(
            "DESCRIBE RELATION \"analytics\".\"public\".\"gone\"",
            "42P01",
            "relation does not exist",
        );
        let client = test_client(driver.clone());

        let found = RelationDataSource
            .read(
                &client,
                json!({"database": "analytics", "namespace": "public", "name": "pageviews"}),
            )
            .await
            .unwrap();
        assert_eq!(found["type"], "Stream");
        assert_eq!(found["fqn"], "analytics.public.pageviews");
        assert!(found.get("ddl").is_none());

        let session = &driver.executed()[0].session;
        assert_eq!(session.database.as_deref(), Some("analytics"));

        let err = RelationDataSource
            .read(
                &client,
                json!({"database": "analytics", "namespace": "public", "name": "gone"}),
            )
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_relations_listing() {
        let driver = Arc::new(MockDriver::new());
        driver.respond("LIST RELATIONS", rows());
        let client = test_client(driver);

        let listed = RelationsDataSource
            .read(&client, json!({"database": "analytics", "namespace": "public"}))
            .await
            .unwrap();
        let relations = listed["relations"].as_array().unwrap();
        assert_eq!(relations.len(), 2);
        assert_eq!(relations[1]["state"], "created");
    }
}
