//! `deltastream_schema_registry` and `deltastream_schema_registries`

use serde_json::Value;

use super::{computed_strings, lookup_key, merge, with_items, DataSource};
use crate::client::Client;
use crate::error::ProviderError;
use crate::resources::schema_registry::{self, SchemaRegistrySummary};
use crate::schema::{Attribute, Block, NestedBlock, Schema};

const REGISTRY_COLUMNS: [&str; 6] = ["type", "state", "uris", "owner", "created_at", "updated_at"];

/// Look up one schema registry by name.
pub struct SchemaRegistryDataSource;

#[async_trait::async_trait]
impl DataSource for SchemaRegistryDataSource {
    fn type_name(&self) -> &'static str {
        "deltastream_schema_registry"
    }

    fn schema(&self) -> Schema {
        let mut schema = Schema::v0().with_attribute("name", Attribute::required_string());
        schema.block = computed_strings(schema.block, &REGISTRY_COLUMNS);
        schema
    }

    async fn read(&self, client: &Client, config: Value) -> Result<Value, ProviderError> {
        let name = lookup_key(&config, "name")?;
        let found = schema_registry::describe_summary(client, &client.session(), name)
            .await?
            .ok_or_else(|| {
                ProviderError::NotFound(format!("schema registry {} not found", name))
            })?;
        merge(config, &found)
    }
}

/// List every schema registry.
pub struct SchemaRegistriesDataSource;

#[async_trait::async_trait]
impl DataSource for SchemaRegistriesDataSource {
    fn type_name(&self) -> &'static str {
        "deltastream_schema_registries"
    }

    fn schema(&self) -> Schema {
        let item = computed_strings(Block::new(), &["name"]);
        Schema::v0().with_block(
            "schema_registries",
            NestedBlock::list(computed_strings(item, &REGISTRY_COLUMNS)),
        )
    }

    async fn read(&self, client: &Client, config: Value) -> Result<Value, ProviderError> {
        let rs = schema_registry::list(client).await?;
        let items: Vec<SchemaRegistrySummary> = rs
            .rows()
            .filter_map(SchemaRegistrySummary::from_row)
            .collect();
        with_items(config, "schema_registries", &items)
    }
}
