//! `deltastream_regions`

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{computed_strings, with_items, DataSource};
use crate::client::Client;
use crate::driver::Row;
use crate::error::ProviderError;
use crate::schema::{Block, NestedBlock, Schema};
use crate::sql;

/// A region the organization can deploy into.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionSummary {
    /// Region name.
    pub name: String,
    /// Cloud provider.
    #[serde(default)]
    pub cloud: Option<String>,
    /// Provider-side region code.
    #[serde(default)]
    pub region: Option<String>,
}

impl RegionSummary {
    /// Build from a `LIST REGIONS` row.
    pub fn from_row(row: Row<'_>) -> Option<Self> {
        Some(Self {
            name: row.text("name")?,
            cloud: row.text("cloud"),
            region: row.text("region"),
        })
    }
}

/// List available regions.
pub struct RegionsDataSource;

#[async_trait::async_trait]
impl DataSource for RegionsDataSource {
    fn type_name(&self) -> &'static str {
        "deltastream_regions"
    }

    fn schema(&self) -> Schema {
        Schema::v0().with_block(
            "regions",
            NestedBlock::list(computed_strings(
                Block::new(),
                &["name", "cloud", "region"],
            )),
        )
    }

    async fn read(&self, client: &Client, config: Value) -> Result<Value, ProviderError> {
        let rs = client
            .execute(&client.session(), &sql::list_regions())
            .await?;
        let items: Vec<RegionSummary> = rs.rows().filter_map(RegionSummary::from_row).collect();
        with_items(config, "regions", &items)
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
    async fn test_regions_listing() {
        let driver = Arc::new(MockDriver::new());
        driver.respond(
            "LIST REGIONS",
            ResultSet::from_rows(
                &["Name", "Cloud", "Region"],
                vec![
                    vec![json!("AWS us-east-1"), json!("aws"), json!("us-east-1")],
                    vec![json!("GCP us-central1"), json!("gcp"), json!("us-central1")],
                ],
            ),
        );
        let client = test_client(driver);

        let listed = RegionsDataSource.read(&client, json!({})).await.unwrap();
        assert_eq!(listed["regions"][1]["cloud"], "gcp");
        assert_eq!(listed["regions"][0]["region"], "us-east-1");
    }

    #[tokio::test]
    async fn test_listing_errors_propagate() {
        let driver = Arc::new(MockDriver::new());
        driver.fail("LIST REGIONS", "42501", "permission denied");
        let client = test_client(driver);

        let err = RegionsDataSource.read(&client, json!({})).await.unwrap_err();
        assert!(matches!(err, ProviderError::PermissionDenied(_)));
    }
}
