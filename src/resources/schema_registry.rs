//! `deltastream_schema_registry`

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument};

use super::{decode, describe, encode, is_failed_state, Resource};
use crate::client::Client;
use crate::driver::{ResultSet, Row, SessionContext};
use crate::error::ProviderError;
use crate::retry::{poll_until, wait_until_absent, PollStatus};
use crate::schema::{Attribute, Block, Diagnostic, NestedBlock, Schema};
use crate::sql::{self, WithClause};

/// Type blocks and their `'type'` keywords.
pub const SCHEMA_REGISTRY_KINDS: [(&str, &str); 2] = [
    ("confluent", "CONFLUENT"),
    ("confluent_cloud", "CONFLUENT_CLOUD"),
];

/// A self-hosted Confluent schema registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfluentBlock {
    /// Registry URL.
    pub uris: String,
    /// Basic-auth username.
    #[serde(default)]
    pub username: Option<String>,
    /// Basic-auth password.
    #[serde(default)]
    pub password: Option<String>,
}

/// A Confluent Cloud schema registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfluentCloudBlock {
    /// Registry URL.
    pub uris: String,
    /// API key.
    #[serde(default)]
    pub key: Option<String>,
    /// API secret.
    #[serde(default)]
    pub secret: Option<String>,
}

/// A schema registry as the catalog reports it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaRegistrySummary {
    /// Registry name.
    pub name: String,
    /// Registry type as reported.
    #[serde(rename = "type", default)]
    pub registry_type: Option<String>,
    /// Provisioning state.
    #[serde(default)]
    pub state: Option<String>,
    /// Registry URIs.
    #[serde(default)]
    pub uris: Option<String>,
    /// Owning role.
    #[serde(default)]
    pub owner: Option<String>,
    /// Creation timestamp.
    #[serde(default)]
    pub created_at: Option<String>,
    /// Last update timestamp.
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl SchemaRegistrySummary {
    /// Build from a `LIST SCHEMA_REGISTRIES` or `DESCRIBE SCHEMA_REGISTRY` row.
    pub fn from_row(row: Row<'_>) -> Option<Self> {
        Some(Self {
            name: row.text("name")?,
            registry_type: row.text("type"),
            state: row.text("state"),
            uris: row.text("uris"),
            owner: row.text("owner"),
            created_at: row.text("created_at"),
            updated_at: row.text("updated_at"),
        })
    }
}

/// State of a schema registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaRegistryState {
    /// Registry name.
    pub name: String,
    /// Owning role.
    #[serde(default)]
    pub owner: Option<String>,
    /// Self-hosted settings.
    #[serde(default)]
    pub confluent: Option<ConfluentBlock>,
    /// Confluent Cloud settings.
    #[serde(default)]
    pub confluent_cloud: Option<ConfluentCloudBlock>,
    /// Registry type as reported.
    #[serde(rename = "type", default)]
    pub registry_type: Option<String>,
    /// Provisioning state.
    #[serde(default)]
    pub state: Option<String>,
    /// Creation timestamp.
    #[serde(default)]
    pub created_at: Option<String>,
    /// Last update timestamp.
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl SchemaRegistryState {
    /// Render the `WITH` clause for the configured block.
    pub fn with_clause(&self, include_type: bool) -> Result<WithClause, ProviderError> {
        let mut with = WithClause::new();
        match (&self.confluent, &self.confluent_cloud) {
            (Some(b), None) => {
                if include_type {
                    with.keyword("type", Some("CONFLUENT"));
                }
                with.literal("uris", Some(&b.uris))
                    .literal("confluent.username", b.username.as_deref())
                    .literal("confluent.password", b.password.as_deref());
            }
            (None, Some(b)) => {
                if include_type {
                    with.keyword("type", Some("CONFLUENT_CLOUD"));
                }
                with.literal("uris", Some(&b.uris))
                    .literal("confluent_cloud.key", b.key.as_deref())
                    .literal("confluent_cloud.secret", b.secret.as_deref());
            }
            _ => {
                return Err(ProviderError::InvalidRequest(format!(
                    "schema registry {} must set exactly one of confluent, confluent_cloud",
                    self.name
                )))
            }
        }
        Ok(with)
    }

    fn kind(&self) -> Option<&'static str> {
        match (&self.confluent, &self.confluent_cloud) {
            (Some(_), None) => Some("confluent"),
            (None, Some(_)) => Some("confluent_cloud"),
            _ => None,
        }
    }

    fn apply(&mut self, summary: SchemaRegistrySummary) {
        if let Some(uris) = summary.uris {
            if let Some(b) = self.confluent.as_mut() {
                b.uris = uris;
            } else if let Some(b) = self.confluent_cloud.as_mut() {
                b.uris = uris;
            } else {
                let reported = summary
                    .registry_type
                    .as_deref()
                    .map(|t| t.to_ascii_uppercase().replace(['_', ' '], ""))
                    .unwrap_or_default();
                if reported == "CONFLUENTCLOUD" {
                    self.confluent_cloud = Some(ConfluentCloudBlock {
                        uris,
                        ..Default::default()
                    });
                } else {
                    self.confluent = Some(ConfluentBlock {
                        uris,
                        ..Default::default()
                    });
                }
            }
        }
        if summary.owner.is_some() {
            self.owner = summary.owner;
        }
        self.registry_type = summary.registry_type;
        self.state = summary.state;
        self.created_at = summary.created_at;
        self.updated_at = summary.updated_at;
    }
}

fn configured_kind(config: &Value) -> Option<&'static str> {
    SCHEMA_REGISTRY_KINDS
        .iter()
        .map(|(kind, _)| *kind)
        .find(|kind| config.get(*kind).is_some_and(|v| !v.is_null()))
}

pub(crate) async fn list(client: &Client) -> Result<ResultSet, ProviderError> {
    client
        .execute(&client.session(), &sql::list_schema_registries())
        .await
}

pub(crate) async fn describe_summary(
    client: &Client,
    session: &SessionContext,
    name: &str,
) -> Result<Option<SchemaRegistrySummary>, ProviderError> {
    let rs = describe(client, session, &sql::describe_schema_registry(name)).await?;
    Ok(rs.as_ref().and_then(ResultSet::first).and_then(SchemaRegistrySummary::from_row))
}

async fn wait_until_ready(
    client: &Client,
    session: &SessionContext,
    name: &str,
) -> Result<SchemaRegistrySummary, ProviderError> {
    let what = format!("schema registry {} to become ready", name);
    poll_until(client.poll_policy(), &what, || async move {
        let Some(summary) = describe_summary(client, session, name).await? else {
            return Ok(PollStatus::Pending("not yet visible".to_string()));
        };
        // Registries without a provisioning state are usable once visible.
        let state = summary.state.clone().unwrap_or_else(|| "ready".to_string());
        if state.eq_ignore_ascii_case("ready") {
            Ok(PollStatus::Ready(summary))
        } else if is_failed_state(&state) {
            Err(ProviderError::FailedPrecondition(format!(
                "schema registry {} entered state {}",
                name, state
            )))
        } else {
            Ok(PollStatus::Pending(format!("state is {:?}", state)))
        }
    })
    .await
}

/// A schema registry used to decode Avro and Protobuf payloads.
pub struct SchemaRegistryResource;

#[async_trait::async_trait]
impl Resource for SchemaRegistryResource {
    fn type_name(&self) -> &'static str {
        "deltastream_schema_registry"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("A schema registry that stores can decode messages with.")
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_description("Name of the schema registry")
                    .with_force_new(),
            )
            .with_attribute(
                "owner",
                Attribute::optional_computed_string().with_force_new(),
            )
            .with_attribute("type", Attribute::computed_string())
            .with_attribute("state", Attribute::computed_string())
            .with_attribute("created_at", Attribute::computed_string())
            .with_attribute("updated_at", Attribute::computed_string())
            .with_block(
                "confluent",
                NestedBlock::single(
                    Block::new()
                        .with_description("Self-hosted Confluent schema registry")
                        .with_attribute("uris", Attribute::required_string())
                        .with_attribute("username", Attribute::optional_string())
                        .with_attribute("password", Attribute::optional_string().sensitive()),
                ),
            )
            .with_block(
                "confluent_cloud",
                NestedBlock::single(
                    Block::new()
                        .with_description("Confluent Cloud schema registry")
                        .with_attribute("uris", Attribute::required_string())
                        .with_attribute("key", Attribute::optional_string())
                        .with_attribute("secret", Attribute::optional_string().sensitive()),
                ),
            )
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let set = SCHEMA_REGISTRY_KINDS
            .iter()
            .filter(|(kind, _)| config.get(*kind).is_some_and(|v| !v.is_null()))
            .count();
        if set == 1 {
            Vec::new()
        } else {
            vec![Diagnostic::error(
                "Exactly one of confluent, confluent_cloud must be set",
            )]
        }
    }

    fn requires_replace(&self, prior: &Value, proposed: &Value) -> bool {
        configured_kind(prior) != configured_kind(proposed)
    }

    #[instrument(skip(self, client, planned), fields(resource_type = self.type_name()))]
    async fn create(&self, client: &Client, planned: Value) -> Result<Value, ProviderError> {
        let mut state: SchemaRegistryState = decode(planned)?;
        let with = state.with_clause(true)?;
        let session = client.session_as(state.owner.as_deref());

        client
            .execute(&session, &sql::create_schema_registry(&state.name, &with))
            .await?;

        let summary = match wait_until_ready(client, &session, &state.name).await {
            Ok(summary) => summary,
            Err(e) => {
                return Err(client
                    .cleanup_after(&session, &sql::drop_schema_registry(&state.name), e)
                    .await)
            }
        };

        state.apply(summary);
        info!(name = %state.name, "schema registry created");
        encode(&state)
    }

    async fn read(&self, client: &Client, current: Value) -> Result<Value, ProviderError> {
        let mut state: SchemaRegistryState = decode(current)?;
        match describe_summary(client, &client.session(), &state.name).await? {
            Some(summary) => {
                state.apply(summary);
                encode(&state)
            }
            None => Err(ProviderError::NotFound(format!(
                "schema registry {} not found",
                state.name
            ))),
        }
    }

    #[instrument(skip(self, client, prior, planned), fields(resource_type = self.type_name()))]
    async fn update(
        &self,
        client: &Client,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let prior: SchemaRegistryState = decode(prior)?;
        let mut state: SchemaRegistryState = decode(planned)?;
        if prior.kind() != state.kind() {
            return Err(ProviderError::FailedPrecondition(format!(
                "schema registry {} cannot change type in place",
                state.name
            )));
        }

        let with = state.with_clause(false)?;
        let session = client.session_as(state.owner.as_deref());
        client
            .execute(&session, &sql::update_schema_registry(&state.name, &with))
            .await?;

        let summary = wait_until_ready(client, &session, &state.name).await?;
        state.apply(summary);
        encode(&state)
    }

    #[instrument(skip(self, client, current), fields(resource_type = self.type_name()))]
    async fn delete(&self, client: &Client, current: Value) -> Result<(), ProviderError> {
        let current: SchemaRegistryState = decode(current)?;
        let session = client.session_as(current.owner.as_deref());
        match client
            .execute(&session, &sql::drop_schema_registry(&current.name))
            .await
        {
            Ok(_) => {}
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e),
        }

        let (name, session) = (current.name.as_str(), &session);
        let what = format!("schema registry {} to be dropped", name);
        wait_until_absent(client.poll_policy(), &what, || async move {
            Ok(describe_summary(client, session, name).await?.is_some())
        })
        .await
    }

    async fn import(&self, client: &Client, id: &str) -> Result<Value, ProviderError> {
        self.read(client, serde_json::json!({ "name": id })).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::test_client;
    use crate::testing::{MockDriver, MockReply};
    use serde_json::json;
    use std::sync::Arc;

    fn described(kind: &str, state: &str) -> ResultSet {
        ResultSet::from_rows(
            &["Name", "Type", "State", "Uris", "Owner", "Created At", "Updated At"],
            vec![vec![
                json!("sr"),
                json!(kind),
                json!(state),
                json!("https://sr.example.com"),
                json!("sysadmin"),
                json!("2024-05-01T10:00:00Z"),
                json!("2024-05-01T10:00:00Z"),
            ]],
        )
    }

    fn cloud_config() -> Value {
        json!({
            "name": "sr",
            "confluent_cloud": {"uris": "https://sr.example.com", "key": "k", "secret": "s"}
        })
    }

    #[test]
    fn test_with_clause() {
        let state: SchemaRegistryState = decode(cloud_config()).unwrap();
        assert_eq!(
            state.with_clause(true).unwrap().to_string(),
            "WITH ( 'type' = CONFLUENT_CLOUD, 'uris' = 'https://sr.example.com', \
             'confluent_cloud.key' = 'k', 'confluent_cloud.secret' = 's' )"
        );

        let neither: SchemaRegistryState = decode(json!({"name": "sr"})).unwrap();
        assert!(neither.with_clause(true).is_err());
    }

    #[test]
    fn test_validate_and_replace() {
        assert!(SchemaRegistryResource.validate(&cloud_config()).is_empty());
        assert_eq!(
            SchemaRegistryResource
                .validate(&json!({"name": "sr"}))
                .len(),
            1
        );

        let self_hosted = json!({"name": "sr", "confluent": {"uris": "https://sr"}});
        assert!(SchemaRegistryResource.requires_replace(&cloud_config(), &self_hosted));
        assert!(!SchemaRegistryResource.requires_replace(&cloud_config(), &cloud_config()));
    }

    #[tokio::test]
    async fn test_create_failure_cleans_up() {
        let driver = Arc::new(MockDriver::new());
        driver.respond("DESCRIBE SCHEMA_REGISTRY", described("ConfluentCloud", "failed"));
        let client = test_client(driver.clone());

        let err = SchemaRegistryResource
            .create(&client, cloud_config())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::FailedPrecondition(_)));
        assert_eq!(
            driver.statements_starting_with("DROP SCHEMA_REGISTRY"),
            vec!["DROP SCHEMA_REGISTRY \"sr\";".to_string()]
        );
    }

    #[tokio::test]
    async fn test_create_update_import() {
        let driver = Arc::new(MockDriver::new());
        driver.respond("DESCRIBE SCHEMA_REGISTRY", described("ConfluentCloud", "ready"));
        let client = test_client(driver.clone());

        let state = SchemaRegistryResource
            .create(&client, cloud_config())
            .await
            .unwrap();
        assert_eq!(state["state"], "ready");
        assert_eq!(state["confluent_cloud"]["secret"], "s");

        let mut planned = state.clone();
        planned["confluent_cloud"]["secret"] = json!("rotated");
        SchemaRegistryResource
            .update(&client, state, planned)
            .await
            .unwrap();
        assert_eq!(
            driver.statements_starting_with("UPDATE SCHEMA_REGISTRY")[0],
            "UPDATE SCHEMA_REGISTRY \"sr\" WITH ( 'uris' = 'https://sr.example.com', \
             'confluent_cloud.key' = 'k', 'confluent_cloud.secret' = 'rotated' );"
        );

        let imported = SchemaRegistryResource.import(&client, "sr").await.unwrap();
        assert_eq!(imported["confluent_cloud"]["uris"], "https://sr.example.com");
        assert!(imported["confluent"].is_null());
    }

    #[tokio::test]
    async fn test_delete_tolerates_missing() {
        let driver = Arc::new(MockDriver::new());
        driver.script(
            "DROP SCHEMA_REGISTRY",
            vec![MockReply::error("42704", "schema registry not found")],
        );
        let client = test_client(driver.clone());

        SchemaRegistryResource
            .delete(&client, cloud_config())
            .await
            .unwrap();
        assert_eq!(driver.statements().len(), 1);
    }
}
