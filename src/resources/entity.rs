//! `deltastream_entity`

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument};

use super::{decode, encode, list_or_empty, split_import_id, Resource};
use crate::client::Client;
use crate::driver::{ResultSet, Row};
use crate::error::ProviderError;
use crate::retry::{poll_until, wait_until_absent, PollStatus};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Diagnostic, Schema};
use crate::sql::{self, Param, WithClause};

/// An entity as listed in its store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntitySummary {
    /// Store the entity lives in.
    pub store: String,
    /// Entity name (a topic, stream, or table).
    pub name: String,
    /// Whether the entity holds data rather than other entities.
    #[serde(default)]
    pub is_leaf: Option<bool>,
}

impl EntitySummary {
    /// Build from a `LIST ENTITIES` row of `store`.
    pub fn from_row(store: &str, row: Row<'_>) -> Option<Self> {
        Some(Self {
            store: store.to_string(),
            name: row.text("name")?,
            is_leaf: row.flag("is_leaf"),
        })
    }
}

/// State of an entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    /// Store the entity lives in.
    pub store: String,
    /// Entity name.
    pub name: String,
    /// Kafka topic partitions.
    #[serde(default)]
    pub partitions: Option<i64>,
    /// Kafka topic replication factor.
    #[serde(default)]
    pub replicas: Option<i64>,
    /// Additional `WITH` parameters, passed through as strings.
    #[serde(default)]
    pub params: Option<BTreeMap<String, String>>,
    /// Whether the entity holds data.
    #[serde(default)]
    pub is_leaf: Option<bool>,
}

impl EntityState {
    /// Render the `WITH` clause for `CREATE ENTITY`.
    pub fn with_clause(&self) -> WithClause {
        let mut with = WithClause::new();
        with.int("kafka.topic.partitions", self.partitions)
            .int("kafka.topic.replicas", self.replicas);
        for (key, value) in self.params.iter().flatten() {
            with.set(key.as_str(), Param::Literal(value.clone()));
        }
        with
    }
}

pub(crate) async fn list(client: &Client, store: &str) -> Result<ResultSet, ProviderError> {
    list_or_empty(
        client,
        &client.session().with_store(store),
        &sql::list_entities(store),
    )
    .await
}

async fn lookup(
    client: &Client,
    store: &str,
    name: &str,
) -> Result<Option<EntitySummary>, ProviderError> {
    let rs = list(client, store).await?;
    Ok(rs
        .find("name", name)
        .and_then(|row| EntitySummary::from_row(store, row)))
}

/// A topic or stream inside a store.
pub struct EntityResource;

#[async_trait::async_trait]
impl Resource for EntityResource {
    fn type_name(&self) -> &'static str {
        "deltastream_entity"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("An entity (topic, stream or table) in a store.")
            .with_attribute(
                "store",
                Attribute::required_string().with_force_new(),
            )
            .with_attribute("name", Attribute::required_string().with_force_new())
            .with_attribute(
                "partitions",
                Attribute::optional_int64()
                    .with_description("Number of topic partitions")
                    .with_force_new(),
            )
            .with_attribute(
                "replicas",
                Attribute::optional_int64()
                    .with_description("Topic replication factor")
                    .with_force_new(),
            )
            .with_attribute(
                "params",
                Attribute::new(
                    AttributeType::map(AttributeType::String),
                    AttributeFlags::optional(),
                )
                .with_description("Extra entity parameters")
                .with_force_new(),
            )
            .with_attribute("is_leaf", Attribute::computed_bool())
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        ["partitions", "replicas"]
            .into_iter()
            .filter(|field| {
                config
                    .get(*field)
                    .and_then(Value::as_i64)
                    .is_some_and(|n| n < 1)
            })
            .map(|field| {
                Diagnostic::error(format!("'{}' must be at least 1", field)).with_attribute(field)
            })
            .collect()
    }

    #[instrument(skip(self, client, planned), fields(resource_type = self.type_name()))]
    async fn create(&self, client: &Client, planned: Value) -> Result<Value, ProviderError> {
        let mut state: EntityState = decode(planned)?;
        let session = client.session().with_store(&state.store);
        client
            .execute(
                &session,
                &sql::create_entity(&state.store, &state.name, &state.with_clause()),
            )
            .await?;

        let (store, name) = (state.store.as_str(), state.name.as_str());
        let what = format!("entity {} in store {}", name, store);
        let listed = poll_until(client.poll_policy(), &what, || async move {
            Ok(match lookup(client, store, name).await? {
                Some(summary) => PollStatus::Ready(summary),
                None => PollStatus::Pending("not yet listed".to_string()),
            })
        })
        .await;

        let summary = match listed {
            Ok(summary) => summary,
            Err(e) => {
                let drop = sql::drop_entity(store, name);
                return Err(client.cleanup_after(&session, &drop, e).await);
            }
        };

        state.is_leaf = summary.is_leaf;
        info!(store = %state.store, name = %state.name, "entity created");
        encode(&state)
    }

    async fn read(&self, client: &Client, current: Value) -> Result<Value, ProviderError> {
        let mut state: EntityState = decode(current)?;
        match lookup(client, &state.store, &state.name).await? {
            Some(summary) => {
                state.is_leaf = summary.is_leaf;
                encode(&state)
            }
            None => Err(ProviderError::NotFound(format!(
                "entity {} not found in store {}",
                state.name, state.store
            ))),
        }
    }

    #[instrument(skip(self, client, current), fields(resource_type = self.type_name()))]
    async fn delete(&self, client: &Client, current: Value) -> Result<(), ProviderError> {
        let state: EntityState = decode(current)?;
        let session = client.session().with_store(&state.store);
        match client
            .execute(&session, &sql::drop_entity(&state.store, &state.name))
            .await
        {
            Ok(_) => {}
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e),
        }

        let (store, name) = (state.store.as_str(), state.name.as_str());
        let what = format!("entity {} in store {} to be dropped", name, store);
        wait_until_absent(client.poll_policy(), &what, || async move {
            Ok(lookup(client, store, name).await?.is_some())
        })
        .await
    }

    async fn import(&self, client: &Client, id: &str) -> Result<Value, ProviderError> {
        let parts = split_import_id(id, 2, "<store>/<entity>")?;
        self.read(
            client,
            serde_json::json!({ "store": parts[0], "name": parts[1] }),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::test_client;
    use crate::testing::MockDriver;
    use serde_json::json;
    use std::sync::Arc;

    fn listing(names: &[&str]) -> ResultSet {
        ResultSet::from_rows(
            &["Name", "Is Leaf"],
            names.iter().map(|n| vec![json!(n), json!(true)]).collect(),
        )
    }

    #[test]
    fn test_with_clause_includes_params() {
        let state: EntityState = decode(json!({
            "store": "kafka_main",
            "name": "pageviews",
            "partitions": 3,
            "params": {"kafka.topic.retention.ms": "86400000"}
        }))
        .unwrap();
        assert_eq!(
            state.with_clause().to_string(),
            "WITH ( 'kafka.topic.partitions' = 3, 'kafka.topic.retention.ms' = '86400000' )"
        );
    }

    #[test]
    fn test_validate_counts() {
        let diags = EntityResource.validate(&json!({
            "store": "s", "name": "e", "partitions": 0, "replicas": 2
        }));
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].attribute.as_deref(), Some("partitions"));
    }

    #[tokio::test]
    async fn test_create_and_import() {
        let driver = Arc::new(MockDriver::new());
        driver.script(
            "LIST ENTITIES",
            vec![listing(&[]).into(), listing(&["pageviews"]).into()],
        );
        let client = test_client(driver.clone());

        let state = EntityResource
            .create(
                &client,
                json!({"store": "kafka_main", "name": "pageviews", "partitions": 1, "replicas": 3}),
            )
            .await
            .unwrap();
        assert_eq!(state["is_leaf"], true);
        assert_eq!(
            driver.statements()[0],
            "CREATE ENTITY \"pageviews\" IN STORE \"kafka_main\" WITH ( \
             'kafka.topic.partitions' = 1, 'kafka.topic.replicas' = 3 );"
        );
        assert_eq!(
            driver.executed()[1].session.store.as_deref(),
            Some("kafka_main")
        );

        let imported = EntityResource
            .import(&client, "kafka_main/pageviews")
            .await
            .unwrap();
        assert_eq!(imported["name"], "pageviews");
        assert!(imported["partitions"].is_null());
    }

    #[tokio::test]
    async fn test_create_timeout_drops_entity() {
        let driver = Arc::new(MockDriver::new());
        driver.respond("LIST ENTITIES", listing(&[]));
        let client = test_client(driver.clone());

        let err = EntityResource
            .create(&client, json!({"store": "kafka_main", "name": "pageviews"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::DeadlineExceeded(_)));
        assert_eq!(driver.statements_starting_with("DROP ENTITY").len(), 1);
    }

    #[tokio::test]
    async fn test_delete_and_read_gone() {
        let driver = Arc::new(MockDriver::new());
        driver.script(
            "LIST ENTITIES",
            vec![listing(&["pageviews"]).into(), listing(&[]).into()],
        );
        let client = test_client(driver.clone());

        let state = json!({"store": "kafka_main", "name": "pageviews"});
        EntityResource.delete(&client, state.clone()).await.unwrap();
        assert_eq!(
            driver.statements()[0],
            "DROP ENTITY \"pageviews\" IN STORE \"kafka_main\";"
        );

        let err = EntityResource.read(&client, state).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
