//! `deltastream_relation`
//!
//! Relations (streams, changelogs, tables) are created from user-supplied DDL
//! run inside the target database and namespace. The relation name is taken
//! from the DDL itself.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument, warn};

use super::{decode, describe, encode, is_failed_state, split_import_id, Resource};
use crate::client::Client;
use crate::driver::{ResultSet, Row, SessionContext};
use crate::error::ProviderError;
use crate::retry::{poll_until, wait_until_absent, PollStatus};
use crate::schema::{Attribute, Diagnostic, Schema};
use crate::sql;

/// States in which a relation is usable.
pub const READY_STATES: [&str; 2] = ["created", "running"];

/// A relation as the catalog reports it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationSummary {
    /// Relation name.
    pub name: String,
    /// Fully qualified name.
    #[serde(default)]
    pub fqn: Option<String>,
    /// `Stream`, `Changelog` or `Table`.
    #[serde(rename = "type", default)]
    pub relation_type: Option<String>,
    /// Lifecycle state.
    #[serde(default)]
    pub state: Option<String>,
    /// Owning role.
    #[serde(default)]
    pub owner: Option<String>,
    /// Creation timestamp.
    #[serde(default)]
    pub created_at: Option<String>,
    /// Last update timestamp.
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(skip)]
    ddl: Option<String>,
}

impl RelationSummary {
    /// Build from a `LIST RELATIONS` or `DESCRIBE RELATION` row in `database.namespace`.
    pub fn from_row(database: &str, namespace: &str, row: Row<'_>) -> Option<Self> {
        let name = row.text("name")?;
        let fqn = row
            .text("fqn")
            .unwrap_or_else(|| format!("{}.{}.{}", database, namespace, name));
        Some(Self {
            fqn: Some(fqn),
            relation_type: row.text("type"),
            state: row.text("state"),
            owner: row.text("owner"),
            created_at: row.text("created_at"),
            updated_at: row.text("updated_at"),
            ddl: row.text("dsql").or_else(|| row.text("ddl")),
            name,
        })
    }
}

/// State of a relation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationState {
    /// Database the DDL runs in.
    pub database: String,
    /// Namespace the DDL runs in.
    pub namespace: String,
    /// Store the DDL runs against, when not the organization default.
    #[serde(default)]
    pub store: Option<String>,
    /// `CREATE STREAM|CHANGELOG|TABLE` statement.
    pub sql: String,
    /// Owning role.
    #[serde(default)]
    pub owner: Option<String>,
    /// Relation name, taken from the DDL.
    #[serde(default)]
    pub name: Option<String>,
    /// Fully qualified name.
    #[serde(default)]
    pub fqn: Option<String>,
    /// Relation kind.
    #[serde(rename = "type", default)]
    pub relation_type: Option<String>,
    /// Lifecycle state.
    #[serde(default)]
    pub state: Option<String>,
    /// Creation timestamp.
    #[serde(default)]
    pub created_at: Option<String>,
    /// Last update timestamp.
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl RelationState {
    fn relation_name(&self) -> Result<String, ProviderError> {
        if let Some(name) = &self.name {
            return Ok(name.clone());
        }
        let ddl = sql::parse_relation_ddl(&self.sql).ok_or_else(|| {
            ProviderError::InvalidRequest(
                "sql must be a CREATE STREAM, CHANGELOG or TABLE statement".to_string(),
            )
        })?;
        if !ddl.targets(&self.database, &self.namespace) {
            return Err(ProviderError::InvalidRequest(format!(
                "sql creates {} in {}, not in {}.{}",
                ddl.name,
                ddl.qualifier.join("."),
                self.database,
                self.namespace
            )));
        }
        Ok(ddl.name)
    }

    fn session(&self, client: &Client) -> SessionContext {
        let session = client
            .session_as(self.owner.as_deref())
            .with_database(&self.database)
            .with_namespace(&self.namespace);
        match &self.store {
            Some(store) => session.with_store(store),
            None => session,
        }
    }

    fn apply(&mut self, summary: RelationSummary) {
        self.name = Some(summary.name);
        self.fqn = summary.fqn;
        self.relation_type = summary.relation_type;
        self.state = summary.state;
        if summary.owner.is_some() {
            self.owner = summary.owner;
        }
        self.created_at = summary.created_at;
        self.updated_at = summary.updated_at;
    }
}

pub(crate) async fn list(
    client: &Client,
    database: &str,
    namespace: &str,
) -> Result<ResultSet, ProviderError> {
    super::list_or_empty(
        client,
        &client.session(),
        &sql::list_relations(database, namespace),
    )
    .await
}

pub(crate) async fn describe_summary(
    client: &Client,
    session: &SessionContext,
    database: &str,
    namespace: &str,
    name: &str,
) -> Result<Option<RelationSummary>, ProviderError> {
    let rs = describe(
        client,
        session,
        &sql::describe_relation(database, namespace, name),
    )
    .await?;
    Ok(rs
        .as_ref()
        .and_then(ResultSet::first)
        .and_then(|row| RelationSummary::from_row(database, namespace, row)))
}

/// A stream, changelog or table defined by DDL.
pub struct RelationResource;

#[async_trait::async_trait]
impl Resource for RelationResource {
    fn type_name(&self) -> &'static str {
        "deltastream_relation"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("A stream, changelog or table created from DDL.")
            .with_attribute(
                "database",
                Attribute::required_string()
                    .with_description("Database the DDL runs in")
                    .with_force_new(),
            )
            .with_attribute(
                "namespace",
                Attribute::required_string()
                    .with_description("Namespace the DDL runs in")
                    .with_force_new(),
            )
            .with_attribute(
                "store",
                Attribute::optional_string()
                    .with_description("Store the relation's entity lives in")
                    .with_force_new(),
            )
            .with_attribute(
                "sql",
                Attribute::required_string()
                    .with_description("CREATE STREAM, CHANGELOG or TABLE statement")
                    .with_force_new(),
            )
            .with_attribute(
                "owner",
                Attribute::optional_computed_string().with_force_new(),
            )
            .with_attribute("name", Attribute::computed_string())
            .with_attribute("fqn", Attribute::computed_string())
            .with_attribute("type", Attribute::computed_string())
            .with_attribute("state", Attribute::computed_string())
            .with_attribute("created_at", Attribute::computed_string())
            .with_attribute("updated_at", Attribute::computed_string())
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let Some(ddl) = config.get("sql").and_then(Value::as_str) else {
            return Vec::new();
        };
        let Some(parsed) = sql::parse_relation_ddl(ddl) else {
            return vec![Diagnostic::error("Unsupported relation DDL")
                .with_detail(format!(
                    "Expected CREATE [OR REPLACE] {} <name> ...",
                    sql::RELATION_KINDS.join("|")
                ))
                .with_attribute("sql")];
        };
        let database = config.get("database").and_then(Value::as_str);
        let namespace = config.get("namespace").and_then(Value::as_str);
        match (database, namespace) {
            (Some(db), Some(ns)) if !parsed.targets(db, ns) => {
                vec![Diagnostic::error("Relation DDL names another namespace")
                    .with_detail(format!(
                        "{} is qualified with {} but database and namespace are {}.{}",
                        parsed.name,
                        parsed.qualifier.join("."),
                        db,
                        ns
                    ))
                    .with_attribute("sql")]
            }
            _ => Vec::new(),
        }
    }

    #[instrument(skip(self, client, planned), fields(resource_type = self.type_name()))]
    async fn create(&self, client: &Client, planned: Value) -> Result<Value, ProviderError> {
        let mut state: RelationState = decode(planned)?;
        state.name = None;
        let name = state.relation_name()?;
        let session = state.session(client);

        client.execute(&session, &state.sql).await?;

        let (database, namespace) = (state.database.as_str(), state.namespace.as_str());
        let (session_ref, name_ref) = (&session, name.as_str());
        let what = format!("relation {}.{}.{}", database, namespace, name);
        let ready = poll_until(client.poll_policy(), &what, || async move {
            let Some(summary) =
                describe_summary(client, session_ref, database, namespace, name_ref).await?
            else {
                return Ok(PollStatus::Pending("not yet visible".to_string()));
            };
            let current = summary.state.clone().unwrap_or_default();
            if READY_STATES.iter().any(|s| s.eq_ignore_ascii_case(&current)) {
                Ok(PollStatus::Ready(summary))
            } else if is_failed_state(&current) {
                Err(ProviderError::FailedPrecondition(format!(
                    "relation {} entered state {}",
                    name_ref, current
                )))
            } else {
                Ok(PollStatus::Pending(format!("state is {:?}", current)))
            }
        })
        .await;

        let summary = match ready {
            Ok(summary) => summary,
            Err(e) => {
                let drop = sql::drop_relation(database, namespace, &name);
                return Err(client.cleanup_after(&session, &drop, e).await);
            }
        };

        state.apply(summary);
        info!(fqn = ?state.fqn, relation_type = ?state.relation_type, "relation created");
        encode(&state)
    }

    async fn read(&self, client: &Client, current: Value) -> Result<Value, ProviderError> {
        let mut state: RelationState = decode(current)?;
        let name = state.relation_name()?;
        match describe_summary(
            client,
            &client.session(),
            &state.database,
            &state.namespace,
            &name,
        )
        .await?
        {
            Some(summary) => {
                state.apply(summary);
                encode(&state)
            }
            None => Err(ProviderError::NotFound(format!(
                "relation {}.{}.{} not found",
                state.database, state.namespace, name
            ))),
        }
    }

    #[instrument(skip(self, client, current), fields(resource_type = self.type_name()))]
    async fn delete(&self, client: &Client, current: Value) -> Result<(), ProviderError> {
        let state: RelationState = decode(current)?;
        let name = state.relation_name()?;
        let session = state.session(client);
        let (database, namespace) = (state.database.as_str(), state.namespace.as_str());

        match client
            .execute(&session, &sql::drop_relation(database, namespace, &name))
            .await
        {
            Ok(_) => {}
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e),
        }

        let (session_ref, name_ref) = (&session, name.as_str());
        let what = format!("relation {}.{}.{} to be dropped", database, namespace, name);
        wait_until_absent(client.poll_policy(), &what, || async move {
            Ok(
                describe_summary(client, session_ref, database, namespace, name_ref)
                    .await?
                    .is_some(),
            )
        })
        .await?;
        info!(database, namespace, name = %name, "relation dropped");
        Ok(())
    }

    async fn import(&self, client: &Client, id: &str) -> Result<Value, ProviderError> {
        let parts = split_import_id(id, 3, "<database>/<namespace>/<relation>")?;
        let (database, namespace, name) = (parts[0], parts[1], parts[2]);

        let summary = describe_summary(client, &client.session(), database, namespace, name)
            .await?
            .ok_or_else(|| {
                ProviderError::NotFound(format!(
                    "relation {}.{}.{} not found",
                    database, namespace, name
                ))
            })?;

        let sql = summary.ddl.clone().unwrap_or_else(|| {
            warn!(database, namespace, name, "relation has no DDL in the catalog, sql left empty");
            String::new()
        });
        let mut state = RelationState {
            database: database.to_string(),
            namespace: namespace.to_string(),
            sql,
            ..Default::default()
        };
        state.apply(summary);
        encode(&state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::test_client;
    use crate::testing::{MockDriver, MockReply};
    use serde_json::json;
    use std::sync::Arc;

    const DDL: &str = "CREATE STREAM pageviews (viewtime BIGINT, userid VARCHAR) \
                       WITH ('topic' = 'pageviews', 'value.format' = 'json');";

    fn described(state: &str) -> ResultSet {
        ResultSet::from_rows(
            &["Name", "Type", "State", "Owner", "Created At", "Updated At", "DSQL"],
            vec![vec![
                json!("pageviews"),
                json!("Stream"),
                json!(state),
                json!("sysadmin"),
                json!("2024-05-01T10:00:00Z"),
                json!("2024-05-01T10:00:00Z"),
                json!(DDL),
            ]],
        )
    }

    fn config() -> Value {
        json!({
            "database": "analytics",
            "namespace": "public",
            "store": "kafka_main",
            "sql": DDL
        })
    }

    #[test]
    fn test_validate_rejects_non_relation_ddl() {
        assert!(RelationResource.validate(&config()).is_empty());

        let diags = RelationResource.validate(&json!({
            "database": "analytics",
            "namespace": "public",
            "sql": "SELECT * FROM pageviews;"
        }));
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].attribute.as_deref(), Some("sql"));
    }

    #[tokio::test]
    async fn test_create_runs_ddl_in_context() {
        let driver = Arc::new(MockDriver::new());
        driver.script(
            "DESCRIBE RELATION",
            vec![described("creating").into(), described("created").into()],
        );
        let client = test_client(driver.clone());

        let state = RelationResource.create(&client, config()).await.unwrap();
        assert_eq!(state["name"], "pageviews");
        assert_eq!(state["fqn"], "analytics.public.pageviews");
        assert_eq!(state["type"], "Stream");
        assert_eq!(state["state"], "created");

        let executed = driver.executed();
        assert_eq!(executed[0].statement, DDL);
        assert_eq!(executed[0].session.database.as_deref(), Some("analytics"));
        assert_eq!(executed[0].session.namespace.as_deref(), Some("public"));
        assert_eq!(executed[0].session.store.as_deref(), Some("kafka_main"));
        assert_eq!(
            executed[1].statement,
            "DESCRIBE RELATION \"analytics\".\"public\".\"pageviews\";"
        );
    }

    #[tokio::test]
    async fn test_create_errored_relation_is_dropped() {
        let driver = Arc::new(MockDriver::new());
        driver.respond("DESCRIBE RELATION", described("errored"));
        let client = test_client(driver.clone());

        let err = RelationResource.create(&client, config()).await.unwrap_err();
        assert!(matches!(err, ProviderError::FailedPrecondition(_)));
        assert_eq!(
            driver.statements_starting_with("DROP RELATION"),
            vec!["DROP RELATION \"analytics\".\"public\".\"pageviews\";".to_string()]
        );
    }

    #[tokio::test]
    async fn test_create_rejects_unparseable_ddl() {
        let driver = Arc::new(MockDriver::new());
        let client = test_client(driver.clone());

        let mut bad = config();
        bad["sql"] = json!("INSERT INTO pageviews SELECT 1;");
        let err = RelationResource.create(&client, bad).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRequest(_)));
        assert!(driver.statements().is_empty());
    }

    #[test]
    fn test_validate_rejects_ddl_for_other_namespace() {
        let mut qualified = config();
        qualified["sql"] = json!("CREATE STREAM analytics.public.pageviews (x INT);");
        assert!(RelationResource.validate(&qualified).is_empty());

        qualified["sql"] = json!("CREATE STREAM raw.pageviews (x INT);");
        let diags = RelationResource.validate(&qualified);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].attribute.as_deref(), Some("sql"));

        qualified["sql"] = json!("CREATE STREAM other.public.pageviews (x INT);");
        assert_eq!(RelationResource.validate(&qualified).len(), 1);
    }

    #[tokio::test]
    async fn test_create_rejects_ddl_for_other_database() {
        let driver = Arc::new(MockDriver::new());
        let client = test_client(driver.clone());

        let mut elsewhere = config();
        elsewhere["sql"] = json!("CREATE STREAM other.public.pageviews (x INT);");
        let err = RelationResource.create(&client, elsewhere).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRequest(_)));
        assert!(driver.statements().is_empty());
    }

    #[test]
    fn test_schema_describes_location() {
        let schema = RelationResource.schema();
        for attr in ["database", "namespace"] {
            assert!(schema.block.attributes[attr].description.is_some(), "{}", attr);
        }
    }

    #[tokio::test]
    async fn test_delete_waits_until_gone() {
        let driver = Arc::new(MockDriver::new());
        driver.script(
            "DESCRIBE RELATION",
            vec![
                described("running").into(),
                MockReply::error("42P01", "relation does not exist"),
            ],
        );
        let client = test_client(driver.clone());

        let mut state = config();
        state["name"] = json!("pageviews");
        RelationResource.delete(&client, state).await.unwrap();
        assert_eq!(driver.statements_starting_with("DESCRIBE RELATION").len(), 2);
    }

    #[tokio::test]
    async fn test_import_reads_ddl() {
        let driver = Arc::new(MockDriver::new());
        driver.respond("DESCRIBE RELATION", described("running"));
        let client = test_client(driver);

        let state = RelationResource
            .import(&client, "analytics/public/pageviews")
            .await
            .unwrap();
        assert_eq!(state["sql"], DDL);
        assert_eq!(state["database"], "analytics");
        assert_eq!(state["name"], "pageviews");
        assert!(state["store"].is_null());
    }

    #[tokio::test]
    async fn test_read_gone_relation() {
        let driver = Arc::new(MockDriver::new());
        driver.fail("DESCRIBE RELATION", "42P01", "relation does not exist");
        let client = test_client(driver);

        let err = RelationResource.read(&client, config()).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
