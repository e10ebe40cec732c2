//! `deltastream_database`

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument};

use super::{decode, encode, Resource};
use crate::client::Client;
use crate::driver::{ResultSet, Row};
use crate::error::ProviderError;
use crate::retry::{poll_until, wait_until_absent, PollStatus};
use crate::schema::{Attribute, Schema};
use crate::sql;

/// State of a database.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseState {
    /// Database name.
    pub name: String,
    /// Owning role.
    #[serde(default)]
    pub owner: Option<String>,
    /// Whether this is the organization's default database.
    #[serde(default)]
    pub is_default: Option<bool>,
    /// Creation timestamp.
    #[serde(default)]
    pub created_at: Option<String>,
}

impl DatabaseState {
    /// Build from a `LIST DATABASES` row.
    pub fn from_row(row: Row<'_>) -> Option<Self> {
        Some(Self {
            name: row.text("name")?,
            owner: row.text("owner"),
            is_default: row.flag("is_default"),
            created_at: row.text("created_at"),
        })
    }
}

pub(crate) async fn list(client: &Client) -> Result<ResultSet, ProviderError> {
    client
        .execute(&client.session(), &sql::list_databases())
        .await
}

async fn lookup(client: &Client, name: &str) -> Result<Option<DatabaseState>, ProviderError> {
    let rs = list(client).await?;
    Ok(rs.find("name", name).and_then(DatabaseState::from_row))
}

/// A database in the organization.
pub struct DatabaseResource;

#[async_trait::async_trait]
impl Resource for DatabaseResource {
    fn type_name(&self) -> &'static str {
        "deltastream_database"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("A database: the top-level container for namespaces and relations.")
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_description("Name of the database")
                    .with_force_new(),
            )
            .with_attribute(
                "owner",
                Attribute::optional_computed_string()
                    .with_description("Role that owns the database")
                    .with_force_new(),
            )
            .with_attribute("is_default", Attribute::computed_bool())
            .with_attribute("created_at", Attribute::computed_string())
    }

    #[instrument(skip(self, client, planned), fields(resource_type = self.type_name()))]
    async fn create(&self, client: &Client, planned: Value) -> Result<Value, ProviderError> {
        let planned: DatabaseState = decode(planned)?;
        let session = client.session_as(planned.owner.as_deref());
        client
            .execute(&session, &sql::create_database(&planned.name))
            .await?;

        let name = planned.name.as_str();
        let what = format!("database {}", name);
        let listed = poll_until(client.poll_policy(), &what, || async move {
            Ok(match lookup(client, name).await? {
                Some(state) => PollStatus::Ready(state),
                None => PollStatus::Pending("not yet listed".to_string()),
            })
        })
        .await;

        let state = match listed {
            Ok(state) => state,
            Err(e) => {
                return Err(client
                    .cleanup_after(&session, &sql::drop_database(name), e)
                    .await)
            }
        };

        info!(name = %state.name, "database created");
        encode(&state)
    }

    async fn read(&self, client: &Client, current: Value) -> Result<Value, ProviderError> {
        let current: DatabaseState = decode(current)?;
        match lookup(client, &current.name).await? {
            Some(state) => encode(&state),
            None => Err(ProviderError::NotFound(format!(
                "database {} not found",
                current.name
            ))),
        }
    }

    #[instrument(skip(self, client, current), fields(resource_type = self.type_name()))]
    async fn delete(&self, client: &Client, current: Value) -> Result<(), ProviderError> {
        let current: DatabaseState = decode(current)?;
        let session = client.session_as(current.owner.as_deref());
        match client
            .execute(&session, &sql::drop_database(&current.name))
            .await
        {
            Ok(_) => {}
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e),
        }

        let name = current.name.as_str();
        let what = format!("database {} to be dropped", name);
        wait_until_absent(client.poll_policy(), &what, || async move {
            Ok(lookup(client, name).await?.is_some())
        })
        .await?;
        info!(name = %current.name, "database dropped");
        Ok(())
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

    fn listing(names: &[&str]) -> ResultSet {
        ResultSet::from_rows(
            &["Name", "Is Default", "Owner", "Created At"],
            names
                .iter()
                .map(|n| vec![json!(n), json!(false), json!("sysadmin"), json!("2024-05-01T10:00:00Z")])
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_create_timeout_drops_database() {
        let driver = Arc::new(MockDriver::new());
        driver.respond("LIST DATABASES", listing(&["default"]));
        let client = test_client(driver.clone());

        let err = DatabaseResource
            .create(&client, json!({"name": "analytics", "owner": "engineers"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::DeadlineExceeded(_)));

        let drops: Vec<_> = driver
            .executed()
            .into_iter()
            .filter(|e| e.statement.starts_with("DROP DATABASE"))
            .collect();
        assert_eq!(drops.len(), 1);
        assert_eq!(drops[0].statement, "DROP DATABASE \"analytics\";");
        assert_eq!(drops[0].session.role.as_deref(), Some("engineers"));
    }

    #[tokio::test]
    async fn test_create_waits_until_listed() {
        let driver = Arc::new(MockDriver::new());
        driver.script(
            "LIST DATABASES",
            vec![listing(&[]).into(), listing(&["analytics"]).into()],
        );
        let client = test_client(driver.clone());

        let state = DatabaseResource
            .create(&client, json!({"name": "analytics", "owner": "engineers"}))
            .await
            .unwrap();

        assert_eq!(state["name"], "analytics");
        assert_eq!(state["owner"], "sysadmin");
        assert_eq!(state["created_at"], "2024-05-01T10:00:00Z");

        let executed = driver.executed();
        assert_eq!(executed[0].statement, "CREATE DATABASE \"analytics\";");
        assert_eq!(executed[0].session.role.as_deref(), Some("engineers"));
        assert_eq!(driver.statements_starting_with("LIST DATABASES").len(), 2);
    }

    #[tokio::test]
    async fn test_create_propagates_conflict() {
        let driver = Arc::new(MockDriver::new());
        driver.fail("CREATE DATABASE", "42710", "database already exists");
        let client = test_client(driver.clone());

        let err = DatabaseResource
            .create(&client, json!({"name": "analytics"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::AlreadyExists(_)));
        assert!(driver.statements_starting_with("LIST").is_empty());
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let driver = Arc::new(MockDriver::new());
        driver.respond("LIST DATABASES", listing(&["other"]));
        let client = test_client(driver);

        let err = DatabaseResource
            .read(&client, json!({"name": "analytics"}))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_waits_until_absent() {
        let driver = Arc::new(MockDriver::new());
        driver.script(
            "LIST DATABASES",
            vec![listing(&["analytics"]).into(), listing(&[]).into()],
        );
        let client = test_client(driver.clone());

        DatabaseResource
            .delete(&client, json!({"name": "analytics", "owner": null}))
            .await
            .unwrap();
        assert_eq!(driver.statements()[0], "DROP DATABASE \"analytics\";");
        assert_eq!(driver.statements_starting_with("LIST DATABASES").len(), 2);
    }

    #[tokio::test]
    async fn test_delete_of_missing_database_succeeds() {
        let driver = Arc::new(MockDriver::new());
        driver.script(
            "DROP DATABASE",
            vec![MockReply::error("3D000", "database does not exist")],
        );
        let client = test_client(driver.clone());

        DatabaseResource
            .delete(&client, json!({"name": "analytics"}))
            .await
            .unwrap();
        assert_eq!(driver.statements().len(), 1);
    }

    #[tokio::test]
    async fn test_import_by_name() {
        let driver = Arc::new(MockDriver::new());
        driver.respond("LIST DATABASES", listing(&["analytics"]));
        let client = test_client(driver);

        let state = DatabaseResource.import(&client, "analytics").await.unwrap();
        assert_eq!(state["name"], "analytics");
        assert_eq!(state["is_default"], false);
    }
}
