//! `deltastream_namespace`

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument};

use super::{decode, encode, list_or_empty, split_import_id, Resource};
use crate::client::Client;
use crate::driver::{ResultSet, Row};
use crate::error::ProviderError;
use crate::retry::{poll_until, wait_until_absent, PollStatus};
use crate::schema::{Attribute, Schema};
use crate::sql;

/// State of a namespace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NamespaceState {
    /// Parent database.
    pub database: String,
    /// Namespace name.
    pub name: String,
    /// Owning role.
    #[serde(default)]
    pub owner: Option<String>,
    /// Creation timestamp.
    #[serde(default)]
    pub created_at: Option<String>,
}

impl NamespaceState {
    /// Build from a `LIST SCHEMAS` row of `database`.
    pub fn from_row(database: &str, row: Row<'_>) -> Option<Self> {
        Some(Self {
            database: database.to_string(),
            name: row.text("name")?,
            owner: row.text("owner"),
            created_at: row.text("created_at"),
        })
    }
}

pub(crate) async fn list(client: &Client, database: &str) -> Result<ResultSet, ProviderError> {
    list_or_empty(client, &client.session(), &sql::list_namespaces(database)).await
}

async fn lookup(
    client: &Client,
    database: &str,
    name: &str,
) -> Result<Option<NamespaceState>, ProviderError> {
    let rs = list(client, database).await?;
    Ok(rs
        .find("name", name)
        .and_then(|row| NamespaceState::from_row(database, row)))
}

/// A namespace (schema) inside a database.
pub struct NamespaceResource;

#[async_trait::async_trait]
impl Resource for NamespaceResource {
    fn type_name(&self) -> &'static str {
        "deltastream_namespace"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("A namespace groups relations within a database.")
            .with_attribute(
                "database",
                Attribute::required_string()
                    .with_description("Name of the parent database")
                    .with_force_new(),
            )
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_description("Name of the namespace")
                    .with_force_new(),
            )
            .with_attribute(
                "owner",
                Attribute::optional_computed_string()
                    .with_description("Role that owns the namespace")
                    .with_force_new(),
            )
            .with_attribute("created_at", Attribute::computed_string())
    }

    #[instrument(skip(self, client, planned), fields(resource_type = self.type_name()))]
    async fn create(&self, client: &Client, planned: Value) -> Result<Value, ProviderError> {
        let planned: NamespaceState = decode(planned)?;
        let session = client.session_as(planned.owner.as_deref());
        client
            .execute(
                &session,
                &sql::create_namespace(&planned.database, &planned.name),
            )
            .await?;

        let (database, name) = (planned.database.as_str(), planned.name.as_str());
        let what = format!("namespace {}.{}", database, name);
        let listed = poll_until(client.poll_policy(), &what, || async move {
            Ok(match lookup(client, database, name).await? {
                Some(state) => PollStatus::Ready(state),
                None => PollStatus::Pending("not yet listed".to_string()),
            })
        })
        .await;

        let state = match listed {
            Ok(state) => state,
            Err(e) => {
                let drop = sql::drop_namespace(database, name);
                return Err(client.cleanup_after(&session, &drop, e).await);
            }
        };

        info!(database, name, "namespace created");
        encode(&state)
    }

    async fn read(&self, client: &Client, current: Value) -> Result<Value, ProviderError> {
        let current: NamespaceState = decode(current)?;
        match lookup(client, &current.database, &current.name).await? {
            Some(state) => encode(&state),
            None => Err(ProviderError::NotFound(format!(
                "namespace {}.{} not found",
                current.database, current.name
            ))),
        }
    }

    #[instrument(skip(self, client, current), fields(resource_type = self.type_name()))]
    async fn delete(&self, client: &Client, current: Value) -> Result<(), ProviderError> {
        let current: NamespaceState = decode(current)?;
        let session = client.session_as(current.owner.as_deref());
        match client
            .execute(
                &session,
                &sql::drop_namespace(&current.database, &current.name),
            )
            .await
        {
            Ok(_) => {}
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e),
        }

        let (database, name) = (current.database.as_str(), current.name.as_str());
        let what = format!("namespace {}.{} to be dropped", database, name);
        wait_until_absent(client.poll_policy(), &what, || async move {
            Ok(lookup(client, database, name).await?.is_some())
        })
        .await?;
        info!(database, name, "namespace dropped");
        Ok(())
    }

    async fn import(&self, client: &Client, id: &str) -> Result<Value, ProviderError> {
        let parts = split_import_id(id, 2, "<database>/<namespace>")?;
        self.read(
            client,
            serde_json::json!({ "database": parts[0], "name": parts[1] }),
        )
        .await
    }
}
