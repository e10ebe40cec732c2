//! `deltastream_store`
//!
//! A store is a connection to an external system. The configuration lives in
//! exactly one type block; the control plane never returns credentials, so
//! the block is carried forward from prior state on every read.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument, warn};

use super::{decode, describe, encode, is_failed_state, Resource};
use crate::client::Client;
use crate::driver::{ResultSet, Row, SessionContext};
use crate::error::ProviderError;
use crate::retry::{poll_until, wait_until_absent, PollStatus};
use crate::schema::{Attribute, Block, Diagnostic, NestedBlock, Schema};
use crate::sql::{self, WithClause};

/// Type blocks and the keyword each renders as in `'type' = ...`.
pub const STORE_KINDS: [(&str, &str); 6] = [
    ("kafka", "KAFKA"),
    ("confluent_kafka", "CONFLUENT_KAFKA"),
    ("kinesis", "KINESIS"),
    ("snowflake", "SNOWFLAKE"),
    ("databricks", "DATABRICKS"),
    ("postgres", "POSTGRESQL"),
];

/// Accepted values for `sasl_hash_function`.
pub const SASL_HASH_FUNCTIONS: [&str; 5] = ["NONE", "PLAIN", "SHA256", "SHA512", "AWS_MSK_IAM"];

/// Settings for a self-managed or MSK Kafka cluster.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KafkaBlock {
    /// Comma separated bootstrap brokers.
    pub uris: String,
    /// SASL mechanism.
    #[serde(default)]
    pub sasl_hash_function: Option<String>,
    /// SASL username.
    #[serde(default)]
    pub sasl_username: Option<String>,
    /// SASL password.
    #[serde(default)]
    pub sasl_password: Option<String>,
    /// AWS region of the MSK cluster.
    #[serde(default)]
    pub msk_aws_region: Option<String>,
    /// IAM role assumed for MSK authentication.
    #[serde(default)]
    pub msk_iam_role_arn: Option<String>,
    /// Connect without TLS.
    #[serde(default)]
    pub tls_disabled: Option<bool>,
    /// Verify the broker hostname against its certificate.
    #[serde(default)]
    pub tls_verify_server_hostname: Option<bool>,
    /// Schema registry used to decode messages.
    #[serde(default)]
    pub schema_registry_name: Option<String>,
}

/// Settings for Confluent Cloud Kafka.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfluentKafkaBlock {
    /// Bootstrap server.
    pub uris: String,
    /// SASL mechanism.
    #[serde(default)]
    pub sasl_hash_function: Option<String>,
    /// SASL username.
    #[serde(default)]
    pub sasl_username: Option<String>,
    /// SASL password.
    #[serde(default)]
    pub sasl_password: Option<String>,
    /// Schema registry used to decode messages.
    #[serde(default)]
    pub schema_registry_name: Option<String>,
}

/// Settings for AWS Kinesis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KinesisBlock {
    /// Kinesis endpoint.
    pub uris: String,
    /// AWS access key id.
    #[serde(default)]
    pub access_key_id: Option<String>,
    /// AWS secret access key.
    #[serde(default)]
    pub secret_access_key: Option<String>,
    /// AWS account id.
    #[serde(default)]
    pub aws_account_id: Option<String>,
}

/// Settings for Snowflake.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnowflakeBlock {
    /// Account URL.
    pub uris: String,
    /// Snowflake account identifier.
    #[serde(default)]
    pub account_id: Option<String>,
    /// Cloud region.
    #[serde(default)]
    pub cloud_region: Option<String>,
    /// Role to use.
    #[serde(default)]
    pub role_name: Option<String>,
    /// Username.
    #[serde(default)]
    pub username: Option<String>,
    /// Warehouse to run queries in.
    #[serde(default)]
    pub warehouse_name: Option<String>,
    /// Private key for key-pair authentication.
    #[serde(default)]
    pub client_key: Option<String>,
    /// Passphrase for the private key.
    #[serde(default)]
    pub client_key_passphrase: Option<String>,
}

/// Settings for Databricks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabricksBlock {
    /// Workspace URL.
    pub uris: String,
    /// Personal access token.
    #[serde(default)]
    pub app_token: Option<String>,
    /// SQL warehouse id.
    #[serde(default)]
    pub warehouse_id: Option<String>,
    /// AWS access key id.
    #[serde(default)]
    pub access_key_id: Option<String>,
    /// AWS secret access key.
    #[serde(default)]
    pub secret_access_key: Option<String>,
    /// Staging bucket.
    #[serde(default)]
    pub cloud_s3_bucket: Option<String>,
    /// Cloud region.
    #[serde(default)]
    pub cloud_region: Option<String>,
}

/// Settings for PostgreSQL.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostgresBlock {
    /// `postgresql://host:port/db` URI.
    pub uris: String,
    /// Username.
    #[serde(default)]
    pub username: Option<String>,
    /// Password.
    #[serde(default)]
    pub password: Option<String>,
}

/// A store as the catalog reports it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSummary {
    /// Store name.
    pub name: String,
    /// Store type as reported (`Kafka`, `Kinesis`, ...).
    #[serde(rename = "type", default)]
    pub store_type: Option<String>,
    /// Provisioning state.
    #[serde(default)]
    pub state: Option<String>,
    /// Endpoint URIs.
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

impl StoreSummary {
    /// Build from a `LIST STORES` or `DESCRIBE STORE` row.
    pub fn from_row(row: Row<'_>) -> Option<Self> {
        Some(Self {
            name: row.text("name")?,
            store_type: row.text("type"),
            state: row.text("state"),
            uris: row.text("uris"),
            owner: row.text("owner"),
            created_at: row.text("created_at"),
            updated_at: row.text("updated_at"),
        })
    }
}

/// State of a store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreState {
    /// Store name.
    pub name: String,
    /// Owning role.
    #[serde(default)]
    pub owner: Option<String>,
    /// Kafka or MSK settings.
    #[serde(default)]
    pub kafka: Option<KafkaBlock>,
    /// Confluent Cloud settings.
    #[serde(default)]
    pub confluent_kafka: Option<ConfluentKafkaBlock>,
    /// Kinesis settings.
    #[serde(default)]
    pub kinesis: Option<KinesisBlock>,
    /// Snowflake settings.
    #[serde(default)]
    pub snowflake: Option<SnowflakeBlock>,
    /// Databricks settings.
    #[serde(default)]
    pub databricks: Option<DatabricksBlock>,
    /// PostgreSQL settings.
    #[serde(default)]
    pub postgres: Option<PostgresBlock>,
    /// Store type as reported by the catalog.
    #[serde(rename = "type", default)]
    pub store_type: Option<String>,
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

impl StoreState {
    /// Names of the type blocks that are set.
    pub fn configured_kinds(&self) -> Vec<&'static str> {
        let set = [
            self.kafka.is_some(),
            self.confluent_kafka.is_some(),
            self.kinesis.is_some(),
            self.snowflake.is_some(),
            self.databricks.is_some(),
            self.postgres.is_some(),
        ];
        STORE_KINDS
            .iter()
            .zip(set)
            .filter(|(_, is_set)| *is_set)
            .map(|((kind, _), _)| *kind)
            .collect()
    }

    /// Render the `WITH` clause for the configured block.
    ///
    /// `'type'` is only included for `CREATE STORE`; `UPDATE STORE` cannot
    /// change it.
    pub fn with_clause(&self, include_type: bool) -> Result<WithClause, ProviderError> {
        let kind = match self.configured_kinds().as_slice() {
            [kind] => *kind,
            kinds => {
                return Err(ProviderError::InvalidRequest(format!(
                    "store {} must set exactly one of {}, got {}",
                    self.name,
                    kind_list(),
                    kinds.len()
                )))
            }
        };

        let mut with = WithClause::new();
        if include_type {
            with.keyword("type", type_keyword(kind));
        }

        if let Some(b) = &self.kafka {
            let hash = b.sasl_hash_function.as_deref().map(str::to_ascii_uppercase);
            with.literal("uris", Some(&b.uris))
                .keyword("kafka.sasl.hash_function", hash.as_deref())
                .literal("kafka.sasl.username", b.sasl_username.as_deref())
                .literal("kafka.sasl.password", b.sasl_password.as_deref())
                .literal("kafka.msk.aws_region", b.msk_aws_region.as_deref())
                .literal("kafka.msk.iam_role_arn", b.msk_iam_role_arn.as_deref())
                .flag("tls.disabled", b.tls_disabled)
                .flag("tls.verify_server_hostname", b.tls_verify_server_hostname)
                .ident("schema_registry.name", b.schema_registry_name.as_deref());
        }
        if let Some(b) = &self.confluent_kafka {
            let hash = b.sasl_hash_function.as_deref().map(str::to_ascii_uppercase);
            with.literal("uris", Some(&b.uris))
                .keyword("kafka.sasl.hash_function", hash.as_deref())
                .literal("kafka.sasl.username", b.sasl_username.as_deref())
                .literal("kafka.sasl.password", b.sasl_password.as_deref())
                .ident("schema_registry.name", b.schema_registry_name.as_deref());
        }
        if let Some(b) = &self.kinesis {
            with.literal("uris", Some(&b.uris))
                .literal("kinesis.access_key_id", b.access_key_id.as_deref())
                .literal("kinesis.secret_access_key", b.secret_access_key.as_deref())
                .literal("aws.account_id", b.aws_account_id.as_deref());
        }
        if let Some(b) = &self.snowflake {
            with.literal("uris", Some(&b.uris))
                .literal("snowflake.account_id", b.account_id.as_deref())
                .literal("snowflake.cloud.region", b.cloud_region.as_deref())
                .literal("snowflake.role_name", b.role_name.as_deref())
                .literal("snowflake.username", b.username.as_deref())
                .literal("snowflake.warehouse_name", b.warehouse_name.as_deref())
                .literal("snowflake.client.key", b.client_key.as_deref())
                .literal(
                    "snowflake.client.key_passphrase",
                    b.client_key_passphrase.as_deref(),
                );
        }
        if let Some(b) = &self.databricks {
            with.literal("uris", Some(&b.uris))
                .literal("databricks.app_token", b.app_token.as_deref())
                .literal("databricks.warehouse_id", b.warehouse_id.as_deref())
                .literal("aws.access_key_id", b.access_key_id.as_deref())
                .literal("aws.secret_access_key", b.secret_access_key.as_deref())
                .literal("databricks.cloud.s3.bucket", b.cloud_s3_bucket.as_deref())
                .literal("databricks.cloud.region", b.cloud_region.as_deref());
        }
        if let Some(b) = &self.postgres {
            with.literal("uris", Some(&b.uris))
                .literal("postgres.username", b.username.as_deref())
                .literal("postgres.password", b.password.as_deref());
        }

        Ok(with)
    }

    fn uris_mut(&mut self) -> Option<&mut String> {
        if let Some(b) = self.kafka.as_mut() {
            return Some(&mut b.uris);
        }
        if let Some(b) = self.confluent_kafka.as_mut() {
            return Some(&mut b.uris);
        }
        if let Some(b) = self.kinesis.as_mut() {
            return Some(&mut b.uris);
        }
        if let Some(b) = self.snowflake.as_mut() {
            return Some(&mut b.uris);
        }
        if let Some(b) = self.databricks.as_mut() {
            return Some(&mut b.uris);
        }
        self.postgres.as_mut().map(|b| &mut b.uris)
    }

    /// Start a block of the given reported type, holding only its URIs.
    fn set_block_from_type(&mut self, store_type: &str, uris: String) -> bool {
        match kind_from_type(store_type) {
            Some("kafka") => self.kafka = Some(KafkaBlock { uris, ..Default::default() }),
            Some("confluent_kafka") => {
                self.confluent_kafka = Some(ConfluentKafkaBlock { uris, ..Default::default() })
            }
            Some("kinesis") => self.kinesis = Some(KinesisBlock { uris, ..Default::default() }),
            Some("snowflake") => {
                self.snowflake = Some(SnowflakeBlock { uris, ..Default::default() })
            }
            Some("databricks") => {
                self.databricks = Some(DatabricksBlock { uris, ..Default::default() })
            }
            Some("postgres") => self.postgres = Some(PostgresBlock { uris, ..Default::default() }),
            _ => return false,
        }
        true
    }

    /// Merge catalog columns into this state, keeping configured secrets.
    fn apply(&mut self, summary: StoreSummary) {
        if let Some(uris) = summary.uris {
            match self.uris_mut() {
                Some(current) => *current = uris,
                None => {
                    let store_type = summary.store_type.clone().unwrap_or_default();
                    if !self.set_block_from_type(&store_type, uris) {
                        warn!(name = %self.name, store_type = %store_type, "unrecognized store type");
                    }
                }
            }
        }
        if summary.owner.is_some() {
            self.owner = summary.owner;
        }
        self.store_type = summary.store_type;
        self.state = summary.state;
        self.created_at = summary.created_at;
        self.updated_at = summary.updated_at;
    }
}

fn kind_list() -> String {
    STORE_KINDS
        .iter()
        .map(|(kind, _)| *kind)
        .collect::<Vec<_>>()
        .join(", ")
}

fn type_keyword(kind: &str) -> Option<&'static str> {
    STORE_KINDS
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, keyword)| *keyword)
}

/// Map a reported store type (`Kafka`, `ConfluentKafka`, `PostgreSQL`) to its block.
pub fn kind_from_type(store_type: &str) -> Option<&'static str> {
    let wanted: String = store_type
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    if wanted == "POSTGRES" {
        return Some("postgres");
    }
    STORE_KINDS
        .iter()
        .find(|(_, keyword)| keyword.replace('_', "") == wanted)
        .map(|(kind, _)| *kind)
}

fn configured_kind(config: &Value) -> Option<&'static str> {
    STORE_KINDS
        .iter()
        .map(|(kind, _)| *kind)
        .find(|kind| config.get(*kind).is_some_and(|v| !v.is_null()))
}

pub(crate) async fn list(client: &Client) -> Result<ResultSet, ProviderError> {
    client.execute(&client.session(), &sql::list_stores()).await
}

pub(crate) async fn describe_summary(
    client: &Client,
    session: &SessionContext,
    name: &str,
) -> Result<Option<StoreSummary>, ProviderError> {
    let rs = describe(client, session, &sql::describe_store(name)).await?;
    Ok(rs.as_ref().and_then(ResultSet::first).and_then(StoreSummary::from_row))
}

async fn wait_until_ready(
    client: &Client,
    session: &SessionContext,
    name: &str,
) -> Result<StoreSummary, ProviderError> {
    let what = format!("store {} to become ready", name);
    poll_until(client.poll_policy(), &what, || async move {
        let summary = match describe_summary(client, session, name).await? {
            Some(summary) => summary,
            None => return Ok(PollStatus::Pending("not yet visible".to_string())),
        };
        let state = summary.state.clone().unwrap_or_default();
        if state.eq_ignore_ascii_case("ready") {
            Ok(PollStatus::Ready(summary))
        } else if is_failed_state(&state) {
            Err(ProviderError::FailedPrecondition(format!(
                "store {} entered state {}",
                name, state
            )))
        } else {
            Ok(PollStatus::Pending(format!("state is {:?}", state)))
        }
    })
    .await
}

fn uris_block(description: &str) -> Block {
    Block::new().with_description(description).with_attribute(
        "uris",
        Attribute::required_string().with_description("Comma separated endpoint URIs"),
    )
}

fn sasl_attributes(block: Block) -> Block {
    block
        .with_attribute(
            "sasl_hash_function",
            Attribute::optional_string()
                .with_description("SASL mechanism: NONE, PLAIN, SHA256, SHA512 or AWS_MSK_IAM"),
        )
        .with_attribute("sasl_username", Attribute::optional_string())
        .with_attribute("sasl_password", Attribute::optional_string().sensitive())
        .with_attribute(
            "schema_registry_name",
            Attribute::optional_string().with_description("Schema registry used for decoding"),
        )
}

fn kafka_schema() -> NestedBlock {
    let block = sasl_attributes(uris_block("Apache Kafka or Amazon MSK"))
        .with_attribute("msk_aws_region", Attribute::optional_string())
        .with_attribute("msk_iam_role_arn", Attribute::optional_string())
        .with_attribute("tls_disabled", Attribute::optional_bool())
        .with_attribute("tls_verify_server_hostname", Attribute::optional_bool());
    NestedBlock::single(block)
}

fn confluent_kafka_schema() -> NestedBlock {
    NestedBlock::single(sasl_attributes(uris_block("Confluent Cloud Kafka")))
}

fn kinesis_schema() -> NestedBlock {
    NestedBlock::single(
        uris_block("Amazon Kinesis")
            .with_attribute("access_key_id", Attribute::optional_string())
            .with_attribute("secret_access_key", Attribute::optional_string().sensitive())
            .with_attribute("aws_account_id", Attribute::optional_string()),
    )
}

fn snowflake_schema() -> NestedBlock {
    NestedBlock::single(
        uris_block("Snowflake")
            .with_attribute("account_id", Attribute::optional_string())
            .with_attribute("cloud_region", Attribute::optional_string())
            .with_attribute("role_name", Attribute::optional_string())
            .with_attribute("username", Attribute::optional_string())
            .with_attribute("warehouse_name", Attribute::optional_string())
            .with_attribute("client_key", Attribute::optional_string().sensitive())
            .with_attribute("client_key_passphrase", Attribute::optional_string().sensitive()),
    )
}

fn databricks_schema() -> NestedBlock {
    NestedBlock::single(
        uris_block("Databricks")
            .with_attribute("app_token", Attribute::optional_string().sensitive())
            .with_attribute("warehouse_id", Attribute::optional_string())
            .with_attribute("access_key_id", Attribute::optional_string())
            .with_attribute("secret_access_key", Attribute::optional_string().sensitive())
            .with_attribute("cloud_s3_bucket", Attribute::optional_string())
            .with_attribute("cloud_region", Attribute::optional_string()),
    )
}

fn postgres_schema() -> NestedBlock {
    NestedBlock::single(
        uris_block("PostgreSQL")
            .with_attribute("username", Attribute::optional_string())
            .with_attribute("password", Attribute::optional_string().sensitive()),
    )
}

/// A store: a connection to Kafka, Kinesis, Snowflake, Databricks or PostgreSQL.
pub struct StoreResource;

#[async_trait::async_trait]
impl Resource for StoreResource {
    fn type_name(&self) -> &'static str {
        "deltastream_store"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("A connection to an external streaming or storage system.")
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_description("Name of the store")
                    .with_force_new(),
            )
            .with_attribute(
                "owner",
                Attribute::optional_computed_string()
                    .with_description("Role that owns the store")
                    .with_force_new(),
            )
            .with_attribute("type", Attribute::computed_string())
            .with_attribute("state", Attribute::computed_string())
            .with_attribute("created_at", Attribute::computed_string())
            .with_attribute("updated_at", Attribute::computed_string())
            .with_block("kafka", kafka_schema())
            .with_block("confluent_kafka", confluent_kafka_schema())
            .with_block("kinesis", kinesis_schema())
            .with_block("snowflake", snowflake_schema())
            .with_block("databricks", databricks_schema())
            .with_block("postgres", postgres_schema())
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();

        let set: Vec<&str> = STORE_KINDS
            .iter()
            .map(|(kind, _)| *kind)
            .filter(|kind| config.get(*kind).is_some_and(|v| !v.is_null()))
            .collect();
        if set.len() != 1 {
            diagnostics.push(
                Diagnostic::error("Exactly one store block must be set")
                    .with_detail(format!("Set one of {}; found {}", kind_list(), set.len())),
            );
        }

        for kind in ["kafka", "confluent_kafka"] {
            let Some(block) = config.get(kind).filter(|v| v.is_object()) else {
                continue;
            };
            let hash = block
                .get("sasl_hash_function")
                .and_then(Value::as_str)
                .map(str::to_ascii_uppercase);
            match hash.as_deref() {
                None | Some("NONE") => {}
                Some("AWS_MSK_IAM") => {
                    for field in ["msk_aws_region", "msk_iam_role_arn"] {
                        if block.get(field).map_or(true, Value::is_null) {
                            diagnostics.push(
                                Diagnostic::error(format!(
                                    "'{}' is required with AWS_MSK_IAM",
                                    field
                                ))
                                .with_attribute(format!("{}.{}", kind, field)),
                            );
                        }
                    }
                }
                Some(h) if SASL_HASH_FUNCTIONS.contains(&h) => {
                    for field in ["sasl_username", "sasl_password"] {
                        if block.get(field).map_or(true, Value::is_null) {
                            diagnostics.push(
                                Diagnostic::error(format!("'{}' is required with {}", field, h))
                                    .with_attribute(format!("{}.{}", kind, field)),
                            );
                        }
                    }
                }
                Some(h) => diagnostics.push(
                    Diagnostic::error(format!("Invalid sasl_hash_function '{}'", h))
                        .with_detail(format!("Expected one of {}", SASL_HASH_FUNCTIONS.join(", ")))
                        .with_attribute(format!("{}.sasl_hash_function", kind)),
                ),
            }
        }

        diagnostics
    }

    fn requires_replace(&self, prior: &Value, proposed: &Value) -> bool {
        configured_kind(prior) != configured_kind(proposed)
    }

    #[instrument(skip(self, client, planned), fields(resource_type = self.type_name()))]
    async fn create(&self, client: &Client, planned: Value) -> Result<Value, ProviderError> {
        let mut state: StoreState = decode(planned)?;
        let with = state.with_clause(true)?;
        let session = client.session_as(state.owner.as_deref());

        client
            .execute(&session, &sql::create_store(&state.name, &with))
            .await?;

        let summary = match wait_until_ready(client, &session, &state.name).await {
            Ok(summary) => summary,
            Err(e) => {
                return Err(client
                    .cleanup_after(&session, &sql::drop_store(&state.name), e)
                    .await)
            }
        };

        state.apply(summary);
        info!(name = %state.name, store_type = ?state.store_type, "store created");
        encode(&state)
    }

    async fn read(&self, client: &Client, current: Value) -> Result<Value, ProviderError> {
        let mut state: StoreState = decode(current)?;
        match describe_summary(client, &client.session(), &state.name).await? {
            Some(summary) => {
                state.apply(summary);
                encode(&state)
            }
            None => Err(ProviderError::NotFound(format!(
                "store {} not found",
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
        let prior: StoreState = decode(prior)?;
        let mut state: StoreState = decode(planned)?;
        if prior.configured_kinds() != state.configured_kinds() {
            return Err(ProviderError::FailedPrecondition(format!(
                "store {} cannot change type in place",
                state.name
            )));
        }

        let with = state.with_clause(false)?;
        let session = client.session_as(state.owner.as_deref());
        client
            .execute(&session, &sql::update_store(&state.name, &with))
            .await?;

        let summary = wait_until_ready(client, &session, &state.name).await?;
        state.apply(summary);
        info!(name = %state.name, "store updated");
        encode(&state)
    }

    #[instrument(skip(self, client, current), fields(resource_type = self.type_name()))]
    async fn delete(&self, client: &Client, current: Value) -> Result<(), ProviderError> {
        let current: StoreState = decode(current)?;
        let session = client.session_as(current.owner.as_deref());
        match client
            .execute(&session, &sql::drop_store(&current.name))
            .await
        {
            Ok(_) => {}
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e),
        }

        let name = current.name.as_str();
        let session = &session;
        let what = format!("store {} to be dropped", name);
        wait_until_absent(client.poll_policy(), &what, || async move {
            Ok(describe_summary(client, session, name).await?.is_some())
        })
        .await?;
        info!(name, "store dropped");
        Ok(())
    }

    async fn import(&self, client: &Client, id: &str) -> Result<Value, ProviderError> {
        self.read(client, serde_json::json!({ "name": id })).await
    }
}
