//! Statement execution against the DeltaStream control plane.
//!
//! Everything the provider does goes through [`Driver::execute`]: one SQL-like
//! statement, run in a [`SessionContext`], returning a [`ResultSet`].
//! [`HttpDriver`] talks to the REST endpoint; tests substitute
//! [`crate::testing::MockDriver`].

mod http;

pub use http::HttpDriver;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProviderError;

/// SQL state reported for a successfully completed statement.
pub const SQL_STATE_SUCCESS: &str = "00000";

/// SQL state reported while an asynchronous statement is still running.
pub const SQL_STATE_PENDING: &str = "03000";

/// Session settings a statement runs under.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionContext {
    /// Organization id or name.
    pub organization: String,
    /// Role the statement executes as.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Current database.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// Current namespace (schema) within the database.
    #[serde(rename = "schema", skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Current store.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<String>,
}

impl SessionContext {
    /// A session in the given organization with no other context.
    pub fn new(organization: impl Into<String>) -> Self {
        Self {
            organization: organization.into(),
            ..Default::default()
        }
    }

    /// Run as the given role.
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Use the given database.
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Use the given namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Use the given store.
    pub fn with_store(mut self, store: impl Into<String>) -> Self {
        self.store = Some(store.into());
        self
    }
}

/// A column in a result set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name as reported by the control plane.
    pub name: String,
    /// Column type name (e.g. `VARCHAR`).
    #[serde(rename = "type", default)]
    pub data_type: String,
    /// Whether the column may be null.
    #[serde(default)]
    pub nullable: bool,
}

/// Column metadata for a result set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultMetadata {
    /// The columns, in data order.
    #[serde(default)]
    pub columns: Vec<Column>,
}

/// The rows returned by a statement, or the status of one still running.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSet {
    /// SQL state of the statement.
    #[serde(default)]
    pub sql_state: String,
    /// Message accompanying a failed statement.
    #[serde(default)]
    pub message: Option<String>,
    /// Id of the statement, used to poll asynchronous statements.
    #[serde(rename = "statementID", default)]
    pub statement_id: Option<String>,
    /// Column metadata.
    #[serde(default)]
    pub metadata: ResultMetadata,
    /// Row data; cells are strings, numbers, booleans or null.
    #[serde(default)]
    pub data: Vec<Vec<Value>>,
}

impl ResultSet {
    /// An empty, successful result.
    pub fn empty() -> Self {
        Self {
            sql_state: SQL_STATE_SUCCESS.to_string(),
            ..Default::default()
        }
    }

    /// A successful result with the given columns and rows.
    pub fn from_rows(columns: &[&str], rows: Vec<Vec<Value>>) -> Self {
        Self {
            sql_state: SQL_STATE_SUCCESS.to_string(),
            metadata: ResultMetadata {
                columns: columns
                    .iter()
                    .map(|name| Column {
                        name: name.to_string(),
                        data_type: "VARCHAR".to_string(),
                        nullable: true,
                    })
                    .collect(),
            },
            data: rows,
            ..Default::default()
        }
    }

    /// Whether the statement is still running.
    pub fn is_pending(&self) -> bool {
        self.sql_state == SQL_STATE_PENDING
    }

    /// Turn a failed SQL state into an error, passing successful results through.
    pub fn into_result(self) -> Result<Self, ProviderError> {
        if self.sql_state.is_empty() || self.sql_state == SQL_STATE_SUCCESS || self.is_pending() {
            Ok(self)
        } else {
            Err(ProviderError::from_sql_state(
                &self.sql_state,
                self.message.unwrap_or_default(),
            ))
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether there are no rows.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Iterate over the rows.
    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.data.iter().map(move |cells| Row { set: self, cells })
    }

    /// The first row, if any.
    pub fn first(&self) -> Option<Row<'_>> {
        self.rows().next()
    }

    /// Find the first row whose column equals `value`.
    pub fn find(&self, column: &str, value: &str) -> Option<Row<'_>> {
        self.rows()
            .find(|row| row.text(column).as_deref() == Some(value))
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        let wanted = normalize_column(name);
        self.metadata
            .columns
            .iter()
            .position(|c| normalize_column(&c.name) == wanted)
    }
}

/// One row of a [`ResultSet`].
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    set: &'a ResultSet,
    cells: &'a [Value],
}

impl<'a> Row<'a> {
    /// Raw cell for a column, matched by normalized name.
    pub fn get(&self, column: &str) -> Option<&'a Value> {
        self.set
            .column_index(column)
            .and_then(|idx| self.cells.get(idx))
            .filter(|v| !v.is_null())
    }

    /// Cell rendered as text. Numbers and booleans are stringified.
    pub fn text(&self, column: &str) -> Option<String> {
        match self.get(column)? {
            Value::String(s) => Some(s.clone()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Number(n) => Some(n.to_string()),
            other => Some(other.to_string()),
        }
    }

    /// Cell as a boolean; accepts JSON booleans and `true`/`false` text.
    pub fn flag(&self, column: &str) -> Option<bool> {
        match self.get(column)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.to_ascii_lowercase().as_str() {
                "true" | "t" | "yes" => Some(true),
                "false" | "f" | "no" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Cell as an integer; accepts JSON numbers and numeric text.
    pub fn int(&self, column: &str) -> Option<i64> {
        match self.get(column)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Normalize a column name to snake_case.
///
/// `CreatedAt`, `Created At`, `created-at` and `created_at` all become
/// `created_at`.
pub fn normalize_column(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for ch in name.trim().chars() {
        if ch == ' ' || ch == '-' || ch == '_' {
            if !out.ends_with('_') && !out.is_empty() {
                out.push('_');
            }
            prev_lower = false;
        } else if ch.is_uppercase() {
            if prev_lower && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
            prev_lower = false;
        } else {
            out.push(ch);
            prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        }
    }
    out
}

/// Executes statements on the control plane.
#[async_trait::async_trait]
pub trait Driver: Send + Sync + 'static {
    /// Run one statement and return its rows.
    ///
    /// Implementations wait for asynchronous statements to finish and turn
    /// failed SQL states into errors.
    async fn execute(
        &self,
        session: &SessionContext,
        statement: &str,
    ) -> Result<ResultSet, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_column() {
        assert_eq!(normalize_column("CreatedAt"), "created_at");
        assert_eq!(normalize_column("Created At"), "created_at");
        assert_eq!(normalize_column("created-at"), "created_at");
        assert_eq!(normalize_column("Is Default"), "is_default");
        assert_eq!(normalize_column("Name"), "name");
        assert_eq!(normalize_column("Uris"), "uris");
        assert_eq!(normalize_column("FQN"), "fqn");
    }

    #[test]
    fn test_row_accessors() {
        let rs = ResultSet::from_rows(
            &["Name", "Is Default", "Partitions", "CreatedAt"],
            vec![
                vec![json!("analytics"), json!("true"), json!("3"), json!(null)],
                vec![json!("staging"), json!(false), json!(6), json!("2024-01-01T00:00:00Z")],
            ],
        );

        assert_eq!(rs.len(), 2);
        let first = rs.first().unwrap();
        assert_eq!(first.text("name").as_deref(), Some("analytics"));
        assert_eq!(first.flag("is_default"), Some(true));
        assert_eq!(first.int("partitions"), Some(3));
        assert_eq!(first.text("created_at"), None);

        let staging = rs.find("name", "staging").unwrap();
        assert_eq!(staging.flag("IsDefault"), Some(false));
        assert_eq!(staging.int("partitions"), Some(6));
        assert_eq!(staging.text("missing"), None);
        assert!(rs.find("name", "prod").is_none());
    }

    #[test]
    fn test_result_set_decodes_wire_format() {
        let rs: ResultSet = serde_json::from_value(json!({
            "sqlState": "00000",
            "statementID": "4c0a",
            "metadata": {"columns": [{"name": "Name", "type": "VARCHAR", "nullable": false}]},
            "data": [["kafka_main"]]
        }))
        .unwrap();

        assert_eq!(rs.statement_id.as_deref(), Some("4c0a"));
        assert_eq!(rs.first().unwrap().text("name").as_deref(), Some("kafka_main"));
        assert!(rs.into_result().is_ok());
    }

    #[test]
    fn test_into_result_maps_sql_state() {
        let rs = ResultSet {
            sql_state: "42P01".to_string(),
            message: Some("relation \"pageviews\" does not exist".to_string()),
            ..Default::default()
        };
        let err = rs.into_result().unwrap_err();
        assert!(err.is_not_found());

        let pending = ResultSet {
            sql_state: SQL_STATE_PENDING.to_string(),
            ..Default::default()
        };
        assert!(pending.into_result().unwrap().is_pending());
    }

    #[test]
    fn test_session_context_serializes_namespace_as_schema() {
        let session = SessionContext::new("acme")
            .with_role("sysadmin")
            .with_database("analytics")
            .with_namespace("public");
        let value = serde_json::to_value(&session).unwrap();
        assert_eq!(value["schema"], "public");
        assert_eq!(value["role"], "sysadmin");
        assert!(value.get("store").is_none());
    }
}
