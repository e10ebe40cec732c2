//! REST driver for the DeltaStream statements API.

use reqwest::StatusCode;
use serde::Serialize;
use tracing::{debug, instrument};

use super::{Driver, ResultSet, SessionContext};
use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::retry::{poll_until, PollStatus, RetryPolicy};
use crate::sql;

#[derive(Serialize)]
struct StatementParameters {
    timezone: &'static str,
}

#[derive(Serialize)]
struct StatementRequest<'a> {
    statement: &'a str,
    #[serde(flatten)]
    session: &'a SessionContext,
    parameters: StatementParameters,
}

/// Executes statements over HTTPS with a bearer token.
///
/// `POST {server}/statements` submits a statement. A `202 Accepted` answer
/// carries a statement id which is then polled with
/// `GET {server}/statements/{id}` until the rows are available.
pub struct HttpDriver {
    client: reqwest::Client,
    server: String,
    api_key: String,
    poll: RetryPolicy,
}

impl HttpDriver {
    /// Build a driver from the resolved provider config.
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("deltastream-provider/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout)
            .danger_accept_invalid_certs(config.insecure_skip_verify)
            .build()?;

        Ok(Self {
            client,
            server: config.server.clone(),
            api_key: config.api_key.clone(),
            poll: config.retry_policy(),
        })
    }

    fn statements_url(&self) -> String {
        format!("{}/statements", self.server)
    }

    fn statement_url(&self, statement_id: &str) -> String {
        format!("{}/statements/{}", self.server, statement_id)
    }

    async fn fetch_status(&self, statement_id: &str) -> Result<PollStatus<ResultSet>, ProviderError> {
        let response = self
            .client
            .get(self.statement_url(statement_id))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        let accepted = response.status() == StatusCode::ACCEPTED;
        let rs = decode(response).await?;
        if accepted || rs.is_pending() {
            Ok(PollStatus::Pending(format!(
                "statement {} still running",
                statement_id
            )))
        } else {
            Ok(PollStatus::Ready(rs))
        }
    }
}

#[async_trait::async_trait]
impl Driver for HttpDriver {
    #[instrument(
        skip(self, session, statement),
        fields(
            role = ?session.role,
            database = ?session.database,
            statement = %sql::redact(statement)
        )
    )]
    async fn execute(
        &self,
        session: &SessionContext,
        statement: &str,
    ) -> Result<ResultSet, ProviderError> {
        let body = StatementRequest {
            statement,
            session,
            parameters: StatementParameters { timezone: "UTC" },
        };

        let response = self
            .client
            .post(self.statements_url())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let accepted = response.status() == StatusCode::ACCEPTED;
        let rs = decode(response).await?;

        if !(accepted || rs.is_pending()) {
            debug!(rows = rs.len(), "statement completed");
            return Ok(rs);
        }

        let statement_id = rs.statement_id.clone().ok_or_else(|| {
            ProviderError::Sdk("statement accepted without a statement id".to_string())
        })?;
        debug!(statement_id = %statement_id, "statement accepted, polling for completion");
        poll_until(&self.poll, &format!("statement {}", statement_id), || {
            self.fetch_status(&statement_id)
        })
        .await
    }
}

async fn decode(response: reqwest::Response) -> Result<ResultSet, ProviderError> {
    let status = response.status();
    let bytes = response.bytes().await?;

    if status.is_success() {
        let rs: ResultSet = serde_json::from_slice(&bytes)?;
        return rs.into_result();
    }

    // Error bodies usually carry a SQL state; prefer it over the HTTP status.
    if let Ok(rs) = serde_json::from_slice::<ResultSet>(&bytes) {
        if !rs.sql_state.is_empty() && rs.sql_state != super::SQL_STATE_SUCCESS {
            return rs.into_result();
        }
    }

    let message = String::from_utf8_lossy(&bytes).trim().to_string();
    Err(status_error(status, message))
}

fn status_error(status: StatusCode, message: String) -> ProviderError {
    let message = if message.is_empty() {
        status.to_string()
    } else {
        format!("{}: {}", status, message)
    };
    match status.as_u16() {
        400 | 422 => ProviderError::InvalidRequest(message),
        401 | 403 => ProviderError::PermissionDenied(message),
        404 => ProviderError::NotFound(message),
        408 | 504 => ProviderError::DeadlineExceeded(message),
        409 => ProviderError::AlreadyExists(message),
        429 => ProviderError::ResourceExhausted(message),
        500..=599 => ProviderError::Unavailable(message),
        _ => ProviderError::Sdk(message),
    }
}
