//! A configured handle on the control plane shared by every handler.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::config::ProviderConfig;
use crate::driver::{Driver, ResultSet, SessionContext};
use crate::error::ProviderError;
use crate::retry::RetryPolicy;
use crate::sql;

/// Driver plus the session defaults and polling policy from the provider config.
#[derive(Clone)]
pub struct Client {
    driver: Arc<dyn Driver>,
    organization: String,
    role: String,
    poll: RetryPolicy,
}

impl Client {
    /// Wrap a driver with the settings from `config`.
    pub fn new(driver: Arc<dyn Driver>, config: &ProviderConfig) -> Self {
        Self {
            driver,
            organization: config.organization.clone(),
            role: config.role.clone(),
            poll: config.retry_policy(),
        }
    }

    /// Replace the polling policy.
    pub fn with_poll_policy(mut self, poll: RetryPolicy) -> Self {
        self.poll = poll;
        self
    }

    /// Policy used when waiting for objects to settle.
    pub fn poll_policy(&self) -> &RetryPolicy {
        &self.poll
    }

    /// The default role.
    pub fn role(&self) -> &str {
        &self.role
    }

    /// A session in the configured organization, running as the default role.
    pub fn session(&self) -> SessionContext {
        SessionContext::new(&self.organization).with_role(&self.role)
    }

    /// A session running as `owner`, or the default role when unset.
    pub fn session_as(&self, owner: Option<&str>) -> SessionContext {
        SessionContext::new(&self.organization).with_role(owner.unwrap_or(&self.role))
    }

    /// Run one statement.
    ///
    /// The span carries the statement with its `WITH` parameters redacted.
    #[instrument(
        level = "debug",
        skip(self, session, statement),
        fields(role = ?session.role, statement = %sql::redact(statement))
    )]
    pub async fn execute(
        &self,
        session: &SessionContext,
        statement: &str,
    ) -> Result<ResultSet, ProviderError> {
        let rs = self.driver.execute(session, statement).await?;
        debug!(rows = rs.len(), "statement returned");
        Ok(rs)
    }

    /// Run a cleanup statement after a failed create, keeping the original error.
    ///
    /// The cleanup outcome is only logged.
    pub async fn cleanup_after(
        &self,
        session: &SessionContext,
        statement: &str,
        err: ProviderError,
    ) -> ProviderError {
        match self.driver.execute(session, statement).await {
            Ok(_) => debug!(statement, "cleaned up after failed create"),
            Err(cleanup) => {
                warn!(statement, error = %cleanup, "cleanup after failed create also failed")
            }
        }
        err
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("organization", &self.organization)
            .field("role", &self.role)
            .field("poll", &self.poll)
            .finish_non_exhaustive()
    }
}
