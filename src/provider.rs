//! The DeltaStream provider.
//!
//! [`DeltaStreamProvider`] implements [`ProviderService`] by dispatching each
//! call to the [`Resource`] or [`DataSource`] registered for the type name.
//! Until [`configure`](ProviderService::configure) succeeds every CRUD call
//! fails with [`ProviderError::Configuration`].

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::client::Client;
use crate::config::{provider_schema, ProviderConfig};
use crate::data_sources::{self, DataSource};
use crate::driver::{Driver, HttpDriver};
use crate::error::ProviderError;
use crate::plan::plan_resource;
use crate::resources::{self, Resource};
use crate::retry::RetryPolicy;
use crate::schema::{has_errors, Diagnostic, ProviderSchema};
use crate::service::ProviderService;
use crate::types::{ImportedResource, PlanResult};
use crate::validation::validate;

/// Manages DeltaStream objects through the statements API.
pub struct DeltaStreamProvider {
    resources: BTreeMap<&'static str, Box<dyn Resource>>,
    data_sources: BTreeMap<&'static str, Box<dyn DataSource>>,
    driver: Option<Arc<dyn Driver>>,
    poll_policy: Option<RetryPolicy>,
    client: RwLock<Option<Client>>,
}

impl Default for DeltaStreamProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl DeltaStreamProvider {
    /// A provider that talks HTTP to the configured server.
    pub fn new() -> Self {
        Self {
            resources: resources::all()
                .into_iter()
                .map(|r| (r.type_name(), r))
                .collect(),
            data_sources: data_sources::all()
                .into_iter()
                .map(|d| (d.type_name(), d))
                .collect(),
            driver: None,
            poll_policy: None,
            client: RwLock::new(None),
        }
    }

    /// A provider that runs statements through `driver` instead of HTTP.
    pub fn with_driver(driver: Arc<dyn Driver>) -> Self {
        Self {
            driver: Some(driver),
            ..Self::new()
        }
    }

    /// Override the polling policy derived from `poll_timeout`.
    pub fn with_poll_policy(mut self, policy: RetryPolicy) -> Self {
        self.poll_policy = Some(policy);
        self
    }

    async fn client(&self) -> Result<Client, ProviderError> {
        self.client.read().await.clone().ok_or_else(|| {
            ProviderError::Configuration("provider has not been configured".to_string())
        })
    }

    fn resource(&self, resource_type: &str) -> Result<&dyn Resource, ProviderError> {
        self.resources
            .get(resource_type)
            .map(|r| r.as_ref())
            .ok_or_else(|| {
                ProviderError::UnknownResource(format!("Unknown resource type: {}", resource_type))
            })
    }

    fn data_source(&self, data_source_type: &str) -> Result<&dyn DataSource, ProviderError> {
        self.data_sources
            .get(data_source_type)
            .map(|d| d.as_ref())
            .ok_or_else(|| {
                ProviderError::UnknownResource(format!(
                    "Unknown data source type: {}",
                    data_source_type
                ))
            })
    }
}

#[async_trait::async_trait]
impl ProviderService for DeltaStreamProvider {
    fn schema(&self) -> ProviderSchema {
        let schema = ProviderSchema::new().with_provider_config(provider_schema());
        let schema = self
            .resources
            .iter()
            .fold(schema, |s, (name, r)| s.with_resource(*name, r.schema()));
        self.data_sources
            .iter()
            .fold(schema, |s, (name, d)| s.with_data_source(*name, d.schema()))
    }

    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let mut diagnostics = validate(&provider_schema(), &config);
        if has_errors(&diagnostics) {
            return Ok(diagnostics);
        }
        match ProviderConfig::from_value(config) {
            Ok(resolved) => diagnostics.extend(resolved.warnings()),
            Err(e) => diagnostics.push(Diagnostic::error(e.to_string())),
        }
        Ok(diagnostics)
    }

    #[instrument(skip(self, config))]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let diagnostics = validate(&provider_schema(), &config);
        if has_errors(&diagnostics) {
            warn!(diagnostics = diagnostics.len(), "provider config rejected");
            return Ok(diagnostics);
        }

        let resolved = ProviderConfig::from_value(config)?;
        let driver: Arc<dyn Driver> = match &self.driver {
            Some(driver) => driver.clone(),
            None => Arc::new(HttpDriver::new(&resolved)?),
        };
        let mut client = Client::new(driver, &resolved);
        if let Some(policy) = &self.poll_policy {
            client = client.with_poll_policy(policy.clone());
        }

        *self.client.write().await = Some(client);
        info!(
            server = %resolved.server,
            organization = %resolved.organization,
            role = %resolved.role,
            "provider configured"
        );
        Ok(resolved.warnings())
    }

    async fn stop(&self) -> Result<(), ProviderError> {
        self.client.write().await.take();
        info!("provider stopped");
        Ok(())
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let resource = self.resource(resource_type)?;
        let mut diagnostics = validate(&resource.schema(), &config);
        diagnostics.extend(resource.validate(&config));
        Ok(diagnostics)
    }

    #[instrument(skip(self, prior_state, proposed_state, _config))]
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        _config: Value,
    ) -> Result<PlanResult, ProviderError> {
        let resource = self.resource(resource_type)?;
        let replace_hint = match &prior_state {
            Some(prior) if !prior.is_null() && !proposed_state.is_null() => {
                resource.requires_replace(prior, &proposed_state)
            }
            _ => false,
        };
        let plan = plan_resource(
            &resource.schema(),
            prior_state.as_ref(),
            &proposed_state,
            replace_hint,
        );
        debug!(
            changes = plan.changes.len(),
            requires_replace = plan.requires_replace,
            "plan computed"
        );
        Ok(plan)
    }

    #[instrument(skip(self, planned_state))]
    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        resource.create(&client, planned_state).await
    }

    #[instrument(skip(self, current_state))]
    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        match resource.read(&client, current_state).await {
            Ok(state) => Ok(state),
            Err(e) if e.is_not_found() => {
                debug!(error = %e, "object is gone, dropping it from state");
                Ok(Value::Null)
            }
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self, prior_state, planned_state))]
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        resource.update(&client, prior_state, planned_state).await
    }

    #[instrument(skip(self, current_state))]
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        resource.delete(&client, current_state).await
    }

    #[instrument(skip(self))]
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        let state = resource.import(&client, id).await?;
        Ok(vec![ImportedResource::new(resource_type, state)])
    }

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let data_source = self.data_source(data_source_type)?;
        let mut diagnostics = validate(&data_source.schema(), &config);
        diagnostics.extend(data_source.validate(&config));
        Ok(diagnostics)
    }

    #[instrument(skip(self, config))]
    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let data_source = self.data_source(data_source_type)?;
        let client = self.client().await?;
        data_source.read(&client, config).await
    }
}
