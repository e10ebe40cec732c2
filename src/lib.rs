//! DeltaStream Provider
//!
//! This crate manages DeltaStream objects as infrastructure: databases,
//! namespaces, stores, schema registries, relations and entities, plus
//! read-only lookups of the same objects and of deployment regions.
//!
//! # Overview
//!
//! The crate provides:
//!
//! - **ProviderService trait**: The plan/apply surface a host drives
//! - **DeltaStreamProvider**: The implementation that dispatches to resource handlers
//! - **Schema types**: Descriptions of the provider, resource, and data source attributes
//! - **Statements**: Rendering of the SQL-like DDL the control plane accepts
//! - **Driver**: Statement execution over HTTPS, with polling of asynchronous statements
//! - **Error types**: One error enum mapped from SQL states and HTTP failures
//! - **Logging**: Integration with `tracing` for structured logging
//!
//! # Quick Start
//!
//! ```ignore
//! use deltastream_provider::{DeltaStreamProvider, ProviderService};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     deltastream_provider::init_logging();
//!
//!     let provider = DeltaStreamProvider::new();
//!     provider
//!         .configure(json!({"api_key": "...", "organization": "acme"}))
//!         .await?;
//!
//!     let plan = provider
//!         .plan("deltastream_database", None, json!({"name": "analytics"}), json!({}))
//!         .await?;
//!     let state = provider
//!         .create("deltastream_database", plan.planned_state)
//!         .await?;
//!     println!("{}", state);
//!     Ok(())
//! }
//! ```
//!
//! # Statement lifecycle
//!
//! Each create renders a statement, submits it, then polls the catalog with
//! bounded exponential backoff until the object is ready. If the object
//! never becomes ready, the provider drops it again before returning the
//! error so no half-created object is left behind.
//!
//! # Resource types
//!
//! - **deltastream_database**: Top-level container
//! - **deltastream_namespace**: Schema inside a database
//! - **deltastream_store**: Kafka, Confluent Kafka, Kinesis, Snowflake, Databricks or PostgreSQL connection
//! - **deltastream_schema_registry**: Confluent or Confluent Cloud schema registry
//! - **deltastream_relation**: Stream, changelog or table defined by DDL
//! - **deltastream_entity**: Topic or stream inside a store

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod data_sources;
pub mod driver;
pub mod error;
pub mod logging;
pub mod plan;
pub mod provider;
pub mod resources;
pub mod retry;
pub mod schema;
pub mod service;
pub mod sql;
pub mod testing;
pub mod types;
pub mod validation;

// Re-export main types at crate root
pub use client::Client;
pub use config::ProviderConfig;
pub use error::ProviderError;
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::DeltaStreamProvider;
pub use schema::ProviderSchema;
pub use service::ProviderService;
pub use types::{
    AttributeChange, ImportedResource, PlanResult, ProviderMetadata, ServerCapabilities,
};
pub use validation::{is_valid, validate, validate_result};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used dependencies
pub use serde_json;
pub use tracing;
