//! Cloud Inventory Domain
//!
//! Discovers resources across the services of one cloud account and merges
//! them into a single resource set.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐
//! │   Provider   │  ← name / id / services / resources / verify
//! └──────┬───────┘
//!        │
//! ┌──────▼───────┐     ┌─────────────┐
//! │  Bootstrap   │ ──► │ CloudBackend│  ← credential, clients, scopes
//! └──────┬───────┘     └─────────────┘
//!        │
//! ┌──────▼───────┐     ┌─────────────┐
//! │ Aggregator / │ ──► │ServiceClient│  ← one per active service
//! │  Verifier    │     └─────────────┘
//! └──────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_inventory::{OptionBlock, Provider};
//! use tokio_util::sync::CancellationToken;
//!
//! let options = OptionBlock::new()
//!     .with("gcp_service_account_key", key_json)
//!     .with("services", "dns,compute");
//! let cancel = CancellationToken::new();
//!
//! let provider = Provider::new(&backend, &options, &cancel).await?;
//! provider.verify(&cancel).await?;
//! let resources = provider.resources(&cancel).await?;
//! ```

pub mod aggregator;
pub mod bootstrap;
pub mod client;
pub mod error;
pub mod models;
pub mod options;
pub mod provider;
pub mod services;
pub mod verifier;

// Re-export commonly used types
pub use aggregator::{Aggregation, SkippedService};
pub use client::{CloudBackend, ServiceClient, ServiceClientSet};
pub use error::{InventoryError, InventoryResult, ServiceError};
pub use models::{ProviderIdentity, Resource, Resources, ScopePage, ScopeSet};
pub use options::OptionBlock;
pub use provider::Provider;
pub use services::{CATALOG, Criticality, Service, ServiceDescriptor, ServicePolicy, ServiceSelection};
