//! Capability traits implemented by cloud backends.
//!
//! A backend turns raw credential material into per-service clients and
//! enumerates scopes; each service client lists its inventory and answers a
//! cheap access probe.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{InventoryError, InventoryResult, ServiceError};
use crate::models::{ProviderIdentity, Resources, ScopePage, ScopeSet};
use crate::services::Service;

/// Initialized client for one activated service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ServiceClient: Send + Sync {
    fn service(&self) -> Service;

    /// List this service's resources across every scope.
    ///
    /// Either returns the complete inventory it could see or fails as a
    /// whole.
    async fn collect(&self, scopes: &ScopeSet) -> Result<Resources, ServiceError>;

    /// One lightweight, side-effect-free list call within `scope`.
    async fn probe(&self, scope: &str) -> Result<(), ServiceError>;
}

/// Active clients keyed by service; iterates in catalog order.
pub type ServiceClientSet = BTreeMap<Service, Arc<dyn ServiceClient>>;

/// A cloud vendor: credential registration, client factory and scope listing.
#[async_trait]
pub trait CloudBackend: Send + Sync {
    type Credential: Send + Sync;

    /// Fixed provider type name reported on every resource.
    fn name(&self) -> &'static str;

    /// Option key carrying the raw credential material.
    fn credential_key(&self) -> &'static str;

    async fn register(&self, raw: &[u8]) -> Result<Self::Credential, ServiceError>;

    async fn connect(
        &self,
        service: Service,
        credential: &Self::Credential,
        identity: &ProviderIdentity,
    ) -> Result<Arc<dyn ServiceClient>, ServiceError>;

    /// Fetch one page of visible scopes.
    async fn list_scopes(
        &self,
        credential: &Self::Credential,
        page_token: Option<&str>,
    ) -> Result<ScopePage, ServiceError>;
}

/// Race `future` against cancellation.
pub(crate) async fn cancellable<T, F>(cancel: &CancellationToken, future: F) -> InventoryResult<T>
where
    F: Future<Output = InventoryResult<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(InventoryError::Cancelled),
        result = future => result,
    }
}
