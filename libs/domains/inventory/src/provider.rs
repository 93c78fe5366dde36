use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::aggregator::{Aggregation, aggregate};
use crate::bootstrap::{Bootstrap, bootstrap};
use crate::client::{CloudBackend, ServiceClientSet};
use crate::error::InventoryResult;
use crate::models::{ProviderIdentity, Resources, ScopeSet};
use crate::options::{BEST_EFFORT_SERVICES_KEY, OptionBlock, SERVICES_KEY};
use crate::services::{ServicePolicy, ServiceSelection};
use crate::verifier::verify;

/// One cloud account's inventory source.
///
/// Everything is fixed at construction; `resources` and `verify` only read
/// shared state, so a provider can serve concurrent calls.
pub struct Provider {
    name: &'static str,
    identity: ProviderIdentity,
    selection: ServiceSelection,
    policy: ServicePolicy,
    clients: ServiceClientSet,
    scopes: ScopeSet,
}

impl Provider {
    /// Build a provider from an option block.
    ///
    /// Fails as a whole on a missing or unusable credential, any client that
    /// cannot be created, or a failed scope listing.
    #[instrument(skip_all, fields(provider = backend.name(), id = options.id()))]
    pub async fn new<B: CloudBackend>(
        backend: &B,
        options: &OptionBlock,
        cancel: &CancellationToken,
    ) -> InventoryResult<Self> {
        let raw_credential = options.require(backend.credential_key())?;
        let identity = ProviderIdentity::new(backend.name(), options.id());
        let selection = ServiceSelection::from_option(options.get(SERVICES_KEY));
        let policy = ServicePolicy::from_option(options.get(BEST_EFFORT_SERVICES_KEY));

        let Bootstrap { clients, scopes } = bootstrap(
            backend,
            raw_credential.as_bytes(),
            &selection,
            &identity,
            cancel,
        )
        .await?;

        info!(
            services = ?selection.names(),
            scopes = scopes.len(),
            "Provider initialized"
        );

        Ok(Self {
            name: backend.name(),
            identity,
            selection,
            policy,
            clients,
            scopes,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn id(&self) -> &str {
        &self.identity.id
    }

    pub fn services(&self) -> Vec<String> {
        self.selection.names()
    }

    pub fn selection(&self) -> &ServiceSelection {
        &self.selection
    }

    pub fn policy(&self) -> &ServicePolicy {
        &self.policy
    }

    pub fn scopes(&self) -> &ScopeSet {
        &self.scopes
    }

    /// Full inventory across every active service and scope.
    pub async fn resources(&self, cancel: &CancellationToken) -> InventoryResult<Resources> {
        self.aggregate(cancel).await.map(|aggregation| aggregation.resources)
    }

    /// Like [`Provider::resources`], also reporting skipped best-effort services.
    #[instrument(skip_all, fields(provider = self.name, id = %self.identity.id))]
    pub async fn aggregate(&self, cancel: &CancellationToken) -> InventoryResult<Aggregation> {
        aggregate(&self.clients, &self.policy, &self.scopes, cancel).await
    }

    #[instrument(skip_all, fields(provider = self.name, id = %self.identity.id))]
    pub async fn verify(&self, cancel: &CancellationToken) -> InventoryResult<()> {
        verify(&self.clients, &self.scopes, cancel).await
    }
}
