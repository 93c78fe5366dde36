use crate::services::Service;

/// Error produced by a vendor client; the core only carries it through.
pub type ServiceError = Box<dyn std::error::Error + Send + Sync>;

pub type InventoryResult<T> = Result<T, InventoryError>;

#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("missing required option '{0}'")]
    Config(String),

    #[error("could not register credential: {0}")]
    Credential(#[source] ServiceError),

    #[error("could not create {service} client: {source}")]
    ServiceInit {
        service: Service,
        #[source]
        source: ServiceError,
    },

    #[error("could not list scopes: {0}")]
    ScopeDiscovery(#[source] ServiceError),

    #[error("could not get {service} resources: {source}")]
    Collector {
        service: Service,
        #[source]
        source: ServiceError,
    },

    #[error("no accessible scopes found with provided credentials")]
    NoScope,

    #[error("failed to verify {service} access in scope '{scope}': {source}")]
    Verification {
        service: Service,
        scope: String,
        #[source]
        source: ServiceError,
    },

    #[error("no accessible services found with provided credentials")]
    NoAccess,

    #[error("operation cancelled")]
    Cancelled,
}

impl InventoryError {
    /// The service an error is attributed to, if any.
    pub fn service(&self) -> Option<Service> {
        match self {
            Self::ServiceInit { service, .. }
            | Self::Collector { service, .. }
            | Self::Verification { service, .. } => Some(*service),
            _ => None,
        }
    }
}
