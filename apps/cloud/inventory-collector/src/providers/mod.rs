//! Cloud inventory providers
//!
//! Each supported vendor implements `CloudBackend`; option blocks name the
//! vendor through their `provider` key.

pub mod gcp;

use strum::{Display, EnumString, IntoStaticStr, VariantNames};

pub use gcp::GcpBackend;

/// Supported provider types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr, VariantNames)]
#[strum(serialize_all = "lowercase")]
pub enum ProviderKind {
    Gcp,
}

impl ProviderKind {
    /// Option key carrying this provider's credential
    pub fn credential_key(self) -> &'static str {
        match self {
            ProviderKind::Gcp => gcp::SERVICE_ACCOUNT_KEY,
        }
    }
}
