//! Free-form provider configuration block.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{InventoryError, InventoryResult};

/// Option key holding the provider type name in a provider file.
pub const PROVIDER_KEY: &str = "provider";
/// Option key holding the caller-supplied label.
pub const ID_KEY: &str = "id";
/// Option key holding the comma-separated requested services.
pub const SERVICES_KEY: &str = "services";
/// Option key overriding which services are best-effort.
pub const BEST_EFFORT_SERVICES_KEY: &str = "best_effort_services";

/// Opaque key/value configuration for one provider instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionBlock(HashMap<String, String>);

impl OptionBlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Fetch a required, non-empty value.
    pub fn require(&self, key: &str) -> InventoryResult<&str> {
        self.get(key)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| InventoryError::Config(key.to_string()))
    }

    pub fn id(&self) -> &str {
        self.get(ID_KEY).unwrap_or_default()
    }

    pub fn provider(&self) -> Option<&str> {
        self.get(PROVIDER_KEY)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for OptionBlock {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_rejects_missing_and_empty() {
        let block = OptionBlock::new().with("gcp_service_account_key", "");
        assert!(matches!(
            block.require("gcp_service_account_key"),
            Err(InventoryError::Config(key)) if key == "gcp_service_account_key"
        ));
        assert!(block.require("other").is_err());
    }

    #[test]
    fn test_id_defaults_to_empty() {
        assert_eq!(OptionBlock::new().id(), "");
        assert_eq!(OptionBlock::new().with(ID_KEY, "prod").id(), "prod");
    }

    #[test]
    fn test_deserializes_from_json_object() {
        let block: OptionBlock = serde_json::from_str(
            r#"{"provider": "gcp", "id": "main", "services": "dns,s3"}"#,
        )
        .unwrap();
        assert_eq!(block.provider(), Some("gcp"));
        assert_eq!(block.get(SERVICES_KEY), Some("dns,s3"));
    }
}
