//! Configuration for the inventory collector

use std::path::{Path, PathBuf};
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use core_config::{ConfigError, Environment, FromEnv, env_flag, env_list, env_optional};
use domain_inventory::OptionBlock;
use domain_inventory::options::{BEST_EFFORT_SERVICES_KEY, ID_KEY, PROVIDER_KEY, SERVICES_KEY};
use eyre::{Result, WrapErr, eyre};

use crate::providers::ProviderKind;

#[derive(Clone)]
pub struct Config {
    pub environment: Environment,
    /// Label attached to every reported resource
    pub id: Option<String>,
    /// Requested services; empty means every supported service
    pub services: Vec<String>,
    /// Services treated as best-effort; empty keeps the catalog defaults
    pub best_effort_services: Vec<String>,
    /// Render Prometheus metrics after a run
    pub metrics: bool,
    pub gcp: GcpConfig,
}

#[derive(Clone, Default)]
pub struct GcpConfig {
    /// Service account key JSON, already decoded
    pub service_account_key: Option<String>,
}

impl std::fmt::Debug for GcpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcpConfig")
            .field(
                "service_account_key",
                &self.service_account_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("environment", &self.environment)
            .field("id", &self.id)
            .field("services", &self.services)
            .field("best_effort_services", &self.best_effort_services)
            .field("metrics", &self.metrics)
            .field("gcp", &self.gcp)
            .finish()
    }
}

/// Command line values that take precedence over the environment
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub id: Option<String>,
    pub services: Option<Vec<String>>,
    pub credentials_file: Option<PathBuf>,
    pub config_file: Option<PathBuf>,
}

/// Accept the key as raw JSON or as base64-encoded JSON.
fn decode_key(key: &str, value: &str) -> Result<String, ConfigError> {
    let trimmed = value.trim();
    if trimmed.starts_with('{') {
        return Ok(trimmed.to_string());
    }

    let bytes = STANDARD.decode(trimmed).map_err(|e| ConfigError::ParseError {
        key: key.to_string(),
        details: format!("neither JSON nor base64: {}", e),
    })?;
    String::from_utf8(bytes).map_err(|e| ConfigError::ParseError {
        key: key.to_string(),
        details: e.to_string(),
    })
}

fn read_key_file(key: &str, path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|e| ConfigError::ParseError {
        key: key.to_string(),
        details: format!("could not read {}: {}", path.display(), e),
    })
}

impl FromEnv for GcpConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let service_account_key = match env_optional("GCP_SERVICE_ACCOUNT_KEY") {
            Some(value) => Some(decode_key("GCP_SERVICE_ACCOUNT_KEY", &value)?),
            None => match env_optional("GCP_SERVICE_ACCOUNT_KEY_FILE") {
                Some(path) => Some(read_key_file("GCP_SERVICE_ACCOUNT_KEY_FILE", Path::new(&path))?),
                None => None,
            },
        };

        Ok(Self { service_account_key })
    }
}

impl FromEnv for Config {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            environment: Environment::from_env(),
            id: env_optional("INVENTORY_ID"),
            services: env_list("INVENTORY_SERVICES"),
            best_effort_services: env_list("INVENTORY_BEST_EFFORT_SERVICES"),
            metrics: env_flag("INVENTORY_METRICS", false)?,
            gcp: GcpConfig::from_env()?,
        })
    }
}

impl Config {
    /// Option blocks to run, one per configured provider.
    ///
    /// A provider file replaces the environment-derived block; `--id` and
    /// `--services` still apply on top of every block.
    pub fn option_blocks(&self, overrides: &Overrides) -> Result<Vec<(ProviderKind, OptionBlock)>> {
        let blocks = match &overrides.config_file {
            Some(path) => load_provider_file(path)?,
            None => vec![(ProviderKind::Gcp, self.gcp_block(overrides)?)],
        };

        Ok(blocks
            .into_iter()
            .map(|(kind, block)| (kind, apply_overrides(block, overrides)))
            .collect())
    }

    fn gcp_block(&self, overrides: &Overrides) -> Result<OptionBlock> {
        let mut block = OptionBlock::new().with(PROVIDER_KEY, ProviderKind::Gcp.to_string());

        let key = match &overrides.credentials_file {
            Some(path) => Some(read_key_file("--credentials-file", path)?),
            None => self.gcp.service_account_key.clone(),
        };
        if let Some(key) = key {
            block.insert(ProviderKind::Gcp.credential_key(), key);
        }
        if let Some(id) = &self.id {
            block.insert(ID_KEY, id.clone());
        }
        if !self.services.is_empty() {
            block.insert(SERVICES_KEY, self.services.join(","));
        }
        if !self.best_effort_services.is_empty() {
            block.insert(BEST_EFFORT_SERVICES_KEY, self.best_effort_services.join(","));
        }

        Ok(block)
    }
}

fn apply_overrides(mut block: OptionBlock, overrides: &Overrides) -> OptionBlock {
    if let Some(id) = &overrides.id {
        block.insert(ID_KEY, id.clone());
    }
    if let Some(services) = &overrides.services {
        block.insert(SERVICES_KEY, services.join(","));
    }
    block
}

/// Parse a JSON array of option blocks; each must name its provider.
fn load_provider_file(path: &Path) -> Result<Vec<(ProviderKind, OptionBlock)>> {
    let contents = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("could not read provider file {}", path.display()))?;
    parse_provider_blocks(&contents).wrap_err_with(|| format!("invalid provider file {}", path.display()))
}

fn parse_provider_blocks(contents: &str) -> Result<Vec<(ProviderKind, OptionBlock)>> {
    let blocks: Vec<OptionBlock> = serde_json::from_str(contents)?;

    blocks
        .into_iter()
        .enumerate()
        .map(|(index, block)| {
            let name = block
                .provider()
                .ok_or_else(|| eyre!("block {} has no '{}' key", index, PROVIDER_KEY))?;
            let kind = ProviderKind::from_str(name)
                .map_err(|_| eyre!("block {}: unsupported provider '{}'", index, name))?;
            Ok((kind, block))
        })
        .collect()
}
