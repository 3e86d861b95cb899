use anyhow::Context;
use pmx_common::ResourceType;
use pmx_unisphere::unisphere::ClientSettings;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExporterConfig {
    pub unisphere: UnisphereConfig,
    pub exporter: ServeConfig,
}

/// Connection to the Unisphere instance managing the monitored array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnisphereConfig {
    /// Host name or IP; port 8443 and the REST path are appended. A full
    /// `http(s)://host:port` base is taken as is.
    pub address: String,
    pub user: String,
    pub password: String,
    /// PowerMax array (Symmetrix) id to monitor.
    pub symm_id: String,
    #[serde(default = "default_accept_invalid_certs")]
    pub accept_invalid_certs: bool,
    /// No timeout when unset.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServeConfig {
    /// Resource type served by this process.
    pub target: ResourceType,
    /// Re-list storage groups after every cycle.
    #[serde(default)]
    pub refresh: bool,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_accept_invalid_certs() -> bool {
    true
}

fn default_port() -> u16 {
    9100
}

impl ExporterConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{path}'"))?;
        Self::parse(&content).with_context(|| format!("Invalid config file '{path}'"))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.unisphere.address.trim().is_empty() {
            anyhow::bail!("unisphere.address must not be empty");
        }
        if self.unisphere.symm_id.trim().is_empty() {
            anyhow::bail!("unisphere.symm_id must not be empty");
        }
        if self.exporter.refresh && self.exporter.target != ResourceType::StorageGroup {
            tracing::warn!(
                target_type = %self.exporter.target,
                "refresh only applies to storagegroup, ignoring"
            );
        }
        Ok(())
    }

    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            address: self.unisphere.address.clone(),
            user: self.unisphere.user.clone(),
            password: self.unisphere.password.clone(),
            accept_invalid_certs: self.unisphere.accept_invalid_certs,
            request_timeout: self.unisphere.request_timeout_secs.map(Duration::from_secs),
        }
    }
}
