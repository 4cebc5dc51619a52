//! TOML configuration for the daemon.

use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::neighbor::{LocalIdentity, NeighborConfig};
use crate::speaker;

/// Default hold time in seconds (keepalive = hold_time / 3).
pub const DEFAULT_HOLD_TIME: u16 = 90;

#[derive(Debug, Deserialize)]
pub struct Config {
    /// Local ASN.
    pub asn: u32,
    /// Local BGP identifier.
    pub router_id: Ipv4Addr,
    #[serde(default, rename = "neighbor")]
    pub neighbors: Vec<NeighborSection>,
}

/// One `[[neighbor]]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct NeighborSection {
    pub address: IpAddr,
    /// ASN the neighbor must present in its OPEN.
    pub asn: u32,
    /// Hold time in seconds. Default 90.
    #[serde(default = "default_hold_time")]
    pub hold_time: u16,
}

fn default_hold_time() -> u16 {
    DEFAULT_HOLD_TIME
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.as_ref().display().to_string(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Validate and split into the speaker identity and neighbor configs.
    pub fn validate(&self) -> Result<(LocalIdentity, Vec<NeighborConfig>), ConfigError> {
        if self.router_id == Ipv4Addr::UNSPECIFIED {
            return Err(ConfigError::ZeroRouterId);
        }
        let local = LocalIdentity {
            router_id: self.router_id,
            asn: self.asn,
        };

        let mut neighbors = Vec::with_capacity(self.neighbors.len());
        for section in &self.neighbors {
            let config = NeighborConfig {
                address: section.address,
                asn: section.asn,
                hold_time: Duration::from_secs(section.hold_time.into()),
            };
            speaker::validate_neighbor(&config).map_err(|source| ConfigError::Neighbor {
                address: section.address,
                source,
            })?;
            neighbors.push(config);
        }
        Ok((local, neighbors))
    }
}
