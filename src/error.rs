//! Speaker-level error types.
//!
//! Per-session errors travel on the event stream as
//! [`NeighborError`](crate::bgp::fsm::NeighborError); the types here cover
//! the management surface.

use std::io;
use std::net::IpAddr;
use std::time::Duration;

use thiserror::Error;

/// Errors from speaker management operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SpeakerError {
    #[error("neighbor already exists: {0}")]
    NeighborExists(IpAddr),
    #[error("neighbor not found: {0}")]
    NeighborNotFound(IpAddr),
    #[error("hold time must be between 3 and 65535 seconds, got {0:?}")]
    InvalidHoldTime(Duration),
}

/// Errors loading or validating a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("router ID cannot be zero")]
    ZeroRouterId,
    #[error("neighbor {address}: {source}")]
    Neighbor {
        address: IpAddr,
        #[source]
        source: SpeakerError,
    },
}
