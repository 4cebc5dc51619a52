//! Neighbor configuration and lifecycle handle.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::bgp::fsm::{Fsm, FsmState};
use crate::event::Event;

/// Port BGP sessions are dialed on.
pub const BGP_PORT: u16 = 179;

/// Immutable per-neighbor session configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighborConfig {
    /// Address the session is dialed to.
    pub address: IpAddr,
    /// ASN the neighbor is expected to present in its OPEN.
    pub asn: u32,
    /// Hold time we propose; the session may negotiate it down to the
    /// peer's proposal. At least 3 seconds.
    pub hold_time: Duration,
}

/// Process-wide identity presented in our OPEN messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalIdentity {
    /// Local BGP identifier; must be non-zero.
    pub router_id: Ipv4Addr,
    /// Local ASN.
    pub asn: u32,
}

/// A configured neighbor and its running session FSM.
#[derive(Debug)]
pub struct Neighbor {
    config: Arc<NeighborConfig>,
    fsm: Fsm,
}

impl Neighbor {
    pub(crate) fn start(
        config: NeighborConfig,
        local: LocalIdentity,
        events: mpsc::Sender<Event>,
        port: u16,
    ) -> Neighbor {
        let config = Arc::new(config);
        let fsm = Fsm::start(Arc::clone(&config), local, events, port);
        Neighbor { config, fsm }
    }

    pub fn config(&self) -> &NeighborConfig {
        &self.config
    }

    /// Snapshot of the session state.
    pub fn state(&self) -> FsmState {
        self.fsm.state()
    }

    /// Shut the session down and wait until its socket, timers and reader
    /// task are released. Idempotent.
    pub async fn shut(&self) {
        self.fsm.shut().await;
    }
}
