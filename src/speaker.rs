//! The speaker: owner of the neighbor set and the shared event stream.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::info;

use crate::bgp::fsm::FsmState;
use crate::error::SpeakerError;
use crate::event::Event;
use crate::neighbor::{LocalIdentity, Neighbor, NeighborConfig, BGP_PORT};

/// Capacity of the shared event channel.
const EVENT_BUFFER: usize = 64;

/// Lower bound on a configurable hold time.
pub const MIN_HOLD_TIME: Duration = Duration::from_secs(3);

/// A BGP-LS speaker: one session FSM per configured neighbor, all of them
/// multiplexed onto a single event stream.
///
/// The speaker is a passive consumer of link-state topology. It originates
/// no routes and keeps no RIB; received UPDATEs are handed to whoever holds
/// the event receiver.
#[derive(Debug)]
pub struct Speaker {
    local: LocalIdentity,
    neighbors: HashMap<IpAddr, Neighbor>,
    events: mpsc::Sender<Event>,
}

impl Speaker {
    /// Create a speaker and the receiving end of its event stream.
    ///
    /// The stream must be drained: sessions block (and eventually disable
    /// themselves if the receiver is dropped) when it backs up.
    pub fn new(local: LocalIdentity) -> (Speaker, mpsc::Receiver<Event>) {
        let (events, events_rx) = mpsc::channel(EVENT_BUFFER);
        let speaker = Speaker {
            local,
            neighbors: HashMap::new(),
            events,
        };
        (speaker, events_rx)
    }

    /// Start a session to a new neighbor.
    pub fn add_neighbor(&mut self, config: NeighborConfig) -> Result<(), SpeakerError> {
        validate_neighbor(&config)?;
        if self.neighbors.contains_key(&config.address) {
            return Err(SpeakerError::NeighborExists(config.address));
        }

        info!(neighbor = %config.address, asn = config.asn, "adding neighbor");
        let address = config.address;
        let neighbor = Neighbor::start(config, self.local, self.events.clone(), BGP_PORT);
        self.neighbors.insert(address, neighbor);
        Ok(())
    }

    /// Shut a neighbor's session down and forget it. Returns once all of
    /// its resources are released.
    pub async fn remove_neighbor(&mut self, address: IpAddr) -> Result<(), SpeakerError> {
        let neighbor = self
            .neighbors
            .remove(&address)
            .ok_or(SpeakerError::NeighborNotFound(address))?;
        info!(neighbor = %address, "removing neighbor");
        neighbor.shut().await;
        Ok(())
    }

    /// Session state of a configured neighbor.
    pub fn neighbor_state(&self, address: IpAddr) -> Option<FsmState> {
        self.neighbors.get(&address).map(Neighbor::state)
    }

    pub fn neighbors(&self) -> impl Iterator<Item = &Neighbor> {
        self.neighbors.values()
    }

    /// Shut every session down. Idempotent.
    pub async fn shutdown(&mut self) {
        for (address, neighbor) in self.neighbors.drain() {
            info!(neighbor = %address, "shutting down neighbor");
            neighbor.shut().await;
        }
    }
}

pub(crate) fn validate_neighbor(config: &NeighborConfig) -> Result<(), SpeakerError> {
    if config.hold_time < MIN_HOLD_TIME || config.hold_time.as_secs() > u64::from(u16::MAX) {
        return Err(SpeakerError::InvalidHoldTime(config.hold_time));
    }
    Ok(())
}
