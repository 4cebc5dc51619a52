//! Events surfaced on the speaker's shared stream.

use std::sync::Arc;

use bytes::Bytes;

use crate::bgp::fsm::{FsmState, NeighborError};
use crate::bgp::message::NotificationMessage;
use crate::neighbor::NeighborConfig;

/// Everything a neighbor session reports.
///
/// Events from one neighbor are totally ordered and mirror its driver's
/// serial execution; across neighbors no ordering is guaranteed.
#[derive(Debug)]
pub enum Event {
    /// The session entered `state`. Emitted exactly once per state entry,
    /// for every state except the terminal disabled state.
    NeighborStateTransition {
        config: Arc<NeighborConfig>,
        state: FsmState,
    },
    /// A dial, I/O, decode or OPEN-validation error.
    NeighborErr {
        config: Arc<NeighborConfig>,
        error: NeighborError,
    },
    /// The peer was silent past the negotiated hold time.
    NeighborHoldTimerExpired { config: Arc<NeighborConfig> },
    /// The peer tore the session down with a NOTIFICATION.
    NeighborNotificationReceived {
        config: Arc<NeighborConfig>,
        notification: NotificationMessage,
    },
    /// A link-state UPDATE arrived; `update` is the raw message body.
    NeighborUpdateReceived {
        config: Arc<NeighborConfig>,
        update: Bytes,
    },
}
