//! BGP protocol: the wire format and the per-neighbor session FSM.

pub mod fsm;
pub mod message;
