//! A BGP-LS (RFC 7752) speaker.
//!
//! The speaker maintains TCP sessions to a set of configured neighbors,
//! negotiates the BGP-LS address family, and surfaces received UPDATE
//! traffic and session events on a single stream. It consumes link-state
//! topology passively: no routes are originated, nothing is redistributed,
//! and no RIB is kept.
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use bgpls::{LocalIdentity, NeighborConfig, Speaker};
//!
//! # async fn run() {
//! let local = LocalIdentity {
//!     router_id: "10.0.0.1".parse().unwrap(),
//!     asn: 64512,
//! };
//! let (mut speaker, mut events) = Speaker::new(local);
//!
//! speaker
//!     .add_neighbor(NeighborConfig {
//!         address: "192.0.2.1".parse().unwrap(),
//!         asn: 64512,
//!         hold_time: Duration::from_secs(90),
//!     })
//!     .unwrap();
//!
//! while let Some(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! # }
//! ```

pub mod bgp;
pub mod config;
pub mod error;
pub mod event;
pub mod neighbor;
pub mod speaker;

pub use bgp::fsm::FsmState;
pub use config::Config;
pub use error::{ConfigError, SpeakerError};
pub use event::Event;
pub use neighbor::{LocalIdentity, Neighbor, NeighborConfig};
pub use speaker::Speaker;
