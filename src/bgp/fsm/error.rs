use std::io;

use thiserror::Error;

use crate::bgp::message::{
    Capability, ErrorCode, MessageError, NotificationMessage, OpenErrorSubcode, BGP_VERSION,
};

use super::state::FsmState;

/// Terminal errors published by the connection reader.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("connection closed by peer")]
    Closed,
    #[error("error reading from neighbor: {0}")]
    Io(#[from] io::Error),
    #[error("error decoding message from neighbor: {0}")]
    Decode(#[from] MessageError),
}

/// Reasons a received OPEN is rejected, in the order validation applies
/// them. Each maps to the NOTIFICATION sent back before teardown.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OpenError {
    #[error("unsupported version number: {0}")]
    UnsupportedVersion(u8),
    #[error("bad peer AS")]
    BadPeerAs,
    #[error("hold time must be at least 3 seconds")]
    UnacceptableHoldTime,
    #[error("bgp identifier cannot be zero")]
    BadBgpIdentifier,
    #[error("non-capability optional parameter found")]
    UnsupportedOptionalParameter,
    #[error("bgp-ls address family capability not found")]
    BgpLsCapabilityMissing,
    #[error("four-octet AS indicated in AS field but capability not found")]
    FourOctetAsCapabilityMissing,
}

impl OpenError {
    /// The NOTIFICATION this rejection sends to the peer. The unsupported
    /// version case carries the version we do support; the missing BGP-LS
    /// case carries the capability we require.
    pub fn notification(&self) -> NotificationMessage {
        match self {
            OpenError::UnsupportedVersion(_) => NotificationMessage::new(
                ErrorCode::OpenMessageError,
                OpenErrorSubcode::UnsupportedVersionNumber as u8,
                u16::from(BGP_VERSION).to_be_bytes().to_vec(),
            ),
            OpenError::BadPeerAs | OpenError::FourOctetAsCapabilityMissing => {
                NotificationMessage::new(
                    ErrorCode::OpenMessageError,
                    OpenErrorSubcode::BadPeerAs as u8,
                    Vec::new(),
                )
            }
            OpenError::UnacceptableHoldTime => NotificationMessage::new(
                ErrorCode::OpenMessageError,
                OpenErrorSubcode::UnacceptableHoldTime as u8,
                Vec::new(),
            ),
            OpenError::BadBgpIdentifier => NotificationMessage::new(
                ErrorCode::OpenMessageError,
                OpenErrorSubcode::BadBgpIdentifier as u8,
                Vec::new(),
            ),
            OpenError::UnsupportedOptionalParameter => NotificationMessage::new(
                ErrorCode::OpenMessageError,
                OpenErrorSubcode::UnsupportedOptionalParameter as u8,
                Vec::new(),
            ),
            OpenError::BgpLsCapabilityMissing => NotificationMessage::new(
                ErrorCode::OpenMessageError,
                OpenErrorSubcode::UnsupportedCapability as u8,
                Capability::bgp_ls().encode().to_vec(),
            ),
        }
    }
}

/// Anything that goes wrong on one neighbor's session; surfaced to the
/// event stream and, where a NOTIFICATION applies, sent to the peer first.
#[derive(Debug, Error)]
pub enum NeighborError {
    #[error("error connecting to neighbor: {0}")]
    Connect(#[source] io::Error),
    #[error("error sending {message} message: {source}")]
    Write {
        message: &'static str,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Read(#[from] ReadError),
    #[error("open message rejected: {0}")]
    Open(#[from] OpenError),
    #[error("{kind} message received in {state} state")]
    UnexpectedMessage {
        kind: &'static str,
        state: FsmState,
    },
}

impl NeighborError {
    /// NOTIFICATION to send before tearing the session down, when the
    /// error carries one.
    pub(crate) fn notification(&self) -> Option<NotificationMessage> {
        match self {
            NeighborError::Open(err) => Some(err.notification()),
            _ => None,
        }
    }
}
