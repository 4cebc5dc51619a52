//! OPEN message acceptance rules for a BGP-LS session.

use std::net::Ipv4Addr;
use std::time::Duration;

use crate::bgp::message::{
    Capability, OpenMessage, OptParam, AS_TRANS, BGP_LS_AFI, BGP_LS_SAFI, BGP_VERSION,
};

use super::error::OpenError;

/// Session timers agreed during the OPEN exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Negotiated {
    pub hold_time: Duration,
    pub keepalive: Duration,
}

/// Interval at which KEEPALIVEs are sent: one third of the hold time,
/// rounded down to whole seconds.
pub fn keepalive_interval(hold_time: Duration) -> Duration {
    Duration::from_secs(hold_time.as_secs() / 3)
}

/// Validate a received OPEN against the neighbor's expected ASN and derive
/// the negotiated session timers.
///
/// Rules are applied in order and the first violation wins; the returned
/// [`OpenError`] carries the NOTIFICATION to send back. On success the
/// negotiated hold time is the minimum of `configured_hold` and the peer's
/// proposal.
///
/// The peer must advertise the BGP-LS address family in a Multiprotocol
/// capability. When its two-octet AS field is `AS_TRANS`, the real ASN must
/// appear in a Four-Octet-AS capability.
pub fn validate_open(
    open: &OpenMessage,
    peer_asn: u32,
    configured_hold: Duration,
) -> Result<Negotiated, OpenError> {
    if open.version != BGP_VERSION {
        return Err(OpenError::UnsupportedVersion(open.version));
    }

    let four_octet_as = open.asn == AS_TRANS;
    if !four_octet_as && open.asn != peer_asn as u16 {
        return Err(OpenError::BadPeerAs);
    }

    if open.hold_time < 3 {
        return Err(OpenError::UnacceptableHoldTime);
    }

    let mut hold_time = configured_hold;
    if u64::from(open.hold_time) < hold_time.as_secs() {
        hold_time = Duration::from_secs(open.hold_time.into());
    }

    if open.bgp_id == Ipv4Addr::UNSPECIFIED {
        return Err(OpenError::BadBgpIdentifier);
    }

    let mut four_octet_as_found = false;
    let mut bgp_ls_af_found = false;
    for param in &open.opt_params {
        let caps = match param {
            OptParam::Capabilities(caps) => caps,
            OptParam::Unknown { .. } => return Err(OpenError::UnsupportedOptionalParameter),
        };
        for cap in caps {
            match cap {
                Capability::FourOctetAs { asn } => {
                    four_octet_as_found = true;
                    if *asn != peer_asn {
                        return Err(OpenError::BadPeerAs);
                    }
                }
                Capability::Multiprotocol { afi, safi } => {
                    if *afi == BGP_LS_AFI && *safi == BGP_LS_SAFI {
                        bgp_ls_af_found = true;
                    }
                }
                Capability::Unknown { .. } => {}
            }
        }
    }

    if !bgp_ls_af_found {
        return Err(OpenError::BgpLsCapabilityMissing);
    }
    if four_octet_as && !four_octet_as_found {
        return Err(OpenError::FourOctetAsCapabilityMissing);
    }

    Ok(Negotiated {
        hold_time,
        keepalive: keepalive_interval(hold_time),
    })
}
