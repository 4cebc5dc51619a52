//! BGP-4 wire format: message framing plus the OPEN, UPDATE, NOTIFICATION
//! and KEEPALIVE messages a BGP-LS session exchanges.
//!
//! UPDATE bodies are carried opaquely; decoding link-state NLRI and
//! attributes is left to the consumer of the event stream.

use std::fmt;
use std::net::Ipv4Addr;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

pub const BGP_MARKER: [u8; 16] = [0xFF; 16];
pub const BGP_VERSION: u8 = 4;
pub const BGP_HEADER_LEN: usize = 19;
/// Maximum BGP message size per RFC 4271.
pub const MAX_MESSAGE_LEN: usize = 4096;

/// Reserved two-octet ASN signalling that the real ASN is carried in a
/// Four-Octet-AS capability (RFC 6793).
pub const AS_TRANS: u16 = 23456;

/// BGP-LS address family identifiers (RFC 7752).
pub const BGP_LS_AFI: u16 = 16388;
pub const BGP_LS_SAFI: u8 = 71;

/// Optional parameter type carrying capabilities (RFC 5492).
const PARAM_TYPE_CAPABILITIES: u8 = 2;

const CAP_CODE_MULTIPROTOCOL: u8 = 1;
const CAP_CODE_FOUR_OCTET_AS: u8 = 65;

/// Errors raised while decoding a BGP byte stream.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MessageError {
    #[error("invalid BGP marker")]
    Marker,
    #[error("invalid message length: {0}")]
    Length(u16),
    #[error("invalid message type: {0}")]
    Type(u8),
    #[error("{0} too short")]
    Truncated(&'static str),
    #[error("invalid {0} capability length")]
    CapabilityLength(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    Open = 1,
    Update = 2,
    Notification = 3,
    Keepalive = 4,
}

impl TryFrom<u8> for MessageType {
    type Error = MessageError;

    fn try_from(value: u8) -> Result<Self, MessageError> {
        match value {
            1 => Ok(MessageType::Open),
            2 => Ok(MessageType::Update),
            3 => Ok(MessageType::Notification),
            4 => Ok(MessageType::Keepalive),
            other => Err(MessageError::Type(other)),
        }
    }
}

/// NOTIFICATION error codes per RFC 4271 Section 4.5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorCode {
    MessageHeaderError = 1,
    OpenMessageError = 2,
    UpdateMessageError = 3,
    HoldTimerExpired = 4,
    FiniteStateMachineError = 5,
    Cease = 6,
}

/// Message Header Error subcodes per RFC 4271 Section 6.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HeaderErrorSubcode {
    ConnectionNotSynchronized = 1,
    BadMessageLength = 2,
    BadMessageType = 3,
}

/// OPEN Message Error subcodes per RFC 4271 Section 6.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpenErrorSubcode {
    UnsupportedVersionNumber = 1,
    BadPeerAs = 2,
    BadBgpIdentifier = 3,
    UnsupportedOptionalParameter = 4,
    // 5 is deprecated (was AuthenticationFailure)
    UnacceptableHoldTime = 6,
    UnsupportedCapability = 7,
}

/// A NOTIFICATION message. Sent before any protocol-driven teardown;
/// received ones are surfaced on the event stream.
///
/// Code and subcode are kept raw so notifications from the peer round-trip
/// even when we do not recognize them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationMessage {
    pub code: u8,
    pub subcode: u8,
    pub data: Vec<u8>,
}

impl NotificationMessage {
    pub fn new(code: ErrorCode, subcode: u8, data: Vec<u8>) -> Self {
        Self {
            code: code as u8,
            subcode,
            data,
        }
    }

    pub fn cease() -> Self {
        Self::new(ErrorCode::Cease, 0, Vec::new())
    }

    pub fn hold_timer_expired() -> Self {
        Self::new(ErrorCode::HoldTimerExpired, 0, Vec::new())
    }

    /// Header error for a message type that is invalid where it was seen.
    /// The data carries the offending type octet.
    pub fn bad_message_type(received: MessageType) -> Self {
        Self::new(
            ErrorCode::MessageHeaderError,
            HeaderErrorSubcode::BadMessageType as u8,
            vec![received as u8],
        )
    }

    pub fn to_bytes(&self) -> Bytes {
        let length = (BGP_HEADER_LEN + 2 + self.data.len()) as u16;
        let mut buf = BytesMut::with_capacity(length as usize);
        buf.put_slice(&BGP_MARKER);
        buf.put_u16(length);
        buf.put_u8(MessageType::Notification as u8);
        buf.put_u8(self.code);
        buf.put_u8(self.subcode);
        buf.put_slice(&self.data);
        buf.freeze()
    }
}

impl fmt::Display for NotificationMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "code {}, subcode {}", self.code, self.subcode)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capability {
    Multiprotocol { afi: u16, safi: u8 },
    FourOctetAs { asn: u32 },
    /// Unrecognized capability, preserved as raw bytes.
    Unknown { code: u8, data: Vec<u8> },
}

impl Capability {
    /// The Multiprotocol capability announcing the BGP-LS address family.
    pub fn bgp_ls() -> Self {
        Capability::Multiprotocol {
            afi: BGP_LS_AFI,
            safi: BGP_LS_SAFI,
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(8);
        match self {
            Capability::Multiprotocol { afi, safi } => {
                buf.put_u8(CAP_CODE_MULTIPROTOCOL);
                buf.put_u8(4);
                buf.put_u16(*afi);
                buf.put_u8(0); // reserved
                buf.put_u8(*safi);
            }
            Capability::FourOctetAs { asn } => {
                buf.put_u8(CAP_CODE_FOUR_OCTET_AS);
                buf.put_u8(4);
                buf.put_u32(*asn);
            }
            Capability::Unknown { code, data } => {
                buf.put_u8(*code);
                buf.put_u8(data.len() as u8);
                buf.put_slice(data);
            }
        }
        buf.freeze()
    }

    pub fn decode(data: &mut impl Buf) -> Result<Self, MessageError> {
        if data.remaining() < 2 {
            return Err(MessageError::Truncated("capability"));
        }
        let code = data.get_u8();
        let len = data.get_u8() as usize;
        if data.remaining() < len {
            return Err(MessageError::Truncated("capability"));
        }

        match code {
            CAP_CODE_MULTIPROTOCOL => {
                if len != 4 {
                    return Err(MessageError::CapabilityLength("multiprotocol"));
                }
                let afi = data.get_u16();
                let _reserved = data.get_u8();
                let safi = data.get_u8();
                Ok(Capability::Multiprotocol { afi, safi })
            }
            CAP_CODE_FOUR_OCTET_AS => {
                if len != 4 {
                    return Err(MessageError::CapabilityLength("four-octet AS"));
                }
                Ok(Capability::FourOctetAs {
                    asn: data.get_u32(),
                })
            }
            _ => {
                let mut raw = vec![0u8; len];
                data.copy_to_slice(&mut raw);
                Ok(Capability::Unknown { code, data: raw })
            }
        }
    }
}

/// An OPEN optional parameter. Only the Capabilities parameter is
/// meaningful to us, but other types are preserved so the session can
/// reject them explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptParam {
    Capabilities(Vec<Capability>),
    Unknown { param_type: u8, data: Vec<u8> },
}

impl OptParam {
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        match self {
            OptParam::Capabilities(caps) => {
                let mut body = BytesMut::new();
                for cap in caps {
                    body.put(cap.encode());
                }
                buf.put_u8(PARAM_TYPE_CAPABILITIES);
                buf.put_u8(body.len() as u8);
                buf.put(body);
            }
            OptParam::Unknown { param_type, data } => {
                buf.put_u8(*param_type);
                buf.put_u8(data.len() as u8);
                buf.put_slice(data);
            }
        }
        buf.freeze()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenMessage {
    pub version: u8,
    /// Two-octet AS field; `AS_TRANS` when the real ASN needs four octets.
    pub asn: u16,
    /// Proposed hold time in seconds.
    pub hold_time: u16,
    pub bgp_id: Ipv4Addr,
    pub opt_params: Vec<OptParam>,
}

impl OpenMessage {
    /// Build the OPEN we announce: Four-Octet-AS plus the BGP-LS address
    /// family, in a single Capabilities parameter.
    pub fn new(asn: u32, hold_time: u16, bgp_id: Ipv4Addr) -> Self {
        let caps = vec![Capability::FourOctetAs { asn }, Capability::bgp_ls()];
        Self {
            version: BGP_VERSION,
            asn: if asn > u32::from(u16::MAX) {
                AS_TRANS
            } else {
                asn as u16
            },
            hold_time,
            bgp_id,
            opt_params: vec![OptParam::Capabilities(caps)],
        }
    }

    /// All capabilities across every Capabilities parameter.
    pub fn capabilities(&self) -> impl Iterator<Item = &Capability> {
        self.opt_params.iter().flat_map(|param| {
            let caps: &[Capability] = match param {
                OptParam::Capabilities(caps) => caps,
                OptParam::Unknown { .. } => &[],
            };
            caps.iter()
        })
    }

    pub fn encode(&self) -> Bytes {
        let mut params = BytesMut::new();
        for param in &self.opt_params {
            params.put(param.encode());
        }

        let mut msg = BytesMut::with_capacity(10 + params.len());
        msg.put_u8(self.version);
        msg.put_u16(self.asn);
        msg.put_u16(self.hold_time);
        msg.put_slice(&self.bgp_id.octets());
        msg.put_u8(params.len() as u8);
        msg.put(params);
        msg.freeze()
    }

    pub fn decode(data: &mut impl Buf) -> Result<Self, MessageError> {
        if data.remaining() < 10 {
            return Err(MessageError::Truncated("OPEN message"));
        }

        let version = data.get_u8();
        let asn = data.get_u16();
        let hold_time = data.get_u16();
        let mut bgp_id = [0u8; 4];
        data.copy_to_slice(&mut bgp_id);
        let bgp_id = Ipv4Addr::from(bgp_id);

        let params_len = data.get_u8() as usize;
        if data.remaining() < params_len {
            return Err(MessageError::Truncated("OPEN message"));
        }
        let mut params_buf = data.copy_to_bytes(params_len);

        let mut opt_params = Vec::new();
        while params_buf.has_remaining() {
            if params_buf.remaining() < 2 {
                return Err(MessageError::Truncated("optional parameter"));
            }
            let param_type = params_buf.get_u8();
            let param_len = params_buf.get_u8() as usize;
            if params_buf.remaining() < param_len {
                return Err(MessageError::Truncated("optional parameter"));
            }
            let mut body = params_buf.copy_to_bytes(param_len);

            if param_type == PARAM_TYPE_CAPABILITIES {
                let mut caps = Vec::new();
                while body.has_remaining() {
                    caps.push(Capability::decode(&mut body)?);
                }
                opt_params.push(OptParam::Capabilities(caps));
            } else {
                opt_params.push(OptParam::Unknown {
                    param_type,
                    data: body.to_vec(),
                });
            }
        }

        Ok(Self {
            version,
            asn,
            hold_time,
            bgp_id,
            opt_params,
        })
    }

    pub fn to_bytes(&self) -> Bytes {
        let body = self.encode();
        let length = (BGP_HEADER_LEN + body.len()) as u16;
        let mut buf = BytesMut::with_capacity(length as usize);
        buf.put_slice(&BGP_MARKER);
        buf.put_u16(length);
        buf.put_u8(MessageType::Open as u8);
        buf.put(body);
        buf.freeze()
    }
}

pub struct KeepaliveMessage;

impl KeepaliveMessage {
    pub fn to_bytes() -> Bytes {
        let mut buf = BytesMut::with_capacity(BGP_HEADER_LEN);
        buf.put_slice(&BGP_MARKER);
        buf.put_u16(BGP_HEADER_LEN as u16);
        buf.put_u8(MessageType::Keepalive as u8);
        buf.freeze()
    }
}

/// A parsed inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Open(OpenMessage),
    /// Raw UPDATE body; link-state NLRI decoding is the consumer's job.
    Update(Bytes),
    Notification(NotificationMessage),
    Keepalive,
}

impl Message {
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Open(_) => "OPEN",
            Message::Update(_) => "UPDATE",
            Message::Notification(_) => "NOTIFICATION",
            Message::Keepalive => "KEEPALIVE",
        }
    }
}

/// Incremental framer over a BGP byte stream.
///
/// Append raw bytes into [`Framer::read_buffer`], then pop complete
/// messages with [`Framer::next_message`]. Partial input is retained until
/// the rest of the frame arrives, so the framer can be fed reads of any
/// size.
#[derive(Debug, Default)]
pub struct Framer {
    buf: BytesMut,
}

impl Framer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer to append incoming bytes into. Spare capacity is reserved so
    /// the return value can be handed straight to `read_buf`.
    pub fn read_buffer(&mut self) -> &mut BytesMut {
        self.buf.reserve(MAX_MESSAGE_LEN);
        &mut self.buf
    }

    /// Pop the next complete message, `Ok(None)` if more bytes are needed.
    pub fn next_message(&mut self) -> Result<Option<Message>, MessageError> {
        if self.buf.len() < BGP_HEADER_LEN {
            return Ok(None);
        }
        if self.buf[..16] != BGP_MARKER {
            return Err(MessageError::Marker);
        }

        let length = u16::from_be_bytes([self.buf[16], self.buf[17]]) as usize;
        if !(BGP_HEADER_LEN..=MAX_MESSAGE_LEN).contains(&length) {
            return Err(MessageError::Length(length as u16));
        }
        if self.buf.len() < length {
            return Ok(None);
        }

        let msg_type = MessageType::try_from(self.buf[18])?;
        let mut frame = self.buf.split_to(length).freeze();
        frame.advance(BGP_HEADER_LEN);

        let message = match msg_type {
            MessageType::Open => Message::Open(OpenMessage::decode(&mut frame)?),
            MessageType::Update => Message::Update(frame),
            MessageType::Notification => {
                let code = if frame.has_remaining() { frame.get_u8() } else { 0 };
                let subcode = if frame.has_remaining() { frame.get_u8() } else { 0 };
                Message::Notification(NotificationMessage {
                    code,
                    subcode,
                    data: frame.to_vec(),
                })
            }
            MessageType::Keepalive => {
                if length != BGP_HEADER_LEN {
                    return Err(MessageError::Length(length as u16));
                }
                Message::Keepalive
            }
        };
        Ok(Some(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(framer: &mut Framer, bytes: &[u8]) {
        framer.read_buffer().put_slice(bytes);
    }

    // ==================== MessageType ====================

    #[test]
    fn test_message_type_try_from_valid() {
        assert_eq!(MessageType::try_from(1).unwrap(), MessageType::Open);
        assert_eq!(MessageType::try_from(2).unwrap(), MessageType::Update);
        assert_eq!(MessageType::try_from(3).unwrap(), MessageType::Notification);
        assert_eq!(MessageType::try_from(4).unwrap(), MessageType::Keepalive);
    }

    #[test]
    fn test_message_type_try_from_invalid() {
        assert_eq!(MessageType::try_from(0), Err(MessageError::Type(0)));
        assert_eq!(MessageType::try_from(5), Err(MessageError::Type(5)));
        assert_eq!(MessageType::try_from(255), Err(MessageError::Type(255)));
    }

    // ==================== Capability ====================

    #[test]
    fn test_capability_bgp_ls_encoding() {
        let encoded = Capability::bgp_ls().encode();
        // Type=1, Len=4, AFI=16388 (0x4004), Reserved=0, SAFI=71
        assert_eq!(&encoded[..], &[1, 4, 0x40, 0x04, 0, 71]);
    }

    #[test]
    fn test_capability_multiprotocol_roundtrip() {
        let cap = Capability::bgp_ls();
        let mut buf = cap.encode();
        let decoded = Capability::decode(&mut buf).unwrap();
        assert_eq!(buf.remaining(), 0);
        assert_eq!(decoded, cap);
    }

    #[test]
    fn test_capability_four_octet_as_roundtrip() {
        let cap = Capability::FourOctetAs { asn: 4_200_000_001 };
        let encoded = cap.encode();
        assert_eq!(encoded[0], 65);
        assert_eq!(encoded[1], 4);

        let mut buf = encoded;
        let decoded = Capability::decode(&mut buf).unwrap();
        assert_eq!(decoded, cap);
    }

    #[test]
    fn test_capability_unknown_preserved() {
        let mut data = Bytes::from_static(&[99, 2, 0x12, 0x34]);
        let cap = Capability::decode(&mut data).unwrap();
        assert_eq!(
            cap,
            Capability::Unknown {
                code: 99,
                data: vec![0x12, 0x34]
            }
        );
    }

    #[test]
    fn test_capability_decode_too_short() {
        let mut data = Bytes::from_static(&[1]);
        assert!(Capability::decode(&mut data).is_err());

        let mut data = Bytes::from_static(&[1, 4, 0, 2]);
        assert!(Capability::decode(&mut data).is_err());
    }

    #[test]
    fn test_capability_decode_bad_multiprotocol_length() {
        let mut data = Bytes::from_static(&[1, 3, 0, 2, 1]);
        assert_eq!(
            Capability::decode(&mut data),
            Err(MessageError::CapabilityLength("multiprotocol"))
        );
    }

    // ==================== OpenMessage ====================

    #[test]
    fn test_open_message_new_16bit_asn() {
        let open = OpenMessage::new(64512, 90, Ipv4Addr::new(10, 0, 0, 1));

        assert_eq!(open.version, BGP_VERSION);
        assert_eq!(open.asn, 64512);
        assert_eq!(open.hold_time, 90);
        assert_eq!(open.bgp_id, Ipv4Addr::new(10, 0, 0, 1));

        let caps: Vec<_> = open.capabilities().collect();
        assert_eq!(caps.len(), 2);
        assert_eq!(caps[0], &Capability::FourOctetAs { asn: 64512 });
        assert_eq!(caps[1], &Capability::bgp_ls());
    }

    #[test]
    fn test_open_message_new_32bit_asn_uses_as_trans() {
        let open = OpenMessage::new(4_200_000_001, 90, Ipv4Addr::new(10, 0, 0, 1));

        assert_eq!(open.asn, AS_TRANS);
        assert!(open
            .capabilities()
            .any(|c| matches!(c, Capability::FourOctetAs { asn: 4_200_000_001 })));
    }

    #[test]
    fn test_open_message_roundtrip() {
        let original = OpenMessage::new(64512, 180, Ipv4Addr::new(172, 16, 0, 1));
        let mut buf = original.encode();
        let decoded = OpenMessage::decode(&mut buf).unwrap();
        assert_eq!(decoded, original);
        assert_eq!(buf.remaining(), 0);
    }

    #[test]
    fn test_open_message_unknown_param_preserved() {
        let original = OpenMessage {
            version: 4,
            asn: 64512,
            hold_time: 90,
            bgp_id: Ipv4Addr::new(172, 16, 0, 1),
            opt_params: vec![
                OptParam::Unknown {
                    param_type: 1,
                    data: vec![0xAB],
                },
                OptParam::Capabilities(vec![Capability::bgp_ls()]),
            ],
        };

        let mut buf = original.encode();
        let decoded = OpenMessage::decode(&mut buf).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_open_message_unknown_capability_roundtrip() {
        let original = OpenMessage {
            version: 4,
            asn: 64512,
            hold_time: 90,
            bgp_id: Ipv4Addr::new(172, 16, 0, 1),
            opt_params: vec![OptParam::Capabilities(vec![
                Capability::Unknown {
                    code: 73,
                    data: vec![1, 2, 3],
                },
                Capability::bgp_ls(),
            ])],
        };

        let mut buf = original.encode();
        let decoded = OpenMessage::decode(&mut buf).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_open_message_decode_too_short() {
        let mut data = Bytes::from_static(&[4, 0xFC, 0x00, 0, 90]);
        assert!(OpenMessage::decode(&mut data).is_err());
    }

    #[test]
    fn test_open_message_wire_layout() {
        let open = OpenMessage {
            version: 4,
            asn: 64512,
            hold_time: 180,
            bgp_id: Ipv4Addr::new(1, 2, 3, 4),
            opt_params: vec![],
        };
        let bytes = open.to_bytes();

        assert_eq!(&bytes[0..16], &BGP_MARKER);
        assert_eq!(u16::from_be_bytes([bytes[16], bytes[17]]), 29);
        assert_eq!(bytes[18], MessageType::Open as u8);
        assert_eq!(bytes[19], 4);
        assert_eq!(u16::from_be_bytes([bytes[20], bytes[21]]), 64512);
        assert_eq!(u16::from_be_bytes([bytes[22], bytes[23]]), 180);
        assert_eq!(&bytes[24..28], &[1, 2, 3, 4]);
        assert_eq!(bytes[28], 0);
    }

    // ==================== KEEPALIVE / NOTIFICATION ====================

    #[test]
    fn test_keepalive_wire_layout() {
        let bytes = KeepaliveMessage::to_bytes();
        assert_eq!(bytes.len(), BGP_HEADER_LEN);
        assert_eq!(&bytes[0..16], &BGP_MARKER);
        assert_eq!(u16::from_be_bytes([bytes[16], bytes[17]]), 19);
        assert_eq!(bytes[18], MessageType::Keepalive as u8);
    }

    #[test]
    fn test_notification_wire_layout() {
        let notification = NotificationMessage::new(
            ErrorCode::OpenMessageError,
            OpenErrorSubcode::UnsupportedVersionNumber as u8,
            vec![0, 4],
        );
        let bytes = notification.to_bytes();

        assert_eq!(bytes.len(), 23);
        assert_eq!(u16::from_be_bytes([bytes[16], bytes[17]]), 23);
        assert_eq!(bytes[18], MessageType::Notification as u8);
        assert_eq!(bytes[19], 2);
        assert_eq!(bytes[20], 1);
        assert_eq!(&bytes[21..], &[0, 4]);
    }

    #[test]
    fn test_notification_bad_message_type_data() {
        let notification = NotificationMessage::bad_message_type(MessageType::Open);
        assert_eq!(notification.code, 1);
        assert_eq!(notification.subcode, 3);
        assert_eq!(notification.data, vec![1]);
    }

    // ==================== Framer ====================

    #[test]
    fn test_framer_needs_more_bytes() {
        let mut framer = Framer::new();
        assert!(matches!(framer.next_message(), Ok(None)));

        feed(&mut framer, &BGP_MARKER[..10]);
        assert!(matches!(framer.next_message(), Ok(None)));
    }

    #[test]
    fn test_framer_single_keepalive() {
        let mut framer = Framer::new();
        feed(&mut framer, &KeepaliveMessage::to_bytes());

        assert!(matches!(framer.next_message(), Ok(Some(Message::Keepalive))));
        assert!(matches!(framer.next_message(), Ok(None)));
    }

    #[test]
    fn test_framer_message_split_across_feeds() {
        let open = OpenMessage::new(64512, 90, Ipv4Addr::new(172, 16, 0, 1));
        let bytes = open.to_bytes();

        let mut framer = Framer::new();
        feed(&mut framer, &bytes[..21]);
        assert!(matches!(framer.next_message(), Ok(None)));

        feed(&mut framer, &bytes[21..]);
        match framer.next_message() {
            Ok(Some(Message::Open(decoded))) => assert_eq!(decoded, open),
            other => panic!("expected OPEN, got {other:?}"),
        }
    }

    #[test]
    fn test_framer_multiple_messages_in_one_feed() {
        let mut framer = Framer::new();
        let mut bytes = BytesMut::new();
        bytes.put(KeepaliveMessage::to_bytes());
        bytes.put(NotificationMessage::cease().to_bytes());
        bytes.put(KeepaliveMessage::to_bytes());
        feed(&mut framer, &bytes);

        assert!(matches!(framer.next_message(), Ok(Some(Message::Keepalive))));
        match framer.next_message() {
            Ok(Some(Message::Notification(n))) => {
                assert_eq!(n.code, ErrorCode::Cease as u8);
                assert_eq!(n.subcode, 0);
                assert!(n.data.is_empty());
            }
            other => panic!("expected NOTIFICATION, got {other:?}"),
        }
        assert!(matches!(framer.next_message(), Ok(Some(Message::Keepalive))));
        assert!(matches!(framer.next_message(), Ok(None)));
    }

    #[test]
    fn test_framer_rejects_bad_marker() {
        let mut framer = Framer::new();
        feed(&mut framer, &[0u8; BGP_HEADER_LEN]);
        assert_eq!(framer.next_message(), Err(MessageError::Marker));
    }

    #[test]
    fn test_framer_rejects_bad_length() {
        let mut framer = Framer::new();
        let mut bytes = BytesMut::new();
        bytes.put_slice(&BGP_MARKER);
        bytes.put_u16(18); // below the header length
        bytes.put_u8(MessageType::Keepalive as u8);
        feed(&mut framer, &bytes);
        assert_eq!(framer.next_message(), Err(MessageError::Length(18)));

        let mut framer = Framer::new();
        let mut bytes = BytesMut::new();
        bytes.put_slice(&BGP_MARKER);
        bytes.put_u16(5000); // above the maximum message size
        bytes.put_u8(MessageType::Update as u8);
        feed(&mut framer, &bytes);
        assert_eq!(framer.next_message(), Err(MessageError::Length(5000)));
    }

    #[test]
    fn test_framer_rejects_keepalive_with_body() {
        let mut framer = Framer::new();
        let mut bytes = BytesMut::new();
        bytes.put_slice(&BGP_MARKER);
        bytes.put_u16(21);
        bytes.put_u8(MessageType::Keepalive as u8);
        bytes.put_slice(&[0, 0]);
        feed(&mut framer, &bytes);
        assert_eq!(framer.next_message(), Err(MessageError::Length(21)));
    }

    #[test]
    fn test_framer_rejects_unknown_type() {
        let mut framer = Framer::new();
        let mut bytes = BytesMut::new();
        bytes.put_slice(&BGP_MARKER);
        bytes.put_u16(19);
        bytes.put_u8(9);
        feed(&mut framer, &bytes);
        assert_eq!(framer.next_message(), Err(MessageError::Type(9)));
    }

    #[test]
    fn test_framer_update_body_passthrough() {
        let body = [0x00, 0x00, 0x00, 0x04, 0x40, 0x01, 0x01, 0x00];
        let mut bytes = BytesMut::new();
        bytes.put_slice(&BGP_MARKER);
        bytes.put_u16((BGP_HEADER_LEN + body.len()) as u16);
        bytes.put_u8(MessageType::Update as u8);
        bytes.put_slice(&body);

        let mut framer = Framer::new();
        feed(&mut framer, &bytes);
        match framer.next_message() {
            Ok(Some(Message::Update(update))) => assert_eq!(&update[..], &body),
            other => panic!("expected UPDATE, got {other:?}"),
        }
    }

    #[test]
    fn test_framer_notification_empty_body() {
        let mut bytes = BytesMut::new();
        bytes.put_slice(&BGP_MARKER);
        bytes.put_u16(BGP_HEADER_LEN as u16);
        bytes.put_u8(MessageType::Notification as u8);

        let mut framer = Framer::new();
        feed(&mut framer, &bytes);
        match framer.next_message() {
            Ok(Some(Message::Notification(n))) => {
                assert_eq!(n.code, 0);
                assert_eq!(n.subcode, 0);
                assert!(n.data.is_empty());
            }
            other => panic!("expected NOTIFICATION, got {other:?}"),
        }
    }
}
