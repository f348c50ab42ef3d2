//! EAP and EAP-AKA' Support (RFC 3748 / RFC 5448)
//!
//! The gateway never terminates the AKA' method itself; it decodes just
//! enough of each EAP packet to route it (code, identifier, method type,
//! AKA' subtype) and keeps the original bytes intact so they can be
//! relayed to the AUSF verbatim.
//!
//! # EAP Packet Format
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |     Code      |  Identifier   |            Length             |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |     Type      |  Type-Data ...
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

use thiserror::Error;

/// EAP packet code (first byte of EAP packet)
pub mod code {
    /// Request packet (Code 1)
    pub const REQUEST: u8 = 1;
    /// Response packet (Code 2)
    pub const RESPONSE: u8 = 2;
    /// Success packet (Code 3)
    pub const SUCCESS: u8 = 3;
    /// Failure packet (Code 4)
    pub const FAILURE: u8 = 4;
}

/// EAP method types handled by the gateway
pub mod method {
    /// Identity (Type 1) - RFC 3748
    pub const IDENTITY: u8 = 1;
    /// EAP-AKA' (Type 50) - RFC 5448
    pub const AKA_PRIME: u8 = 50;
}

/// EAP-AKA' subtype (first octet of the AKA' type data)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AkaSubtype {
    Challenge = 1,
    AuthenticationReject = 2,
    SynchronizationFailure = 4,
    Identity = 5,
}

impl AkaSubtype {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(Self::Challenge),
            2 => Some(Self::AuthenticationReject),
            4 => Some(Self::SynchronizationFailure),
            5 => Some(Self::Identity),
            _ => None,
        }
    }
}

/// EAP-related errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EapError {
    #[error("Packet too short: expected at least {expected} bytes, got {actual}")]
    PacketTooShort { expected: usize, actual: usize },

    #[error("Invalid EAP code: {0}")]
    InvalidCode(u8),

    #[error("Invalid packet length: {0}")]
    InvalidLength(usize),

    #[error("Invalid network name: {0}")]
    InvalidNetworkName(String),
}

/// Decoded EAP packet
///
/// `contents` holds the full original bytes; the AKA' exchange forwards
/// them to the AUSF without re-encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EapPacket {
    /// EAP code (Request, Response, Success, Failure)
    pub code: u8,
    /// Identifier for matching requests and responses (0-255)
    pub identifier: u8,
    /// Declared packet length (network byte order on the wire)
    pub length: u16,
    /// Method type; 0 for Success/Failure packets, which carry none
    pub eap_type: u8,
    /// Type-specific data
    pub type_data: Vec<u8>,
    /// The complete packet bytes as received
    pub contents: Vec<u8>,
}

impl EapPacket {
    /// Parse an EAP packet from bytes.
    ///
    /// Too-short input invalidates the whole packet; a declared length
    /// longer than the buffer does the same. Trailing bytes beyond the
    /// declared length are ignored.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EapError> {
        if bytes.len() < 4 {
            return Err(EapError::PacketTooShort {
                expected: 4,
                actual: bytes.len(),
            });
        }

        let code = bytes[0];
        if code < code::REQUEST || code > code::FAILURE {
            return Err(EapError::InvalidCode(code));
        }
        let identifier = bytes[1];
        let length = u16::from_be_bytes([bytes[2], bytes[3]]);

        let declared = length as usize;
        if declared < 4 {
            return Err(EapError::InvalidLength(declared));
        }
        if bytes.len() < declared {
            return Err(EapError::PacketTooShort {
                expected: declared,
                actual: bytes.len(),
            });
        }

        // Success/Failure packets are headers only; Request/Response
        // carry a type octet followed by type data.
        let (eap_type, type_data) = if declared >= 5 {
            (bytes[4], bytes[5..declared].to_vec())
        } else {
            (0, Vec::new())
        };

        Ok(EapPacket {
            code,
            identifier,
            length,
            eap_type,
            type_data,
            contents: bytes[..declared].to_vec(),
        })
    }

    /// AKA' subtype, when this is an AKA' packet with at least one data octet.
    pub fn aka_subtype(&self) -> Option<u8> {
        if self.eap_type == method::AKA_PRIME {
            self.type_data.first().copied()
        } else {
            None
        }
    }
}

/// An EAP-Identity split into its access-network components.
///
/// A well-formed 5G identity is exactly 51 octets: a one-digit routing
/// prefix, 15 IMSI digits, and a 35-character NAI realm. Anything else is
/// treated as an opaque prefix so the dispatcher can reject it by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentitySet {
    pub prefix: String,
    pub imsi: String,
    pub nai: String,
}

/// Length of a well-formed identity: prefix(1) + IMSI(15) + NAI(35)
pub const IDENTITY_LEN: usize = 51;

/// Split EAP-Identity type data into {prefix, IMSI, NAI}.
pub fn parse_identity(type_data: &[u8]) -> IdentitySet {
    if type_data.len() == IDENTITY_LEN {
        IdentitySet {
            prefix: String::from_utf8_lossy(&type_data[..1]).into_owned(),
            imsi: String::from_utf8_lossy(&type_data[1..16]).into_owned(),
            nai: String::from_utf8_lossy(&type_data[16..]).into_owned(),
        }
    } else {
        IdentitySet {
            prefix: String::from_utf8_lossy(type_data).into_owned(),
            imsi: String::new(),
            nai: String::new(),
        }
    }
}

/// Derive the N12 servingNetworkName from an NAI realm.
///
/// `@wlan.<realm>.3gppnetwork.org` becomes `5G:wlan.<realm>.3gppnetwork.org`;
/// anything not carrying both affixes is rejected.
pub fn serving_network_name(nai: &str) -> Result<String, EapError> {
    if nai.starts_with("@wlan.") && nai.ends_with(".3gppnetwork.org") {
        Ok(format!("5G:{}", &nai[1..]))
    } else {
        Err(EapError::InvalidNetworkName(nai.to_string()))
    }
}

/// EAP-Request/AKA'-Identity carrying AT_FULLAUTH_ID_REQ.
///
/// Sent when a peer offers a pseudonym or fast-reauthentication identity
/// the gateway cannot resolve; forces the peer back to a full
/// authentication with its permanent identity. Byte 1 is the EAP
/// identifier placeholder.
const FULLAUTH_ID_REQUEST: [u8; 12] = [
    0x01, 0x00, 0x00, 0x0c, 0x32, 0x05, 0x00, 0x00, 0x11, 0x01, 0x00, 0x00,
];

/// The AT_FULLAUTH_ID_REQ request with the given EAP identifier stamped in.
pub fn fullauth_id_request(identifier: u8) -> [u8; 12] {
    let mut request = FULLAUTH_ID_REQUEST;
    request[1] = identifier;
    request
}
