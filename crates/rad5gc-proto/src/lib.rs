//! RADIUS / EAP-AKA' Protocol Support
//!
//! This crate provides the wire-format pieces the Rad-5GC gateway needs to
//! terminate RADIUS Access-Requests carrying EAP-AKA' authentication:
//!
//! - Packet and attribute encoding/decoding (RFC 2865)
//! - Response Authenticator calculation (RFC 2865 Section 3)
//! - Message-Authenticator HMAC-MD5 verification (RFC 2869 / RFC 3579)
//! - MS-MPPE key attribute encryption (RFC 2548)
//! - EAP header decoding and AKA' identity handling (RFC 3748 / RFC 5448)
//!
//! # Example
//!
//! ```rust
//! use rad5gc_proto::{Attribute, AttributeType, Code, Packet};
//! use rad5gc_proto::message_auth::message_authenticator_calc;
//!
//! let mut packet = Packet::new(Code::AccessChallenge, 1, [0u8; 16]);
//! packet.add_attribute(
//!     Attribute::new(AttributeType::EapMessage as u8, vec![0x01, 0x02, 0x00, 0x04]).unwrap(),
//! );
//! packet.add_attribute(
//!     Attribute::new(AttributeType::MessageAuthenticator as u8, vec![0u8; 16]).unwrap(),
//! );
//!
//! let (mac, _) = message_authenticator_calc(&packet, b"secret").unwrap();
//! packet.set_attribute(AttributeType::MessageAuthenticator as u8, &mac);
//! ```

pub mod attributes;
pub mod auth;
pub mod eap;
pub mod message_auth;
pub mod mppe;
pub mod packet;

pub use attributes::{Attribute, AttributeType};
pub use auth::{
    calculate_response_authenticator, generate_request_authenticator,
    verify_response_authenticator,
};
pub use eap::{EapError, EapPacket, IdentitySet};
pub use message_auth::{message_authenticator_calc, MessageAuthError};
pub use packet::{Code, Packet, PacketError};
