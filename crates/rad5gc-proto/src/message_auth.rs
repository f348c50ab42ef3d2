//! Message-Authenticator Support (RFC 2869 / RFC 3579)
//!
//! The Message-Authenticator attribute (80) carries an HMAC-MD5 over the
//! entire RADIUS packet, computed with the attribute's own 16-byte value
//! overwritten by zeros. It is mandatory on Access-Requests carrying
//! EAP-Message and on every reply the gateway writes.
//!
//! The same calculation serves both directions: for inbound packets the
//! result is compared against the stored value, for outbound packets the
//! caller appends a zeroed attribute first and then stores the result
//! back into it.

use crate::attributes::AttributeType;
use crate::packet::{Packet, PacketError};
use hmac::{Hmac, Mac};
use md5_digest::Md5;
use thiserror::Error;

type HmacMd5 = Hmac<Md5>;

/// 16 zero octets substituted for the stored MAC during calculation
const ZEROED_MAC: [u8; 16] = [0u8; 16];

#[derive(Error, Debug)]
pub enum MessageAuthError {
    #[error("AVP Message-Authenticator not found")]
    NotFound,
    #[error("Packet marshaling error: {0}")]
    Marshal(#[from] PacketError),
}

/// Calculate the expected Message-Authenticator for a packet and compare
/// it against the stored one.
///
/// Returns `(expected_mac, matches_stored)`. Fails with
/// [`MessageAuthError::NotFound`] when the packet carries no attribute 80,
/// or [`MessageAuthError::Marshal`] when the zeroed serialization cannot
/// be produced. A stored value of the wrong length simply does not match.
pub fn message_authenticator_calc(
    packet: &Packet,
    secret: &[u8],
) -> Result<([u8; 16], bool), MessageAuthError> {
    let msg_auth_type = AttributeType::MessageAuthenticator as u8;

    let stored = packet
        .find_attribute(msg_auth_type)
        .map(|attr| attr.value.clone())
        .ok_or(MessageAuthError::NotFound)?;

    let mut zeroed = packet.clone();
    zeroed.set_attribute(msg_auth_type, &ZEROED_MAC);
    let bytes = zeroed.encode()?;

    let mut mac = HmacMd5::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(&bytes);
    let result = mac.finalize().into_bytes();

    let mut expected = [0u8; 16];
    expected.copy_from_slice(&result);

    Ok((expected, constant_time_eq(&expected, &stored)))
}

fn constant_time_eq(expected: &[u8; 16], stored: &[u8]) -> bool {
    if stored.len() != expected.len() {
        return false;
    }
    let mut diff = 0u8;
    for (a, b) in expected.iter().zip(stored.iter()) {
        diff |= a ^ b;
    }
    diff == 0
}
