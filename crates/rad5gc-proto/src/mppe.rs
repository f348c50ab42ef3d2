//! MS-MPPE Key Attributes (RFC 2548 Section 2.4.2 / 2.4.3)
//!
//! On EAP success the gateway hands the access point its session key
//! material inside the vendor-specific MS-MPPE-Send-Key and
//! MS-MPPE-Recv-Key attributes. The key string is encrypted with the
//! shared secret and the Request Authenticator using the same MD5 XOR
//! chain RADIUS uses for User-Password, extended with a 2-byte salt.

use crate::attributes::{Attribute, AttributeType};
use crate::packet::PacketError;
use rand::Rng;
use thiserror::Error;

/// Microsoft vendor id (SMI enterprise code 311)
pub const VENDOR_MICROSOFT: u32 = 311;
/// MS-MPPE-Send-Key vendor type
pub const MS_MPPE_SEND_KEY: u8 = 16;
/// MS-MPPE-Recv-Key vendor type
pub const MS_MPPE_RECV_KEY: u8 = 17;

#[derive(Error, Debug)]
pub enum MppeError {
    #[error("Invalid salt: high bit of the first octet must be set")]
    InvalidSalt,
    #[error("Encrypted key data too short: {0} bytes")]
    DataTooShort(usize),
    #[error("Encrypted key data not a multiple of 16: {0} bytes")]
    BadBlockLength(usize),
    #[error("Key length byte {0} exceeds decrypted data")]
    BadKeyLength(usize),
    #[error("Attribute error: {0}")]
    Attribute(#[from] PacketError),
}

/// Generate a 2-byte salt with the RFC 2548 high bit set.
pub fn generate_salt() -> [u8; 2] {
    let mut rng = rand::rng();
    let mut salt = [0u8; 2];
    rng.fill(&mut salt);
    salt[0] |= 0x80;
    salt
}

/// Encrypt key material per RFC 2548 Section 2.4.2.
///
/// The plaintext is the key prefixed by its length octet, zero-padded to
/// a 16-octet multiple; each block is XORed with
/// b(1) = MD5(secret + request_authenticator + salt),
/// b(i) = MD5(secret + c(i-1)). Returns salt followed by the ciphertext.
pub fn encrypt_mppe_key(
    key: &[u8],
    secret: &[u8],
    request_authenticator: &[u8; 16],
    salt: [u8; 2],
) -> Result<Vec<u8>, MppeError> {
    if salt[0] & 0x80 == 0 {
        return Err(MppeError::InvalidSalt);
    }

    let mut plaintext = Vec::with_capacity(1 + key.len());
    plaintext.push(key.len() as u8);
    plaintext.extend_from_slice(key);
    let padding = (16 - (plaintext.len() % 16)) % 16;
    plaintext.resize(plaintext.len() + padding, 0);

    let mut result = Vec::with_capacity(2 + plaintext.len());
    result.extend_from_slice(&salt);

    let mut previous: Vec<u8> = {
        let mut seed = Vec::new();
        seed.extend_from_slice(request_authenticator);
        seed.extend_from_slice(&salt);
        seed
    };

    for chunk in plaintext.chunks(16) {
        let mut data = Vec::new();
        data.extend_from_slice(secret);
        data.extend_from_slice(&previous);
        let hash = md5::compute(&data);

        let mut encrypted = [0u8; 16];
        for i in 0..16 {
            encrypted[i] = chunk[i] ^ hash.0[i];
        }

        previous = encrypted.to_vec();
        result.extend_from_slice(&encrypted);
    }

    Ok(result)
}

/// Decrypt key material encrypted with [`encrypt_mppe_key`].
pub fn decrypt_mppe_key(
    data: &[u8],
    secret: &[u8],
    request_authenticator: &[u8; 16],
) -> Result<Vec<u8>, MppeError> {
    if data.len() < 2 + 16 {
        return Err(MppeError::DataTooShort(data.len()));
    }
    let (salt, ciphertext) = data.split_at(2);
    if ciphertext.len() % 16 != 0 {
        return Err(MppeError::BadBlockLength(ciphertext.len()));
    }

    let mut plaintext = Vec::with_capacity(ciphertext.len());
    let mut previous: Vec<u8> = {
        let mut seed = Vec::new();
        seed.extend_from_slice(request_authenticator);
        seed.extend_from_slice(salt);
        seed
    };

    for chunk in ciphertext.chunks(16) {
        let mut data = Vec::new();
        data.extend_from_slice(secret);
        data.extend_from_slice(&previous);
        let hash = md5::compute(&data);

        for i in 0..16 {
            plaintext.push(chunk[i] ^ hash.0[i]);
        }
        previous = chunk.to_vec();
    }

    let key_len = plaintext[0] as usize;
    if key_len > plaintext.len() - 1 {
        return Err(MppeError::BadKeyLength(key_len));
    }
    Ok(plaintext[1..1 + key_len].to_vec())
}

/// Build the complete Vendor-Specific (26) attribute carrying one
/// encrypted MS-MPPE key.
fn mppe_key_attribute(
    vendor_type: u8,
    key: &[u8],
    secret: &[u8],
    request_authenticator: &[u8; 16],
    salt: [u8; 2],
) -> Result<Attribute, MppeError> {
    let encrypted = encrypt_mppe_key(key, secret, request_authenticator, salt)?;

    let mut value = Vec::with_capacity(4 + 2 + encrypted.len());
    value.extend_from_slice(&VENDOR_MICROSOFT.to_be_bytes());
    value.push(vendor_type);
    value.push((2 + encrypted.len()) as u8);
    value.extend_from_slice(&encrypted);

    Ok(Attribute::new(AttributeType::VendorSpecific as u8, value)?)
}

/// MS-MPPE-Send-Key attribute (vendor 311, type 16)
pub fn ms_mppe_send_key(
    key: &[u8],
    secret: &[u8],
    request_authenticator: &[u8; 16],
    salt: [u8; 2],
) -> Result<Attribute, MppeError> {
    mppe_key_attribute(MS_MPPE_SEND_KEY, key, secret, request_authenticator, salt)
}

/// MS-MPPE-Recv-Key attribute (vendor 311, type 17)
pub fn ms_mppe_recv_key(
    key: &[u8],
    secret: &[u8],
    request_authenticator: &[u8; 16],
    salt: [u8; 2],
) -> Result<Attribute, MppeError> {
    mppe_key_attribute(MS_MPPE_RECV_KEY, key, secret, request_authenticator, salt)
}

/// Split a Vendor-Specific value back into (vendor_id, vendor_type, data).
///
/// Used by clients and tests to recover the encrypted key string.
pub fn parse_vendor_specific(value: &[u8]) -> Option<(u32, u8, &[u8])> {
    if value.len() < 6 {
        return None;
    }
    let vendor_id = u32::from_be_bytes([value[0], value[1], value[2], value[3]]);
    let vendor_type = value[4];
    let vendor_len = value[5] as usize;
    if vendor_len < 2 || 4 + vendor_len > value.len() {
        return None;
    }
    Some((vendor_id, vendor_type, &value[6..4 + vendor_len]))
}
