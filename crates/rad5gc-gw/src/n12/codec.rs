//! EAP Payload Transport Encoding
//!
//! N12 carries EAP packets as the hex-string rendering of the raw bytes,
//! Base64-encoded on top: `b64(ascii(hex(eap)))`. The one exception is
//! `5gAuthData` in the 201 response, which the AUSF already delivers as
//! plain Base64 of the EAP bytes.

use super::N12Error;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

/// Encode EAP bytes for an N12 `eapPayload` field
pub fn encode_eap_payload(bytes: &[u8]) -> String {
    BASE64.encode(hex::encode(bytes).as_bytes())
}

/// Decode an N12 `eapPayload` field back to EAP bytes
pub fn decode_eap_payload(payload: &str) -> Result<Vec<u8>, N12Error> {
    let hex_str = BASE64.decode(payload)?;
    Ok(hex::decode(hex_str)?)
}

/// Decode `5gAuthData` from a 201 response (Base64 only, no hex layer)
pub fn decode_auth_data(data: &str) -> Result<Vec<u8>, N12Error> {
    Ok(BASE64.decode(data)?)
}

/// The EAP identifier of a decoded payload (RFC 3748: second octet)
pub fn payload_eap_id(payload: &[u8]) -> Result<u8, N12Error> {
    payload
        .get(1)
        .copied()
        .ok_or(N12Error::PayloadTooShort(payload.len()))
}
