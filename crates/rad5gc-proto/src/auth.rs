use crate::packet::Packet;
use rand::Rng;

/// Generate a random Request Authenticator (16 bytes) per RFC 2865 Section 3
pub fn generate_request_authenticator() -> [u8; 16] {
    let mut authenticator = [0u8; 16];
    rand::rng().fill(&mut authenticator);
    authenticator
}

/// Calculate the Response Authenticator for an Access-Accept,
/// Access-Reject, or Access-Challenge (RFC 2865 Section 3).
///
/// The hash input is the reply exactly as it will appear on the wire,
/// except that the authenticator field still holds the request's value,
/// with the shared secret appended:
/// MD5(Code + ID + Length + RequestAuth + Attributes + Secret).
/// Every reply attribute, including the finalized Message-Authenticator,
/// must already be in place when this is called.
pub fn calculate_response_authenticator(
    packet: &Packet,
    request_authenticator: &[u8; 16],
    secret: &[u8],
) -> [u8; 16] {
    let mut image = packet.clone();
    image.authenticator = *request_authenticator;

    let mut data = image.encode().expect("Failed to encode reply packet");
    data.extend_from_slice(secret);

    md5::compute(&data).0
}

/// Check a reply's Response Authenticator against the request it answers.
pub fn verify_response_authenticator(
    response: &Packet,
    request_authenticator: &[u8; 16],
    secret: &[u8],
) -> bool {
    response.authenticator
        == calculate_response_authenticator(response, request_authenticator, secret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{Attribute, AttributeType};
    use crate::packet::Code;

    #[test]
    fn test_generate_authenticator() {
        let auth1 = generate_request_authenticator();
        let auth2 = generate_request_authenticator();
        // Should be random
        assert_ne!(auth1, auth2);
    }

    #[test]
    fn test_response_authenticator_round_trip() {
        let secret = b"sharedsecret";
        let request_auth = [1u8; 16];
        let mut packet = Packet::new(Code::AccessChallenge, 42, [0u8; 16]);
        packet.add_attribute(
            Attribute::new(AttributeType::EapMessage as u8, vec![0x01, 0x02, 0x00, 0x04])
                .unwrap(),
        );

        packet.authenticator = calculate_response_authenticator(&packet, &request_auth, secret);
        assert!(verify_response_authenticator(&packet, &request_auth, secret));
    }

    #[test]
    fn test_response_authenticator_covers_attributes() {
        let secret = b"sharedsecret";
        let request_auth = [1u8; 16];
        let mut packet = Packet::new(Code::AccessReject, 3, [0u8; 16]);
        packet.authenticator = calculate_response_authenticator(&packet, &request_auth, secret);

        packet.add_attribute(
            Attribute::string(AttributeType::ReplyMessage as u8, "late addition").unwrap(),
        );
        assert!(!verify_response_authenticator(&packet, &request_auth, secret));
    }

    #[test]
    fn test_response_authenticator_wrong_secret() {
        let request_auth = [1u8; 16];
        let mut packet = Packet::new(Code::AccessReject, 3, [0u8; 16]);
        packet.authenticator = calculate_response_authenticator(&packet, &request_auth, b"one");

        assert!(!verify_response_authenticator(&packet, &request_auth, b"two"));
    }
}
