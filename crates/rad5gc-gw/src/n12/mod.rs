//! N12 Client (`Nausf_UEAuthentication`)
//!
//! Drives the two HTTP operations of the 5G primary authentication
//! service: the initial `ue-authentications` POST that opens an EAP
//! session at the AUSF, and the follow-up POSTs to the `eap-session`
//! link that relay the peer's AKA' responses. Each RADIUS transaction
//! performs at most one such round-trip, bounded by a 5-second timeout.

pub mod codec;

use crate::session::SessionTable;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Total connect+send+receive budget per N12 exchange
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

const ACCEPT_TYPES: &str = "application/3gppHal+json, application/problem+json";

#[derive(Error, Debug)]
pub enum N12Error {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("EAP id 0x{0:02X} not found in session table")]
    EapIdNotFound(u8),
    #[error("Response body JSON decoding error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Base64 decoding error: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Hex decoding error: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("EAP payload too short: {0} bytes")]
    PayloadTooShort(usize),
    #[error("Unknown response body")]
    UnknownResponseBody,
}

/// Decoded N12 response, normalized across the status-specific shapes.
///
/// `result` is the `eap-session` href for session-continuing responses,
/// `kSeaf` on EAP success, `authResult` on EAP failure, and the verbatim
/// body for problem statuses.
#[derive(Debug, Clone)]
pub struct AuthResponse {
    pub eap_payload: Vec<u8>,
    pub eap_id: u8,
    pub result: String,
}

#[derive(Serialize)]
struct AuthenticationInfo<'a> {
    #[serde(rename = "supiOrSuci")]
    supi_or_suci: &'a str,
    #[serde(rename = "servingNetworkName")]
    serving_network_name: &'a str,
}

#[derive(Serialize)]
struct EapSessionRequest {
    #[serde(rename = "eapPayload")]
    eap_payload: String,
}

#[derive(Deserialize)]
struct UeAuthenticationCtx {
    #[serde(rename = "authType", default)]
    auth_type: String,
    #[serde(rename = "5gAuthData")]
    auth_data: String,
    #[serde(rename = "_links")]
    links: CtxLinks,
}

#[derive(Deserialize)]
struct CtxLinks {
    #[serde(rename = "eap-session")]
    eap_session: Link,
}

#[derive(Deserialize)]
struct Link {
    href: String,
}

#[derive(Deserialize)]
struct EapSuccessBody {
    #[serde(rename = "eapPayload")]
    eap_payload: String,
    #[serde(rename = "kSeaf")]
    k_seaf: String,
}

#[derive(Deserialize)]
struct EapFailureBody {
    #[serde(rename = "eapPayload")]
    eap_payload: String,
    #[serde(rename = "authResult")]
    auth_result: String,
}

#[derive(Deserialize)]
struct EapSessionBody {
    #[serde(rename = "eapPayload")]
    eap_payload: String,
    #[serde(rename = "_links")]
    links: Link,
}

/// HTTP client for the AUSF, shared across handler invocations
pub struct N12Client {
    http: reqwest::Client,
    ausf_address: String,
    sessions: Arc<SessionTable>,
}

impl N12Client {
    pub fn new(ausf_address: impl Into<String>, sessions: Arc<SessionTable>) -> Result<Self, N12Error> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(N12Client {
            http,
            ausf_address: ausf_address.into(),
            sessions,
        })
    }

    /// Initial N12 authentication request for a permanent identity.
    ///
    /// Returns the HTTP status and the raw response body; decoding is a
    /// separate step because the body shape depends on the status.
    pub async fn auth_request_first(
        &self,
        supi: &str,
        serving_network_name: &str,
    ) -> Result<(u16, String), N12Error> {
        let url = format!("http://{}/nausf-auth/v1/ue-authentications", self.ausf_address);
        let body = AuthenticationInfo {
            supi_or_suci: supi,
            serving_network_name,
        };

        debug!(supi, url = %url, "[N12] sending initial authentication request");
        let response = self
            .http
            .post(&url)
            .header("content-type", "application/json")
            .header("accept", ACCEPT_TYPES)
            .json(&body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!(status, "[N12] initial authentication response received");
        Ok((status, body))
    }

    /// Relay a peer EAP message to the eap-session URI bound to its
    /// EAP identifier (RFC 3748: second octet of the message).
    pub async fn auth_request_exchange(&self, eap_contents: &[u8]) -> Result<(u16, String), N12Error> {
        let eap_id = codec::payload_eap_id(eap_contents)?;
        let url = self
            .sessions
            .load(eap_id)
            .ok_or(N12Error::EapIdNotFound(eap_id))?;
        let body = EapSessionRequest {
            eap_payload: codec::encode_eap_payload(eap_contents),
        };

        debug!("[N12] relaying EAP message for EAP-ID 0x{:02X} to {}", eap_id, url);
        let response = self
            .http
            .post(&url)
            .header("content-type", "application/json")
            .header("accept", ACCEPT_TYPES)
            .json(&body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!(status, "[N12] eap-session response received");
        Ok((status, body))
    }
}

/// Decode an N12 response body according to its HTTP status.
///
/// - 201 opens the session: `5gAuthData` (plain Base64) plus the
///   `_links.eap-session.href` to continue on.
/// - 200 carries one of three shapes, discriminated by substring in
///   this order: `kSeaf` (EAP success), `authResult` (EAP failure),
///   `_links` (session continues). The payload in all three uses the
///   Base64-over-hex transport encoding.
/// - Any other status passes the body through verbatim for the caller
///   to log; nothing is decoded.
pub fn decode_auth_response(status: u16, body: &str) -> Result<AuthResponse, N12Error> {
    match status {
        200 => {
            if body.contains("kSeaf") {
                let decoded: EapSuccessBody = serde_json::from_str(body)?;
                let eap_payload = codec::decode_eap_payload(&decoded.eap_payload)?;
                let eap_id = codec::payload_eap_id(&eap_payload)?;
                debug!(status, "[N12] EAP success body decoded");
                Ok(AuthResponse {
                    eap_payload,
                    eap_id,
                    result: decoded.k_seaf,
                })
            } else if body.contains("authResult") {
                let decoded: EapFailureBody = serde_json::from_str(body)?;
                let eap_payload = codec::decode_eap_payload(&decoded.eap_payload)?;
                let eap_id = codec::payload_eap_id(&eap_payload)?;
                debug!(status, "[N12] EAP failure body decoded");
                Ok(AuthResponse {
                    eap_payload,
                    eap_id,
                    result: decoded.auth_result,
                })
            } else if body.contains("_links") {
                let decoded: EapSessionBody = serde_json::from_str(body)?;
                let eap_payload = codec::decode_eap_payload(&decoded.eap_payload)?;
                let eap_id = codec::payload_eap_id(&eap_payload)?;
                debug!(status, "[N12] EAP session continuation body decoded");
                Ok(AuthResponse {
                    eap_payload,
                    eap_id,
                    result: decoded.links.href,
                })
            } else {
                warn!(status, "[N12] unknown response body");
                Err(N12Error::UnknownResponseBody)
            }
        }
        201 => {
            let decoded: UeAuthenticationCtx = serde_json::from_str(body)?;
            let eap_payload = codec::decode_auth_data(&decoded.auth_data)?;
            let eap_id = codec::payload_eap_id(&eap_payload)?;
            debug!(status, auth_type = %decoded.auth_type, "[N12] authentication context decoded");
            Ok(AuthResponse {
                eap_payload,
                eap_id,
                result: decoded.links.eap_session.href,
            })
        }
        _ => {
            // Likely a ProblemDetails document; passed through for logging.
            debug!(status, "[N12] passing response body through undecoded");
            Ok(AuthResponse {
                eap_payload: Vec::new(),
                eap_id: 0,
                result: body.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;

    #[test]
    fn test_decode_201() {
        let challenge = [0x01u8, 0x02, 0x00, 0x08, 0x32, 0x01, 0x00, 0x00];
        let body = format!(
            r#"{{"authType":"EAP_AKA_PRIME","5gAuthData":"{}","_links":{{"eap-session":{{"href":"http://ausf/nausf-auth/v1/ue-authentications/abc/eap-session"}}}},"servingNetworkName":"5G:wlan.mnc012.mcc345.3gppnetwork.org"}}"#,
            BASE64.encode(challenge)
        );

        let decoded = decode_auth_response(201, &body).unwrap();
        assert_eq!(decoded.eap_payload, challenge);
        assert_eq!(decoded.eap_id, 0x02);
        assert_eq!(
            decoded.result,
            "http://ausf/nausf-auth/v1/ue-authentications/abc/eap-session"
        );
    }

    #[test]
    fn test_decode_200_success() {
        let success = [0x03u8, 0x02, 0x00, 0x04];
        let kseaf = "a".repeat(64);
        let body = format!(
            r#"{{"eapPayload":"{}","kSeaf":"{}"}}"#,
            codec::encode_eap_payload(&success),
            kseaf
        );

        let decoded = decode_auth_response(200, &body).unwrap();
        assert_eq!(decoded.eap_payload, success);
        assert_eq!(decoded.eap_id, 0x02);
        assert_eq!(decoded.result, kseaf);
    }

    #[test]
    fn test_decode_200_failure() {
        let failure = [0x04u8, 0x02, 0x00, 0x04];
        let body = format!(
            r#"{{"eapPayload":"{}","authResult":"AUTHENTICATION_FAILURE"}}"#,
            codec::encode_eap_payload(&failure)
        );

        let decoded = decode_auth_response(200, &body).unwrap();
        assert_eq!(decoded.eap_payload, failure);
        assert_eq!(decoded.result, "AUTHENTICATION_FAILURE");
    }

    #[test]
    fn test_decode_200_continuation() {
        let request = [0x01u8, 0x03, 0x00, 0x08, 0x32, 0x01, 0x00, 0x00];
        let body = format!(
            r#"{{"eapPayload":"{}","_links":{{"href":"http://ausf/eap-session/next"}}}}"#,
            codec::encode_eap_payload(&request)
        );

        let decoded = decode_auth_response(200, &body).unwrap();
        assert_eq!(decoded.eap_payload, request);
        assert_eq!(decoded.eap_id, 0x03);
        assert_eq!(decoded.result, "http://ausf/eap-session/next");
    }

    #[test]
    fn test_decode_200_kseaf_takes_precedence() {
        // A success body also containing _links must decode as success.
        let success = [0x03u8, 0x05, 0x00, 0x04];
        let body = format!(
            r#"{{"eapPayload":"{}","kSeaf":"{}","_links":{{"href":"http://ausf/x"}}}}"#,
            codec::encode_eap_payload(&success),
            "k".repeat(64)
        );

        let decoded = decode_auth_response(200, &body).unwrap();
        assert_eq!(decoded.result, "k".repeat(64));
    }

    #[test]
    fn test_decode_200_unknown_body() {
        assert!(matches!(
            decode_auth_response(200, r#"{"something":"else"}"#),
            Err(N12Error::UnknownResponseBody)
        ));
    }

    #[test]
    fn test_decode_problem_status_passthrough() {
        for status in [400u16, 403, 404, 500, 501, 503] {
            let body = r#"{"type":"problem","cause":"AUTHENTICATION_REJECTED"}"#;
            let decoded = decode_auth_response(status, body).unwrap();
            assert!(decoded.eap_payload.is_empty());
            assert_eq!(decoded.eap_id, 0);
            assert_eq!(decoded.result, body);
        }
    }

    #[test]
    fn test_decode_200_malformed_json() {
        assert!(decode_auth_response(200, "kSeaf but not json").is_err());
    }
}
