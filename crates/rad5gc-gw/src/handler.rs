//! Per-Packet Dispatcher
//!
//! One RADIUS Access-Request in, at most one reply out. The handler walks
//! a fixed sequence of checks (source filter, Proxy-State capture,
//! Message-Authenticator verification, EAP decode) and then branches on
//! EAP type and AKA' subtype. Any integrity or parsing failure surfaces
//! as a [`Discard`], which the server drops silently so a malformed or
//! unauthorized peer gains no oracle; protocol-level refusals become
//! Access-Reject replies instead.

use crate::config::{Config, ConfigError};
use crate::n12::{decode_auth_response, AuthResponse, N12Client, N12Error};
use crate::session::SessionTable;
use rad5gc_proto::eap::{self, AkaSubtype, EapError, EapPacket, IdentitySet};
use rad5gc_proto::message_auth::{message_authenticator_calc, MessageAuthError};
use rad5gc_proto::mppe;
use rad5gc_proto::{
    calculate_response_authenticator, Attribute, AttributeType, Code, Packet, PacketError,
};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Reasons a request is dropped without any reply
#[derive(Error, Debug)]
pub enum Discard {
    #[error("Client IP address not allowed: {0}")]
    UnauthorizedClient(IpAddr),
    #[error("EAP-Message not found")]
    NoEapMessage,
    #[error("Message-Authenticator check failed: {0}")]
    MessageAuth(#[from] MessageAuthError),
    #[error("Message-Authenticator not matched")]
    InvalidMessageAuthenticator,
    #[error("EAP packet decoding failure: {0}")]
    EapDecode(#[from] EapError),
    #[error("Failed to assemble network name for N12: {0}")]
    InvalidNetworkName(EapError),
    #[error("N12 authentication request failure: {0}")]
    N12Request(N12Error),
    #[error("N12 response body decoding failure: {0}")]
    N12Decode(N12Error),
    #[error("Invalid EAP-Message from AUSF")]
    InvalidEapMessageFromAusf,
    #[error("Failed to build reply: {0}")]
    ReplyBuild(#[from] PacketError),
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("N12 client error: {0}")]
    N12(#[from] N12Error),
}

/// EAP-Id / eap-session URI pair committed to the session table once the
/// reply carrying the challenge has actually been written.
#[derive(Debug, Clone)]
pub struct SessionBinding {
    pub eap_id: u8,
    pub uri: String,
}

/// Reply under construction, before Proxy-State echo and authenticators.
#[derive(Debug)]
enum Reply {
    Challenge {
        eap_payload: Vec<u8>,
    },
    Accept {
        eap_payload: Vec<u8>,
        kseaf: String,
    },
    Reject {
        eap_payload: Option<Vec<u8>>,
        reply_message: Option<String>,
    },
}

/// The authentication state coordinator.
///
/// Constructed once at startup from the validated configuration; shared
/// by every handler invocation. All mutable state lives in the session
/// table.
pub struct Gateway {
    config: Arc<Config>,
    allowed_client: IpAddr,
    sessions: Arc<SessionTable>,
    n12: N12Client,
}

impl Gateway {
    pub fn new(config: Arc<Config>) -> Result<Self, GatewayError> {
        let allowed_client = config.allowed_client_ip()?;
        let sessions = Arc::new(SessionTable::new(
            config.ausf_address.clone(),
            config.overwrite_link_string,
        ));
        let n12 = N12Client::new(config.ausf_address.clone(), Arc::clone(&sessions))?;

        Ok(Gateway {
            config,
            allowed_client,
            sessions,
            n12,
        })
    }

    pub fn sessions(&self) -> &SessionTable {
        &self.sessions
    }

    /// Process one Access-Request.
    ///
    /// Returns the finalized reply packet plus the session binding to
    /// commit after a successful write, or a [`Discard`].
    pub async fn handle(
        &self,
        request: &Packet,
        source: SocketAddr,
    ) -> Result<(Packet, Option<SessionBinding>), Discard> {
        if source.ip() != self.allowed_client {
            return Err(Discard::UnauthorizedClient(source.ip()));
        }

        if self.config.attributes_logging {
            for (i, attr) in request.attributes.iter().enumerate() {
                debug!(
                    "[RADIUS] Attribute {} / Type {} : {}",
                    i + 1,
                    attr.attr_type,
                    hex::encode_upper(&attr.value)
                );
            }
        }

        // Captured before any branching; every reply kind echoes these.
        let proxy_state: Vec<Vec<u8>> = request
            .find_all_attributes(AttributeType::ProxyState as u8)
            .into_iter()
            .map(|attr| attr.value.clone())
            .collect();

        let eap = self.extract_eap(request)?;

        let (reply, binding) = match eap.eap_type {
            eap::method::IDENTITY => self.handle_identity(&eap).await?,
            eap::method::AKA_PRIME => self.handle_aka_prime(&eap).await?,
            other => {
                info!("[EAP] EAP type ({}) is not supported", other);
                (
                    Reply::Reject {
                        eap_payload: None,
                        reply_message: Some(format!("EAP type ({other}) is not supported.")),
                    },
                    None,
                )
            }
        };

        let packet = self.finalize(request, reply, &proxy_state)?;
        Ok((packet, binding))
    }

    /// AVP-79 lookup, Message-Authenticator verification, EAP decode.
    fn extract_eap(&self, request: &Packet) -> Result<EapPacket, Discard> {
        let eap_attr = request
            .find_attribute(AttributeType::EapMessage as u8)
            .ok_or(Discard::NoEapMessage)?;
        debug!("[EAP] EAP-Message: {}", hex::encode_upper(&eap_attr.value));

        let (_, matches) = message_authenticator_calc(request, self.config.secret())?;
        if !matches {
            return Err(Discard::InvalidMessageAuthenticator);
        }

        let eap = EapPacket::from_bytes(&eap_attr.value)?;
        debug!(
            "[EAP] Code: 0x{:02X}, Id: 0x{:02X}, Length: 0x{:04X}, Type: 0x{:02X}",
            eap.code, eap.identifier, eap.length, eap.eap_type
        );
        Ok(eap)
    }

    async fn handle_identity(
        &self,
        eap: &EapPacket,
    ) -> Result<(Reply, Option<SessionBinding>), Discard> {
        let identity = eap::parse_identity(&eap.type_data);
        match identity.prefix.as_str() {
            // Permanent IMSI: open the N12 authentication at the AUSF.
            "6" => {
                let network_name = eap::serving_network_name(&identity.nai)
                    .map_err(Discard::InvalidNetworkName)?;
                let supi = format!("imsi-{}", identity.imsi);
                let (status, body) = self
                    .n12
                    .auth_request_first(&supi, &network_name)
                    .await
                    .map_err(Discard::N12Request)?;
                let response = decode_auth_response(status, &body).map_err(Discard::N12Decode)?;
                match status {
                    201 => Ok((
                        Reply::Challenge {
                            eap_payload: response.eap_payload,
                        },
                        Some(SessionBinding {
                            eap_id: response.eap_id,
                            uri: response.result,
                        }),
                    )),
                    400 | 403 | 404 | 500 | 501 | 503 => {
                        warn!("[N12] response code {} / {}", status, response.result);
                        Ok((
                            Reply::Reject {
                                eap_payload: None,
                                reply_message: None,
                            },
                            None,
                        ))
                    }
                    other => {
                        warn!("[N12] response code {} not supported", other);
                        Ok((
                            Reply::Reject {
                                eap_payload: None,
                                reply_message: None,
                            },
                            None,
                        ))
                    }
                }
            }
            // Pseudonym or fast-reauthentication identity: the gateway
            // holds no state for these, so force a full authentication.
            // No session entry is made; the eap-session URI is unknown
            // until the peer returns its permanent identity.
            "7" | "8" => {
                let eap_id = self.sessions.generate_eap_id();
                info!(
                    "[EAP] pseudonym/fast-reauth identity; requesting full authentication (EAP-ID 0x{:02X})",
                    eap_id
                );
                Ok((
                    Reply::Challenge {
                        eap_payload: eap::fullauth_id_request(eap_id).to_vec(),
                    },
                    None,
                ))
            }
            other => {
                info!(
                    "[RADIUS] Unknown identity : {}{}{}",
                    other, identity.imsi, identity.nai
                );
                Ok((
                    Reply::Reject {
                        eap_payload: None,
                        reply_message: Some(format!("Unknown identity : {other}")),
                    },
                    None,
                ))
            }
        }
    }

    async fn handle_aka_prime(
        &self,
        eap: &EapPacket,
    ) -> Result<(Reply, Option<SessionBinding>), Discard> {
        match eap.aka_subtype().and_then(AkaSubtype::from_u8) {
            Some(AkaSubtype::Challenge) => {
                info!("[EAP] AKA'-Challenge response received");
                let response = self.exchange(eap).await?;
                match response.eap_payload.first().copied() {
                    Some(eap::code::REQUEST) => {
                        info!("[EAP] EAP request / AKA-Challenge");
                        Ok(Self::challenge_with_binding(response))
                    }
                    Some(eap::code::SUCCESS) => {
                        info!("[EAP] EAP Success");
                        Ok((
                            Reply::Accept {
                                eap_payload: response.eap_payload,
                                kseaf: response.result,
                            },
                            None,
                        ))
                    }
                    Some(eap::code::FAILURE) => {
                        info!("[EAP] EAP Failure / authResult : {}", response.result);
                        Ok((
                            Reply::Reject {
                                eap_payload: Some(response.eap_payload),
                                reply_message: None,
                            },
                            None,
                        ))
                    }
                    _ => Err(Discard::InvalidEapMessageFromAusf),
                }
            }
            Some(AkaSubtype::AuthenticationReject) => {
                info!("[EAP] AKA-Authentication-Reject received");
                let response = self.exchange(eap).await?;
                info!(
                    "[EAP] EAP Failure (0x{:02X}) / authResult : {}",
                    response.eap_id, response.result
                );
                Ok((
                    Reply::Reject {
                        eap_payload: Some(response.eap_payload),
                        reply_message: None,
                    },
                    None,
                ))
            }
            Some(AkaSubtype::SynchronizationFailure) => {
                info!("[EAP] AKA-Synchronization-Failure received");
                let response = self.exchange(eap).await?;
                match response.eap_payload.first().copied() {
                    Some(eap::code::REQUEST) => {
                        info!("[EAP] EAP request / AKA-Challenge");
                        Ok(Self::challenge_with_binding(response))
                    }
                    Some(eap::code::FAILURE) => {
                        info!("[EAP] EAP Failure / authResult : {}", response.result);
                        Ok((
                            Reply::Reject {
                                eap_payload: Some(response.eap_payload),
                                reply_message: None,
                            },
                            None,
                        ))
                    }
                    _ => Err(Discard::InvalidEapMessageFromAusf),
                }
            }
            Some(AkaSubtype::Identity) => {
                info!("[EAP] AKA-Identity response received");
                // AT_IDENTITY puts the actual identity at fixed offsets
                // inside the type data: prefix at byte 7, IMSI digits at
                // 8..23, NAI realm from 23 on.
                if eap.type_data.len() < 23 {
                    return Err(Discard::EapDecode(EapError::PacketTooShort {
                        expected: 23,
                        actual: eap.type_data.len(),
                    }));
                }
                let identity = IdentitySet {
                    prefix: String::from_utf8_lossy(&eap.type_data[7..8]).into_owned(),
                    imsi: String::from_utf8_lossy(&eap.type_data[8..23]).into_owned(),
                    nai: String::from_utf8_lossy(&eap.type_data[23..]).into_owned(),
                };
                let network_name = eap::serving_network_name(&identity.nai)
                    .map_err(Discard::InvalidNetworkName)?;
                let (status, body) = self
                    .n12
                    .auth_request_first(&identity.imsi, &network_name)
                    .await
                    .map_err(Discard::N12Request)?;
                let response = decode_auth_response(status, &body).map_err(Discard::N12Decode)?;
                Ok(Self::challenge_with_binding(response))
            }
            None => {
                let subtype = eap.aka_subtype().unwrap_or(0);
                info!("[EAP] EAP subtype (0x{:02X}) is not supported", subtype);
                self.sessions.remove(eap.identifier);
                Ok((
                    Reply::Reject {
                        eap_payload: None,
                        reply_message: Some(format!(
                            "EAP subtype (0x{subtype:02X}) is not supported."
                        )),
                    },
                    None,
                ))
            }
        }
    }

    /// Relay the peer's AKA' message to the AUSF and decode the answer.
    ///
    /// The in-flight binding for the request's EAP identifier is consumed
    /// by the exchange whether it succeeds or not; continuations recommit
    /// under the identifier the AUSF hands back.
    async fn exchange(&self, eap: &EapPacket) -> Result<AuthResponse, Discard> {
        let result = self.n12.auth_request_exchange(&eap.contents).await;
        self.sessions.remove(eap.identifier);
        let (status, body) = result.map_err(Discard::N12Request)?;
        decode_auth_response(status, &body).map_err(Discard::N12Decode)
    }

    fn challenge_with_binding(response: AuthResponse) -> (Reply, Option<SessionBinding>) {
        let binding = SessionBinding {
            eap_id: response.eap_id,
            uri: response.result,
        };
        (
            Reply::Challenge {
                eap_payload: response.eap_payload,
            },
            Some(binding),
        )
    }

    /// Assemble the wire-ready reply: payload attributes, Proxy-State
    /// echo, Message-Authenticator, Response Authenticator - in that
    /// order, since the MAC covers the echoed attributes and the
    /// Response Authenticator covers the finalized MAC.
    fn finalize(
        &self,
        request: &Packet,
        reply: Reply,
        proxy_state: &[Vec<u8>],
    ) -> Result<Packet, Discard> {
        let secret = self.config.secret();
        let code = match reply {
            Reply::Challenge { .. } => Code::AccessChallenge,
            Reply::Accept { .. } => Code::AccessAccept,
            Reply::Reject { .. } => Code::AccessReject,
        };
        let mut packet = Packet::new(code, request.identifier, request.authenticator);

        match reply {
            Reply::Challenge { eap_payload } => {
                packet.add_attribute(Attribute::new(
                    AttributeType::EapMessage as u8,
                    eap_payload,
                )?);
            }
            Reply::Accept { eap_payload, kseaf } => {
                packet.add_attribute(Attribute::new(
                    AttributeType::EapMessage as u8,
                    eap_payload,
                )?);
                self.add_mppe_keys(&mut packet, &kseaf, request);
            }
            Reply::Reject {
                eap_payload,
                reply_message,
            } => {
                if let Some(payload) = eap_payload {
                    packet.add_attribute(Attribute::new(
                        AttributeType::EapMessage as u8,
                        payload,
                    )?);
                }
                if let Some(message) = reply_message {
                    packet.add_attribute(Attribute::string(
                        AttributeType::ReplyMessage as u8,
                        message,
                    )?);
                }
            }
        }

        for value in proxy_state {
            packet.add_attribute(Attribute::new(
                AttributeType::ProxyState as u8,
                value.clone(),
            )?);
        }

        packet.add_attribute(Attribute::new(
            AttributeType::MessageAuthenticator as u8,
            vec![0u8; 16],
        )?);
        let (mac, _) = message_authenticator_calc(&packet, secret)?;
        packet.set_attribute(AttributeType::MessageAuthenticator as u8, &mac);

        packet.authenticator =
            calculate_response_authenticator(&packet, &request.authenticator, secret);
        Ok(packet)
    }

    /// MS-MPPE key material from kSeaf (first 32 bytes send, next 32
    /// recv). A key that cannot be set is logged and skipped; the reply
    /// is sent regardless.
    fn add_mppe_keys(&self, packet: &mut Packet, kseaf: &str, request: &Packet) {
        if !kseaf.is_ascii() || kseaf.len() < 64 {
            warn!(
                "[RADIUS] kSeaf unusable as MS-MPPE key material (length {})",
                kseaf.len()
            );
            return;
        }
        let secret = self.config.secret();
        let bytes = kseaf.as_bytes();

        let send_salt = mppe::generate_salt();
        let mut recv_salt = mppe::generate_salt();
        if recv_salt == send_salt {
            // Salts must differ within one packet.
            recv_salt[1] ^= 0x01;
        }

        match mppe::ms_mppe_send_key(&bytes[..32], secret, &request.authenticator, send_salt) {
            Ok(attr) => packet.add_attribute(attr),
            Err(e) => warn!("[RADIUS] Failed to set MS-MPPE-Send-Key: {e}"),
        }
        match mppe::ms_mppe_recv_key(&bytes[32..64], secret, &request.authenticator, recv_salt) {
            Ok(attr) => packet.add_attribute(attr),
            Err(e) => warn!("[RADIUS] Failed to set MS-MPPE-Recv-Key: {e}"),
        }
    }
}
