//! Rad-5GC Gateway
//!
//! Terminates RADIUS Access-Requests carrying EAP-AKA' traffic from a
//! Wi-Fi access network, translates them into N12
//! (`Nausf_UEAuthentication`) HTTP/JSON transactions against an AUSF, and
//! returns the resulting EAP challenges, successes, or failures to the
//! RADIUS client - the trusted non-3GPP access authenticator role in
//! front of a 5G core.
//!
//! One inbound Access-Request yields at most one synchronous N12
//! round-trip and at most one RADIUS reply. Exchange state is a single
//! process-wide table binding in-flight EAP identifiers to the
//! `eap-session` URIs the AUSF hands out.

pub mod config;
pub mod handler;
pub mod n12;
pub mod server;
pub mod session;

pub use config::{Config, ConfigError, DEFAULT_CONFIG_FILE};
pub use handler::{Discard, Gateway, GatewayError, SessionBinding};
pub use n12::{decode_auth_response, AuthResponse, N12Client, N12Error};
pub use server::{GatewayServer, ServerError};
pub use session::SessionTable;
