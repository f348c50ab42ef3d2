//! End-to-end tests for the Rad-5GC gateway
//!
//! Each test drives the gateway over a real UDP socket with crafted
//! Access-Requests while an in-process stub plays the AUSF side of N12:
//! - EAP-Identity happy path through the 201 response
//! - pseudonym restart with AT_FULLAUTH_ID_REQ
//! - AKA'-Challenge to success (MS-MPPE keys), continuation, and
//!   synchronization failure
//! - source filtering, Message-Authenticator enforcement, unknown
//!   identity rejection

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::Router;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rad5gc_gw::n12::codec::encode_eap_payload;
use rad5gc_gw::{Config, Gateway, GatewayServer};
use rad5gc_proto::eap::IDENTITY_LEN;
use rad5gc_proto::message_auth::message_authenticator_calc;
use rad5gc_proto::mppe::{
    decrypt_mppe_key, parse_vendor_specific, MS_MPPE_RECV_KEY, MS_MPPE_SEND_KEY, VENDOR_MICROSOFT,
};
use rad5gc_proto::{
    generate_request_authenticator, verify_response_authenticator, Attribute, AttributeType, Code,
    Packet,
};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;

const SECRET: &str = "testing123";
const NAI: &str = "@wlan.mnc012.mcc345.3gppnetwork.org";

/// Scripted AUSF: one canned response per N12 operation, plus call counts
struct StubAusf {
    first_calls: AtomicUsize,
    exchange_calls: AtomicUsize,
    first_response: Mutex<(u16, String)>,
    exchange_response: Mutex<(u16, String)>,
}

impl StubAusf {
    fn new() -> Self {
        StubAusf {
            first_calls: AtomicUsize::new(0),
            exchange_calls: AtomicUsize::new(0),
            first_response: Mutex::new((404, String::new())),
            exchange_response: Mutex::new((404, String::new())),
        }
    }

    fn set_first_response(&self, status: u16, body: String) {
        *self.first_response.lock().unwrap() = (status, body);
    }

    fn set_exchange_response(&self, status: u16, body: String) {
        *self.exchange_response.lock().unwrap() = (status, body);
    }
}

async fn first_handler(State(stub): State<Arc<StubAusf>>) -> impl IntoResponse {
    stub.first_calls.fetch_add(1, Ordering::SeqCst);
    let (status, body) = stub.first_response.lock().unwrap().clone();
    (
        StatusCode::from_u16(status).unwrap(),
        [(header::CONTENT_TYPE, "application/3gppHal+json")],
        body,
    )
}

async fn exchange_handler(State(stub): State<Arc<StubAusf>>) -> impl IntoResponse {
    stub.exchange_calls.fetch_add(1, Ordering::SeqCst);
    let (status, body) = stub.exchange_response.lock().unwrap().clone();
    (
        StatusCode::from_u16(status).unwrap(),
        [(header::CONTENT_TYPE, "application/3gppHal+json")],
        body,
    )
}

async fn start_stub_ausf() -> (Arc<StubAusf>, SocketAddr) {
    let stub = Arc::new(StubAusf::new());
    let app = Router::new()
        .route("/nausf-auth/v1/ue-authentications", post(first_handler))
        .route(
            "/nausf-auth/v1/ue-authentications/{ctx}/eap-session",
            post(exchange_handler),
        )
        .with_state(Arc::clone(&stub));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (stub, addr)
}

async fn start_gateway(
    ausf_addr: SocketAddr,
    allowed_client: &str,
    overwrite_link: bool,
) -> (SocketAddr, Arc<Gateway>) {
    let config = Config {
        shared_secret: SECRET.to_string(),
        allowed_client_address: allowed_client.to_string(),
        ausf_address: format!("127.0.0.1:{}", ausf_addr.port()),
        overwrite_link_string: overwrite_link,
        listen_address: "127.0.0.1:0".to_string(),
        ..Config::default()
    };
    config.validate().expect("test config must validate");

    let gateway = Arc::new(Gateway::new(Arc::new(config)).unwrap());
    let server = GatewayServer::bind("127.0.0.1:0".parse().unwrap(), Arc::clone(&gateway))
        .await
        .expect("failed to bind gateway server");
    let addr = server.local_addr().unwrap();
    tokio::spawn(async move {
        server.run().await.expect("gateway server failed");
    });

    (addr, gateway)
}

/// EAP Response/Identity with a well-formed 51-byte identity
fn eap_identity_payload(eap_id: u8, prefix: u8) -> Vec<u8> {
    let mut type_data = vec![prefix];
    type_data.extend_from_slice(b"123456789012345");
    type_data.extend_from_slice(NAI.as_bytes());
    assert_eq!(type_data.len(), IDENTITY_LEN);

    let mut payload = vec![0x02, eap_id, 0x00, 0x00, 0x01];
    payload.extend_from_slice(&type_data);
    let len = payload.len() as u16;
    payload[2..4].copy_from_slice(&len.to_be_bytes());
    payload
}

/// Minimal EAP Response/AKA' message with the given subtype
fn eap_aka_payload(eap_id: u8, subtype: u8) -> Vec<u8> {
    vec![0x02, eap_id, 0x00, 0x08, 0x32, subtype, 0x00, 0x00]
}

fn access_request(identifier: u8, eap_payload: &[u8], proxy_states: &[&[u8]]) -> Packet {
    let req_auth = generate_request_authenticator();
    let mut packet = Packet::new(Code::AccessRequest, identifier, req_auth);

    for state in proxy_states {
        packet.add_attribute(
            Attribute::new(AttributeType::ProxyState as u8, state.to_vec()).unwrap(),
        );
    }
    packet.add_attribute(
        Attribute::new(AttributeType::EapMessage as u8, eap_payload.to_vec()).unwrap(),
    );
    packet.add_attribute(
        Attribute::new(AttributeType::MessageAuthenticator as u8, vec![0u8; 16]).unwrap(),
    );

    let (mac, _) = message_authenticator_calc(&packet, SECRET.as_bytes()).unwrap();
    packet.set_attribute(AttributeType::MessageAuthenticator as u8, &mac);
    packet
}

/// Send a request and wait briefly for a reply; None means discarded
async fn send_radius_request(packet: &Packet, server_addr: SocketAddr) -> Option<Packet> {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let bytes = packet.encode().unwrap();
    socket.send_to(&bytes, server_addr).await.unwrap();

    let mut buf = [0u8; 4096];
    match timeout(Duration::from_secs(1), socket.recv_from(&mut buf)).await {
        Ok(Ok((len, _))) => Some(Packet::decode(&buf[..len]).unwrap()),
        _ => None,
    }
}

/// Verify the reply's Message-Authenticator and Response Authenticator
fn assert_reply_authenticated(reply: &Packet, request: &Packet) {
    let mut check = reply.clone();
    check.authenticator = request.authenticator;
    let (_, matches) = message_authenticator_calc(&check, SECRET.as_bytes()).unwrap();
    assert!(matches, "reply Message-Authenticator must verify");

    assert!(
        verify_response_authenticator(reply, &request.authenticator, SECRET.as_bytes()),
        "reply Response Authenticator must verify"
    );
}

fn ctx_201_body(auth_data: &[u8], href: &str) -> String {
    format!(
        r#"{{"authType":"EAP_AKA_PRIME","5gAuthData":"{}","_links":{{"eap-session":{{"href":"{}"}}}},"servingNetworkName":"5G:wlan.mnc012.mcc345.3gppnetwork.org"}}"#,
        BASE64.encode(auth_data),
        href
    )
}

fn success_200_body(eap_payload: &[u8], kseaf: &str) -> String {
    format!(
        r#"{{"eapPayload":"{}","kSeaf":"{}"}}"#,
        encode_eap_payload(eap_payload),
        kseaf
    )
}

fn continuation_200_body(eap_payload: &[u8], href: &str) -> String {
    format!(
        r#"{{"eapPayload":"{}","_links":{{"href":"{}"}}}}"#,
        encode_eap_payload(eap_payload),
        href
    )
}

fn eap_session_href(ausf_port: u16, ctx: &str) -> String {
    format!("http://127.0.0.1:{ausf_port}/nausf-auth/v1/ue-authentications/{ctx}/eap-session")
}

#[tokio::test]
async fn test_imsi_identity_happy_path() {
    let (stub, ausf_addr) = start_stub_ausf().await;
    let (server_addr, gateway) = start_gateway(ausf_addr, "127.0.0.1", false).await;

    let challenge = [0x01u8, 0x02, 0x00, 0x08, 0x32, 0x01, 0x00, 0x00];
    let href = eap_session_href(ausf_addr.port(), "abc");
    stub.set_first_response(201, ctx_201_body(&challenge, &href));

    let request = access_request(0x30, &eap_identity_payload(0x01, b'6'), &[b"ps-1", b"ps-2"]);
    let reply = send_radius_request(&request, server_addr)
        .await
        .expect("expected Access-Challenge");

    assert_eq!(reply.code, Code::AccessChallenge);
    assert_eq!(reply.identifier, 0x30);
    assert_eq!(
        reply
            .find_attribute(AttributeType::EapMessage as u8)
            .unwrap()
            .value,
        challenge
    );
    assert_reply_authenticated(&reply, &request);

    // Proxy-State echoed once each, original order
    let states = reply.find_all_attributes(AttributeType::ProxyState as u8);
    assert_eq!(states.len(), 2);
    assert_eq!(states[0].value, b"ps-1");
    assert_eq!(states[1].value, b"ps-2");

    // Binding committed under the EAP id of the challenge (second octet);
    // the commit happens just after the reply write, so let it settle.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(gateway.sessions().load(0x02), Some(href));
    assert_eq!(stub.first_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_pseudonym_identity_restarts_full_auth() {
    let (stub, ausf_addr) = start_stub_ausf().await;
    let (server_addr, gateway) = start_gateway(ausf_addr, "127.0.0.1", false).await;

    let request = access_request(0x31, &eap_identity_payload(0x01, b'7'), &[]);
    let reply = send_radius_request(&request, server_addr)
        .await
        .expect("expected Access-Challenge");

    assert_eq!(reply.code, Code::AccessChallenge);
    assert_reply_authenticated(&reply, &request);

    let payload = &reply
        .find_attribute(AttributeType::EapMessage as u8)
        .unwrap()
        .value;
    assert_eq!(payload.len(), 12);
    // AT_FULLAUTH_ID_REQ literal with byte 1 replaced by the invented id
    assert_eq!(payload[0], 0x01);
    assert!(payload[1] < 255);
    assert_eq!(&payload[2..], &[0x00, 0x0c, 0x32, 0x05, 0x00, 0x00, 0x11, 0x01, 0x00, 0x00]);

    // No eap-session URI is known yet, so no table entry either
    assert!(gateway.sessions().load(payload[1]).is_none());
    assert_eq!(stub.first_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_aka_challenge_to_success_with_mppe_keys() {
    let (stub, ausf_addr) = start_stub_ausf().await;
    let (server_addr, gateway) = start_gateway(ausf_addr, "127.0.0.1", false).await;

    // An earlier challenge bound EAP id 0x02 to the stub's eap-session
    gateway
        .sessions()
        .store(0x02, &eap_session_href(ausf_addr.port(), "abc"));

    let kseaf: String = "0123456789abcdef".repeat(4); // 64 ASCII chars
    let success = [0x03u8, 0x02, 0x00, 0x04];
    stub.set_exchange_response(200, success_200_body(&success, &kseaf));

    let request = access_request(0x32, &eap_aka_payload(0x02, 0x01), &[]);
    let reply = send_radius_request(&request, server_addr)
        .await
        .expect("expected Access-Accept");

    assert_eq!(reply.code, Code::AccessAccept);
    assert_eq!(
        reply
            .find_attribute(AttributeType::EapMessage as u8)
            .unwrap()
            .value,
        success
    );
    assert_reply_authenticated(&reply, &request);

    // MS-MPPE-Send-Key / Recv-Key carry the kSeaf halves
    let vendor_attrs = reply.find_all_attributes(AttributeType::VendorSpecific as u8);
    assert_eq!(vendor_attrs.len(), 2);
    let mut seen = Vec::new();
    for attr in vendor_attrs {
        let (vendor_id, vendor_type, data) = parse_vendor_specific(&attr.value).unwrap();
        assert_eq!(vendor_id, VENDOR_MICROSOFT);
        let key = decrypt_mppe_key(data, SECRET.as_bytes(), &request.authenticator).unwrap();
        match vendor_type {
            MS_MPPE_SEND_KEY => assert_eq!(key, kseaf.as_bytes()[..32]),
            MS_MPPE_RECV_KEY => assert_eq!(key, kseaf.as_bytes()[32..64]),
            other => panic!("unexpected vendor type {other}"),
        }
        seen.push(vendor_type);
    }
    assert!(seen.contains(&MS_MPPE_SEND_KEY) && seen.contains(&MS_MPPE_RECV_KEY));

    // The exchange consumed the binding
    assert!(gateway.sessions().load(0x02).is_none());
    assert_eq!(stub.exchange_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_aka_challenge_continuation_rebinds_session() {
    let (stub, ausf_addr) = start_stub_ausf().await;
    let (server_addr, gateway) = start_gateway(ausf_addr, "127.0.0.1", false).await;

    gateway
        .sessions()
        .store(0x02, &eap_session_href(ausf_addr.port(), "abc"));

    let next_request = [0x01u8, 0x07, 0x00, 0x08, 0x32, 0x01, 0x00, 0x00];
    let next_href = eap_session_href(ausf_addr.port(), "abc2");
    stub.set_exchange_response(200, continuation_200_body(&next_request, &next_href));

    let request = access_request(0x33, &eap_aka_payload(0x02, 0x01), &[]);
    let reply = send_radius_request(&request, server_addr)
        .await
        .expect("expected Access-Challenge");

    assert_eq!(reply.code, Code::AccessChallenge);
    assert_eq!(
        reply
            .find_attribute(AttributeType::EapMessage as u8)
            .unwrap()
            .value,
        next_request
    );
    assert_reply_authenticated(&reply, &request);

    // Old id consumed, new id bound to the fresh href
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(gateway.sessions().load(0x02).is_none());
    assert_eq!(gateway.sessions().load(0x07), Some(next_href));
}

#[tokio::test]
async fn test_aka_synchronization_failure_resyncs() {
    let (stub, ausf_addr) = start_stub_ausf().await;
    let (server_addr, gateway) = start_gateway(ausf_addr, "127.0.0.1", false).await;

    gateway
        .sessions()
        .store(0x05, &eap_session_href(ausf_addr.port(), "sync"));

    let resync_challenge = [0x01u8, 0x08, 0x00, 0x08, 0x32, 0x01, 0x00, 0x00];
    let resync_href = eap_session_href(ausf_addr.port(), "sync2");
    stub.set_exchange_response(200, continuation_200_body(&resync_challenge, &resync_href));

    let request = access_request(0x34, &eap_aka_payload(0x05, 0x04), &[]);
    let reply = send_radius_request(&request, server_addr)
        .await
        .expect("expected Access-Challenge");

    assert_eq!(reply.code, Code::AccessChallenge);
    assert_eq!(
        reply
            .find_attribute(AttributeType::EapMessage as u8)
            .unwrap()
            .value,
        resync_challenge
    );
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(gateway.sessions().load(0x05).is_none());
    assert_eq!(gateway.sessions().load(0x08), Some(resync_href));
}

#[tokio::test]
async fn test_aka_authentication_reject_yields_access_reject() {
    let (stub, ausf_addr) = start_stub_ausf().await;
    let (server_addr, gateway) = start_gateway(ausf_addr, "127.0.0.1", false).await;

    gateway
        .sessions()
        .store(0x06, &eap_session_href(ausf_addr.port(), "rej"));

    let failure = [0x04u8, 0x06, 0x00, 0x04];
    let body = format!(
        r#"{{"eapPayload":"{}","authResult":"AUTHENTICATION_FAILURE"}}"#,
        encode_eap_payload(&failure)
    );
    stub.set_exchange_response(200, body);

    let request = access_request(0x35, &eap_aka_payload(0x06, 0x02), &[]);
    let reply = send_radius_request(&request, server_addr)
        .await
        .expect("expected Access-Reject");

    assert_eq!(reply.code, Code::AccessReject);
    assert_eq!(
        reply
            .find_attribute(AttributeType::EapMessage as u8)
            .unwrap()
            .value,
        failure
    );
    assert!(gateway.sessions().load(0x06).is_none());
}

#[tokio::test]
async fn test_unauthorized_source_is_silently_dropped() {
    let (stub, ausf_addr) = start_stub_ausf().await;
    // Only 203.0.113.7 may talk to us; the test client is 127.0.0.1
    let (server_addr, _gateway) = start_gateway(ausf_addr, "203.0.113.7", false).await;

    let challenge = [0x01u8, 0x02, 0x00, 0x08, 0x32, 0x01, 0x00, 0x00];
    stub.set_first_response(201, ctx_201_body(&challenge, &eap_session_href(ausf_addr.port(), "x")));

    let request = access_request(0x36, &eap_identity_payload(0x01, b'6'), &[]);
    let reply = send_radius_request(&request, server_addr).await;

    assert!(reply.is_none(), "unauthorized source must get no reply");
    assert_eq!(stub.first_calls.load(Ordering::SeqCst), 0, "no N12 call");
}

#[tokio::test]
async fn test_corrupted_message_authenticator_is_silently_dropped() {
    let (stub, ausf_addr) = start_stub_ausf().await;
    let (server_addr, _gateway) = start_gateway(ausf_addr, "127.0.0.1", false).await;

    let challenge = [0x01u8, 0x02, 0x00, 0x08, 0x32, 0x01, 0x00, 0x00];
    stub.set_first_response(201, ctx_201_body(&challenge, &eap_session_href(ausf_addr.port(), "x")));

    let mut request = access_request(0x37, &eap_identity_payload(0x01, b'6'), &[]);
    let mut mac = request
        .find_attribute(AttributeType::MessageAuthenticator as u8)
        .unwrap()
        .value
        .clone();
    mac[0] ^= 0x01;
    request.set_attribute(AttributeType::MessageAuthenticator as u8, &mac);

    let reply = send_radius_request(&request, server_addr).await;

    assert!(reply.is_none(), "corrupted MAC must get no reply");
    assert_eq!(stub.first_calls.load(Ordering::SeqCst), 0, "no N12 call");
}

#[tokio::test]
async fn test_unknown_identity_prefix_rejected() {
    let (_stub, ausf_addr) = start_stub_ausf().await;
    let (server_addr, _gateway) = start_gateway(ausf_addr, "127.0.0.1", false).await;

    let request = access_request(0x38, &eap_identity_payload(0x01, b'9'), &[]);
    let reply = send_radius_request(&request, server_addr)
        .await
        .expect("expected Access-Reject");

    assert_eq!(reply.code, Code::AccessReject);
    assert_reply_authenticated(&reply, &request);
    let message = reply
        .find_attribute(AttributeType::ReplyMessage as u8)
        .unwrap()
        .as_string()
        .unwrap();
    assert!(message.contains("Unknown identity : 9"));
}

#[tokio::test]
async fn test_problem_status_from_ausf_rejects() {
    let (stub, ausf_addr) = start_stub_ausf().await;
    let (server_addr, _gateway) = start_gateway(ausf_addr, "127.0.0.1", false).await;

    stub.set_first_response(
        403,
        r#"{"type":"problem","cause":"AUTHENTICATION_REJECTED"}"#.to_string(),
    );

    let request = access_request(0x39, &eap_identity_payload(0x01, b'6'), &[]);
    let reply = send_radius_request(&request, server_addr)
        .await
        .expect("expected Access-Reject");

    assert_eq!(reply.code, Code::AccessReject);
    assert_reply_authenticated(&reply, &request);
}

#[tokio::test]
async fn test_link_rewrite_on_commit() {
    let (stub, ausf_addr) = start_stub_ausf().await;
    let (server_addr, gateway) = start_gateway(ausf_addr, "127.0.0.1", true).await;

    // AUSF advertises some other authority; the stored binding must be
    // canonicalized to the configured AUSF address.
    let challenge = [0x01u8, 0x02, 0x00, 0x08, 0x32, 0x01, 0x00, 0x00];
    let advertised = "http://10.99.99.99:1234/nausf-auth/v1/ue-authentications/abc/eap-session";
    stub.set_first_response(201, ctx_201_body(&challenge, advertised));

    let request = access_request(0x3A, &eap_identity_payload(0x01, b'6'), &[]);
    let reply = send_radius_request(&request, server_addr)
        .await
        .expect("expected Access-Challenge");
    assert_eq!(reply.code, Code::AccessChallenge);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(
        gateway.sessions().load(0x02),
        Some(eap_session_href(ausf_addr.port(), "abc"))
    );
}
