use std::sync::Arc;

use super::*;
use crate::error::{PairingError, PairingErrorKind};
use crate::identity::ClientIdentity;
use crate::net::{HttpPairingTransport, PairingRequest, PairingTransport, TransportError};
use crate::protocol::pairing::{PairState, PairingSession, PairingStep, Pin, messages};
use crate::types::{HostAddress, PairingConfig};

fn identity(id: &str) -> Arc<ClientIdentity> {
    Arc::new(ClientIdentity::generate(id).unwrap())
}

fn session(pin: &str) -> PairingSession {
    PairingSession::new(HostAddress::new("127.0.0.1"), Pin::new(pin).unwrap())
}

/// Run the four steps against `host`, stopping at the first error
fn drive(
    session: &mut PairingSession,
    host: &mut HostHandshake,
    client: &ClientIdentity,
) -> Result<(), PairingError> {
    let params = session.server_cert_request("Test", client)?;
    session.handle_server_cert(&host.handle(&params, None).to_response())?;

    let params = session.client_challenge_request("Test")?;
    session.handle_challenge_response(&host.handle(&params, None).to_response())?;

    let params = session.server_challenge_response_request("Test", client)?;
    session.handle_server_challenge_response(&host.handle(&params, None).to_response())?;

    let params = session.client_pairing_secret_request("Test", client)?;
    session.handle_client_pairing_secret(&host.handle(&params, None).to_response())
}

#[test]
fn test_handshake_pairs_and_verifies_host_proof() {
    let client = identity("0123456789ABCDEF");
    let mut host = HostHandshake::new("1234", identity("HOST"), HostBehavior::default());
    let mut session = session("1234");

    drive(&mut session, &mut host, &client).unwrap();

    assert_eq!(session.state(), PairState::Paired);
    assert!(session.host_proof_verified());
    assert_eq!(host.paired_certificate(), Some(client.certificate_der()));
}

#[test]
fn test_handshake_without_disclosure_skips_proof() {
    let client = identity("0123456789ABCDEF");
    let behavior = HostBehavior {
        disclose_certificate: false,
        ..HostBehavior::default()
    };
    let mut host = HostHandshake::new("1234", identity("HOST"), behavior);
    let mut session = session("1234");

    drive(&mut session, &mut host, &client).unwrap();

    assert_eq!(session.state(), PairState::Paired);
    assert!(!session.host_proof_verified());
}

#[test]
fn test_wrong_pin_caught_by_host_proof() {
    let client = identity("0123456789ABCDEF");
    let mut host = HostHandshake::new("1234", identity("HOST"), HostBehavior::default());
    let mut session = session("4321");

    let err = drive(&mut session, &mut host, &client).unwrap_err();

    assert_eq!(err.kind(), PairingErrorKind::PinMismatch);
    assert_eq!(session.state(), PairState::ChallengeSent);
    assert!(host.paired_certificate().is_none());
}

#[test]
fn test_wrong_pin_caught_by_host_at_step_four() {
    let client = identity("0123456789ABCDEF");
    let behavior = HostBehavior {
        disclose_certificate: false,
        ..HostBehavior::default()
    };
    let mut host = HostHandshake::new("1234", identity("HOST"), behavior);
    let mut session = session("4321");

    let err = drive(&mut session, &mut host, &client).unwrap_err();

    assert_eq!(err.kind(), PairingErrorKind::PinMismatch);
    assert_eq!(session.state(), PairState::SecretExchanged);
    assert!(host.paired_certificate().is_none());
}

#[test]
fn test_short_challenge_response_is_protocol_error() {
    let client = identity("0123456789ABCDEF");
    let behavior = HostBehavior {
        short_challenge_response: true,
        ..HostBehavior::default()
    };
    let mut host = HostHandshake::new("1234", identity("HOST"), behavior);
    let mut session = session("1234");

    let err = drive(&mut session, &mut host, &client).unwrap_err();

    assert_eq!(err.kind(), PairingErrorKind::Protocol);
    assert_eq!(session.state(), PairState::PinRequested);
}

#[test]
fn test_forged_proof_is_pin_mismatch() {
    let client = identity("0123456789ABCDEF");
    let behavior = HostBehavior {
        forge_proof: true,
        ..HostBehavior::default()
    };
    let mut host = HostHandshake::new("1234", identity("HOST"), behavior);
    let mut session = session("1234");

    let err = drive(&mut session, &mut host, &client).unwrap_err();
    assert_eq!(err.kind(), PairingErrorKind::PinMismatch);
}

#[test]
fn test_pair_challenge_requires_paired_peer() {
    let client = identity("0123456789ABCDEF");
    let mut host = HostHandshake::new("1234", identity("HOST"), HostBehavior::default());
    let mut session = session("1234");
    drive(&mut session, &mut host, &client).unwrap();

    let params = messages::pair_challenge("Test");
    assert!(!host.handle(&params, None).is_paired());
    assert!(!host.handle(&params, Some(&b"someone else"[..])).is_paired());
    assert!(host.handle(&params, Some(client.certificate_der())).is_paired());

    host.unpair();
    assert!(!host.handle(&params, Some(client.certificate_der())).is_paired());
}

#[test]
fn test_unknown_query_is_bad_request() {
    let mut host = HostHandshake::new("1234", identity("HOST"), HostBehavior::default());
    let reply = host.handle(&[("devicename".to_string(), "x".to_string())], None);
    assert_eq!(reply.status_code, 400);
    assert!(!reply.is_paired());
}

#[test]
fn test_host_reply_decodes_as_client_would() {
    let response = HostReply::ok(&[("paired", "1"), ("plaincert", "AB")]).to_response();
    assert!(response.is_success());
    assert!(response.paired());
    assert_eq!(response.field("plaincert"), Some("AB"));

    let response = host_response(401, "Unauthorized", &[]);
    assert_eq!(response.status_code, 401);
    assert!(!response.is_success());
}

#[tokio::test]
async fn test_scripted_transport_replays_in_order() {
    let transport = ScriptedTransport::new()
        .respond_paired(true)
        .respond_with(|request| {
            assert_eq!(request.param("phrase"), None);
            Ok(HostReply::paired(false).to_response())
        });

    let first = PairingRequest::pair("host", 47989, messages::pair_challenge("A"));
    let second = PairingRequest::pair("host", 47989, messages::base_params("A"));

    assert!(transport.send(&first).await.unwrap().paired());
    assert!(!transport.send(&second).await.unwrap().paired());
    assert!(matches!(
        transport.send(&first).await,
        Err(TransportError::Io(_))
    ));

    let requests = transport.requests().await;
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[0].param("phrase"), Some("pairchallenge"));
    assert_eq!(transport.remaining().await, 0);
}

#[tokio::test]
async fn test_mock_host_records_requests() {
    let host = MockHost::start_with_pin("1234").await.unwrap();
    let address = host.address();
    let transport = HttpPairingTransport::new("CAFEBABE00000000", &PairingConfig::default());

    let request = PairingRequest::pair(
        address.host.clone(),
        address.http_port,
        messages::get_server_cert("Test", &[0u8; 16], "00"),
    );
    // Certificate "00" does not parse, so the host refuses
    let response = transport.send(&request).await.unwrap();
    assert!(response.is_success());
    assert!(!response.paired());

    let requests = host.requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].path, "/pair");
    assert_eq!(requests[0].step(), Some(PairingStep::GetServerCert));
    assert_eq!(requests[0].param("uniqueid"), Some("CAFEBABE00000000"));
    assert_eq!(requests[0].client_id.as_deref(), Some("CAFEBABE00000000"));
    assert!(!requests[0].tls);
}

#[tokio::test]
async fn test_mock_host_unknown_path() {
    let host = MockHost::start(MockHostConfig::default()).await.unwrap();
    let address = host.address();
    let transport = HttpPairingTransport::new("CAFEBABE00000000", &PairingConfig::default());

    let request = PairingRequest::pair(address.host.clone(), address.http_port, Vec::new())
        .with_path("/applist");
    let response = transport.send(&request).await.unwrap();
    assert_eq!(response.status_code, 404);
}
