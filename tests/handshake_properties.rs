//! Handshake properties checked through in-process transports

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use gamestream_pairing::net::{PairingRequest, TransportError};
use gamestream_pairing::protocol::crypto::{
    aes128_ecb_decrypt, aes128_ecb_encrypt, derive_key, hex_decode, hex_encode,
    sha256_concat,
};
use gamestream_pairing::protocol::pairing::{PairingResponse, params};
use gamestream_pairing::testing::{HostReply, ScriptedTransport};
use gamestream_pairing::{
    Confirmation, HostAddress, IdentityStore, PairState, PairingConfig, PairingErrorKind,
    PairingStateMachine, Pin,
};

const PIN: &str = "5678";

fn param(request: &PairingRequest, name: &str) -> Vec<u8> {
    hex_decode(request.param(name).unwrap()).unwrap()
}

/// Scripts a host that records what the client sent and answers step 2
/// with `0x00×32 ∥ 0x01×16` under the key derived from the client's salt
struct RecordingHost {
    salt: Arc<Mutex<Vec<u8>>>,
    secrets: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl RecordingHost {
    fn new() -> Self {
        Self {
            salt: Arc::new(Mutex::new(Vec::new())),
            secrets: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn script(&self, transport: ScriptedTransport) -> ScriptedTransport {
        let salt = Arc::clone(&self.salt);
        let key_salt = Arc::clone(&self.salt);
        let secrets = Arc::clone(&self.secrets);

        transport
            .respond_with(move |request| {
                *salt.lock().unwrap() = param(request, params::SALT);
                Ok(HostReply::paired(true).to_response())
            })
            .respond_with(move |_| Ok(challenge_response(&key_salt.lock().unwrap())))
            .respond_paired(true)
            .respond_with(move |request| {
                let payload = param(request, params::CLIENT_PAIRING_SECRET);
                secrets.lock().unwrap().push(payload[..16].to_vec());
                Ok(HostReply::paired(true).to_response())
            })
    }
}

fn challenge_response(salt: &[u8]) -> PairingResponse {
    let key = derive_key(salt, PIN);
    let mut plaintext = vec![0x00; 32];
    plaintext.extend_from_slice(&[0x01; 16]);
    let encrypted = hex_encode(&aes128_ecb_encrypt(&plaintext, &key).unwrap());
    HostReply::ok(&[("paired", "1"), ("challengeresponse", encrypted.as_str())]).to_response()
}

fn no_confirmation() -> PairingConfig {
    PairingConfig::builder().confirm_over_tls(false).build()
}

#[tokio::test]
async fn test_scripted_host_pairs_with_usable_tls_config() {
    let host = RecordingHost::new();
    let transport = Arc::new(host.script(ScriptedTransport::new()));
    let machine = PairingStateMachine::new(
        no_confirmation(),
        Arc::new(IdentityStore::in_memory()),
        transport.clone(),
    );

    let outcome = machine
        .pair(&HostAddress::new("192.168.1.20"), &Pin::new(PIN).unwrap())
        .await
        .unwrap();

    assert_eq!(outcome.state, PairState::Paired);
    assert_eq!(outcome.confirmation, Confirmation::Skipped);
    assert!(outcome.tls_config.client_auth_cert_resolver.has_certs());

    // Step 3 hashes the server challenge the host sent
    let requests = transport.requests().await;
    let salt = host.salt.lock().unwrap().clone();
    let key = derive_key(&salt, PIN);
    let hash = aes128_ecb_decrypt(&param(&requests[2], params::SERVER_CHALLENGE_RESP), &key).unwrap();

    let identity = machine.identity().current().await.unwrap();
    let secret = host.secrets.lock().unwrap()[0].clone();
    let expected = sha256_concat(&[
        &[0x01u8; 16],
        identity.signature_of_certificate(),
        secret.as_slice(),
    ]);
    assert_eq!(hash, expected);
}

#[tokio::test]
async fn test_sessions_never_reuse_salt_or_secret() {
    const SESSIONS: usize = 6;

    let host = RecordingHost::new();
    let mut script = ScriptedTransport::new();
    for _ in 0..SESSIONS {
        script = host.script(script);
    }
    let transport = Arc::new(script);
    let machine = PairingStateMachine::new(
        no_confirmation(),
        Arc::new(IdentityStore::in_memory()),
        transport.clone(),
    );

    for _ in 0..SESSIONS {
        machine
            .pair(&HostAddress::new("10.0.0.9"), &Pin::new(PIN).unwrap())
            .await
            .unwrap();
    }

    let salts: HashSet<_> = transport
        .requests()
        .await
        .iter()
        .filter(|r| r.param(params::SALT).is_some())
        .map(|r| param(r, params::SALT))
        .collect();
    let secrets: HashSet<_> = host.secrets.lock().unwrap().iter().cloned().collect();

    assert_eq!(salts.len(), SESSIONS);
    assert_eq!(secrets.len(), SESSIONS);
}

#[tokio::test]
async fn test_not_paired_at_each_step_never_reports_paired() {
    for reject in 0..4 {
        let mut transport = ScriptedTransport::new();
        let salt = Arc::new(Mutex::new(Vec::new()));
        for step in 0..4 {
            if step == reject {
                transport = transport.respond_paired(false);
                break;
            }
            transport = match step {
                0 => {
                    let salt = Arc::clone(&salt);
                    transport.respond_with(move |request| {
                        *salt.lock().unwrap() = param(request, params::SALT);
                        Ok(HostReply::paired(true).to_response())
                    })
                }
                1 => {
                    let salt = Arc::clone(&salt);
                    transport.respond_with(move |_| Ok(challenge_response(&salt.lock().unwrap())))
                }
                _ => transport.respond_paired(true),
            };
        }

        let machine = PairingStateMachine::new(
            no_confirmation(),
            Arc::new(IdentityStore::in_memory()),
            Arc::new(transport),
        );
        let err = machine
            .pair(&HostAddress::new("10.0.0.9"), &Pin::new(PIN).unwrap())
            .await
            .unwrap_err();

        let expected = if reject == 0 {
            PairingErrorKind::Rejected
        } else {
            PairingErrorKind::PinMismatch
        };
        assert_eq!(err.kind(), expected, "paired=0 at step {}", reject + 1);
    }
}

#[tokio::test]
async fn test_short_step_two_payload_is_protocol_error() {
    let salt = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&salt);
    let transport = ScriptedTransport::new()
        .respond_with(move |request| {
            *recorded.lock().unwrap() = param(request, params::SALT);
            Ok(HostReply::paired(true).to_response())
        })
        .respond_with(move |_| {
            let key = derive_key(&salt.lock().unwrap(), PIN);
            let encrypted = hex_encode(&aes128_ecb_encrypt(&[0u8; 32], &key).unwrap());
            Ok(HostReply::ok(&[("paired", "1"), ("challengeresponse", encrypted.as_str())])
                .to_response())
        });

    let machine = PairingStateMachine::new(
        no_confirmation(),
        Arc::new(IdentityStore::in_memory()),
        Arc::new(transport),
    );
    let err = machine
        .pair(&HostAddress::new("10.0.0.9"), &Pin::new(PIN).unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), PairingErrorKind::Protocol);
}

#[tokio::test]
async fn test_network_failure_at_step_one() {
    let transport = ScriptedTransport::new().fail(TransportError::Io(std::io::Error::new(
        std::io::ErrorKind::TimedOut,
        "no route",
    )));
    let machine = PairingStateMachine::new(
        no_confirmation(),
        Arc::new(IdentityStore::in_memory()),
        Arc::new(transport),
    );

    let err = machine
        .pair(&HostAddress::new("10.0.0.9"), &Pin::new(PIN).unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), PairingErrorKind::Network);
}

#[tokio::test]
async fn test_regenerated_identity_invalidates_old_signatures() {
    let store = IdentityStore::in_memory();
    let before = store.ensure_identity().await.unwrap();
    let signature = store.sign(b"client secret").await.unwrap();
    before
        .public_key()
        .verify_sha256(b"client secret", &signature)
        .unwrap();

    let after = store.regenerate_identity().await.unwrap();

    assert_eq!(before.unique_id(), after.unique_id());
    assert_ne!(before.certificate_der(), after.certificate_der());
    assert!(after
        .public_key()
        .verify_sha256(b"client secret", &signature)
        .is_err());
}
