use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use x509_cert::certificate::Version;
use x509_cert::der::Encode;
use x509_cert::time::Time;

use super::*;

fn store_with(record: IdentityRecord) -> IdentityStore {
    let mut storage = MemoryStorage::new();
    futures::executor::block_on(storage.save(&record)).unwrap();
    IdentityStore::new(storage)
}

// --- certificate ---

#[test]
fn test_certificate_fields() {
    let now = UNIX_EPOCH + Duration::from_millis(1_700_000_000_123);
    let identity = ClientIdentity::generate_at("0123456789ABCDEF", now).unwrap();
    let parsed = ParsedCertificate::from_der(identity.certificate_der()).unwrap();
    let tbs = &parsed.certificate().tbs_certificate;

    assert_eq!(tbs.subject.to_string(), CLIENT_CERT_SUBJECT);
    assert_eq!(tbs.issuer, tbs.subject);
    assert_eq!(tbs.version, Version::V3);
    assert!(tbs.extensions.is_none());

    let expected_serial = 1_700_000_000_123_u64.to_be_bytes();
    let serial = tbs.serial_number.as_bytes();
    assert_eq!(
        serial,
        &expected_serial[expected_serial.len() - serial.len()..]
    );

    let not_before = tbs.validity.not_before.to_unix_duration();
    let not_after = tbs.validity.not_after.to_unix_duration();
    assert_eq!(not_before.as_secs(), 1_700_000_000 - 24 * 60 * 60);
    assert_eq!(not_after.as_secs(), 1_700_000_000 + 20 * 365 * 24 * 60 * 60);
}

#[test]
fn test_validity_switches_to_generalized_time_after_2049() {
    // 2040-01-01T00:00:00Z
    let now = UNIX_EPOCH + Duration::from_secs(2_208_988_800);
    let identity = ClientIdentity::generate_at("0123456789ABCDEF", now).unwrap();
    let parsed = ParsedCertificate::from_der(identity.certificate_der()).unwrap();
    let validity = &parsed.certificate().tbs_certificate.validity;

    assert!(matches!(validity.not_before, Time::UtcTime(_)));
    assert!(matches!(validity.not_after, Time::GeneralTime(_)));
    assert_eq!(
        validity.not_after.to_unix_duration().as_secs(),
        2_208_988_800 + 20 * 365 * 24 * 60 * 60
    );
}

#[test]
fn test_certificate_is_self_signed() {
    let identity = ClientIdentity::generate("0123456789ABCDEF").unwrap();
    let parsed = ParsedCertificate::from_der(identity.certificate_der()).unwrap();
    let tbs_der = parsed.certificate().tbs_certificate.to_der().unwrap();

    identity
        .public_key()
        .verify_sha256(&tbs_der, identity.signature_of_certificate())
        .unwrap();
}

#[test]
fn test_certificate_pem_hex() {
    let identity = ClientIdentity::generate("0123456789ABCDEF").unwrap();
    let pem = identity.certificate_pem();
    assert!(pem.starts_with("-----BEGIN CERTIFICATE-----\n"));
    assert!(!pem.contains('\r'));

    let hex = identity.certificate_pem_hex();
    assert_eq!(hex, hex.to_uppercase());
    assert_eq!(hex::decode(&hex).unwrap(), pem.as_bytes());

    let reparsed = ParsedCertificate::from_pem(pem).unwrap();
    assert_eq!(reparsed.der(), identity.certificate_der());
}

#[test]
fn test_signature_verifies_against_certificate_key() {
    let identity = ClientIdentity::generate("0123456789ABCDEF").unwrap();
    let signature = identity.sign(b"client secret");
    identity
        .public_key()
        .verify_sha256(b"client secret", &signature)
        .unwrap();
}

#[test]
fn test_unique_id_format() {
    let id = generate_unique_id();
    assert_eq!(id.len(), 16);
    assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    assert_ne!(id, generate_unique_id());
}

// --- record ---

#[test]
fn test_record_roundtrip_is_exact() {
    let identity = ClientIdentity::generate("0123456789ABCDEF").unwrap();
    let record = identity.to_record().unwrap();

    let json = serde_json::to_string(&record).unwrap();
    let decoded: IdentityRecord = serde_json::from_str(&json).unwrap();
    let restored = ClientIdentity::from_record(&decoded).unwrap();

    assert_eq!(restored.unique_id(), identity.unique_id());
    assert_eq!(restored.certificate_der(), identity.certificate_der());
    assert_eq!(restored.certificate_pem(), identity.certificate_pem());
    assert_eq!(restored.to_record().unwrap(), record);
}

#[test]
fn test_record_with_foreign_certificate_is_corrupt() {
    let first = ClientIdentity::generate("0123456789ABCDEF").unwrap();
    let second = ClientIdentity::generate("0123456789ABCDEF").unwrap();

    let mut record = first.to_record().unwrap();
    record.certificate_der = second.to_record().unwrap().certificate_der.clone();

    assert!(matches!(
        ClientIdentity::from_record(&record),
        Err(IdentityError::Corrupt(_))
    ));
}

#[test]
fn test_record_debug_hides_key() {
    let record = IdentityRecord::new("ID".into(), "secret pem".into(), b"der");
    assert!(!format!("{record:?}").contains("secret pem"));
}

// --- store ---

#[tokio::test]
async fn test_ensure_identity_is_idempotent() {
    let store = IdentityStore::in_memory();
    assert!(store.current().await.is_none());

    let first = store.ensure_identity().await.unwrap();
    let second = store.ensure_identity().await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[tokio::test]
async fn test_concurrent_ensure_creates_one_identity() {
    let store = Arc::new(IdentityStore::in_memory());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.ensure_identity().await.unwrap() })
        })
        .collect();

    let mut ders = Vec::new();
    for handle in handles {
        ders.push(handle.await.unwrap().certificate_der().to_vec());
    }
    assert!(ders.windows(2).all(|w| w[0] == w[1]));
}

#[tokio::test]
async fn test_sign_without_identity_fails() {
    let store = IdentityStore::in_memory();
    assert!(matches!(
        store.sign(b"data").await,
        Err(IdentityError::Signing(_))
    ));
}

#[tokio::test]
async fn test_regenerate_invalidates_old_signatures() {
    let store = IdentityStore::in_memory();
    let old = store.ensure_identity().await.unwrap();
    let signature = store.sign(b"client secret").await.unwrap();

    let new = store.regenerate_identity().await.unwrap();

    assert_eq!(new.unique_id(), old.unique_id());
    assert_ne!(new.certificate_der(), old.certificate_der());
    assert!(
        new.public_key()
            .verify_sha256(b"client secret", &signature)
            .is_err()
    );
    assert_eq!(
        store.certificate_der().await.unwrap(),
        new.certificate_der()
    );
}

#[tokio::test]
async fn test_stored_identity_is_loaded_not_regenerated() {
    let identity = ClientIdentity::generate("FEDCBA9876543210").unwrap();
    let store = store_with(identity.to_record().unwrap());

    let loaded = store.ensure_identity().await.unwrap();
    assert_eq!(loaded.unique_id(), "FEDCBA9876543210");
    assert_eq!(loaded.certificate_der(), identity.certificate_der());
    assert_eq!(
        store.signature_of_certificate().await.unwrap(),
        identity.signature_of_certificate()
    );
}

#[tokio::test]
async fn test_corrupt_record_is_an_error() {
    let store = store_with(IdentityRecord::new(
        "FEDCBA9876543210".into(),
        "not a key".into(),
        b"not a certificate",
    ));

    assert!(matches!(
        store.ensure_identity().await,
        Err(IdentityError::Corrupt(_))
    ));
    assert!(store.current().await.is_none());

    // Explicit regeneration recovers and keeps the id
    let identity = store.regenerate_identity().await.unwrap();
    assert_eq!(identity.unique_id(), "FEDCBA9876543210");
}

#[tokio::test]
async fn test_clear_forgets_identity() {
    let store = IdentityStore::in_memory();
    store.ensure_identity().await.unwrap();
    store.clear().await.unwrap();

    assert!(store.current().await.is_none());
    assert!(store.sign(b"x").await.is_err());
}

#[test]
fn test_generate_at_before_epoch_fails() {
    let before = UNIX_EPOCH - Duration::from_secs(1);
    assert!(matches!(
        ClientIdentity::generate_at("ID", before),
        Err(IdentityError::Certificate(_))
    ));
}

// --- file storage ---

fn sample_record() -> IdentityRecord {
    ClientIdentity::generate("0123456789ABCDEF")
        .unwrap()
        .to_record()
        .unwrap()
}

#[tokio::test]
async fn test_failed_save_leaves_no_temp_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("identity.json");
    let mut storage = FileStorage::new(&path).await.unwrap();

    // A non-empty directory at the target makes the rename fail
    std::fs::create_dir(&path).unwrap();
    std::fs::write(path.join("occupied"), b"x").unwrap();

    let result = storage.save(&sample_record()).await;

    assert!(matches!(result, Err(StorageError::Io(_))));
    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect();
    assert_eq!(leftovers, [std::ffi::OsString::from("identity.json")]);
}

#[cfg(unix)]
#[tokio::test]
async fn test_stale_temp_file_is_replaced_privately() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("identity.json");
    let temp = dir.path().join("identity.json.tmp");
    std::fs::write(&temp, b"stale").unwrap();
    std::fs::set_permissions(&temp, std::fs::Permissions::from_mode(0o644)).unwrap();

    let mut storage = FileStorage::new(&path).await.unwrap();
    storage.save(&sample_record()).await.unwrap();

    assert!(!temp.exists());
    let mode = std::fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
    assert!(storage.load().await.unwrap().is_some());
}
