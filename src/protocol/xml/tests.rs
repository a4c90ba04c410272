use proptest::prelude::*;

use super::*;

#[test]
fn test_decode_host_response() {
    let body = r#"<?xml version="1.0" encoding="utf-8"?>
<root status_code="200">
  <paired>1</paired>
  <plaincert>2D2D2D</plaincert>
</root>"#;

    let fields = decode_fields(body);
    assert_eq!(fields.get("status_code"), Some("200"));
    assert_eq!(fields.get("paired"), Some("1"));
    assert_eq!(fields.get("plaincert"), Some("2D2D2D"));
    assert_eq!(fields.get("root"), None);
}

#[test]
fn test_empty_element_differs_from_missing() {
    let fields = decode_fields("<root><challengeresponse></challengeresponse><x/></root>");
    assert_eq!(fields.get("challengeresponse"), Some(""));
    assert_eq!(fields.get("x"), Some(""));
    assert!(!fields.contains("pairingsecret"));
}

#[test]
fn test_nested_elements_are_flattened() {
    let body = "<root><App><AppTitle>Desktop</AppTitle><ID>1</ID></App></root>";
    let fields = decode_fields(body);
    assert_eq!(fields.get("AppTitle"), Some("Desktop"));
    assert_eq!(fields.get("ID"), Some("1"));
    assert!(!fields.contains("App"));
}

#[test]
fn test_entities_unescaped() {
    let fields = decode_fields(r#"<root status_message="A &amp; B"><name>&lt;pc&gt;</name></root>"#);
    assert_eq!(fields.get("status_message"), Some("A & B"));
    assert_eq!(fields.get("name"), Some("<pc>"));
}

#[test]
fn test_comments_and_doctype_skipped() {
    let body = "<!DOCTYPE root><!-- note <paired>0</paired> --><root><paired>1</paired></root>";
    assert_eq!(decode_fields(body).get("paired"), Some("1"));
}

#[test]
fn test_malformed_yields_empty() {
    assert!(decode_fields("").is_empty());
    assert!(decode_fields("   \n").is_empty());
    assert!(decode_fields("<root><paired>1</root>").is_empty());
    assert!(decode_fields("<root><paired>1</paired>").is_empty());
    assert!(decode_fields("plain text").is_empty());
}

#[test]
fn test_strict_reports_mismatch() {
    let result = decode_strict("<root><a>1</b></root>");
    assert!(matches!(
        result,
        Err(XmlDecodeError::MismatchedTag { .. })
    ));
}

#[test]
fn test_encode_decode_response() {
    let body = encode_response(400, "Bad \"pin\"", &[("paired", "0")]);
    let fields = decode_fields(&body);
    assert_eq!(fields.get("status_code"), Some("400"));
    assert_eq!(fields.get("status_message"), Some("Bad \"pin\""));
    assert_eq!(fields.get("paired"), Some("0"));
}

#[test]
fn test_fields_insert_replaces_in_place() {
    let mut fields = Fields::new();
    fields.insert("a", "1");
    fields.insert("b", "2");
    fields.insert("a", "3");

    let collected: Vec<_> = fields.iter().collect();
    assert_eq!(collected, vec![("a", "3"), ("b", "2")]);
}

proptest! {
    #[test]
    fn test_decode_never_panics(body in "\\PC{0,128}") {
        let _ = decode_fields(&body);
    }

    #[test]
    fn test_decode_tag_soup_never_panics(body in "[<>/a-z =\"'!?&;-]{0,64}") {
        let _ = decode_fields(&body);
    }
}
