use super::*;
use serde_json::json;

// =============================================================================
// parse_template_response
// =============================================================================

#[test]
fn bare_document_is_returned_as_is() {
    let body = r#"{"name":"Diploma","pages":[]}"#;
    assert_eq!(parse_template_response(body).unwrap(), json!({ "name": "Diploma", "pages": [] }));
}

#[test]
fn wrapped_document_is_unwrapped() {
    let body = r#"{"template":{"name":"Old","width":842,"height":595,"design":{"objects":[]}}}"#;
    let doc = parse_template_response(body).unwrap();
    assert_eq!(doc["name"], "Old");
    assert!(doc.get("template").is_none());
}

#[test]
fn non_object_template_is_parse_error() {
    assert!(matches!(parse_template_response("[1]"), Err(ApiError::ApiParse(_))));
    assert!(matches!(parse_template_response("not json"), Err(ApiError::ApiParse(_))));
}

// =============================================================================
// parse_template_id
// =============================================================================

#[test]
fn template_id_accepts_numbers_and_strings() {
    assert_eq!(parse_template_id(r#"{"id":42}"#).unwrap(), "42");
    assert_eq!(parse_template_id(r#"{"id":"tpl-7"}"#).unwrap(), "tpl-7");
    assert_eq!(parse_template_id(r#"{"template":{"id":9}}"#).unwrap(), "9");
}

#[test]
fn missing_template_id_is_parse_error() {
    assert!(matches!(parse_template_id(r#"{"ok":true}"#), Err(ApiError::ApiParse(_))));
    assert!(matches!(parse_template_id(r#"{"id":""}"#), Err(ApiError::ApiParse(_))));
}

// =============================================================================
// parse_upload_response
// =============================================================================

#[test]
fn upload_response_yields_url() {
    let uploaded = parse_upload_response(r#"{"url":"/uploads/seal.png","size":1024}"#).unwrap();
    assert_eq!(uploaded.url, "/uploads/seal.png");
}

#[test]
fn upload_response_without_url_is_parse_error() {
    assert!(matches!(parse_upload_response(r#"{"path":"x"}"#), Err(ApiError::ApiParse(_))));
    assert!(matches!(parse_upload_response(r#"{"url":"  "}"#), Err(ApiError::ApiParse(_))));
}

// =============================================================================
// Client
// =============================================================================

#[test]
fn client_trims_base_url() {
    let mut config = EditorConfig::default();
    config.api_base_url = "https://certs.test/api/".into();
    let client = TemplateClient::new(&config).unwrap();
    assert_eq!(client.base_url(), "https://certs.test/api");
}
