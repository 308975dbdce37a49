use serde_json::json;

use super::*;
use crate::request::ApiRequest;

fn parser() -> AcceptParser {
    AcceptParser::new("acme", "v1", "json").unwrap()
}

#[test]
fn test_parses_simple_version() {
    let accept = parser().parse(Some("application/vnd.acme.v3+json"));
    assert_eq!(accept.version, "v3");
    assert_eq!(accept.format, "json");
    assert_eq!(accept.source, AcceptSource::Header);
}

#[test]
fn test_vendor_is_case_sensitive() {
    let accept = parser().parse(Some("application/vnd.ACME.v3+json"));
    assert_eq!(accept.source, AcceptSource::Default);
    assert_eq!(accept.version, "v1");
}

#[test]
fn test_first_match_wins() {
    let accept = parser().parse(Some(
        "text/html, application/vnd.acme.v2+xml, application/vnd.acme.v3+json",
    ));
    assert_eq!(accept.version, "v2");
    assert_eq!(accept.format, "xml");
}

#[test]
fn test_unknown_formats_pass_through() {
    let accept = parser().parse(Some("application/vnd.acme.v1+yaml"));
    assert_eq!(accept.format, "yaml");
}

#[test]
fn test_malformed_versions_fall_back() {
    for header in [
        "application/vnd.acme.1+json",
        "application/vnd.acme.v+json",
        "application/json",
        "",
    ] {
        let accept = parser().parse(Some(header));
        assert_eq!(accept.source, AcceptSource::Default, "{header}");
        assert_eq!((accept.version.as_str(), accept.format.as_str()), ("v1", "json"));
    }
}

#[test]
fn test_build_round_trips() {
    let p = parser();
    for (version, format) in [("v1", "json"), ("v2.0.1", "xml"), ("v10", "jsonp")] {
        let accept = p.parse(Some(&p.build(version, format)));
        assert_eq!(accept.version, version);
        assert_eq!(accept.format, format);
    }
}

#[test]
fn test_strict_rejects_missing_header() {
    let err = parser().parse_strict(None).unwrap_err();
    assert_eq!(err.status(), Some(http::StatusCode::BAD_REQUEST));
}

#[test]
fn test_custom_tree() {
    let p = AcceptParser::with_tree("x", "acme", "v1", "json").unwrap();
    assert_eq!(p.build("v2", "json"), "application/x.acme.v2+json");
    assert_eq!(p.parse(Some("application/x.acme.v2+json")).version, "v2");
    assert_eq!(
        p.parse(Some("application/vnd.acme.v2+json")).source,
        AcceptSource::Default
    );
}

#[test]
fn test_json_formatter_wraps_strings() {
    let req = ApiRequest::get("/");
    let bytes = JsonFormatter.encode(&json!("bar"), &req).unwrap();
    assert_eq!(
        serde_json::from_slice::<serde_json::Value>(&bytes).unwrap(),
        json!({"message": "bar"})
    );
}

#[test]
fn test_jsonp_wraps_only_with_valid_callback() {
    let f = JsonpFormatter::new("callback");
    let with_cb = ApiRequest::get("/?callback=handle");
    assert_eq!(f.encode(&json!([1]), &with_cb).unwrap(), b"handle([1]);".to_vec());
    assert_eq!(f.content_type(&with_cb), "application/javascript");

    let evil = ApiRequest::get("/?callback=alert(1)");
    assert_eq!(f.encode(&json!([1]), &evil).unwrap(), b"[1]".to_vec());
    assert_eq!(f.content_type(&evil), "application/json");
}

#[test]
fn test_registry_defaults() {
    let registry = FormatterRegistry::with_defaults("callback");
    assert_eq!(registry.formats(), vec!["json", "jsonp"]);
    assert!(registry.get("xml").is_none());
}
