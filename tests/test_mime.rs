use lantern::config::StaticFilesConfig;
use lantern::http::mime::ContentTypes;

#[test]
fn test_builtin_types() {
    let types = ContentTypes::default();

    assert_eq!(types.lookup(Some("html")), "text/html");
    assert_eq!(types.lookup(Some("css")), "text/css");
    assert_eq!(types.lookup(Some("png")), "image/png");
    assert_eq!(types.lookup(Some("json")), "application/json");
}

#[test]
fn test_lookup_is_case_insensitive() {
    let types = ContentTypes::default();

    assert_eq!(types.lookup(Some("HTML")), "text/html");
    assert_eq!(types.lookup(Some("Jpg")), "image/jpeg");
}

#[test]
fn test_unknown_extension_falls_back_to_text_html() {
    let types = ContentTypes::default();

    assert_eq!(types.fallback(), "text/html");
    assert_eq!(types.lookup(Some("xyz")), "text/html");
    assert_eq!(types.lookup(None), "text/html");
}

#[test]
fn test_insert_overrides_and_extends() {
    let mut types = ContentTypes::default();
    types.insert(".MD", "text/markdown");
    types.insert("html", "application/xhtml+xml");

    assert_eq!(types.lookup(Some("md")), "text/markdown");
    assert_eq!(types.lookup(Some("html")), "application/xhtml+xml");
}

#[test]
fn test_from_config() {
    let mut cfg = StaticFilesConfig::default();
    cfg.default_content_type = "application/octet-stream".to_string();
    cfg.content_types
        .insert("log".to_string(), "text/plain".to_string());

    let types = ContentTypes::from_config(&cfg);

    assert_eq!(types.lookup(Some("log")), "text/plain");
    assert_eq!(types.lookup(Some("bin")), "application/octet-stream");
    assert_eq!(types.lookup(Some("html")), "text/html");
}
