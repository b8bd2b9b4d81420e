use lantern::http::parser::{ParseError, parse_http_request};
use lantern::http::request::Request;

const LIMIT: usize = 1024;

#[test]
fn test_parse_simple_get_request() {
    let req = b"GET /index.html HTTP/1.1\r\nHost: example.com\r\n\r\n";
    let parsed = parse_http_request(req, LIMIT).unwrap();

    assert_eq!(parsed.path, "index.html");
}

#[test]
fn test_parse_request_without_version() {
    let parsed = parse_http_request(b"GET /notes.txt\r\n\r\n", LIMIT).unwrap();

    assert_eq!(parsed, Request { path: "notes.txt".to_string() });
}

#[test]
fn test_parse_ignores_version_token() {
    for version in ["HTTP/1.1", "HTTP/1.0", "HTTP/2", "nonsense"] {
        let req = format!("GET /page.html {version}\r\n\r\n");
        let parsed = parse_http_request(req.as_bytes(), LIMIT).unwrap();

        assert_eq!(parsed, Request { path: "page.html".to_string() });
    }
}

#[test]
fn test_parse_headers_are_ignored() {
    let req = b"GET /a.css HTTP/1.1\r\nHost: x\r\nBrokenHeader\r\nX-Path: /etc/passwd\r\n\r\n";
    let parsed = parse_http_request(req, LIMIT).unwrap();

    assert_eq!(parsed.path, "a.css");
}

#[test]
fn test_parse_extra_spaces_before_target() {
    let parsed = parse_http_request(b"GET   /spaced.html HTTP/1.1\r\n\r\n", LIMIT).unwrap();

    assert_eq!(parsed.path, "spaced.html");
}

#[test]
fn test_parse_rejects_other_methods() {
    for method in ["POST", "PUT", "DELETE", "HEAD", "OPTIONS", "PATCH", "get"] {
        let req = format!("{} /index.html HTTP/1.1\r\n\r\n", method);
        let result = parse_http_request(req.as_bytes(), LIMIT);

        assert_eq!(result, Err(ParseError::UnsupportedMethod(method.to_string())));
    }
}

#[test]
fn test_parse_rejects_missing_leading_slash() {
    let result = parse_http_request(b"GET index.html HTTP/1.1\r\n\r\n", LIMIT);

    assert_eq!(result, Err(ParseError::MissingLeadingSlash));
}

#[test]
fn test_parse_rejects_root_path() {
    let result = parse_http_request(b"GET / HTTP/1.1\r\n\r\n", LIMIT);

    assert_eq!(result, Err(ParseError::EmptyPath));
}

#[test]
fn test_parse_rejects_directory_paths() {
    let cases: [&[u8]; 5] = [
        b"GET /docs/index.html HTTP/1.1\r\n\r\n",
        b"GET /../secret HTTP/1.1\r\n\r\n",
        b"GET //etc/passwd HTTP/1.1\r\n\r\n",
        b"GET /dir/ HTTP/1.1\r\n\r\n",
        b"GET /..\\windows HTTP/1.1\r\n\r\n",
    ];

    for req in cases {
        assert_eq!(parse_http_request(req, LIMIT), Err(ParseError::PathSeparator));
    }
}

#[test]
fn test_parse_rejects_nul_and_invalid_utf8() {
    assert_eq!(
        parse_http_request(b"GET /a\0b HTTP/1.1\r\n\r\n", LIMIT),
        Err(ParseError::InvalidPath)
    );
    assert_eq!(
        parse_http_request(b"GET /\xff\xfe HTTP/1.1\r\n\r\n", LIMIT),
        Err(ParseError::InvalidPath)
    );
}

#[test]
fn test_parse_rejects_oversized_token() {
    let req = format!("GET /{} HTTP/1.1\r\n\r\n", "a".repeat(65));
    let result = parse_http_request(req.as_bytes(), 64);

    assert_eq!(result, Err(ParseError::PathTooLong { limit: 64 }));
}

#[test]
fn test_parse_malformed_request_line() {
    assert_eq!(parse_http_request(b"GARBAGE", LIMIT), Err(ParseError::InvalidRequest));
    assert_eq!(parse_http_request(b"\r\n\r\n", LIMIT), Err(ParseError::InvalidRequest));
}

#[test]
fn test_parse_only_first_line_counts() {
    // A slash-free first line is not rescued by a valid-looking second one.
    let result = parse_http_request(b"HELLO\r\nGET /index.html HTTP/1.1\r\n\r\n", LIMIT);

    assert_eq!(result, Err(ParseError::InvalidRequest));
}
