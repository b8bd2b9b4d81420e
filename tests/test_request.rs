use lantern::http::request::Request;

fn request(path: &str) -> Request {
    Request {
        path: path.to_string(),
    }
}

#[test]
fn test_request_extension() {
    assert_eq!(request("index.html").extension(), Some("html"));
    assert_eq!(request("archive.tar.gz").extension(), Some("gz"));
    assert_eq!(request("LOGO.PNG").extension(), Some("PNG"));
}

#[test]
fn test_request_without_extension() {
    assert_eq!(request("README").extension(), None);
    assert_eq!(request("trailing.").extension(), None);
}

#[test]
fn test_request_dotfile_has_no_extension() {
    assert_eq!(request(".htaccess").extension(), None);
}

#[test]
fn test_request_equality() {
    assert_eq!(request("a.html"), request("a.html"));
    assert_ne!(request("a.html"), request("b.html"));
}
