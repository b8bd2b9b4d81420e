use crate::http::request::Request;

/// Why a framed request head was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("malformed request line")]
    InvalidRequest,

    #[error("unsupported method {0:?}")]
    UnsupportedMethod(String),

    #[error("request target must start with '/'")]
    MissingLeadingSlash,

    #[error("empty resource path")]
    EmptyPath,

    #[error("resource path contains a path separator")]
    PathSeparator,

    #[error("resource path is not a valid file name")]
    InvalidPath,

    #[error("resource path exceeds {limit} bytes")]
    PathTooLong { limit: usize },
}

/// Extracts the requested file name from a request head of the form
/// `GET /<token> ...`.
///
/// `<token>` is the run of non-whitespace bytes following the slash. Only the
/// request line is examined; headers are ignored.
pub fn parse_http_request(buf: &[u8], max_path: usize) -> Result<Request, ParseError> {
    let line_end = buf
        .windows(2)
        .position(|w| w == b"\r\n")
        .unwrap_or(buf.len());
    let line = &buf[..line_end];

    let method_end = line
        .iter()
        .position(|b| b.is_ascii_whitespace())
        .ok_or(ParseError::InvalidRequest)?;
    let method = &line[..method_end];

    if method != b"GET" {
        return Err(ParseError::UnsupportedMethod(
            String::from_utf8_lossy(method).into_owned(),
        ));
    }

    let rest = trim_start(&line[method_end..]);
    let target = rest.strip_prefix(b"/").ok_or(ParseError::MissingLeadingSlash)?;

    let token_end = target
        .iter()
        .position(|b| b.is_ascii_whitespace())
        .unwrap_or(target.len());
    let token = &target[..token_end];

    if token.is_empty() {
        return Err(ParseError::EmptyPath);
    }
    if token.len() > max_path {
        return Err(ParseError::PathTooLong { limit: max_path });
    }
    if token.iter().any(|&b| b == b'/' || b == b'\\') {
        return Err(ParseError::PathSeparator);
    }
    if token.contains(&0) {
        return Err(ParseError::InvalidPath);
    }

    let path = std::str::from_utf8(token)
        .map_err(|_| ParseError::InvalidPath)?
        .to_string();

    Ok(Request { path })
}

fn trim_start(bytes: &[u8]) -> &[u8] {
    let skip = bytes
        .iter()
        .take_while(|b| b.is_ascii_whitespace())
        .count();
    &bytes[skip..]
}
