/// A request this server is willing to answer: `GET /<path>`.
///
/// `path` is a single file name relative to the server root. It never
/// contains a path separator; the parser rejects such requests outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// The requested file name (e.g. "index.html")
    pub path: String,
}

impl Request {
    /// Extension of the requested file, without the dot.
    ///
    /// ```
    /// # use lantern::http::request::Request;
    /// let req = Request { path: "index.html".into() };
    /// assert_eq!(req.extension(), Some("html"));
    /// ```
    pub fn extension(&self) -> Option<&str> {
        match self.path.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext),
            _ => None,
        }
    }
}
