//! Content-Type resolution by file extension.

use std::collections::HashMap;

use crate::config::StaticFilesConfig;

const BUILTIN: &[(&str, &str)] = &[
    ("html", "text/html"),
    ("htm", "text/html"),
    ("css", "text/css"),
    ("js", "text/javascript"),
    ("mjs", "text/javascript"),
    ("json", "application/json"),
    ("txt", "text/plain"),
    ("xml", "application/xml"),
    ("csv", "text/csv"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("svg", "image/svg+xml"),
    ("ico", "image/x-icon"),
    ("webp", "image/webp"),
    ("pdf", "application/pdf"),
    ("wasm", "application/wasm"),
    ("woff", "font/woff"),
    ("woff2", "font/woff2"),
];

/// Extension → content type table with a fallback for everything else.
///
/// Keys are stored lowercase, so lookups are case-insensitive.
#[derive(Debug, Clone)]
pub struct ContentTypes {
    table: HashMap<String, String>,
    fallback: String,
}

impl ContentTypes {
    /// Built-in table with the given fallback.
    pub fn new(fallback: impl Into<String>) -> Self {
        let table = BUILTIN
            .iter()
            .map(|(ext, ct)| (ext.to_string(), ct.to_string()))
            .collect();

        Self {
            table,
            fallback: fallback.into(),
        }
    }

    /// Built-in table plus the configured overrides.
    pub fn from_config(cfg: &StaticFilesConfig) -> Self {
        let mut types = Self::new(cfg.default_content_type.clone());
        for (ext, ct) in &cfg.content_types {
            types.insert(ext, ct.clone());
        }
        types
    }

    /// Adds or replaces an entry. A leading dot on `ext` is ignored.
    pub fn insert(&mut self, ext: &str, content_type: impl Into<String>) {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        self.table.insert(ext, content_type.into());
    }

    /// Content type for an extension, or the fallback.
    pub fn lookup(&self, ext: Option<&str>) -> &str {
        ext.and_then(|e| self.table.get(&e.to_ascii_lowercase()))
            .map(String::as_str)
            .unwrap_or(&self.fallback)
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }
}

impl Default for ContentTypes {
    fn default() -> Self {
        Self::new("text/html")
    }
}
