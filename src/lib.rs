//! Lantern - minimal static file server
//!
//! Serves one file per connection from a fixed root and keeps an append-only
//! performance log of every file served.

pub mod config;
pub mod http;
pub mod metrics;
pub mod server;
