//! HTTP protocol implementation.
//!
//! Just enough HTTP/1.1 to serve one file per connection.
//!
//! # Architecture
//!
//! - **`framer`**: delimits the request head from the byte stream
//! - **`parser`**: extracts the file name from `GET /<name>`
//! - **`request`**: the parsed request
//! - **`response`**: status codes and response heads
//! - **`writer`**: serializes heads and streams file bodies
//! - **`mime`**: content type by file extension
//! - **`connection`**: the per-connection worker tying the above together
//!
//! # Connection lifecycle
//!
//! ```text
//!        ┌─────────────┐
//!        │   Framing   │ ← read until \r\n\r\n or the size bound
//!        └──────┬──────┘
//!               │ head framed          (error → close, nothing sent)
//!               ▼
//!        ┌──────────────────┐
//!        │    Parsing       │ ← GET /<name>
//!        └──────┬───────────┘
//!               │ name extracted       (refused → 400, close)
//!               ▼
//!        ┌──────────────────┐
//!        │   Opening file   │
//!        └──────┬───────────┘
//!               │ found                (missing → 404, close)
//!               ▼
//!        ┌──────────────────┐
//!        │  Streaming 200   │ ← head, then body in chunks
//!        └──────┬───────────┘
//!               │ sent
//!               ▼
//!        ┌──────────────────┐
//!        │  Access log      │ ← one line, then close
//!        └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use lantern::http::connection::{ServeContext, handle_connection};
//! use std::sync::Arc;
//!
//! let (socket, peer) = listener.accept().await?;
//! tokio::spawn(handle_connection(socket, peer, Arc::clone(&ctx)));
//! ```

pub mod connection;
pub mod framer;
pub mod mime;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;
