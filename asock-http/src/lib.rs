//! # asock-http
//!
//! One-shot HTTP/1.1 requests over [`asock`] endpoints: build a `GET` or
//! `POST` request, send it, read until the server closes the connection.
//! The response is returned as raw bytes; nothing is parsed.
//!
//! ```rust,no_run
//! use asock::EndpointConfig;
//!
//! let response = asock_http::fetch("http://example.com/", &EndpointConfig::default())?;
//! std::fs::write(&response.file_name, &response.body)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod client;
mod request;
pub mod url;

pub use client::{Response, fetch, post};
pub use request::{POST_BODY_PREFIX, get_request, post_request};
pub use url::{extract_file, extract_host, extract_path, split_host_port};
