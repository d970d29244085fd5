#![cfg_attr(docsrs, feature(doc_cfg))]

//! # asock - completion-driven TCP endpoints
//!
//! asock is a small, single-threaded TCP socket engine. Every operation is
//! issued asynchronously and its completion is delivered back to the issuing
//! thread, but only while that thread is parked in one of the engine's
//! waits. No thread pool, no locks.
//!
//! ## Features
//! - **Time-bounded handshakes**: connect and single-shot accept, both
//!   bounded by [`EndpointConfig`] timeouts.
//! - **Bounded send pipeline**: outbound buffers are cut into chunks and
//!   issued through an [`SEND_QUEUE_DEPTH`]-deep queue of in-flight sends.
//! - **Receive loop**: one receive at a time into a reused scratch buffer,
//!   appended to a caller-supplied accumulator until the peer closes.
//!
//! ## Platform support
//!
//! | Platform   | Completion source                 | Status        |
//! |------------|-----------------------------------|---------------|
//! | Linux      | epoll, one instance per endpoint  | Yes           |
//! | Others     | -                                 | Not supported |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use asock::{EndpointConfig, resolve};
//!
//! fn example() -> asock::Result<()> {
//!     let config = EndpointConfig::default();
//!     let address = resolve("example.com", 80)?;
//!
//!     let mut endpoint = asock::connect(&address, &config)?;
//!     endpoint.send(b"GET / HTTP/1.1\r\nHost: example.com\r\nConnection: close\r\n\r\n")?;
//!
//!     let mut response = Vec::new();
//!     endpoint.recv(&mut response)?;
//!     println!("{} bytes", response.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result`], whose [`Error`] keeps the
//! failure kinds apart: resolution, connect/accept timeouts, connect/accept
//! handshake errors, transport errors reported by completions, and failures
//! of the issuing syscalls themselves.

#[cfg(not(linux))]
compile_error!("asock only supports Linux (epoll).");

#[macro_use]
mod macros;

pub mod backends;
mod config;
mod connect;
mod endpoint;
mod error;
mod net_utils;
mod op;
mod recv;
mod resolve;
mod send;
mod socket;
mod sync;

pub use config::EndpointConfig;
pub use connect::{Listener, accept, connect};
pub use endpoint::Endpoint;
pub use error::{Error, Result};
pub use op::{Completion, Op, OpKind, Token};
pub use resolve::{Address, resolve};
pub use socket::Socket;
pub use sync::{Handshake, Interest, Signal};

/// Number of sends that may be in flight on one endpoint.
pub const SEND_QUEUE_DEPTH: usize = 8;

/// Default upper bound of one send fragment, in bytes.
pub const SEND_CHUNK_SIZE: usize = 8192;

/// Default size of the receive scratch buffer, in bytes.
pub const RECV_BUFFER_SIZE: usize = 32768;
