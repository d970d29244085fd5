use std::time::Duration;

use crate::{RECV_BUFFER_SIZE, SEND_CHUNK_SIZE};

/// Tunables for connection establishment and I/O.
///
/// Fields are only reachable through the `with_*` builders, which reject
/// zero sizes, so an endpoint never sees an empty chunk or scratch buffer.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use asock::EndpointConfig;
///
/// let config = EndpointConfig::default()
///   .with_connect_timeout(Duration::from_secs(5))
///   .with_chunk_size(4096);
/// assert_eq!(config.chunk_size(), 4096);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
  connect_timeout: Duration,
  accept_timeout: Duration,
  chunk_size: usize,
  recv_buffer_size: usize,
  io_timeout: Option<Duration>,
}

impl Default for EndpointConfig {
  fn default() -> Self {
    Self {
      connect_timeout: Duration::from_secs(60),
      accept_timeout: Duration::from_secs(60),
      chunk_size: SEND_CHUNK_SIZE,
      recv_buffer_size: RECV_BUFFER_SIZE,
      io_timeout: None,
    }
  }
}

impl EndpointConfig {
  /// Upper bound for the connect handshake.
  pub fn connect_timeout(&self) -> Duration {
    self.connect_timeout
  }

  /// Upper bound for the accept handshake.
  pub fn accept_timeout(&self) -> Duration {
    self.accept_timeout
  }

  /// Largest fragment a single send operation carries. Never zero.
  pub fn chunk_size(&self) -> usize {
    self.chunk_size
  }

  /// Size of the receive scratch buffer. Never zero.
  pub fn recv_buffer_size(&self) -> usize {
    self.recv_buffer_size
  }

  /// How long a wait may go without any completion before the endpoint
  /// gives up with [`Error::Stalled`](crate::Error::Stalled).
  /// `None` waits until a completion arrives.
  pub fn io_timeout(&self) -> Option<Duration> {
    self.io_timeout
  }

  pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
    self.connect_timeout = timeout;
    self
  }

  pub fn with_accept_timeout(mut self, timeout: Duration) -> Self {
    self.accept_timeout = timeout;
    self
  }

  /// Sets both handshake timeouts.
  pub fn with_handshake_timeout(self, timeout: Duration) -> Self {
    self.with_connect_timeout(timeout).with_accept_timeout(timeout)
  }

  pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
    assert!(chunk_size > 0, "chunk_size must be > 0");
    self.chunk_size = chunk_size;
    self
  }

  pub fn with_recv_buffer_size(mut self, size: usize) -> Self {
    assert!(size > 0, "recv_buffer_size must be > 0");
    self.recv_buffer_size = size;
    self
  }

  pub fn with_io_timeout(mut self, timeout: Option<Duration>) -> Self {
    self.io_timeout = timeout;
    self
  }
}
