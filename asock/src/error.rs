use std::{io, time::Duration};

use thiserror::Error;

/// Result alias used throughout asock.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors returned by endpoint construction and I/O.
///
/// Every variant is raised by the operation that detected it; nothing is
/// retried.
#[derive(Debug, Error)]
pub enum Error {
  /// The resolver call itself failed.
  #[error("failed to resolve `{host}`: {source}")]
  Resolution {
    host: String,
    #[source]
    source: io::Error,
  },
  /// The resolver succeeded but returned no IPv4 candidate.
  #[error("`{host}` has no IPv4 address")]
  NoIpv4Address { host: String },
  /// No connect signal within the configured bound.
  #[error("connect timed out after {0:?}")]
  ConnectTimeout(Duration),
  /// The connect handshake finished with an error code.
  #[error("connect failed [error = {0}]")]
  Connect(i32),
  /// No incoming connection within the configured bound.
  #[error("accept timed out after {0:?}")]
  AcceptTimeout(Duration),
  /// The accept handshake finished with an error code.
  #[error("accept failed [error = {0}]")]
  Accept(i32),
  /// A send or receive completion carried a nonzero error code.
  #[error("transport error [error = {0}]")]
  Transport(i32),
  /// The issuing call failed for a reason other than "in progress".
  #[error("{op} failed: {source}")]
  Io {
    op: &'static str,
    #[source]
    source: io::Error,
  },
  /// The configured I/O idle timeout elapsed without a single completion.
  #[error("no completion within {0:?}")]
  Stalled(Duration),
  /// The send side was closed without an error (e.g. by [`close`](crate::Endpoint::close)).
  #[error("send side is closed")]
  SendClosed,
}

impl Error {
  pub(crate) fn io(op: &'static str, source: io::Error) -> Self {
    Self::Io { op, source }
  }

  /// OS-level error code associated with this error, `0` when there is none.
  pub fn os_code(&self) -> i32 {
    match self {
      Self::Resolution { source, .. } | Self::Io { source, .. } => {
        source.raw_os_error().unwrap_or(0)
      }
      Self::Connect(code) | Self::Accept(code) | Self::Transport(code) => *code,
      Self::ConnectTimeout(_) | Self::AcceptTimeout(_) | Self::Stalled(_) => {
        libc::ETIMEDOUT
      }
      Self::NoIpv4Address { .. } | Self::SendClosed => 0,
    }
  }

  pub fn is_resolution(&self) -> bool {
    matches!(self, Self::Resolution { .. } | Self::NoIpv4Address { .. })
  }

  pub fn is_timeout(&self) -> bool {
    matches!(
      self,
      Self::ConnectTimeout(_) | Self::AcceptTimeout(_) | Self::Stalled(_)
    )
  }
}
