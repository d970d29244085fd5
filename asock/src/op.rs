//! Operations handed to a backend and the completions it hands back.

use std::{fmt, io};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
  Send,
  Recv,
}

/// Identifies an in-flight operation: its kind and, for sends, the queue slot.
///
/// Packs into a `u64` so it can travel as epoll/uring user data.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token(u64);

impl Token {
  const SEND_TAG: u64 = 1 << 32;
  const RECV_TAG: u64 = 2 << 32;
  const SLOT_MASK: u64 = u32::MAX as u64;

  pub const fn send(slot: usize) -> Self {
    assert!(slot <= u32::MAX as usize, "Token::send: slot out of range");
    Self(Self::SEND_TAG | slot as u64)
  }

  pub const fn recv() -> Self {
    Self(Self::RECV_TAG)
  }

  pub fn kind(self) -> OpKind {
    match self.0 & !Self::SLOT_MASK {
      Self::SEND_TAG => OpKind::Send,
      Self::RECV_TAG => OpKind::Recv,
      other => unreachable!("token with unknown tag {other:#x}"),
    }
  }

  /// Queue slot of a send token, `0` for a receive.
  pub fn slot(self) -> usize {
    (self.0 & Self::SLOT_MASK) as usize
  }

  pub const fn user_data(self) -> u64 {
    self.0
  }
}

impl fmt::Debug for Token {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.kind() {
      OpKind::Send => write!(f, "Token::Send({})", self.slot()),
      OpKind::Recv => f.write_str("Token::Recv"),
    }
  }
}

/// An operation and the buffer it owns while in flight.
#[derive(Debug)]
pub enum Op {
  /// Write all of `buf`.
  Send { buf: Vec<u8> },
  /// Read into the spare capacity of `buf`, up to `buf.capacity()`.
  Recv { buf: Vec<u8> },
}

impl Op {
  pub fn kind(&self) -> OpKind {
    match self {
      Op::Send { .. } => OpKind::Send,
      Op::Recv { .. } => OpKind::Recv,
    }
  }

  pub fn into_buf(self) -> Vec<u8> {
    match self {
      Op::Send { buf } | Op::Recv { buf } => buf,
    }
  }
}

/// Outcome of one operation, delivered by [`IoBackend::wait_timeout`](crate::backends::IoBackend::wait_timeout).
///
/// The operation's buffer comes back with it. For a receive, `buf.len()`
/// equals the byte count of a successful result.
#[derive(Debug)]
pub struct Completion {
  pub token: Token,
  pub result: io::Result<usize>,
  pub buf: Vec<u8>,
}

impl Completion {
  /// OS error code carried by the completion, `0` on success.
  pub fn error_code(&self) -> i32 {
    match &self.result {
      Ok(_) => 0,
      Err(err) => err.raw_os_error().unwrap_or(libc::EIO),
    }
  }
}
