use std::{io, time::Duration};

use crate::op::{Completion, Op};
use crate::Token;

pub mod epoll;
mod poller;
pub use poller::Poller;

#[cfg(test)]
pub(crate) mod scripted;

/// Source of completions for one endpoint.
///
/// # Contract
///
/// Implementations must:
/// - Eventually complete every pushed operation exactly once, handing its
///   buffer back in the [`Completion`].
/// - Start sends in the order they were pushed. Their completions may be
///   delivered in any order.
/// - Deliver completions only from [`wait_timeout`](IoBackend::wait_timeout),
///   never from `push` or `flush`.
pub trait IoBackend {
  /// Queues `op`. Nothing is issued before the next `flush`.
  fn push(&mut self, token: Token, op: Op) -> io::Result<()>;

  /// Issues queued operations. Returns how many were issued.
  fn flush(&mut self) -> io::Result<usize>;

  /// Parks until at least one completion is available or `timeout` elapses.
  ///
  /// The returned buffer holds whatever completed; callers drain it. An
  /// empty buffer means the wait timed out (or nothing is pending).
  fn wait_timeout(
    &mut self,
    timeout: Option<Duration>,
  ) -> io::Result<&mut Vec<Completion>>;
}
