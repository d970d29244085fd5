//! Waitable primitives used by the endpoint engine.
//!
//! [`Signal`] is a manual-reset flag the receive loop sets from a
//! completion. [`Handshake`] waits, with a deadline, for a single socket to
//! become readable or writable; connect and accept use it to bound their
//! handshakes.

use std::io;
use std::os::fd::RawFd;
use std::time::{Duration, Instant};

use crate::backends::epoll::{Events, OsPoller};

pub use crate::backends::epoll::Interest;

/// Manual-reset flag: stays set until explicitly reset.
#[derive(Debug, Default)]
pub struct Signal {
  set: bool,
}

impl Signal {
  pub const fn new() -> Self {
    Self { set: false }
  }

  pub fn set(&mut self) {
    self.set = true;
  }

  pub fn reset(&mut self) {
    self.set = false;
  }

  pub fn is_set(&self) -> bool {
    self.set
  }
}

const HANDSHAKE_KEY: u64 = 0;

/// One-shot readiness wait on a single socket.
pub struct Handshake {
  poller: OsPoller,
  events: Events,
  fd: RawFd,
}

impl Handshake {
  /// Registers `fd` for `interest`. The registration is removed on drop.
  pub fn new(fd: RawFd, interest: Interest) -> io::Result<Self> {
    let poller = OsPoller::new()?;
    poller.add(fd, HANDSHAKE_KEY, interest)?;
    Ok(Self { poller, events: Events::with_capacity(1), fd })
  }

  /// Waits until the socket is ready or `timeout` elapses.
  ///
  /// Returns `Ok(None)` on timeout. Interrupted waits resume with the time
  /// that is left.
  pub fn wait(&mut self, timeout: Duration) -> io::Result<Option<Interest>> {
    let deadline = Instant::now() + timeout;

    loop {
      let remaining = deadline.saturating_duration_since(Instant::now());
      if self.poller.wait(&mut self.events, Some(remaining))? > 0 {
        return Ok(Some(self.events.interest()));
      }
      if remaining.is_zero() || Instant::now() >= deadline {
        return Ok(None);
      }
    }
  }
}

impl Drop for Handshake {
  fn drop(&mut self) {
    // The fd may already be closed; nothing to do about a failure here.
    let _ = self.poller.delete(self.fd);
  }
}
