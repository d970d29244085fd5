//! Thin wrapper around an epoll instance.

use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::time::Duration;
use std::{io, ptr};

/// Interest/Event flags for I/O readiness
///
/// This type is used for both:
/// - Registering interest (what you want to be notified about)
/// - Receiving events (what actually happened)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interest {
  bits: u8,
}

impl Interest {
  pub const NONE: Self = Self { bits: 0 };
  pub const READ: Self = Self { bits: 1 << 0 };
  pub const WRITE: Self = Self { bits: 1 << 1 };
  pub const READ_AND_WRITE: Self =
    Self { bits: Self::READ.bits | Self::WRITE.bits };

  pub const fn is_readable(self) -> bool {
    self.bits & Self::READ.bits != 0
  }

  pub const fn is_writable(self) -> bool {
    self.bits & Self::WRITE.bits != 0
  }

  pub const fn is_none(self) -> bool {
    self.bits == 0
  }

  /// Combine interests using bitwise OR
  pub const fn or(self, other: Self) -> Self {
    Self { bits: self.bits | other.bits }
  }

  fn epoll_bits(self) -> u32 {
    let mut events = 0u32;

    if self.is_readable() {
      events |= libc::EPOLLIN as u32;
    }
    if self.is_writable() {
      events |= libc::EPOLLOUT as u32;
    }

    // One event per arming; the owner re-arms with `modify`.
    events | libc::EPOLLONESHOT as u32
  }

  fn from_epoll_bits(events: u32) -> Self {
    let readable = events & libc::EPOLLIN as u32 != 0;
    let writable = events & libc::EPOLLOUT as u32 != 0;

    match (readable, writable) {
      (true, true) => Self::READ_AND_WRITE,
      (true, false) => Self::READ,
      (false, true) => Self::WRITE,
      // Error or hang-up alone: every pending direction must look.
      (false, false) => Self::READ_AND_WRITE,
    }
  }
}

impl std::ops::BitOr for Interest {
  type Output = Self;

  fn bitor(self, rhs: Self) -> Self::Output {
    self.or(rhs)
  }
}

/// Buffer the kernel fills on [`OsPoller::wait`].
pub struct Events {
  events: Vec<libc::epoll_event>,
  len: usize,
}

impl Events {
  pub fn with_capacity(capacity: usize) -> Self {
    assert!(capacity > 0, "Events::with_capacity: capacity must be > 0");
    Self { events: vec![libc::epoll_event { events: 0, u64: 0 }; capacity], len: 0 }
  }

  pub fn is_empty(&self) -> bool {
    self.len == 0
  }

  /// Union of the interests reported by the last wait.
  pub fn interest(&self) -> Interest {
    self.events[..self.len]
      .iter()
      .fold(Interest::NONE, |acc, ev| acc | Interest::from_epoll_bits(ev.events))
  }
}

/// Wrapper around an epoll file descriptor
pub struct OsPoller {
  epoll_fd: OwnedFd,
}

impl OsPoller {
  /// Create a new epoll instance
  pub fn new() -> io::Result<Self> {
    let fd = syscall!(epoll_create1(libc::EPOLL_CLOEXEC))?;
    // SAFETY: epoll_create1 handed us a fresh descriptor.
    Ok(Self { epoll_fd: unsafe { OwnedFd::from_raw_fd(fd) } })
  }

  /// Add interest for a file descriptor
  /// This is not idempotent.
  pub fn add(&self, fd: RawFd, key: u64, interest: Interest) -> io::Result<()> {
    assert!(!interest.is_none(), "OsPoller::add: interest cannot be NONE");
    self.ctl(libc::EPOLL_CTL_ADD, fd, key, interest)
  }

  /// Modify existing interest for a file descriptor; also re-arms it.
  /// This fails if not added before.
  pub fn modify(
    &self,
    fd: RawFd,
    key: u64,
    interest: Interest,
  ) -> io::Result<()> {
    assert!(!interest.is_none(), "OsPoller::modify: interest cannot be NONE");
    self.ctl(libc::EPOLL_CTL_MOD, fd, key, interest)
  }

  /// Remove all interest for a file descriptor
  pub fn delete(&self, fd: RawFd) -> io::Result<()> {
    // For EPOLL_CTL_DEL, event pointer can be NULL in Linux 2.6.9+
    syscall!(epoll_ctl(
      self.epoll_fd.as_raw_fd(),
      libc::EPOLL_CTL_DEL,
      fd,
      ptr::null_mut(),
    ))
    .map(drop)
  }

  fn ctl(
    &self,
    op: libc::c_int,
    fd: RawFd,
    key: u64,
    interest: Interest,
  ) -> io::Result<()> {
    let mut event = libc::epoll_event { events: interest.epoll_bits(), u64: key };

    syscall!(epoll_ctl(
      self.epoll_fd.as_raw_fd(),
      op,
      fd,
      &mut event as *mut libc::epoll_event,
    ))
    .map(drop)
  }

  /// Waits for events. A signal interrupting the wait counts as zero events.
  pub fn wait(
    &self,
    events: &mut Events,
    timeout: Option<Duration>,
  ) -> io::Result<usize> {
    // Convert timeout to milliseconds (-1 for infinite wait), rounding up so
    // a sub-millisecond timeout does not turn into a busy poll.
    let timeout_ms = match timeout {
      Some(d) => {
        let ms = d.as_nanos().div_ceil(1_000_000);
        if ms > i32::MAX as u128 { i32::MAX } else { ms as i32 }
      }
      None => -1,
    };

    events.len = 0;
    let n = match syscall!(epoll_wait(
      self.epoll_fd.as_raw_fd(),
      events.events.as_mut_ptr(),
      events.events.len() as i32,
      timeout_ms,
    )) {
      Ok(n) => n as usize,
      Err(err) if err.kind() == io::ErrorKind::Interrupted => 0,
      Err(err) => return Err(err),
    };

    assert!(
      n <= events.events.len(),
      "epoll_wait returned more events ({}) than buffer size ({})",
      n,
      events.events.len()
    );
    events.len = n;
    Ok(n)
  }
}
