//! Exclusive owner of one native socket handle.
//!
//! The handle lives in an `Option<OwnedFd>`: [`Socket::close`] takes it out
//! and releases it, later calls find nothing to release, and dropping a
//! socket that was never closed releases it through `OwnedFd`. Whatever the
//! exit path, the handle is released exactly once.

use std::{
  io, mem,
  net::SocketAddrV4,
  os::fd::{AsRawFd, FromRawFd, IntoRawFd, OwnedFd, RawFd},
};

use crate::net_utils::{SOCKADDR_IN_LEN, from_sockaddr_in, into_sockaddr_in};

#[derive(Debug)]
pub struct Socket {
  fd: Option<OwnedFd>,
}

impl Socket {
  /// Creates a non-blocking IPv4 TCP socket.
  pub fn stream_v4() -> io::Result<Self> {
    let fd = syscall!(socket(
      libc::AF_INET,
      libc::SOCK_STREAM | libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC,
      libc::IPPROTO_TCP
    ))?;
    // SAFETY: We literally just created it.
    Ok(unsafe { Self::from_raw_fd(fd) })
  }

  pub fn is_open(&self) -> bool {
    self.fd.is_some()
  }

  pub fn set_reuse_address(&self) -> io::Result<()> {
    let enable: libc::c_int = 1;
    syscall!(setsockopt(
      self.as_raw_fd(),
      libc::SOL_SOCKET,
      libc::SO_REUSEADDR,
      &enable as *const libc::c_int as *const libc::c_void,
      mem::size_of::<libc::c_int>() as libc::socklen_t
    ))
    .map(drop)
  }

  pub fn bind(&self, addr: SocketAddrV4) -> io::Result<()> {
    let raw = into_sockaddr_in(addr);
    syscall!(bind(
      self.as_raw_fd(),
      &raw as *const libc::sockaddr_in as *const libc::sockaddr,
      SOCKADDR_IN_LEN
    ))
    .map(drop)
  }

  pub fn listen(&self, backlog: i32) -> io::Result<()> {
    syscall!(listen(self.as_raw_fd(), backlog)).map(drop)
  }

  /// Issues a non-blocking connect. `EINPROGRESS` is returned as an error
  /// like any other; callers decide whether it is expected.
  pub fn connect(&self, addr: SocketAddrV4) -> io::Result<()> {
    let raw = into_sockaddr_in(addr);
    syscall!(connect(
      self.as_raw_fd(),
      &raw as *const libc::sockaddr_in as *const libc::sockaddr,
      SOCKADDR_IN_LEN
    ))
    .map(drop)
  }

  /// Accepts one pending connection. The new socket is non-blocking.
  pub fn accept(&self) -> io::Result<Socket> {
    let fd = loop {
      match syscall!(accept4(
        self.as_raw_fd(),
        std::ptr::null_mut(),
        std::ptr::null_mut(),
        libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC
      )) {
        Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
        other => break other?,
      }
    };
    // SAFETY: accept4 handed us a fresh descriptor.
    Ok(unsafe { Self::from_raw_fd(fd) })
  }

  /// Reads and clears the pending socket error (`SO_ERROR`).
  pub fn take_error(&self) -> io::Result<i32> {
    let mut code: libc::c_int = 0;
    let mut len = mem::size_of::<libc::c_int>() as libc::socklen_t;
    syscall!(getsockopt(
      self.as_raw_fd(),
      libc::SOL_SOCKET,
      libc::SO_ERROR,
      &mut code as *mut libc::c_int as *mut libc::c_void,
      &mut len
    ))?;
    Ok(code)
  }

  pub fn local_addr(&self) -> io::Result<SocketAddrV4> {
    // SAFETY: sockaddr_in is plain old data, zero is a valid value.
    let mut raw: libc::sockaddr_in = unsafe { mem::zeroed() };
    let mut len = SOCKADDR_IN_LEN;
    syscall!(getsockname(
      self.as_raw_fd(),
      &mut raw as *mut libc::sockaddr_in as *mut libc::sockaddr,
      &mut len
    ))?;

    if raw.sin_family != libc::AF_INET as libc::sa_family_t {
      return Err(io::Error::from_raw_os_error(libc::EAFNOSUPPORT));
    }
    Ok(from_sockaddr_in(&raw))
  }

  pub fn shutdown_write(&self) -> io::Result<()> {
    syscall!(shutdown(self.as_raw_fd(), libc::SHUT_WR)).map(drop)
  }

  /// Releases the handle. Calling this again is a no-op.
  pub fn close(&mut self) -> io::Result<()> {
    match self.fd.take() {
      Some(fd) => syscall!(close(fd.into_raw_fd())).map(drop),
      None => Ok(()),
    }
  }
}

impl AsRawFd for Socket {
  /// Returns `-1` once the socket is closed, so late syscalls fail with `EBADF`.
  fn as_raw_fd(&self) -> RawFd {
    self.fd.as_ref().map_or(-1, AsRawFd::as_raw_fd)
  }
}

impl FromRawFd for Socket {
  unsafe fn from_raw_fd(fd: RawFd) -> Self {
    // SAFETY: Caller hands over ownership of an open descriptor.
    Self { fd: Some(unsafe { OwnedFd::from_raw_fd(fd) }) }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::net::Ipv4Addr;

  #[test]
  fn close_is_idempotent() {
    let mut socket = Socket::stream_v4().unwrap();
    assert!(socket.is_open());
    assert!(socket.as_raw_fd() >= 0);

    socket.close().unwrap();
    assert!(!socket.is_open());
    assert_eq!(socket.as_raw_fd(), -1);

    // Second close (e.g. normal path after an error path) releases nothing.
    socket.close().unwrap();
    drop(socket);
  }

  #[test]
  fn syscalls_after_close_fail_with_ebadf() {
    let mut socket = Socket::stream_v4().unwrap();
    socket.close().unwrap();

    let err = socket.listen(1).unwrap_err();
    assert_eq!(err.raw_os_error(), Some(libc::EBADF));
  }

  #[test]
  fn bind_reports_local_addr() {
    let socket = Socket::stream_v4().unwrap();
    socket.set_reuse_address().unwrap();
    socket.bind(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0)).unwrap();

    let local = socket.local_addr().unwrap();
    assert_eq!(*local.ip(), Ipv4Addr::LOCALHOST);
    assert_ne!(local.port(), 0);
  }

  #[test]
  fn fresh_socket_has_no_pending_error() {
    let socket = Socket::stream_v4().unwrap();
    assert_eq!(socket.take_error().unwrap(), 0);
  }
}
