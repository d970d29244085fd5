//! Completion emulation over epoll.
//!
//! Operations are attempted as soon as they are flushed. Whatever would
//! block stays pending and the socket is armed (one-shot) for the directions
//! that still have work; the next wakeup retries them. Results are parked
//! and only handed out by [`wait_timeout`](IoBackend::wait_timeout), so
//! completion delivery happens exclusively on the waiting thread.

use std::collections::VecDeque;
use std::os::fd::RawFd;
use std::time::{Duration, Instant};
use std::io;

use super::IoBackend;
use super::epoll::{Events, Interest, OsPoller};
use crate::op::{Completion, Op};
use crate::Token;

const KEY: u64 = 0;

struct PendingSend {
  token: Token,
  buf: Vec<u8>,
  written: usize,
}

struct PendingRecv {
  token: Token,
  buf: Vec<u8>,
}

enum Progress {
  Done(io::Result<usize>),
  Blocked,
}

/// Epoll-backed [`IoBackend`] bound to a single socket.
///
/// The poller does not own the socket; it must not outlive it.
pub struct Poller {
  fd: RawFd,
  os: OsPoller,
  events: Events,
  staged: Vec<(Token, Op)>,
  sends: VecDeque<PendingSend>,
  recv: Option<PendingRecv>,
  registered: bool,
  completed: Vec<Completion>,
}

impl Poller {
  pub fn new(fd: RawFd) -> io::Result<Self> {
    Ok(Self {
      fd,
      os: OsPoller::new()?,
      events: Events::with_capacity(4),
      staged: Vec::new(),
      sends: VecDeque::new(),
      recv: None,
      registered: false,
      completed: Vec::new(),
    })
  }

  /// Operations issued but not yet completed.
  pub fn pending(&self) -> usize {
    self.sends.len() + usize::from(self.recv.is_some())
  }

  fn interest(&self) -> Interest {
    let mut interest = Interest::NONE;
    if !self.sends.is_empty() {
      interest = interest | Interest::WRITE;
    }
    if self.recv.is_some() {
      interest = interest | Interest::READ;
    }
    interest
  }

  fn rearm(&mut self) -> io::Result<()> {
    let interest = self.interest();

    match (interest.is_none(), self.registered) {
      (true, true) => {
        self.registered = false;
        self.os.delete(self.fd)
      }
      (true, false) => Ok(()),
      (false, true) => self.os.modify(self.fd, KEY, interest),
      (false, false) => {
        self.os.add(self.fd, KEY, interest)?;
        self.registered = true;
        Ok(())
      }
    }
  }

  /// Pushes every pending operation as far as the socket allows.
  fn drive(&mut self) {
    // Sends go out strictly in issue order: a blocked head blocks the rest.
    while let Some(pending) = self.sends.front_mut() {
      match write_some(self.fd, pending) {
        Progress::Blocked => break,
        Progress::Done(result) => {
          if let Some(PendingSend { token, buf, .. }) = self.sends.pop_front() {
            self.completed.push(Completion { token, result, buf });
          }
        }
      }
    }

    if let Some(pending) = self.recv.as_mut() {
      if let Progress::Done(result) = read_some(self.fd, &mut pending.buf) {
        if let Some(PendingRecv { token, buf }) = self.recv.take() {
          self.completed.push(Completion { token, result, buf });
        }
      }
    }
  }
}

fn write_some(fd: RawFd, pending: &mut PendingSend) -> Progress {
  loop {
    if pending.written == pending.buf.len() {
      return Progress::Done(Ok(pending.written));
    }

    let rest = &pending.buf[pending.written..];
    match syscall!(send(
      fd,
      rest.as_ptr() as *const libc::c_void,
      rest.len(),
      libc::MSG_NOSIGNAL
    )) {
      Ok(n) => pending.written += n as usize,
      Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
      Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
        return Progress::Blocked;
      }
      Err(err) => return Progress::Done(Err(err)),
    }
  }
}

fn read_some(fd: RawFd, buf: &mut Vec<u8>) -> Progress {
  let filled = buf.len();
  let spare = buf.capacity() - filled;
  assert!(spare > 0, "recv buffer has no spare capacity");

  loop {
    // SAFETY: the pointer and length describe the vector's spare capacity.
    match syscall!(recv(
      fd,
      unsafe { buf.as_mut_ptr().add(filled) } as *mut libc::c_void,
      spare,
      0
    )) {
      Ok(n) => {
        let n = n as usize;
        // SAFETY: the kernel initialised `n` bytes past `filled`.
        unsafe { buf.set_len(filled + n) };
        return Progress::Done(Ok(n));
      }
      Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
      Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
        return Progress::Blocked;
      }
      Err(err) => return Progress::Done(Err(err)),
    }
  }
}

impl IoBackend for Poller {
  fn push(&mut self, token: Token, op: Op) -> io::Result<()> {
    self.staged.push((token, op));
    Ok(())
  }

  fn flush(&mut self) -> io::Result<usize> {
    let issued = self.staged.len();

    for (token, op) in self.staged.drain(..) {
      match op {
        Op::Send { buf } => {
          self.sends.push_back(PendingSend { token, buf, written: 0 })
        }
        Op::Recv { buf } => {
          assert!(self.recv.is_none(), "only one receive may be in flight");
          self.recv = Some(PendingRecv { token, buf });
        }
      }
    }

    if issued > 0 {
      self.drive();
      self.rearm()?;
    }
    Ok(issued)
  }

  fn wait_timeout(
    &mut self,
    timeout: Option<Duration>,
  ) -> io::Result<&mut Vec<Completion>> {
    if !self.completed.is_empty() || self.pending() == 0 {
      return Ok(&mut self.completed);
    }

    let deadline = timeout.map(|timeout| Instant::now() + timeout);

    loop {
      let remaining =
        deadline.map(|deadline| deadline.saturating_duration_since(Instant::now()));

      if self.os.wait(&mut self.events, remaining)? > 0 {
        tracing::trace!(interest = ?self.events.interest(), "socket ready");
        self.drive();
        self.rearm()?;
        if !self.completed.is_empty() {
          break;
        }
      }

      if remaining.is_some_and(|remaining| remaining.is_zero())
        || deadline.is_some_and(|deadline| Instant::now() >= deadline)
      {
        break;
      }
    }

    Ok(&mut self.completed)
  }
}

impl Drop for Poller {
  fn drop(&mut self) {
    if self.registered {
      // The socket may already be closed, which removed it anyway.
      let _ = self.os.delete(self.fd);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::net::{TcpListener, TcpStream};
  use std::io::{Read, Write};
  use std::os::fd::AsRawFd;

  fn pair() -> (TcpStream, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
    let (server, _) = listener.accept().unwrap();
    client.set_nonblocking(true).unwrap();
    (client, server)
  }

  #[test]
  fn nothing_pending_returns_immediately() {
    let (client, _server) = pair();
    let mut poller = Poller::new(client.as_raw_fd()).unwrap();

    let started = Instant::now();
    let completed = poller.wait_timeout(None).unwrap();
    assert!(completed.is_empty());
    assert!(started.elapsed() < Duration::from_secs(1));
  }

  #[test]
  fn send_completes_in_wait() {
    let (client, mut server) = pair();
    let mut poller = Poller::new(client.as_raw_fd()).unwrap();

    poller.push(Token::send(0), Op::Send { buf: b"hello".to_vec() }).unwrap();
    assert_eq!(poller.flush().unwrap(), 1);

    let completed = poller.wait_timeout(Some(Duration::from_secs(5))).unwrap();
    assert_eq!(completed.len(), 1);
    let completion = completed.pop().unwrap();
    assert_eq!(completion.token, Token::send(0));
    assert_eq!(completion.result.unwrap(), 5);
    assert_eq!(completion.buf, b"hello");

    let mut received = [0u8; 5];
    server.read_exact(&mut received).unwrap();
    assert_eq!(&received, b"hello");
  }

  #[test]
  fn recv_waits_for_data() {
    let (client, mut server) = pair();
    let mut poller = Poller::new(client.as_raw_fd()).unwrap();

    poller.push(Token::recv(), Op::Recv { buf: Vec::with_capacity(64) }).unwrap();
    poller.flush().unwrap();

    let completed = poller.wait_timeout(Some(Duration::from_millis(20))).unwrap();
    assert!(completed.is_empty());
    assert_eq!(poller.pending(), 1);

    server.write_all(b"abc").unwrap();
    let completed = poller.wait_timeout(Some(Duration::from_secs(5))).unwrap();
    let completion = completed.pop().unwrap();
    assert_eq!(completion.token, Token::recv());
    assert_eq!(completion.result.unwrap(), 3);
    assert_eq!(completion.buf, b"abc");
    assert_eq!(poller.pending(), 0);
  }

  #[test]
  fn recv_reports_eof() {
    let (client, server) = pair();
    let mut poller = Poller::new(client.as_raw_fd()).unwrap();
    drop(server);

    poller.push(Token::recv(), Op::Recv { buf: Vec::with_capacity(64) }).unwrap();
    poller.flush().unwrap();

    let completed = poller.wait_timeout(Some(Duration::from_secs(5))).unwrap();
    let completion = completed.pop().unwrap();
    assert_eq!(completion.result.unwrap(), 0);
    assert!(completion.buf.is_empty());
  }
}
