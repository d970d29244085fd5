//! A connected TCP endpoint: send pipeline and receive loop.
//!
//! All state lives on the endpoint and is only touched by the thread that
//! owns it. Completions are dispatched from inside [`Endpoint`]'s waits,
//! the only place the backend hands them out, so the send queue and the
//! receive flags need no locking.

use std::os::fd::AsRawFd;
use std::time::Duration;

use crate::backends::{IoBackend, Poller};
use crate::op::{Op, OpKind, Token};
use crate::recv::RecvState;
use crate::send::SendState;
use crate::{EndpointConfig, Error, Result, Socket};

/// Owns one connected socket and the operations in flight on it.
///
/// Dropping the endpoint releases the socket; so does [`close`](Self::close),
/// after which drop has nothing left to release.
pub struct Endpoint<B: IoBackend = Poller> {
  // Declared before `socket`: the backend deregisters before the fd closes.
  backend: B,
  socket: Socket,
  config: EndpointConfig,
  send: SendState,
  recv: RecvState,
}

impl Endpoint<Poller> {
  /// Wraps a connected, non-blocking socket.
  pub fn new(socket: Socket, config: EndpointConfig) -> Result<Self> {
    let backend = Poller::new(socket.as_raw_fd())
      .map_err(|err| Error::io("epoll_create1", err))?;
    Ok(Self::from_parts(socket, backend, config))
  }
}

impl<B: IoBackend> Endpoint<B> {
  pub(crate) fn from_parts(socket: Socket, backend: B, config: EndpointConfig) -> Self {
    Self {
      backend,
      socket,
      config,
      send: SendState::default(),
      recv: RecvState::default(),
    }
  }

  /// Hands all of `data` to the transport.
  ///
  /// `data` is cut into fragments of at most `chunk_size` bytes, each issued
  /// through a free slot of the send queue. When all slots are taken the
  /// call parks until a completion frees one. Returns once every fragment
  /// has completed, or with the error that closed the send side.
  ///
  /// A receive left pending by an earlier [`recv`](Self::recv) may complete
  /// while this call waits. Its bytes are kept and handed out first by the
  /// next `recv`.
  pub fn send(&mut self, data: &[u8]) -> Result<()> {
    self.send_result()?;

    let mut rest = data;
    while !rest.is_empty() && !self.send.closed {
      let Some((slot, mut buf)) = self.send.queue.reserve() else {
        self.wait_for_completion(None)?;
        continue;
      };

      let (chunk, tail) = rest.split_at(rest.len().min(self.config.chunk_size()));
      buf.extend_from_slice(chunk);

      if let Err(err) = self.backend.push(Token::send(slot), Op::Send { buf }) {
        self.send.queue.rollback();
        return Err(Error::io("send", err));
      }
      self.backend.flush().map_err(|err| Error::io("send", err))?;
      rest = tail;
    }

    // Drain: every issued fragment completes before we report.
    while !self.send.queue.is_empty() {
      self.wait_for_completion(None)?;
    }

    self.send_result()
  }

  /// Receives until the peer closes or the receive side fails, appending
  /// every delivered byte to `sink` in arrival order.
  ///
  /// Bytes that arrived during an earlier [`send`](Self::send) are appended
  /// first. Returns the number of bytes appended. End of stream and transport
  /// errors both end the loop normally; the latter is kept in
  /// [`recv_error`](Self::recv_error).
  pub fn recv(&mut self, sink: &mut Vec<u8>) -> Result<usize> {
    let start = sink.len();
    sink.append(&mut self.recv.backlog);

    while !self.recv.closed {
      if !self.recv.pending {
        let buf = self.recv.take_scratch(self.config.recv_buffer_size());
        self
          .backend
          .push(Token::recv(), Op::Recv { buf })
          .map_err(|err| Error::io("recv", err))?;
        self.recv.pending = true;
        self.recv.done.reset();
        self.backend.flush().map_err(|err| Error::io("recv", err))?;
      }

      while !self.recv.done.is_set() {
        self.wait_for_completion(Some(&mut *sink))?;
      }
    }

    Ok(sink.len() - start)
  }

  /// Half-closes the connection: the peer sees end of stream, and this
  /// endpoint refuses further sends.
  pub fn shutdown_send(&mut self) -> Result<()> {
    self.send.closed = true;
    self.socket.shutdown_write().map_err(|err| Error::io("shutdown", err))
  }

  /// Closes both directions and releases the socket. Repeat calls do nothing.
  pub fn close(&mut self) -> Result<()> {
    self.send.closed = true;
    self.recv.closed = true;
    self.socket.close().map_err(|err| Error::io("close", err))
  }

  pub fn is_open(&self) -> bool {
    self.socket.is_open()
  }

  /// The transport error that ended the last receive loop, if any.
  pub fn recv_error(&self) -> Option<Error> {
    self.recv.error.map(Error::Transport)
  }

  pub fn bytes_sent(&self) -> u64 {
    self.send.bytes_sent
  }

  pub fn bytes_received(&self) -> u64 {
    self.recv.bytes_received
  }

  /// Operations issued and not yet completed.
  pub fn in_flight(&self) -> usize {
    self.send.queue.len() + usize::from(self.recv.pending)
  }

  pub fn config(&self) -> &EndpointConfig {
    &self.config
  }

  pub fn backend(&self) -> &B {
    &self.backend
  }

  fn send_result(&self) -> Result<()> {
    match (self.send.closed, self.send.error) {
      (_, Some(code)) => Err(Error::Transport(code)),
      (true, None) => Err(Error::SendClosed),
      (false, None) => Ok(()),
    }
  }

  /// Parks until the backend delivers completions, then dispatches them.
  fn wait_for_completion(&mut self, mut sink: Option<&mut Vec<u8>>) -> Result<()> {
    let timeout = self.config.io_timeout();
    let completions =
      self.backend.wait_timeout(timeout).map_err(|err| Error::io("epoll_wait", err))?;

    if completions.is_empty() {
      return Err(Error::Stalled(timeout.unwrap_or(Duration::ZERO)));
    }

    for completion in completions.drain(..) {
      match completion.token.kind() {
        OpKind::Send => self.send.on_send(completion),
        OpKind::Recv => self.recv.on_recv(completion, sink.as_deref_mut()),
      }
    }
    Ok(())
  }
}

impl<B: IoBackend> std::fmt::Debug for Endpoint<B> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Endpoint")
      .field("socket", &self.socket)
      .field("in_flight", &self.in_flight())
      .field("send_closed", &self.send.closed)
      .field("recv_closed", &self.recv.closed)
      .finish()
  }
}
