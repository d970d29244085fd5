//! Time-bounded connection establishment.
//!
//! Both directions share one shape: issue the non-blocking call, park on a
//! [`Handshake`] until the socket signals or the bound elapses, then read the
//! socket's pending error to tell success from failure. No retries.

use std::net::{Ipv4Addr, SocketAddrV4};
use std::os::fd::AsRawFd;
use std::time::Duration;

use crate::sync::{Handshake, Interest};
use crate::{Address, Endpoint, EndpointConfig, Error, Result, Socket};

fn os_code(err: &std::io::Error) -> i32 {
  err.raw_os_error().unwrap_or(libc::EIO)
}

/// Waits for `interest` on `socket`, then returns its pending error code.
///
/// `Ok(None)` means the bound elapsed.
fn handshake(
  socket: &Socket,
  interest: Interest,
  timeout: Duration,
) -> Result<Option<i32>> {
  let mut handshake = Handshake::new(socket.as_raw_fd(), interest)
    .map_err(|err| Error::io("epoll_ctl", err))?;

  let fired =
    handshake.wait(timeout).map_err(|err| Error::io("epoll_wait", err))?;
  // Tear the registration down before the socket moves on.
  drop(handshake);

  match fired {
    None => Ok(None),
    Some(_) => socket.take_error().map(Some).map_err(|err| Error::io("getsockopt", err)),
  }
}

/// Connects to `address`, waiting at most `config.connect_timeout()`.
///
/// # Errors
///
/// - [`Error::ConnectTimeout`] when the handshake does not finish in time.
/// - [`Error::Connect`] with the OS code when the peer refuses or the
///   connect fails outright.
pub fn connect(address: &Address, config: &EndpointConfig) -> Result<Endpoint> {
  let socket = Socket::stream_v4().map_err(|err| Error::io("socket", err))?;

  match socket.connect(address.as_socket_addr()) {
    Ok(()) => {}
    Err(err) if err.raw_os_error() == Some(libc::EINPROGRESS) => {}
    Err(err) => return Err(Error::Connect(os_code(&err))),
  }

  match handshake(&socket, Interest::WRITE, config.connect_timeout())? {
    None => return Err(Error::ConnectTimeout(config.connect_timeout())),
    Some(0) => {}
    Some(code) => return Err(Error::Connect(code)),
  }

  tracing::info!(%address, "connected");
  Endpoint::new(socket, config.clone())
}

/// A loopback listening socket that accepts exactly one connection.
#[derive(Debug)]
pub struct Listener {
  socket: Socket,
}

impl Listener {
  /// Binds `127.0.0.1:port` with `SO_REUSEADDR` and starts listening.
  /// Port `0` picks a free port, see [`local_addr`](Self::local_addr).
  pub fn bind(port: u16) -> Result<Self> {
    let socket = Socket::stream_v4().map_err(|err| Error::io("socket", err))?;
    socket.set_reuse_address().map_err(|err| Error::io("setsockopt", err))?;
    socket
      .bind(SocketAddrV4::new(Ipv4Addr::LOCALHOST, port))
      .map_err(|err| Error::io("bind", err))?;
    socket.listen(libc::SOMAXCONN).map_err(|err| Error::io("listen", err))?;

    let listener = Self { socket };
    tracing::info!(address = %listener.local_addr()?, "listening");
    Ok(listener)
  }

  pub fn local_addr(&self) -> Result<Address> {
    self
      .socket
      .local_addr()
      .map(Address::from)
      .map_err(|err| Error::io("getsockname", err))
  }

  /// Waits at most `config.accept_timeout()` for one peer, accepts it and
  /// closes the listening socket.
  pub fn accept(mut self, config: &EndpointConfig) -> Result<Endpoint> {
    match handshake(&self.socket, Interest::READ, config.accept_timeout())? {
      None => return Err(Error::AcceptTimeout(config.accept_timeout())),
      Some(0) => {}
      Some(code) => return Err(Error::Accept(code)),
    }

    let socket = self.socket.accept().map_err(|err| Error::Accept(os_code(&err)))?;
    self.socket.close().map_err(|err| Error::io("close", err))?;

    match socket.local_addr() {
      Ok(local) => tracing::info!(%local, "accepted"),
      Err(_) => tracing::info!("accepted"),
    }
    Endpoint::new(socket, config.clone())
  }
}

/// Binds loopback `port` and accepts a single connection on it.
pub fn accept(port: u16, config: &EndpointConfig) -> Result<Endpoint> {
  Listener::bind(port)?.accept(config)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::{Read, Write};
  use std::net::TcpStream;
  use std::time::Instant;

  #[test]
  fn accept_times_out() {
    let config =
      EndpointConfig::default().with_accept_timeout(Duration::from_millis(50));
    let listener = Listener::bind(0).unwrap();

    let started = Instant::now();
    let err = listener.accept(&config).unwrap_err();
    assert!(matches!(err, Error::AcceptTimeout(t) if t == Duration::from_millis(50)));
    assert!(started.elapsed() >= Duration::from_millis(50));
  }

  #[test]
  fn accept_then_echo_with_std_client() {
    let config = EndpointConfig::default().with_accept_timeout(Duration::from_secs(5));
    let listener = Listener::bind(0).unwrap();
    let address = listener.local_addr().unwrap();

    let client = std::thread::spawn(move || {
      let mut stream = TcpStream::connect(address.as_socket_addr()).unwrap();
      stream.write_all(b"hi there").unwrap();
      stream.shutdown(std::net::Shutdown::Write).unwrap();
      let mut echoed = Vec::new();
      stream.read_to_end(&mut echoed).unwrap();
      echoed
    });

    let mut endpoint = listener.accept(&config).unwrap();
    let mut received = Vec::new();
    endpoint.recv(&mut received).unwrap();
    endpoint.send(&received).unwrap();
    endpoint.close().unwrap();

    assert_eq!(client.join().unwrap(), b"hi there");
  }

  #[test]
  fn connect_to_closed_port_fails() {
    // Grab a free port, then stop listening on it.
    let port = {
      let listener = Listener::bind(0).unwrap();
      listener.local_addr().unwrap().port()
    };

    let config =
      EndpointConfig::default().with_connect_timeout(Duration::from_secs(5));
    let err = connect(&Address::new(Ipv4Addr::LOCALHOST, port), &config).unwrap_err();
    assert!(
      matches!(err, Error::Connect(code) if code == libc::ECONNREFUSED)
        || matches!(err, Error::ConnectTimeout(_)),
      "unexpected error: {err:?}"
    );
  }
}
