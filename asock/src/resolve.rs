use std::{
  fmt,
  net::{Ipv4Addr, SocketAddr, SocketAddrV4, ToSocketAddrs},
};

use crate::{Error, Result};

/// A resolved, connectable IPv4 address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address(SocketAddrV4);

impl Address {
  pub const fn new(ip: Ipv4Addr, port: u16) -> Self {
    Self(SocketAddrV4::new(ip, port))
  }

  pub const fn ip(&self) -> &Ipv4Addr {
    self.0.ip()
  }

  pub const fn port(&self) -> u16 {
    self.0.port()
  }

  pub const fn as_socket_addr(&self) -> SocketAddrV4 {
    self.0
  }
}

impl From<SocketAddrV4> for Address {
  fn from(value: SocketAddrV4) -> Self {
    Self(value)
  }
}

impl fmt::Display for Address {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.0.fmt(f)
  }
}

/// Resolves `host` to the first IPv4 address it maps to.
///
/// Fails with [`Error::Resolution`] when the resolver itself fails and with
/// [`Error::NoIpv4Address`] when it succeeds without yielding an IPv4
/// candidate.
///
/// # Example
///
/// ```rust
/// let address = asock::resolve("127.0.0.1", 9000).unwrap();
/// assert_eq!(address.port(), 9000);
/// ```
pub fn resolve(host: &str, port: u16) -> Result<Address> {
  let candidates = (host, port)
    .to_socket_addrs()
    .map_err(|source| Error::Resolution { host: host.to_owned(), source })?;

  candidates
    .filter_map(|candidate| match candidate {
      SocketAddr::V4(v4) => Some(Address(v4)),
      SocketAddr::V6(_) => None,
    })
    .next()
    .ok_or_else(|| Error::NoIpv4Address { host: host.to_owned() })
}
