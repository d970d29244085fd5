use std::{
  mem,
  net::{Ipv4Addr, SocketAddrV4},
};

pub(crate) const SOCKADDR_IN_LEN: libc::socklen_t =
  mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;

pub(crate) fn into_sockaddr_in(addr: SocketAddrV4) -> libc::sockaddr_in {
  // SAFETY: sockaddr_in is a C struct with primitive integer fields.
  // Zero-initialization is safe - all fields accept zero as a valid value.
  let mut raw: libc::sockaddr_in = unsafe { mem::zeroed() };

  raw.sin_family = libc::AF_INET as libc::sa_family_t;
  raw.sin_port = addr.port().to_be();
  raw.sin_addr = libc::in_addr { s_addr: u32::from(*addr.ip()).to_be() };

  raw
}

pub(crate) fn from_sockaddr_in(raw: &libc::sockaddr_in) -> SocketAddrV4 {
  // `s_addr` is a u32 in network byte order.
  let ip = Ipv4Addr::from(u32::from_be(raw.sin_addr.s_addr));
  SocketAddrV4::new(ip, u16::from_be(raw.sin_port))
}
