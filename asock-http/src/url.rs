//! Minimal URL slicing for `http://host[:port]/path` strings.
//!
//! No validation and no percent-decoding: the pieces are cut out of the
//! text as written.

const SCHEME: &str = "http://";
const DEFAULT_PORT: u16 = 80;

/// Text after an optional `http://`.
fn after_scheme(url: &str) -> &str {
  match url.find(SCHEME) {
    Some(at) => &url[at + SCHEME.len()..],
    None => url,
  }
}

/// Everything between the scheme and the first `/` (the port included).
pub fn extract_host(url: &str) -> &str {
  let rest = after_scheme(url);
  match rest.find('/') {
    Some(slash) => &rest[..slash],
    None => rest,
  }
}

/// Everything from the first `/` after the host, `"/"` when there is none.
pub fn extract_path(url: &str) -> &str {
  let rest = after_scheme(url);
  match rest.find('/') {
    Some(slash) => &rest[slash..],
    None => "/",
  }
}

/// Last segment of `path`, `"index.html"` when that segment is empty.
pub fn extract_file(path: &str) -> &str {
  let name = match path.rfind('/') {
    Some(slash) => &path[slash + 1..],
    None => path,
  };
  if name.is_empty() { "index.html" } else { name }
}

/// Splits an optional `:port` off `host`; the port defaults to 80.
///
/// A suffix that does not parse as a port is kept as part of the name.
pub fn split_host_port(host: &str) -> (&str, u16) {
  match host.rsplit_once(':') {
    Some((name, port)) => match port.parse() {
      Ok(port) => (name, port),
      Err(_) => (host, DEFAULT_PORT),
    },
    None => (host, DEFAULT_PORT),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn host_and_path() {
    assert_eq!(extract_host("http://example.com/a/b"), "example.com");
    assert_eq!(extract_path("http://example.com/a/b"), "/a/b");

    assert_eq!(extract_host("http://example.com"), "example.com");
    assert_eq!(extract_path("http://example.com"), "/");

    assert_eq!(extract_host("example.com:8080/x?y=1"), "example.com:8080");
    assert_eq!(extract_path("example.com:8080/x?y=1"), "/x?y=1");
  }

  #[test]
  fn file_names() {
    assert_eq!(extract_file("/"), "index.html");
    assert_eq!(extract_file(""), "index.html");
    assert_eq!(extract_file("/a/b/"), "index.html");
    assert_eq!(extract_file("/a/b/report.pdf"), "report.pdf");
    assert_eq!(extract_file("report.pdf"), "report.pdf");
  }

  #[test]
  fn host_port() {
    assert_eq!(split_host_port("example.com"), ("example.com", 80));
    assert_eq!(split_host_port("127.0.0.1:9000"), ("127.0.0.1", 9000));
    assert_eq!(split_host_port("example.com:http"), ("example.com:http", 80));
  }
}
