/// Prefix written in front of every POST body. It counts towards
/// `Content-Length`.
pub const POST_BODY_PREFIX: &[u8] = b"data=";

/// `GET {path} HTTP/1.1` with `Host` and `Connection: close`.
pub fn get_request(host: &str, path: &str) -> Vec<u8> {
  format!("GET {path} HTTP/1.1\r\nHost: {host}\r\nConnection: close\r\n\r\n")
    .into_bytes()
}

/// `POST {path} HTTP/1.1` carrying `data=` followed by `content` verbatim.
pub fn post_request(host: &str, path: &str, content: &[u8]) -> Vec<u8> {
  let length = POST_BODY_PREFIX.len() + content.len();
  let mut request = format!(
    "POST {path} HTTP/1.1\r\nHost: {host}\r\nConnection: close\r\nContent-Length: {length}\r\n\r\n"
  )
  .into_bytes();

  request.reserve(length);
  request.extend_from_slice(POST_BODY_PREFIX);
  request.extend_from_slice(content);
  request
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn get() {
    assert_eq!(
      get_request("example.com", "/"),
      b"GET / HTTP/1.1\r\nHost: example.com\r\nConnection: close\r\n\r\n"
    );
  }

  #[test]
  fn post_counts_prefix() {
    let request = post_request("h", "/submit", b"a b\n");
    let text = String::from_utf8(request).unwrap();

    assert!(text.starts_with("POST /submit HTTP/1.1\r\nHost: h\r\n"));
    assert!(text.contains("Content-Length: 9\r\n"));
    assert!(text.ends_with("\r\n\r\ndata=a b\n"));
  }

  #[test]
  fn post_empty_and_binary_content() {
    let request = post_request("h", "/", &[]);
    assert!(request.ends_with(b"Content-Length: 5\r\n\r\ndata="));

    let request = post_request("h", "/", &[0, 255, 13, 10]);
    assert!(request.ends_with(&[b'=', 0, 255, 13, 10]));
  }
}
