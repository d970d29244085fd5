use asock::{EndpointConfig, Result};

use crate::request::{get_request, post_request};
use crate::url::{extract_file, extract_host, extract_path, split_host_port};

/// Raw bytes the server sent back, headers included, and the file name
/// derived from the request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
  pub file_name: String,
  pub body: Vec<u8>,
}

/// Sends a GET for `url` and reads the response until the server closes.
pub fn fetch(url: &str, config: &EndpointConfig) -> Result<Response> {
  exchange(url, config, get_request)
}

/// POSTs `data=` followed by `content` to `url`.
pub fn post(url: &str, content: &[u8], config: &EndpointConfig) -> Result<Response> {
  exchange(url, config, |host, path| post_request(host, path, content))
}

fn exchange(
  url: &str,
  config: &EndpointConfig,
  build: impl FnOnce(&str, &str) -> Vec<u8>,
) -> Result<Response> {
  let host = extract_host(url);
  let path = extract_path(url);
  tracing::info!(host, path, "request");

  let (name, port) = split_host_port(host);
  let address = asock::resolve(name, port)?;
  let request = build(host, path);

  let mut endpoint = asock::connect(&address, config)?;
  endpoint.send(&request)?;

  let mut body = Vec::new();
  endpoint.recv(&mut body)?;
  if let Some(err) = endpoint.recv_error() {
    tracing::warn!(error = %err, received = body.len(), "response cut short");
  }
  endpoint.close()?;

  Ok(Response { file_name: extract_file(path).to_owned(), body })
}
