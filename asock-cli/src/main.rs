//! asock - fetch, post and echo over asock endpoints.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use asock::EndpointConfig;
use asock_http::Response;
use tracing_subscriber::EnvFilter;

#[derive(Debug, PartialEq, Eq)]
enum Command {
  Client(u16),
  Server(u16),
  Get(String),
  Post { url: String, file: PathBuf },
  Help,
}

#[derive(Debug, PartialEq, Eq)]
struct Invocation {
  timeout: Option<Duration>,
  command: Command,
}

impl Invocation {
  fn config(&self) -> EndpointConfig {
    match self.timeout {
      Some(timeout) => EndpointConfig::default().with_handshake_timeout(timeout),
      None => EndpointConfig::default(),
    }
  }
}

fn print_usage() {
  println!("Usage: asock [--timeout <secs>] <command>");
  println!();
  println!("Commands:");
  println!("  client <port>        Client mode (placeholder)");
  println!("  server <port>        Accept one peer on 127.0.0.1:<port> and echo it");
  println!("  get <url>            GET <url>, save the response");
  println!("  post <url> <file>    POST data=<file contents> to <url>, save the response");
  println!();
  println!("Options:");
  println!("  --timeout <secs>     Connect/accept timeout (default: 60)");
  println!();
  println!("Logging is controlled by RUST_LOG (default: info).");
}

fn parse_port(value: &str) -> Result<u16> {
  value.parse().with_context(|| format!("invalid port `{value}`"))
}

/// `Ok(None)` means "print usage and fail".
fn parse(args: &[String]) -> Result<Option<Invocation>> {
  let mut timeout = None;
  let mut remaining: Vec<&str> = Vec::new();

  let mut i = 0;
  while i < args.len() {
    if args[i] == "--timeout" {
      i += 1;
      let secs: u64 = args
        .get(i)
        .context("--timeout requires a value")?
        .parse()
        .context("--timeout must be a number of seconds")?;
      if secs == 0 {
        bail!("--timeout must be at least one second");
      }
      timeout = Some(Duration::from_secs(secs));
    } else {
      remaining.push(&args[i]);
    }
    i += 1;
  }

  let command = match remaining.as_slice() {
    ["client", port] => Command::Client(parse_port(port)?),
    ["server", port] => Command::Server(parse_port(port)?),
    ["get", url] => Command::Get((*url).to_owned()),
    ["post", url, file] => {
      Command::Post { url: (*url).to_owned(), file: PathBuf::from(*file) }
    }
    ["help"] | ["--help"] | ["-h"] => Command::Help,
    _ => return Ok(None),
  };

  Ok(Some(Invocation { timeout, command }))
}

// ── Subcommand handlers ───────────────────────────────────────────────────────

fn cmd_client(port: u16) -> Result<()> {
  tracing::info!(port, "client mode has nothing to do yet");
  Ok(())
}

fn cmd_server(port: u16, config: &EndpointConfig) -> Result<()> {
  let mut endpoint = asock::accept(port, config)
    .with_context(|| format!("failed to accept a peer on port {port}"))?;

  let mut request = Vec::new();
  endpoint.recv(&mut request).context("failed to receive")?;
  if let Some(err) = endpoint.recv_error() {
    tracing::warn!(error = %err, "peer connection failed while receiving");
  }

  endpoint.send(&request).context("failed to echo")?;
  endpoint.close().context("failed to close")?;

  tracing::info!(bytes = request.len(), "echoed");
  Ok(())
}

fn cmd_get(url: &str, config: &EndpointConfig) -> Result<()> {
  let response =
    asock_http::fetch(url, config).with_context(|| format!("GET {url} failed"))?;
  report(persist(&response, Path::new("."))?);
  Ok(())
}

fn cmd_post(url: &str, file: &Path, config: &EndpointConfig) -> Result<()> {
  let content = std::fs::read(file)
    .with_context(|| format!("failed to read {}", file.display()))?;
  let response = asock_http::post(url, &content, config)
    .with_context(|| format!("POST {url} failed"))?;
  report(persist(&response, Path::new("."))?);
  Ok(())
}

/// Writes a non-empty response verbatim to its file name under `dir`.
///
/// Returns the written path, `None` for an empty body.
fn persist(response: &Response, dir: &Path) -> Result<Option<PathBuf>> {
  if response.body.is_empty() {
    tracing::info!("empty response, nothing written");
    return Ok(None);
  }

  let path = dir.join(&response.file_name);
  std::fs::write(&path, &response.body)
    .with_context(|| format!("failed to write {}", path.display()))?;
  tracing::info!(path = %path.display(), bytes = response.body.len(), "response saved");
  Ok(Some(path))
}

fn report(written: Option<PathBuf>) {
  if let Some(path) = written {
    println!("{}", path.display());
  }
}

fn run(invocation: &Invocation) -> Result<()> {
  let config = invocation.config();

  match &invocation.command {
    Command::Client(port) => cmd_client(*port),
    Command::Server(port) => cmd_server(*port, &config),
    Command::Get(url) => cmd_get(url, &config),
    Command::Post { url, file } => cmd_post(url, file, &config),
    Command::Help => {
      print_usage();
      Ok(())
    }
  }
}

/// OS error code of the first socket error in the chain, `0` if none.
fn os_code(err: &anyhow::Error) -> i32 {
  err
    .chain()
    .find_map(|cause| cause.downcast_ref::<asock::Error>())
    .map_or(0, asock::Error::os_code)
}

fn main() -> ExitCode {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    )
    .init();

  let args: Vec<String> = std::env::args().skip(1).collect();

  let invocation = match parse(&args) {
    Ok(Some(invocation)) => invocation,
    Ok(None) => {
      print_usage();
      return ExitCode::from(1);
    }
    Err(err) => {
      eprintln!("error: {err:#}");
      eprintln!();
      print_usage();
      return ExitCode::from(1);
    }
  };

  match run(&invocation) {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      let message = format!("{err:#}");
      tracing::error!(error = %message, os_code = os_code(&err), "command failed");
      ExitCode::from(2)
    }
  }
}
