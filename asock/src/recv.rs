use crate::op::Completion;
use crate::sync::Signal;

/// Receive side of an endpoint.
#[derive(Debug, Default)]
pub(crate) struct RecvState {
  /// Scratch buffer, parked here between receives.
  scratch: Option<Vec<u8>>,
  /// A receive is issued and not yet completed.
  pub pending: bool,
  pub closed: bool,
  pub done: Signal,
  pub error: Option<i32>,
  pub bytes_received: u64,
  /// Bytes that arrived while nobody was receiving, handed to the next
  /// receive loop before anything else.
  pub backlog: Vec<u8>,
}

impl RecvState {
  /// Hands out the scratch buffer, emptied, with room for `size` bytes.
  pub fn take_scratch(&mut self, size: usize) -> Vec<u8> {
    let mut buf = self.scratch.take().unwrap_or_default();
    buf.clear();
    buf.reserve_exact(size);
    buf
  }

  /// Appends delivered bytes to `sink`, or to the backlog when no receive
  /// loop is running, and signals the waiting loop. Zero bytes or an error
  /// close the side.
  pub fn on_recv(&mut self, completion: Completion, sink: Option<&mut Vec<u8>>) {
    let code = completion.error_code();
    let Completion { result, buf, .. } = completion;

    match result {
      Ok(0) => {
        self.closed = true;
        tracing::debug!(total = self.bytes_received, "peer closed, receive side closed");
      }
      Ok(n) => {
        self.bytes_received += n as u64;
        match sink {
          Some(sink) => sink.extend_from_slice(&buf[..n]),
          None => self.backlog.extend_from_slice(&buf[..n]),
        }
        tracing::debug!("received {n} bytes");
      }
      Err(err) => {
        self.closed = true;
        self.error.get_or_insert(code);
        tracing::warn!(error = %err, code, "receive failed, receive side closed");
      }
    }

    self.scratch = Some(buf);
    self.pending = false;
    self.done.set();
  }
}
