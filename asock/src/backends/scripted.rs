//! Scripted IoBackend for testing purposes
//!
//! Nothing touches the OS. Sends "succeed" (or fail, if told to) when a wait
//! completes them, receives are answered from a queue of canned deliveries,
//! and every issued fragment is recorded so tests can inspect what the
//! endpoint put on the wire and in which order.

use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use crate::backends::IoBackend;
use crate::op::{Completion, Op, OpKind};
use crate::Token;

#[derive(Default)]
pub struct ScriptedBackend {
  staged: Vec<(Token, Op)>,
  /// Issued operations with their index into `sent` (sends only).
  in_flight: VecDeque<(Token, Op, usize)>,
  completed: Vec<Completion>,

  /// Fragments in the order they were issued.
  pub sent: Vec<Vec<u8>>,
  /// Tokens in the order their completions were delivered.
  pub completion_order: Vec<Token>,
  /// Largest number of sends in flight at once.
  pub max_in_flight: usize,
  /// Number of waits that had something to complete.
  pub waits: usize,

  per_wait: Option<usize>,
  newest_first: bool,
  stall_next_wait: bool,
  fail_sends: Option<(usize, i32)>,
  deliveries: VecDeque<io::Result<Vec<u8>>>,
}

impl ScriptedBackend {
  pub fn new() -> Self {
    Self::default()
  }

  /// Completes at most `n` operations per wait.
  pub fn per_wait(mut self, n: usize) -> Self {
    assert!(n > 0);
    self.per_wait = Some(n);
    self
  }

  /// Completes the most recently issued operations first.
  pub fn newest_first(mut self) -> Self {
    self.newest_first = true;
    self
  }

  /// The next wait returns nothing, as if the timeout elapsed.
  pub fn stall_next_wait(mut self) -> Self {
    self.stall_next_wait = true;
    self
  }

  /// Every send issued after the first `after` fails with `code`.
  pub fn fail_sends_after(mut self, after: usize, code: i32) -> Self {
    self.fail_sends = Some((after, code));
    self
  }

  /// Queues a successful receive. Once the queue is empty receives see EOF.
  pub fn deliver(mut self, bytes: &[u8]) -> Self {
    self.deliveries.push_back(Ok(bytes.to_vec()));
    self
  }

  /// Queues a failed receive.
  pub fn deliver_error(mut self, code: i32) -> Self {
    self.deliveries.push_back(Err(io::Error::from_raw_os_error(code)));
    self
  }

  pub fn sends_in_flight(&self) -> usize {
    self.in_flight.iter().filter(|(token, ..)| token.kind() == OpKind::Send).count()
  }

  fn complete(&mut self, token: Token, op: Op, index: usize) -> Completion {
    match op {
      Op::Send { buf } => {
        let result = match self.fail_sends {
          Some((after, code)) if index >= after => {
            Err(io::Error::from_raw_os_error(code))
          }
          _ => Ok(buf.len()),
        };
        Completion { token, result, buf }
      }
      Op::Recv { mut buf } => {
        let result = match self.deliveries.pop_front() {
          None => Ok(0),
          Some(Err(err)) => Err(err),
          Some(Ok(mut bytes)) => {
            let room = buf.capacity() - buf.len();
            if bytes.len() > room {
              let rest = bytes.split_off(room);
              self.deliveries.push_front(Ok(rest));
            }
            buf.extend_from_slice(&bytes);
            Ok(bytes.len())
          }
        };
        Completion { token, result, buf }
      }
    }
  }
}

impl IoBackend for ScriptedBackend {
  fn push(&mut self, token: Token, op: Op) -> io::Result<()> {
    self.staged.push((token, op));
    Ok(())
  }

  fn flush(&mut self) -> io::Result<usize> {
    let issued = self.staged.len();
    for (token, op) in std::mem::take(&mut self.staged) {
      let index = self.sent.len();
      if let Op::Send { buf } = &op {
        self.sent.push(buf.clone());
      }
      self.in_flight.push_back((token, op, index));
    }
    self.max_in_flight = self.max_in_flight.max(self.sends_in_flight());
    Ok(issued)
  }

  fn wait_timeout(
    &mut self,
    _timeout: Option<Duration>,
  ) -> io::Result<&mut Vec<Completion>> {
    if std::mem::take(&mut self.stall_next_wait) {
      return Ok(&mut self.completed);
    }
    if !self.completed.is_empty() || self.in_flight.is_empty() {
      return Ok(&mut self.completed);
    }

    self.waits += 1;
    let budget = self.per_wait.unwrap_or(usize::MAX);
    for _ in 0..budget {
      let next = if self.newest_first {
        self.in_flight.pop_back()
      } else {
        self.in_flight.pop_front()
      };
      let Some((token, op, index)) = next else { break };

      let completion = self.complete(token, op, index);
      self.completion_order.push(completion.token);
      self.completed.push(completion);
    }

    Ok(&mut self.completed)
  }
}
