//! Send side of an endpoint: the bounded queue of in-flight fragments.

use crate::op::Completion;
use crate::SEND_QUEUE_DEPTH;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum SlotState {
  #[default]
  Free,
  InFlight,
  Done,
}

#[derive(Debug, Default)]
struct Slot {
  state: SlotState,
  /// Buffer handed back by the last completion, reused for the next fragment.
  buf: Option<Vec<u8>>,
}

/// Circular queue of [`SEND_QUEUE_DEPTH`] slots.
///
/// `begin` is the oldest outstanding slot and `count` how many are
/// outstanding, so empty (`count == 0`) and full (`count == DEPTH`) never
/// look alike. `begin` only moves forward, one contiguous completed slot at
/// a time: a completion that arrives for a younger slot is recorded, but
/// its position is freed only after every older one has completed too.
#[derive(Debug, Default)]
pub(crate) struct SendQueue {
  slots: [Slot; SEND_QUEUE_DEPTH],
  begin: usize,
  count: usize,
}

impl SendQueue {
  pub fn len(&self) -> usize {
    self.count
  }

  pub fn is_empty(&self) -> bool {
    self.count == 0
  }

  pub fn is_full(&self) -> bool {
    self.count == SEND_QUEUE_DEPTH
  }

  pub fn begin(&self) -> usize {
    self.begin
  }

  pub fn end(&self) -> usize {
    (self.begin + self.count) % SEND_QUEUE_DEPTH
  }

  /// Claims the slot at `end`, with an empty buffer to fill.
  pub fn reserve(&mut self) -> Option<(usize, Vec<u8>)> {
    if self.is_full() {
      return None;
    }

    let index = self.end();
    let slot = &mut self.slots[index];
    assert_eq!(slot.state, SlotState::Free, "slot {index} reserved twice");

    slot.state = SlotState::InFlight;
    self.count += 1;

    let mut buf = slot.buf.take().unwrap_or_default();
    buf.clear();
    Some((index, buf))
  }

  /// Gives back the most recently reserved slot, whose send never got issued.
  pub fn rollback(&mut self) {
    assert!(!self.is_empty(), "rollback on an empty send queue");
    self.count -= 1;
    self.slots[self.end()].state = SlotState::Free;
  }

  /// Records the completion of `index`. Returns how many slots were freed.
  pub fn complete(&mut self, index: usize, buf: Vec<u8>) -> usize {
    let slot = &mut self.slots[index];
    assert_eq!(
      slot.state,
      SlotState::InFlight,
      "completion for slot {index} that is not in flight"
    );
    slot.state = SlotState::Done;
    slot.buf = Some(buf);

    let mut freed = 0;
    while self.count > 0 && self.slots[self.begin].state == SlotState::Done {
      self.slots[self.begin].state = SlotState::Free;
      self.begin = (self.begin + 1) % SEND_QUEUE_DEPTH;
      self.count -= 1;
      freed += 1;
    }
    freed
  }
}

#[derive(Debug, Default)]
pub(crate) struct SendState {
  pub queue: SendQueue,
  pub closed: bool,
  /// Error code of the first failed send, if any.
  pub error: Option<i32>,
  pub bytes_sent: u64,
}

impl SendState {
  pub fn on_send(&mut self, completion: Completion) {
    let code = completion.error_code();
    let Completion { token, result, buf } = completion;

    match result {
      Ok(n) => {
        self.bytes_sent += n as u64;
        self.queue.complete(token.slot(), buf);
        tracing::debug!(
          "sent {n} bytes queue {}:{}",
          self.queue.begin(),
          self.queue.end()
        );
      }
      Err(err) => {
        self.closed = true;
        self.error.get_or_insert(code);
        self.queue.complete(token.slot(), buf);
        tracing::warn!(error = %err, code, "send failed, closing send side");
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::Token;
  use std::io;

  fn fill(queue: &mut SendQueue) -> Vec<usize> {
    std::iter::from_fn(|| queue.reserve().map(|(index, _)| index)).collect()
  }

  #[test]
  fn empty_and_full_are_distinct() {
    let mut queue = SendQueue::default();
    assert!(queue.is_empty());
    assert!(!queue.is_full());
    assert_eq!(queue.begin(), queue.end());

    let slots = fill(&mut queue);
    assert_eq!(slots, (0..SEND_QUEUE_DEPTH).collect::<Vec<_>>());
    assert!(queue.is_full());
    assert!(!queue.is_empty());
    // begin == end again, yet the queue is full.
    assert_eq!(queue.begin(), queue.end());
    assert!(queue.reserve().is_none());
  }

  #[test]
  fn begin_never_skips() {
    let mut queue = SendQueue::default();
    fill(&mut queue);

    // Younger slots complete first: nothing is freed yet.
    assert_eq!(queue.complete(2, Vec::new()), 0);
    assert_eq!(queue.complete(1, Vec::new()), 0);
    assert_eq!(queue.begin(), 0);
    assert!(queue.is_full());

    // The oldest completes: it and the two behind it are freed in order.
    assert_eq!(queue.complete(0, Vec::new()), 3);
    assert_eq!(queue.begin(), 3);
    assert_eq!(queue.len(), SEND_QUEUE_DEPTH - 3);
  }

  #[test]
  fn wraps_around() {
    let mut queue = SendQueue::default();
    for round in 0..3 * SEND_QUEUE_DEPTH {
      let (index, buf) = queue.reserve().unwrap();
      assert_eq!(index, round % SEND_QUEUE_DEPTH);
      assert!(buf.is_empty());
      assert_eq!(queue.complete(index, vec![0; 16]), 1);
      assert!(queue.is_empty());
    }
  }

  #[test]
  fn reuses_returned_buffers() {
    let mut queue = SendQueue::default();
    let (index, mut buf) = queue.reserve().unwrap();
    buf.extend_from_slice(&[7; 64]);
    let capacity = buf.capacity();
    queue.complete(index, buf);

    // Walk the ring back to the same slot.
    for _ in 1..SEND_QUEUE_DEPTH {
      let (index, buf) = queue.reserve().unwrap();
      queue.complete(index, buf);
    }
    let (again, buf) = queue.reserve().unwrap();
    assert_eq!(again, index);
    assert!(buf.is_empty());
    assert_eq!(buf.capacity(), capacity);
  }

  #[test]
  fn rollback_frees_last_reservation() {
    let mut queue = SendQueue::default();
    queue.reserve().unwrap();
    let (second, _) = queue.reserve().unwrap();
    queue.rollback();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue.reserve().unwrap().0, second);
  }

  #[test]
  fn failed_completion_closes_and_keeps_first_code() {
    let mut state = SendState::default();
    let (first, _) = state.queue.reserve().unwrap();
    let (second, _) = state.queue.reserve().unwrap();

    state.on_send(Completion {
      token: Token::send(first),
      result: Err(io::Error::from_raw_os_error(libc::EPIPE)),
      buf: Vec::new(),
    });
    state.on_send(Completion {
      token: Token::send(second),
      result: Err(io::Error::from_raw_os_error(libc::ECONNRESET)),
      buf: Vec::new(),
    });

    assert!(state.closed);
    assert_eq!(state.error, Some(libc::EPIPE));
    assert!(state.queue.is_empty());
    assert_eq!(state.bytes_sent, 0);
  }
}
