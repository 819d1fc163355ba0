use super::*;

/// Upper bound on the capacity exponent, keeping a single ring below 16 MiB.
const MAX_LEVELS: u32 = 22;

/// Lock-free bounded history of recently executed line numbers.
///
/// The instrumented thread overwrites the oldest slot once the ring is full;
/// readers copy the current window out without coordinating with the writer.
/// A reader racing an in-flight append may miss or double-count the newest
/// entry, which the visualization tolerates.
#[derive(Debug)]
pub struct LineHistory {
  cursor: AtomicU64,
  slots: Box<[AtomicU32]>,
}

impl LineHistory {
  #[must_use]
  pub fn capacity(&self) -> usize {
    self.slots.len()
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.cursor.load(Ordering::Acquire) == 0
  }

  /// Number of entries currently held, never more than the capacity.
  #[must_use]
  pub fn len(&self) -> usize {
    let pushed = self.cursor.load(Ordering::Acquire);
    let capacity = self.slots.len() as u64;
    usize::try_from(pushed.min(capacity)).unwrap_or(usize::MAX)
  }

  /// Create a ring holding the last `2^levels` entries.
  #[must_use]
  pub fn new(levels: u32) -> Self {
    let capacity = 1_usize << levels.min(MAX_LEVELS);

    Self {
      cursor: AtomicU64::new(0),
      slots: (0..capacity).map(|_| AtomicU32::new(0)).collect(),
    }
  }

  /// Append a line number, evicting the oldest entry when at capacity.
  pub fn push(&self, lineno: u32) {
    let ticket = self.cursor.fetch_add(1, Ordering::AcqRel);
    let index = (ticket % self.slots.len() as u64) as usize;
    self.slots[index].store(lineno, Ordering::Release);
  }

  /// Copy the current window out, oldest entry first.
  #[must_use]
  pub fn recent(&self) -> Vec<u32> {
    let pushed = self.cursor.load(Ordering::Acquire);
    let capacity = self.slots.len() as u64;
    let start = pushed.saturating_sub(capacity);

    (start..pushed)
      .map(|ticket| {
        let index = (ticket % capacity) as usize;
        self.slots[index].load(Ordering::Acquire)
      })
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_ring_has_no_entries() {
    let history = LineHistory::new(3);

    assert!(history.is_empty());
    assert_eq!(history.len(), 0);
    assert_eq!(history.recent(), Vec::<u32>::new());
  }

  #[test]
  fn length_never_exceeds_capacity() {
    let history = LineHistory::new(2);

    for lineno in 1..=20 {
      history.push(lineno);
      assert!(history.len() <= history.capacity());
    }

    assert_eq!(history.len(), 4);
  }

  #[test]
  fn evicts_oldest_entries_in_order() {
    // levels = 1 gives capacity 2.
    let history = LineHistory::new(1);

    history.push(10);
    history.push(10);
    history.push(20);

    assert_eq!(history.recent(), vec![10, 20]);
  }

  #[test]
  fn recent_preserves_append_order() {
    let history = LineHistory::new(3);

    for lineno in [5, 7, 5, 9] {
      history.push(lineno);
    }

    assert_eq!(history.recent(), vec![5, 7, 5, 9]);
  }
}
