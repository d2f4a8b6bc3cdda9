use std::sync::atomic::{AtomicU64, Ordering};

/// Gate for log statements that fire on hot or failure-prone paths.
///
/// Opens on the first occurrence and then on every `n`th one after it.
#[derive(Debug)]
pub(crate) struct EveryN {
	n: u64,
	seen: AtomicU64,
}

impl EveryN {
	pub const fn new(n: u64) -> Self {
		Self {
			n: if n == 0 { 1 } else { n },
			seen: AtomicU64::new(0),
		}
	}

	/// Records one occurrence, returning `true` when it should be logged.
	pub fn tick(&self) -> bool {
		self.seen.fetch_add(1, Ordering::Relaxed) % self.n == 0
	}

	/// Total occurrences recorded so far.
	pub fn occurrences(&self) -> u64 {
		self.seen.load(Ordering::Relaxed)
	}
}
