use std::cell::Cell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_IDENTITY: AtomicU64 = AtomicU64::new(1);

thread_local! {
	static CURRENT: Cell<Option<ThreadIdentity>> = const { Cell::new(None) };
}

/// Logical identity of one supervised execution.
///
/// Allocated from a process-wide monotonic clock, so it is available before the
/// OS thread id is known and is never recycled within a process run, unlike
/// kernel thread ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadIdentity(u64);

impl ThreadIdentity {
	/// Allocates the next identity. Never returns the same value twice.
	pub fn allocate() -> Self {
		Self(NEXT_IDENTITY.fetch_add(1, Ordering::Relaxed))
	}

	/// Returns the raw identity value.
	pub const fn get(self) -> u64 {
		self.0
	}
}

impl fmt::Display for ThreadIdentity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "#{}", self.0)
	}
}

/// Identity of the calling thread, if it is running under supervision.
pub fn current_identity() -> Option<ThreadIdentity> {
	CURRENT.with(Cell::get)
}

/// Binds `identity` to the calling thread until the guard drops.
pub(crate) fn bind_current(identity: ThreadIdentity) -> CurrentGuard {
	let previous = CURRENT.with(|c| c.replace(Some(identity)));
	CurrentGuard { previous }
}

pub(crate) struct CurrentGuard {
	previous: Option<ThreadIdentity>,
}

impl Drop for CurrentGuard {
	fn drop(&mut self) {
		CURRENT.with(|c| c.set(self.previous));
	}
}

#[cfg(test)]
mod tests {
	use std::collections::HashSet;

	use super::*;

	#[test]
	fn identities_are_unique_across_threads() {
		let handles: Vec<_> = (0..8)
			.map(|_| std::thread::spawn(|| (0..256).map(|_| ThreadIdentity::allocate()).collect::<Vec<_>>()))
			.collect();
		let mut seen = HashSet::new();
		for handle in handles {
			for id in handle.join().unwrap() {
				assert!(seen.insert(id), "identity {id} handed out twice");
			}
		}
	}

	#[test]
	fn bind_restores_previous() {
		assert_eq!(current_identity(), None);
		let outer = ThreadIdentity::allocate();
		let inner = ThreadIdentity::allocate();
		{
			let _outer = bind_current(outer);
			{
				let _inner = bind_current(inner);
				assert_eq!(current_identity(), Some(inner));
			}
			assert_eq!(current_identity(), Some(outer));
		}
		assert_eq!(current_identity(), None);
	}
}
