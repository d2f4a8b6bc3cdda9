//! Launcher/child rendezvous used while a supervised thread starts.
//!
//! The channel carries two words: an assignment state the launcher advances
//! once it has stored the native join handle, and an id slot the child fills
//! with its OS thread id. The id store is the last thing the child does with
//! the channel; [`ChildHalf::report_id`] consumes the half so nothing on the
//! child side can touch it afterwards. All acquire/release pairing stays in
//! this module.
//!
//! No mutex, condvar or semaphore is involved. Waits spin with backoff, which
//! is bounded in practice by the cost of a `gettid` call on the other side.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU8, Ordering};
use std::time::Duration;

/// Sentinel held by the id slot until the child reports.
pub(crate) const UNSET_TID: i64 = i64::MIN;

/// Placeholder id for a thread whose OS id could not be resolved.
pub const UNKNOWN_TID: i64 = -1;

const NOT_ASSIGNED: u8 = 0;
const ASSIGNED: u8 = 1;
const RUNNING: u8 = 2;

/// Observable position in the assignment state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AssignmentState {
	NotAssigned,
	Assigned,
	Running,
}

impl AssignmentState {
	fn from_raw(raw: u8) -> Self {
		match raw {
			NOT_ASSIGNED => Self::NotAssigned,
			ASSIGNED => Self::Assigned,
			_ => Self::Running,
		}
	}
}

#[derive(Debug)]
struct HandshakeCell {
	assignment: AtomicU8,
	child_tid: AtomicI64,
}

/// Creates a fresh channel in the `NotAssigned` state with an unset id slot.
pub(crate) fn channel() -> (LauncherHalf, ChildHalf) {
	let cell = Arc::new(HandshakeCell {
		assignment: AtomicU8::new(NOT_ASSIGNED),
		child_tid: AtomicI64::new(UNSET_TID),
	});
	(LauncherHalf { cell: Arc::clone(&cell) }, ChildHalf { cell, reported: false })
}

/// Side held by the thread calling `start`.
#[derive(Debug)]
pub(crate) struct LauncherHalf {
	cell: Arc<HandshakeCell>,
}

impl LauncherHalf {
	/// Lets the child past its first wait. Call once the join handle is stored.
	pub fn signal_assigned(&self) {
		self.cell.assignment.store(ASSIGNED, Ordering::Release);
	}

	/// Spins until the child reports its id.
	///
	/// Every write the child made before reporting is visible once this returns.
	pub fn wait_for_id(&self) -> i64 {
		let mut backoff = Backoff::new();
		loop {
			let tid = self.cell.child_tid.load(Ordering::Acquire);
			if tid != UNSET_TID {
				return tid;
			}
			backoff.snooze();
		}
	}

	pub fn state(&self) -> AssignmentState {
		AssignmentState::from_raw(self.cell.assignment.load(Ordering::Acquire))
	}
}

/// Side moved into the new thread.
#[derive(Debug)]
pub(crate) struct ChildHalf {
	cell: Arc<HandshakeCell>,
	reported: bool,
}

impl ChildHalf {
	/// Blocks until the launcher has assigned the join handle, then marks the
	/// channel `Running`.
	pub fn wait_assigned(&self) {
		spin_wait_until(&self.cell.assignment, ASSIGNED, RUNNING);
	}

	/// Publishes the OS id and gives up the channel.
	pub fn report_id(mut self, tid: i64) {
		debug_assert_ne!(tid, UNSET_TID, "reported the unset sentinel");
		self.cell.child_tid.store(tid, Ordering::Release);
		self.reported = true;
	}
}

impl Drop for ChildHalf {
	fn drop(&mut self) {
		if self.reported {
			return;
		}
		// Unblocks the launcher if the child unwinds before reporting.
		let _ = self
			.cell
			.child_tid
			.compare_exchange(UNSET_TID, UNKNOWN_TID, Ordering::Release, Ordering::Relaxed);
	}
}

/// Spins until `word == expected` (acquire), then stores `then_set` (release).
fn spin_wait_until(word: &AtomicU8, expected: u8, then_set: u8) {
	let mut backoff = Backoff::new();
	while word.load(Ordering::Acquire) != expected {
		backoff.snooze();
	}
	word.store(then_set, Ordering::Release);
}

const SPIN_LIMIT: u32 = 6;
const YIELD_LIMIT: u32 = 10;
const MAX_SLEEP: Duration = Duration::from_millis(1);

/// Escalating wait: CPU spin hints, then scheduler yields, then short sleeps.
#[derive(Debug, Default)]
struct Backoff {
	step: u32,
}

impl Backoff {
	fn new() -> Self {
		Self::default()
	}

	fn snooze(&mut self) {
		if self.step <= SPIN_LIMIT {
			for _ in 0..(1u32 << self.step) {
				std::hint::spin_loop();
			}
		} else if self.step <= YIELD_LIMIT {
			std::thread::yield_now();
		} else {
			let micros = 1u64 << (self.step - YIELD_LIMIT).min(10);
			std::thread::sleep(Duration::from_micros(micros).min(MAX_SLEEP));
		}
		self.step = self.step.saturating_add(1);
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::AtomicBool;
	use std::thread;

	use super::*;

	#[test]
	fn walks_the_state_machine() {
		let (launcher, child) = channel();
		assert_eq!(launcher.state(), AssignmentState::NotAssigned);

		let worker = thread::spawn(move || {
			child.wait_assigned();
			child.report_id(42);
		});

		launcher.signal_assigned();
		assert_eq!(launcher.wait_for_id(), 42);
		assert_eq!(launcher.state(), AssignmentState::Running);
		worker.join().unwrap();
	}

	#[test]
	fn child_waits_for_assignment() {
		let (launcher, child) = channel();
		let passed = Arc::new(AtomicBool::new(false));
		let passed_child = Arc::clone(&passed);

		let worker = thread::spawn(move || {
			child.wait_assigned();
			passed_child.store(true, Ordering::Relaxed);
			child.report_id(7);
		});

		thread::sleep(Duration::from_millis(20));
		assert!(!passed.load(Ordering::Relaxed), "child ran ahead of assignment");
		launcher.signal_assigned();
		assert_eq!(launcher.wait_for_id(), 7);
		worker.join().unwrap();
	}

	#[test]
	fn report_releases_the_cell() {
		let (launcher, child) = channel();
		launcher.signal_assigned();
		child.wait_assigned();
		child.report_id(11);
		assert_eq!(Arc::strong_count(&launcher.cell), 1);
		assert_eq!(launcher.wait_for_id(), 11);
		assert_eq!(launcher.state(), AssignmentState::Running);
	}

	#[test]
	fn dropped_child_releases_launcher() {
		let (launcher, child) = channel();
		let worker = thread::spawn(move || {
			let _child = child;
			panic!("child died before reporting");
		});
		launcher.signal_assigned();
		assert_eq!(launcher.wait_for_id(), UNKNOWN_TID);
		assert!(worker.join().is_err());
	}

	/// The canary is written with `Relaxed` before `report_id`; the launcher must
	/// still observe it once its wait returns, under scheduling jitter on both
	/// sides.
	#[test]
	fn report_happens_after_child_writes() {
		for round in 0..500u64 {
			let (launcher, child) = channel();
			let canary = Arc::new(AtomicBool::new(false));
			let canary_child = Arc::clone(&canary);

			let worker = thread::spawn(move || {
				child.wait_assigned();
				if round % 7 == 0 {
					thread::sleep(Duration::from_micros(round % 50));
				} else if round % 3 == 0 {
					thread::yield_now();
				}
				canary_child.store(true, Ordering::Relaxed);
				child.report_id(round as i64);
			});

			if round % 5 == 0 {
				thread::yield_now();
			}
			launcher.signal_assigned();
			let tid = launcher.wait_for_id();
			assert_eq!(tid, round as i64);
			assert!(canary.load(Ordering::Relaxed), "round {round}: id observed before canary");
			worker.join().unwrap();
		}
	}

	#[test]
	fn backoff_escalates_without_overflow() {
		let mut backoff = Backoff { step: u32::MAX - 1 };
		backoff.snooze();
		backoff.snooze();
		assert_eq!(backoff.step, u32::MAX);
	}
}
