//! Supervised OS threads.
//!
//! A [`SupervisedThread`] runs one work function on one dedicated native
//! thread. Starting it performs a handshake with the new thread so that
//! `start` returns only once the child has taken ownership of everything it
//! was handed and has published its OS thread id. The child registers with
//! the [`ThreadRegistry`] before running the work function and deregisters
//! after it, holding its own registry handle throughout so the registry
//! outlives the thread even if the process-wide handle has been released.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread::JoinHandle;

use crate::error::{Result, ThreadError};
use crate::handshake::{self, AssignmentState, ChildHalf, UNKNOWN_TID};
use crate::registry::ThreadRegistry;
use crate::token::{self, ThreadIdentity};
use crate::runtime;


/// Lifecycle of a supervised thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
	/// Constructed, `start` not yet called.
	Created,
	/// Native thread exists; handshake in progress.
	Starting,
	/// Work function is executing.
	Running,
	/// Work function returned and the thread has deregistered.
	Finished,
}

impl ThreadState {
	const fn as_raw(self) -> u8 {
		match self {
			Self::Created => 0,
			Self::Starting => 1,
			Self::Running => 2,
			Self::Finished => 3,
		}
	}

	const fn from_raw(raw: u8) -> Self {
		match raw {
			0 => Self::Created,
			1 => Self::Starting,
			2 => Self::Running,
			_ => Self::Finished,
		}
	}
}

#[derive(Debug)]
struct Lifecycle(AtomicU8);

impl Lifecycle {
	fn new() -> Self {
		Self(AtomicU8::new(ThreadState::Created.as_raw()))
	}

	fn get(&self) -> ThreadState {
		ThreadState::from_raw(self.0.load(Ordering::Acquire))
	}

	fn set(&self, state: ThreadState) {
		self.0.store(state.as_raw(), Ordering::Release);
	}
}

/// One dedicated OS thread tracked by a [`ThreadRegistry`].
#[derive(Debug)]
pub struct SupervisedThread {
	name: String,
	category: String,
	registry: Option<Arc<ThreadRegistry>>,
	identity: Option<ThreadIdentity>,
	tid: Option<i64>,
	lifecycle: Arc<Lifecycle>,
	handle: Option<JoinHandle<()>>,
}

impl SupervisedThread {
	/// Creates a thread that registers with the process-wide registry.
	///
	/// An empty `name` or `category` is replaced with the configured default
	/// once the thread starts.
	pub fn new(name: impl Into<String>, category: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			category: category.into(),
			registry: None,
			identity: None,
			tid: None,
			lifecycle: Arc::new(Lifecycle::new()),
			handle: None,
		}
	}

	/// Creates a thread that registers with `registry` instead of the global one.
	pub fn with_registry(registry: Arc<ThreadRegistry>, name: impl Into<String>, category: impl Into<String>) -> Self {
		Self {
			registry: Some(registry),
			..Self::new(name, category)
		}
	}

	/// Launches the native thread and waits for it to report its OS id.
	///
	/// # Panics
	///
	/// Panics if called twice on the same object, or if no registry was given
	/// and [`init_threading`](crate::init_threading) has not run.
	pub fn start<F>(&mut self, work: F) -> Result<()>
	where
		F: FnOnce() + Send + 'static,
	{
		assert!(self.identity.is_none(), "start called twice on thread '{}'", self.name);
		let registry = match &self.registry {
			Some(registry) => Arc::clone(registry),
			None => runtime::global_registry().unwrap_or_else(|| panic!("thread '{}' started before init_threading", self.name)),
		};

		let identity = ThreadIdentity::allocate();
		self.identity = Some(identity);
		self.lifecycle.set(ThreadState::Starting);

		let (launcher, child) = handshake::channel();
		let ctx = ChildContext {
			name: self.name.clone(),
			category: self.category.clone(),
			identity,
			registry,
			lifecycle: Arc::clone(&self.lifecycle),
		};

		let mut builder = std::thread::Builder::new();
		if !self.name.is_empty() && !self.name.contains('\0') {
			builder = builder.name(self.name.clone());
		}
		let handle = match builder.spawn(move || supervise(ctx, child, work)) {
			Ok(handle) => handle,
			Err(source) => {
				self.identity = None;
				self.lifecycle.set(ThreadState::Created);
				tracing::warn!(name = %self.name, category = %self.category, error = %source, "threadz.start.failed");
				return Err(ThreadError::Spawn {
					name: self.name.clone(),
					source,
				});
			}
		};

		self.handle = Some(handle);
		launcher.signal_assigned();
		let tid = launcher.wait_for_id();
		debug_assert!(tid == UNKNOWN_TID || launcher.state() == AssignmentState::Running);
		self.tid = Some(tid);

		tracing::debug!(tid, %identity, category = %self.category, name = %self.name, "threadz.start");
		Ok(())
	}

	/// Waits for the thread to finish. Returns the panic payload if the work
	/// function panicked. A thread that was never started joins immediately.
	pub fn join(&mut self) -> std::thread::Result<()> {
		match self.handle.take() {
			Some(handle) => handle.join(),
			None => Ok(()),
		}
	}

	/// OS thread id, set once `start` returns.
	pub fn tid(&self) -> Option<i64> {
		self.tid
	}

	/// Registry key, set once `start` is called.
	pub fn identity(&self) -> Option<ThreadIdentity> {
		self.identity
	}

	/// Current lifecycle position.
	pub fn state(&self) -> ThreadState {
		self.lifecycle.get()
	}

	/// Name as supplied by the caller.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Category as supplied by the caller.
	pub fn category(&self) -> &str {
		&self.category
	}
}

/// Everything the child owns. Moved in by value, nothing borrowed from the launcher.
struct ChildContext {
	name: String,
	category: String,
	identity: ThreadIdentity,
	registry: Arc<ThreadRegistry>,
	lifecycle: Arc<Lifecycle>,
}

fn supervise<F>(ctx: ChildContext, child: ChildHalf, work: F)
where
	F: FnOnce(),
{
	let ChildContext {
		name,
		category,
		identity,
		registry,
		lifecycle,
	} = ctx;

	let tid = registry.resolve_tid(&name);

	let config = registry.config();
	let name = if name.is_empty() { format!("{}-{tid}", config.default_name) } else { name };
	let category = if category.is_empty() { config.default_category.clone() } else { category };

	registry.add_thread(identity, name.as_str(), category.as_str(), tid);

	child.wait_assigned();
	lifecycle.set(ThreadState::Running);
	child.report_id(tid);

	let outcome = {
		let _current = token::bind_current(identity);
		panic::catch_unwind(AssertUnwindSafe(work))
	};

	registry.remove_thread(identity, &category);
	lifecycle.set(ThreadState::Finished);
	tracing::trace!(tid, %identity, category = %category, name = %name, panicked = outcome.is_err(), "threadz.finish");
	drop(registry);

	if let Err(payload) = outcome {
		panic::resume_unwind(payload);
	}
}
