use std::sync::Arc;

use crate::error::Result;
use crate::registry::ThreadRegistry;
use crate::supervisor::SupervisedThread;

/// Starts a supervised thread registered with the process-wide registry.
///
/// # Panics
///
/// Panics if [`init_threading`](crate::init_threading) has not run.
pub fn spawn<F>(category: impl Into<String>, name: impl Into<String>, work: F) -> Result<SupervisedThread>
where
	F: FnOnce() + Send + 'static,
{
	let mut thread = SupervisedThread::new(name, category);
	tracing::trace!(category = thread.category(), name = thread.name(), "threadz.spawn");
	thread.start(work)?;
	Ok(thread)
}

/// Starts a supervised thread registered with `registry`.
pub fn spawn_in<F>(registry: &Arc<ThreadRegistry>, category: impl Into<String>, name: impl Into<String>, work: F) -> Result<SupervisedThread>
where
	F: FnOnce() + Send + 'static,
{
	let mut thread = SupervisedThread::with_registry(Arc::clone(registry), name, category);
	tracing::trace!(category = thread.category(), name = thread.name(), "threadz.spawn_in");
	thread.start(work)?;
	Ok(thread)
}
