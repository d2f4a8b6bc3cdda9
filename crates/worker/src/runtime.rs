//! Process-wide registry handle.
//!
//! The process holds one [`Arc<ThreadRegistry>`] between [`init_threading`]
//! and [`shutdown_threading`]. Supervised threads clone it when they start, so
//! releasing it here only destroys the registry once the last thread that
//! might still deregister has exited.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::ThreadingConfig;
use crate::registry::ThreadRegistry;
use crate::sink::{MetricsSink, PathHandlerSink};

static THREAD_MANAGER: Mutex<Option<Arc<ThreadRegistry>>> = parking_lot::const_mutex(None);

/// Installs the process-wide registry with default configuration.
///
/// Idempotent: later calls return the already-installed registry.
pub fn init_threading() -> Arc<ThreadRegistry> {
	init_threading_with(ThreadingConfig::default())
}

/// Installs the process-wide registry with `config`.
///
/// If a registry is already installed it is returned unchanged and `config`
/// is ignored.
pub fn init_threading_with(config: ThreadingConfig) -> Arc<ThreadRegistry> {
	let mut slot = THREAD_MANAGER.lock();
	if let Some(registry) = slot.as_ref() {
		return Arc::clone(registry);
	}
	let registry = Arc::new(ThreadRegistry::with_config(config));
	*slot = Some(Arc::clone(&registry));
	tracing::debug!("threadz.init");
	registry
}

/// Returns the process-wide registry, if installed.
pub fn global_registry() -> Option<Arc<ThreadRegistry>> {
	THREAD_MANAGER.lock().clone()
}

/// Enables metrics and the introspection page on the process-wide registry.
///
/// # Panics
///
/// Panics if [`init_threading`] has not run.
pub fn start_thread_instrumentation(metrics: &dyn MetricsSink, web: &dyn PathHandlerSink) {
	let Some(registry) = global_registry() else {
		panic!("start_thread_instrumentation called before init_threading");
	};
	registry.start_instrumentation(metrics, web);
}

/// Releases the process-wide handle and returns it.
///
/// Threads still running keep the registry alive through their own handles.
/// Starting a thread against the global registry after this panics until
/// [`init_threading`] runs again.
pub fn shutdown_threading() -> Option<Arc<ThreadRegistry>> {
	let released = THREAD_MANAGER.lock().take();
	if let Some(registry) = &released {
		tracing::debug!(live = registry.live_threads(), holders = Arc::strong_count(registry), "threadz.shutdown");
	}
	released
}

#[cfg(test)]
mod tests {
	use std::sync::mpsc;

	use serial_test::serial;

	use super::*;
	use crate::sink::{GaugeSet, PathHandlers};
	use crate::supervisor::SupervisedThread;

	#[test]
	#[serial]
	fn init_is_idempotent() {
		shutdown_threading();
		let first = init_threading();
		let second = init_threading_with(ThreadingConfig {
			default_category: "ignored".to_string(),
			..ThreadingConfig::default()
		});
		assert!(Arc::ptr_eq(&first, &second));
		assert_eq!(second.config().default_category, "no-category");
		shutdown_threading();
	}

	#[test]
	#[serial]
	#[should_panic(expected = "started before init_threading")]
	fn start_before_init_panics() {
		shutdown_threading();
		let mut thread = SupervisedThread::new("early", "io");
		let _ = thread.start(|| {});
	}

	#[test]
	#[serial]
	fn registry_outlives_released_global_handle() {
		shutdown_threading();
		let registry = init_threading();
		let gauges = GaugeSet::new();
		start_thread_instrumentation(&gauges, &PathHandlers::new());
		let weak = Arc::downgrade(&registry);
		drop(registry);

		let (release_tx, release_rx) = mpsc::channel::<()>();
		let mut thread = SupervisedThread::new("straggler", "shutdown");
		thread
			.start(move || {
				let _ = release_rx.recv();
			})
			.unwrap();

		let released = shutdown_threading().expect("registry was installed");
		drop(released);
		assert!(global_registry().is_none());

		// Only the straggler's handle keeps the registry alive now.
		let alive = weak.upgrade().expect("thread still holds the registry");
		assert_eq!(alive.read_current_alive(), 1);
		drop(alive);

		release_tx.send(()).unwrap();
		thread.join().unwrap();
		assert!(weak.upgrade().is_none(), "registry should drop with its last thread");
		assert_eq!(gauges.read(crate::registry::CURRENT_THREADS_GAUGE), Some(0));
	}

	#[test]
	#[serial]
	fn global_threads_use_global_registry() {
		shutdown_threading();
		let registry = init_threading();
		let mut thread = SupervisedThread::new("", "");
		let (tx, rx) = mpsc::channel();
		let probe = Arc::clone(&registry);
		thread
			.start(move || {
				let identity = crate::current_identity().unwrap();
				tx.send(probe.descriptor(identity)).unwrap();
			})
			.unwrap();
		let descriptor = rx.recv().unwrap().expect("registered before running");
		thread.join().unwrap();

		let tid = thread.tid().unwrap();
		assert_eq!(descriptor.name(), format!("thread-{tid}"));
		assert_eq!(descriptor.category(), "no-category");
		assert_eq!(registry.live_threads(), 0);
		shutdown_threading();
	}
}
