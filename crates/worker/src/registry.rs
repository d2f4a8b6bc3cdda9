use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::config::ThreadingConfig;
use crate::os::{self, ProcfsStats, ThreadStatsSource};
use crate::sink::{GaugeFn, MetricsSink, PageArgs, PathHandlerSink};
use crate::throttle::EveryN;
use crate::token::ThreadIdentity;

mod page;


/// Gauge name for the all-time number of registered threads.
pub const TOTAL_THREADS_GAUGE: &str = "threading.total_threads";
/// Gauge name for the number of currently registered threads.
pub const CURRENT_THREADS_GAUGE: &str = "threading.current_num_threads";

/// Details captured about one registered thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadDescriptor {
	name: String,
	category: String,
	os_tid: i64,
}

impl ThreadDescriptor {
	/// Display name, defaulted from the OS id when none was given.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Category the thread is listed under.
	pub fn category(&self) -> &str {
		&self.category
	}

	/// OS thread id, or [`UNKNOWN_TID`](crate::UNKNOWN_TID) when it could not be resolved.
	pub fn os_tid(&self) -> i64 {
		self.os_tid
	}
}

struct Entry {
	descriptor: ThreadDescriptor,
	/// Whether this entry contributed to `current_alive`.
	counted: bool,
}

/// Logically related threads, ordered by identity.
type ThreadCategory = BTreeMap<ThreadIdentity, Entry>;

#[derive(Default)]
struct RegistryState {
	/// Every category that ever held a thread, even if now empty.
	categories: BTreeMap<String, ThreadCategory>,
	/// Identity to owning category.
	index: HashMap<ThreadIdentity, String>,
	metrics_enabled: bool,
	total_created: u64,
	current_alive: u64,
}

/// Resolves the calling thread's OS id.
type TidFn = Box<dyn Fn() -> Option<i64> + Send + Sync>;

/// Process-wide catalog of live supervised threads, grouped by category.
///
/// All state sits behind one mutex, so registration, deregistration and reads
/// are linearized. Rendered pages are point-in-time snapshots.
pub struct ThreadRegistry {
	state: Mutex<RegistryState>,
	config: ThreadingConfig,
	stats: Box<dyn ThreadStatsSource>,
	tid_source: TidFn,
	stats_failures: EveryN,
	tid_failures: EveryN,
}

impl Default for ThreadRegistry {
	fn default() -> Self {
		Self::new()
	}
}

impl std::fmt::Debug for ThreadRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let state = self.state.lock();
		f.debug_struct("ThreadRegistry")
			.field("categories", &state.categories.len())
			.field("live", &state.index.len())
			.field("metrics_enabled", &state.metrics_enabled)
			.finish()
	}
}

impl ThreadRegistry {
	/// Creates an empty registry with default configuration and `/proc` statistics.
	pub fn new() -> Self {
		Self::with_config(ThreadingConfig::default())
	}

	/// Creates an empty registry with `config` and `/proc` statistics.
	pub fn with_config(config: ThreadingConfig) -> Self {
		Self::with_stats_source(config, ProcfsStats)
	}

	/// Creates a registry that reads per-thread statistics from `stats`.
	pub fn with_stats_source(config: ThreadingConfig, stats: impl ThreadStatsSource + 'static) -> Self {
		Self {
			state: Mutex::new(RegistryState::default()),
			stats: Box::new(stats),
			tid_source: Box::new(os::current_os_tid),
			stats_failures: EveryN::new(config.log_every_n),
			tid_failures: EveryN::new(config.log_every_n),
			config,
		}
	}

	/// Replaces how supervised threads look up their own OS id.
	///
	/// Defaults to [`current_os_tid`](crate::current_os_tid).
	pub fn with_tid_source(mut self, source: impl Fn() -> Option<i64> + Send + Sync + 'static) -> Self {
		self.tid_source = Box::new(source);
		self
	}

	/// Settings this registry was built with.
	pub fn config(&self) -> &ThreadingConfig {
		&self.config
	}

	/// Enables the counters and hands read callbacks to the collaborators.
	///
	/// Callbacks hold weak handles and go quiet once the registry is dropped.
	/// Calling this twice registers everything twice.
	pub fn start_instrumentation(self: &Arc<Self>, metrics: &dyn MetricsSink, web: &dyn PathHandlerSink) {
		self.state.lock().metrics_enabled = true;

		let weak = Arc::downgrade(self);
		metrics.register_gauge(
			TOTAL_THREADS_GAUGE,
			"All time total number of threads",
			weak_gauge(&weak, Self::read_total_created),
		);
		metrics.register_gauge(
			CURRENT_THREADS_GAUGE,
			"Current number of running threads",
			weak_gauge(&weak, Self::read_current_alive),
		);
		web.register_path_handler(
			&self.config.path,
			Arc::new(move |args: &PageArgs, out: &mut String| {
				if let Some(registry) = weak.upgrade() {
					registry.render_page(args, out);
				}
			}),
		);
		tracing::debug!(path = %self.config.path, "threadz.instrumentation.started");
	}

	/// Registers `identity` under `category`, replacing any earlier entry for it.
	pub fn add_thread(&self, identity: ThreadIdentity, name: impl Into<String>, category: impl Into<String>, os_tid: i64) {
		let descriptor = ThreadDescriptor {
			name: name.into(),
			category: category.into(),
			os_tid,
		};

		let mut guard = self.state.lock();
		let state = &mut *guard;
		let previous = state
			.index
			.remove(&identity)
			.and_then(|old| state.categories.get_mut(&old).and_then(|c| c.remove(&identity)));

		let mut counted = previous.is_some_and(|p| p.counted);
		if state.metrics_enabled {
			state.total_created += 1;
			if !counted {
				state.current_alive += 1;
				counted = true;
			}
		}

		state.index.insert(identity, descriptor.category.clone());
		state
			.categories
			.entry(descriptor.category.clone())
			.or_default()
			.insert(identity, Entry { descriptor, counted });
	}

	/// Deregisters `identity` from `category`.
	///
	/// Unknown categories and identities are ignored and leave the counters
	/// untouched. Returns the removed descriptor.
	pub fn remove_thread(&self, identity: ThreadIdentity, category: &str) -> Option<ThreadDescriptor> {
		let mut guard = self.state.lock();
		let state = &mut *guard;
		let Some(entry) = state.categories.get_mut(category).and_then(|c| c.remove(&identity)) else {
			tracing::trace!(%identity, category, "threadz.remove.absent");
			return None;
		};
		state.index.remove(&identity);
		if entry.counted {
			state.current_alive = state.current_alive.saturating_sub(1);
		}
		Some(entry.descriptor)
	}

	/// OS id of the calling thread, or [`UNKNOWN_TID`](crate::UNKNOWN_TID)
	/// after a throttled log when it cannot be resolved.
	pub(crate) fn resolve_tid(&self, name: &str) -> i64 {
		(self.tid_source)().unwrap_or_else(|| {
			if self.tid_failures.tick() {
				tracing::info!(thread = name, failures = self.tid_failures.occurrences(), "threadz.tid.unavailable");
			}
			crate::UNKNOWN_TID
		})
	}

	/// Number of threads that started without a resolvable OS id.
	pub(crate) fn unresolved_tids(&self) -> u64 {
		self.tid_failures.occurrences()
	}

	/// All-time number of threads added since instrumentation started.
	pub fn read_total_created(&self) -> u64 {
		self.state.lock().total_created
	}

	/// Number of counted threads currently registered.
	pub fn read_current_alive(&self) -> u64 {
		self.state.lock().current_alive
	}

	/// Whether `start_instrumentation` has run.
	pub fn metrics_enabled(&self) -> bool {
		self.state.lock().metrics_enabled
	}

	/// Looks up the descriptor registered for `identity`.
	pub fn descriptor(&self, identity: ThreadIdentity) -> Option<ThreadDescriptor> {
		let state = self.state.lock();
		let category = state.index.get(&identity)?;
		state
			.categories
			.get(category)
			.and_then(|c| c.get(&identity))
			.map(|e| e.descriptor.clone())
	}

	/// Category names with their live thread counts, sorted by name.
	pub fn categories(&self) -> Vec<(String, usize)> {
		let state = self.state.lock();
		state.categories.iter().map(|(name, c)| (name.clone(), c.len())).collect()
	}

	/// Number of registered threads, independent of instrumentation.
	pub fn live_threads(&self) -> usize {
		self.state.lock().index.len()
	}

	/// Every registered thread, sorted by category and then name.
	pub fn snapshot(&self) -> Vec<ThreadDescriptor> {
		let state = self.state.lock();
		let mut out: Vec<_> = state
			.categories
			.values()
			.flat_map(|c| c.values().map(|e| e.descriptor.clone()))
			.collect();
		out.sort_by(|a, b| a.category.cmp(&b.category).then_with(|| a.name.cmp(&b.name)));
		out
	}

	/// Writes the introspection page for `args` into `out`.
	///
	/// Without a `group` argument this lists categories; `group=all` lists
	/// every thread; any other value lists that category or reports it missing.
	pub fn render_page(&self, args: &PageArgs, out: &mut String) {
		let state = self.state.lock();
		page::render(self, &state, args.get("group").map(String::as_str), out);
	}
}

fn weak_gauge(weak: &Weak<ThreadRegistry>, read: fn(&ThreadRegistry) -> u64) -> GaugeFn {
	let weak = Weak::clone(weak);
	Arc::new(move || weak.upgrade().map_or(0, |registry| read(&registry)))
}
