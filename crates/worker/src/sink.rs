//! Collaborator seams for metrics and the introspection web server.
//!
//! The registry only pushes callbacks into these traits. [`GaugeSet`] and
//! [`PathHandlers`] are small in-process implementations for hosts without a
//! metrics or HTTP stack of their own.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;

/// Query arguments handed to a page handler.
pub type PageArgs = HashMap<String, String>;

/// Gauge read callback, invoked from an arbitrary reporting thread.
pub type GaugeFn = Arc<dyn Fn() -> u64 + Send + Sync>;

/// Page render callback: writes an HTML fragment for the given arguments.
pub type PageHandler = Arc<dyn Fn(&PageArgs, &mut String) + Send + Sync>;

/// Receives function-backed gauges.
pub trait MetricsSink {
	fn register_gauge(&self, name: &'static str, help: &'static str, read: GaugeFn);
}

/// Receives path handlers for human-readable diagnostics.
pub trait PathHandlerSink {
	fn register_path_handler(&self, path: &str, handler: PageHandler);
}

struct Gauge {
	help: &'static str,
	read: GaugeFn,
}

/// In-memory gauge registry.
#[derive(Default, Clone)]
pub struct GaugeSet {
	gauges: Arc<RwLock<BTreeMap<&'static str, Vec<Gauge>>>>,
}

impl GaugeSet {
	/// Creates an empty gauge set.
	pub fn new() -> Self {
		Self::default()
	}

	/// Reads the most recently registered gauge under `name`.
	pub fn read(&self, name: &str) -> Option<u64> {
		// Callbacks take their own locks; never run them under ours.
		let read = self.gauges.read().get(name).and_then(|g| g.last()).map(|g| Arc::clone(&g.read))?;
		Some(read())
	}

	/// Returns the help text for `name`.
	pub fn help(&self, name: &str) -> Option<&'static str> {
		self.gauges.read().get(name).and_then(|g| g.last()).map(|g| g.help)
	}

	/// Number of registrations under `name`, counting duplicates.
	pub fn registrations(&self, name: &str) -> usize {
		self.gauges.read().get(name).map_or(0, Vec::len)
	}

	/// Reads every gauge, sorted by name.
	pub fn snapshot(&self) -> Vec<(&'static str, u64)> {
		let read: Vec<(&'static str, GaugeFn)> = {
			let guard = self.gauges.read();
			guard
				.iter()
				.filter_map(|(name, g)| g.last().map(|g| (*name, Arc::clone(&g.read))))
				.collect()
		};
		read.into_iter().map(|(name, f)| (name, f())).collect()
	}
}

impl std::fmt::Debug for GaugeSet {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("GaugeSet")
			.field("names", &self.gauges.read().keys().collect::<Vec<_>>())
			.finish()
	}
}

impl MetricsSink for GaugeSet {
	fn register_gauge(&self, name: &'static str, help: &'static str, read: GaugeFn) {
		self.gauges.write().entry(name).or_default().push(Gauge { help, read });
	}
}

/// In-memory path handler table.
#[derive(Default, Clone)]
pub struct PathHandlers {
	handlers: Arc<RwLock<HashMap<String, PageHandler>>>,
}

impl PathHandlers {
	/// Creates an empty handler table.
	pub fn new() -> Self {
		Self::default()
	}

	/// Renders `path` with `args`, or `None` when nothing is registered there.
	pub fn render(&self, path: &str, args: &PageArgs) -> Option<String> {
		let handler = self.handlers.read().get(path).cloned()?;
		let mut out = String::new();
		handler(args, &mut out);
		Some(out)
	}

	/// Registered paths, sorted.
	pub fn paths(&self) -> Vec<String> {
		let mut paths: Vec<_> = self.handlers.read().keys().cloned().collect();
		paths.sort();
		paths
	}
}

impl std::fmt::Debug for PathHandlers {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("PathHandlers").field("paths", &self.paths()).finish()
	}
}

impl PathHandlerSink for PathHandlers {
	fn register_path_handler(&self, path: &str, handler: PageHandler) {
		if self.handlers.write().insert(path.to_string(), handler).is_some() {
			tracing::debug!(path, "threadz.path_handler.replaced");
		}
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicU64, Ordering};

	use super::*;

	#[test]
	fn gauges_read_live_values() {
		let set = GaugeSet::new();
		let value = Arc::new(AtomicU64::new(3));
		let value_read = Arc::clone(&value);
		set.register_gauge("x", "help", Arc::new(move || value_read.load(Ordering::Relaxed)));
		assert_eq!(set.read("x"), Some(3));
		value.store(9, Ordering::Relaxed);
		assert_eq!(set.read("x"), Some(9));
		assert_eq!(set.help("x"), Some("help"));
		assert_eq!(set.read("y"), None);
		assert_eq!(set.snapshot(), vec![("x", 9)]);
	}

	#[test]
	fn handlers_render_by_path() {
		let handlers = PathHandlers::new();
		handlers.register_path_handler(
			"/echo",
			Arc::new(|args: &PageArgs, out: &mut String| {
				out.push_str(args.get("v").map_or("none", String::as_str));
			}),
		);
		let mut args = PageArgs::new();
		assert_eq!(handlers.render("/echo", &args).as_deref(), Some("none"));
		args.insert("v".into(), "hi".into());
		assert_eq!(handlers.render("/echo", &args).as_deref(), Some("hi"));
		assert_eq!(handlers.render("/missing", &args), None);
	}
}
