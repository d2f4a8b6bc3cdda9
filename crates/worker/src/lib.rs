//! Supervised worker threads and a process-wide thread registry.
//!
//! Every [`SupervisedThread`] runs on its own OS thread and is listed in a
//! [`ThreadRegistry`] by category for as long as its work function runs. The
//! registry feeds two gauges and an HTML introspection page through the
//! [`MetricsSink`] and [`PathHandlerSink`] seams.
//!
//! ```no_run
//! let registry = threadz_worker::init_threading();
//! let mut thread = threadz_worker::spawn("compaction", "compactor-0", || {
//! 	// work
//! })
//! .unwrap();
//! assert!(thread.tid().is_some());
//! thread.join().unwrap();
//! assert_eq!(registry.live_threads(), 0);
//! ```

mod config;
mod error;
mod handshake;
mod os;
mod registry;
mod runtime;
mod sink;
mod spawn;
mod supervisor;
mod throttle;
mod token;

pub use config::ThreadingConfig;
pub use error::{ConfigError, Result, StatsError, ThreadError};
pub use handshake::UNKNOWN_TID;
pub use os::{ProcfsStats, ThreadStats, ThreadStatsSource, current_os_tid};
pub use registry::{CURRENT_THREADS_GAUGE, TOTAL_THREADS_GAUGE, ThreadDescriptor, ThreadRegistry};
pub use runtime::{global_registry, init_threading, init_threading_with, shutdown_threading, start_thread_instrumentation};
pub use sink::{GaugeFn, GaugeSet, MetricsSink, PageArgs, PageHandler, PathHandlerSink, PathHandlers};
pub use spawn::{spawn, spawn_in};
pub use supervisor::{SupervisedThread, ThreadState};
pub use token::{ThreadIdentity, current_identity};
