//! Platform hooks: OS thread ids and per-thread CPU/IO-wait counters.

use crate::error::StatsError;

/// Returns the kernel thread id of the caller, if the platform exposes one.
#[cfg(any(target_os = "linux", target_os = "android"))]
pub fn current_os_tid() -> Option<i64> {
	Some(i64::from(rustix::thread::gettid().as_raw_nonzero().get()))
}

/// Returns the kernel thread id of the caller, if the platform exposes one.
#[cfg(not(any(target_os = "linux", target_os = "android")))]
pub fn current_os_tid() -> Option<i64> {
	None
}

/// Cumulative per-thread times in nanoseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThreadStats {
	pub user_ns: u64,
	pub kernel_ns: u64,
	pub iowait_ns: u64,
}

impl ThreadStats {
	/// User-mode CPU time in seconds.
	pub fn user_secs(&self) -> f64 {
		self.user_ns as f64 / 1e9
	}

	/// Kernel-mode CPU time in seconds.
	pub fn kernel_secs(&self) -> f64 {
		self.kernel_ns as f64 / 1e9
	}

	/// Time blocked on IO in seconds.
	pub fn iowait_secs(&self) -> f64 {
		self.iowait_ns as f64 / 1e9
	}
}

/// Source of per-thread CPU/IO-wait statistics, keyed by OS thread id.
pub trait ThreadStatsSource: Send + Sync {
	/// Reads cumulative times for `tid`.
	fn thread_stats(&self, tid: i64) -> Result<ThreadStats, StatsError>;
}

/// Reads `/proc/self/task/<tid>/stat`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcfsStats;

#[cfg(target_os = "linux")]
impl ThreadStatsSource for ProcfsStats {
	fn thread_stats(&self, tid: i64) -> Result<ThreadStats, StatsError> {
		let raw_tid = i32::try_from(tid).ok().filter(|t| *t > 0).ok_or(StatsError::InvalidTid(tid))?;
		let stat = procfs::process::Process::myself()?.task_from_tid(raw_tid)?.stat()?;
		let ns_per_tick = 1_000_000_000 / procfs::ticks_per_second().max(1);
		Ok(ThreadStats {
			user_ns: stat.utime.saturating_mul(ns_per_tick),
			kernel_ns: stat.stime.saturating_mul(ns_per_tick),
			iowait_ns: stat.delayacct_blkio_ticks.unwrap_or(0).saturating_mul(ns_per_tick),
		})
	}
}

#[cfg(not(target_os = "linux"))]
impl ThreadStatsSource for ProcfsStats {
	fn thread_stats(&self, _tid: i64) -> Result<ThreadStats, StatsError> {
		Err(StatsError::Unsupported)
	}
}
