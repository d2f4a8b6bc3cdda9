use std::sync::{Arc, Barrier};

use threadz_worker::{
	CURRENT_THREADS_GAUGE, GaugeSet, PageArgs, PathHandlers, TOTAL_THREADS_GAUGE, init_threading, shutdown_threading, spawn,
	start_thread_instrumentation,
};

#[test]
fn page_and_gauges_follow_thread_lifecycles() {
	let registry = init_threading();
	let gauges = GaugeSet::new();
	let pages = PathHandlers::new();
	start_thread_instrumentation(&gauges, &pages);

	let gate = Arc::new(Barrier::new(3));
	let io_gate = Arc::clone(&gate);
	let compute_gate = Arc::clone(&gate);
	let mut io = spawn("io", "A", move || {
		io_gate.wait();
	})
	.unwrap();
	let mut compute = spawn("compute", "B", move || {
		compute_gate.wait();
	})
	.unwrap();

	assert_eq!(gauges.read(CURRENT_THREADS_GAUGE), Some(2));
	assert_eq!(gauges.read(TOTAL_THREADS_GAUGE), Some(2));

	let index = pages.render("/threadz", &PageArgs::new()).unwrap();
	assert!(index.contains("2 thread(s) running"), "{index}");
	assert!(index.contains("<a href='/threadz?group=compute'><h3>compute : 1</h3></a>"), "{index}");

	let mut args = PageArgs::new();
	args.insert("group".to_string(), "all".to_string());
	let all = pages.render("/threadz", &args).unwrap();
	assert_eq!(all.matches("<tr><td>").count(), 2, "{all}");
	assert!(all.contains("<tr><td>A</td>") && all.contains("<tr><td>B</td>"), "{all}");

	args.insert("group".to_string(), "nonexistent".to_string());
	let missing = pages.render("/threadz", &args).unwrap();
	assert!(missing.contains("Thread group 'nonexistent' not found"), "{missing}");

	gate.wait();
	io.join().unwrap();
	compute.join().unwrap();

	assert_eq!(gauges.read(CURRENT_THREADS_GAUGE), Some(0));
	assert_eq!(gauges.read(TOTAL_THREADS_GAUGE), Some(2));
	assert_eq!(registry.live_threads(), 0);

	drop(registry);
	assert!(shutdown_threading().is_some());
	assert_eq!(gauges.read(CURRENT_THREADS_GAUGE), Some(0));
}
