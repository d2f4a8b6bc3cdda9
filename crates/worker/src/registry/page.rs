//! HTML fragments for the thread introspection page.

use std::fmt::Write as _;

use super::{RegistryState, ThreadCategory, ThreadRegistry};
use crate::os::ThreadStats;

const ALL_GROUPS: &str = "all";

pub(super) fn render(registry: &ThreadRegistry, state: &RegistryState, group: Option<&str>, out: &mut String) {
	match group {
		None => render_index(registry, state, out),
		Some(group) => render_group(registry, state, group, out),
	}
}

fn render_index(registry: &ThreadRegistry, state: &RegistryState, out: &mut String) {
	let path = &registry.config.path;
	out.push_str("<h2>Thread Groups</h2>\n");
	if state.metrics_enabled {
		let _ = writeln!(out, "<h4>{} thread(s) running</h4>", state.current_alive);
	}
	let _ = writeln!(out, "<a href='{path}?group={ALL_GROUPS}'><h3>All Threads</h3></a>");
	for (name, category) in &state.categories {
		let _ = writeln!(
			out,
			"<a href='{path}?group={}'><h3>{} : {}</h3></a>",
			url_encode(name),
			escape_html(name),
			category.len()
		);
	}
}

fn render_group(registry: &ThreadRegistry, state: &RegistryState, group: &str, out: &mut String) {
	let escaped = escape_html(group);
	let _ = writeln!(out, "<h2>Thread Group: {escaped}</h2>");

	let selected: Vec<&ThreadCategory> = if group == ALL_GROUPS {
		out.push_str("<h3>All Threads : </h3>\n");
		state.categories.values().collect()
	} else {
		let Some(category) = state.categories.get(group) else {
			let _ = writeln!(out, "Thread group '{escaped}' not found");
			return;
		};
		let _ = writeln!(out, "<h3>{escaped} : {}</h3>", category.len());
		vec![category]
	};

	out.push_str("<table class='table table-hover table-border'>\n");
	out.push_str(
		"<tr><th>Thread name</th><th>Cumulative User CPU(s)</th><th>Cumulative Kernel CPU(s)</th><th>Cumulative IO-wait(s)</th></tr>\n",
	);
	for category in selected {
		render_rows(registry, category, out);
	}
	out.push_str("</table>\n");
}

fn render_rows(registry: &ThreadRegistry, category: &ThreadCategory, out: &mut String) {
	for entry in category.values() {
		let descriptor = &entry.descriptor;
		let stats = match registry.stats.thread_stats(descriptor.os_tid) {
			Ok(stats) => stats,
			Err(error) => {
				if registry.stats_failures.tick() {
					tracing::info!(
						tid = descriptor.os_tid,
						thread = %descriptor.name,
						%error,
						failures = registry.stats_failures.occurrences(),
						"threadz.stats.unavailable"
					);
				}
				ThreadStats::default()
			}
		};
		let _ = writeln!(
			out,
			"<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
			escape_html(&descriptor.name),
			stats.user_secs(),
			stats.kernel_secs(),
			stats.iowait_secs()
		);
	}
}

/// Percent-encodes a query value.
pub(super) fn url_encode(value: &str) -> String {
	url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Escapes text for use inside HTML element bodies and single- or double-quoted attributes.
pub(super) fn escape_html(value: &str) -> String {
	let mut out = String::with_capacity(value.len());
	for c in value.chars() {
		match c {
			'&' => out.push_str("&amp;"),
			'<' => out.push_str("&lt;"),
			'>' => out.push_str("&gt;"),
			'"' => out.push_str("&quot;"),
			'\'' => out.push_str("&#39;"),
			_ => out.push(c),
		}
	}
	out
}
