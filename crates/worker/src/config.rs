//! Threading configuration.

use serde::Deserialize;

use crate::error::ConfigError;

/// Tunables for the thread registry and supervised threads.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThreadingConfig {
	/// Path the introspection page is registered under.
	#[serde(default = "default_path")]
	pub path: String,
	/// Name prefix used when a thread is started without a name.
	#[serde(default = "default_name")]
	pub default_name: String,
	/// Category assigned when a thread is started without one.
	#[serde(default = "default_category")]
	pub default_category: String,
	/// Throttled warnings are emitted on the first and then every Nth occurrence.
	#[serde(default = "default_log_every_n")]
	pub log_every_n: u64,
}

fn default_path() -> String {
	"/threadz".to_string()
}

fn default_name() -> String {
	"thread".to_string()
}

fn default_category() -> String {
	"no-category".to_string()
}

fn default_log_every_n() -> u64 {
	100
}

impl Default for ThreadingConfig {
	fn default() -> Self {
		Self {
			path: default_path(),
			default_name: default_name(),
			default_category: default_category(),
			log_every_n: default_log_every_n(),
		}
	}
}

impl ThreadingConfig {
	/// Parses a config from TOML, filling missing keys with defaults.
	pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
		let config: Self = toml::from_str(input)?;
		config.validate()?;
		Ok(config)
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if !self.path.starts_with('/') {
			return Err(ConfigError::Invalid {
				field: "path",
				reason: "must start with '/'",
			});
		}
		if self.default_category.is_empty() {
			return Err(ConfigError::Invalid {
				field: "default_category",
				reason: "must not be empty",
			});
		}
		if self.log_every_n == 0 {
			return Err(ConfigError::Invalid {
				field: "log_every_n",
				reason: "must be > 0",
			});
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_document_uses_defaults() {
		let config = ThreadingConfig::from_toml_str("").unwrap();
		assert_eq!(config, ThreadingConfig::default());
		assert_eq!(config.path, "/threadz");
	}

	#[test]
	fn partial_document_overrides() {
		let config = ThreadingConfig::from_toml_str("default_category = \"rpc\"\nlog_every_n = 5\n").unwrap();
		assert_eq!(config.default_category, "rpc");
		assert_eq!(config.log_every_n, 5);
		assert_eq!(config.default_name, "thread");
	}

	#[test]
	fn rejects_zero_throttle() {
		let err = ThreadingConfig::from_toml_str("log_every_n = 0").unwrap_err();
		assert!(matches!(err, ConfigError::Invalid { field: "log_every_n", .. }));
	}

	#[test]
	fn rejects_relative_path() {
		assert!(ThreadingConfig::from_toml_str("path = \"threadz\"").is_err());
	}

	#[test]
	fn rejects_unknown_keys() {
		let err = ThreadingConfig::from_toml_str("pool_size = 4").unwrap_err();
		assert!(matches!(err, ConfigError::Toml(_)));
	}
}
