//! License registry configuration.
//!
//! ```toml
//! store-dir = "/home/me/.config/ide/templates/Licenses"
//! id-prefix = "project"
//! file-prefix = "license-"
//! file-extension = "txt"
//! ```
//!
//! Only `store-dir` is required.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur when loading a [`LicenseConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error reading the configuration file.
	#[error("I/O error reading {path}: {error}")]
	Io {
		/// Path to the file that failed to read.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},

	/// Error parsing TOML syntax or shape.
	#[error("TOML parse error: {0}")]
	Toml(#[from] toml::de::Error),

	/// A field holds a value the store cannot use.
	#[error("invalid {field}: {reason}")]
	Invalid {
		/// Offending field, in its TOML spelling.
		field: &'static str,
		/// Why the value was refused.
		reason: String,
	},
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct LicenseConfig {
	/// Directory holding materialized license templates.
	pub store_dir: PathBuf,
	/// Prefix of every derived license id.
	#[serde(default = "default_id_prefix")]
	pub id_prefix: String,
	#[serde(default = "default_file_prefix")]
	pub file_prefix: String,
	#[serde(default = "default_file_extension")]
	pub file_extension: String,
}

fn default_id_prefix() -> String {
	"project".to_string()
}

fn default_file_prefix() -> String {
	"license-".to_string()
}

fn default_file_extension() -> String {
	"txt".to_string()
}

impl LicenseConfig {
	/// Configuration with defaults for everything but the store directory.
	pub fn new(store_dir: impl Into<PathBuf>) -> Self {
		Self {
			store_dir: store_dir.into(),
			id_prefix: default_id_prefix(),
			file_prefix: default_file_prefix(),
			file_extension: default_file_extension(),
		}
	}

	pub fn from_toml_str(input: &str) -> Result<Self> {
		let config: Self = toml::from_str(input)?;
		config.validate()?;
		Ok(config)
	}

	pub fn load(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let input = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		Self::from_toml_str(&input)
	}

	fn validate(&self) -> Result<()> {
		if self.store_dir.as_os_str().is_empty() {
			return Err(invalid("store-dir", "must not be empty"));
		}
		if self.id_prefix.is_empty() {
			return Err(invalid("id-prefix", "must not be empty"));
		}
		for (field, value) in [("id-prefix", &self.id_prefix), ("file-prefix", &self.file_prefix), ("file-extension", &self.file_extension)] {
			if value.contains(['/', '\\']) {
				return Err(invalid(field, format!("{value:?} contains a path separator")));
			}
		}
		if self.file_extension.is_empty() || self.file_extension.starts_with('.') {
			return Err(invalid("file-extension", "must be a bare, non-empty extension"));
		}
		Ok(())
	}
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
	ConfigError::Invalid {
		field,
		reason: reason.into(),
	}
}
