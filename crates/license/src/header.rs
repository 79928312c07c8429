//! License header descriptions and the projects that own them.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tally_registry::HeaderInfo;

/// Project whose settings reference a license header.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectOwner {
	pub name: String,
	/// Directory relative license files are resolved against.
	pub root: PathBuf,
}

impl ProjectOwner {
	pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
		Self {
			name: name.into(),
			root: root.into(),
		}
	}

	/// Resolves `path` against the project root unless it is absolute.
	pub fn resolve(&self, path: &Path) -> PathBuf {
		if path.is_absolute() { path.to_path_buf() } else { self.root.join(path) }
	}
}

/// License header settings of one project.
///
/// A header without `license_file` names a license the store already knows
/// (a built-in template) and needs no registration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LicenseHeaderInfo {
	pub license_name: String,
	#[serde(default)]
	pub properties: BTreeMap<String, String>,
	#[serde(default)]
	pub license_file: Option<PathBuf>,
}

impl LicenseHeaderInfo {
	/// Header referring to a built-in license.
	pub fn builtin(license_name: impl Into<String>) -> Self {
		Self {
			license_name: license_name.into(),
			..Self::default()
		}
	}

	/// Header backed by a project license file.
	pub fn with_file(license_name: impl Into<String>, license_file: impl Into<PathBuf>) -> Self {
		Self {
			license_name: license_name.into(),
			license_file: Some(license_file.into()),
			..Self::default()
		}
	}

	#[must_use]
	pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.properties.insert(key.into(), value.into());
		self
	}
}

impl HeaderInfo for LicenseHeaderInfo {
	fn fallback_id(&self) -> Option<&str> {
		(!self.license_name.is_empty()).then_some(self.license_name.as_str())
	}
}
