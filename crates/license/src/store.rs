//! File-backed license store.
//!
//! Each registered license is materialized as one template file,
//! `<store_dir>/<file_prefix><id>.<file_extension>`, copied from the project's
//! license file.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tally_registry::{BackingStore, StoreError};

use crate::config::LicenseConfig;
use crate::key::LicenseDef;

/// Template directory shared by every project license.
#[derive(Debug, Clone)]
pub struct FsLicenseStore {
	dir: PathBuf,
	file_prefix: String,
	file_extension: String,
}

impl FsLicenseStore {
	pub fn new(config: &LicenseConfig) -> Self {
		Self {
			dir: config.store_dir.clone(),
			file_prefix: config.file_prefix.clone(),
			file_extension: config.file_extension.clone(),
		}
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	/// Path of the template file for `id`, or `None` if `id` could escape the
	/// store directory.
	pub fn template_path(&self, id: &str) -> Option<PathBuf> {
		if id.is_empty() || id.contains(['/', '\\']) || id.starts_with('.') {
			return None;
		}
		Some(self.dir.join(format!("{}{id}.{}", self.file_prefix, self.file_extension)))
	}
}

#[async_trait]
impl BackingStore<LicenseDef> for FsLicenseStore {
	async fn add_resource(&self, def: &LicenseDef) -> Result<(), StoreError> {
		let Some(target) = self.template_path(&def.id) else {
			return Err(StoreError::rejected(&def.id, "id is not a valid template file name"));
		};
		tokio::fs::create_dir_all(&self.dir).await.map_err(|err| StoreError::io(&def.id, err))?;
		let bytes = tokio::fs::copy(&def.src, &target).await.map_err(|err| StoreError::io(&def.id, err))?;
		tracing::debug!(id = %def.id, src = %def.src.display(), target = %target.display(), bytes, "license.added");
		Ok(())
	}

	async fn remove_resource(&self, id: &str) -> Result<(), StoreError> {
		let Some(target) = self.template_path(id) else {
			return Err(StoreError::rejected(id, "id is not a valid template file name"));
		};
		match tokio::fs::remove_file(&target).await {
			Ok(()) => {
				tracing::debug!(id, target = %target.display(), "license.removed");
				Ok(())
			}
			// Never materialized (its add failed) or already cleaned up.
			Err(err) if err.kind() == ErrorKind::NotFound => {
				tracing::debug!(id, "license.remove.missing");
				Ok(())
			}
			Err(err) => Err(StoreError::io(id, err)),
		}
	}

	/// One `stat` on the template path. Templates installed by other tools
	/// (built-in licenses) count too, so this cannot be an in-memory index.
	fn contains_resource(&self, id: &str) -> bool {
		self.template_path(id).is_some_and(|path| path.is_file())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn store_in(dir: &Path) -> FsLicenseStore {
		FsLicenseStore::new(&LicenseConfig::new(dir))
	}

	#[test]
	fn template_path_rejects_escaping_ids() {
		let store = store_in(Path::new("/licenses"));
		assert_eq!(store.template_path("acme"), Some(PathBuf::from("/licenses/license-acme.txt")));
		assert_eq!(store.template_path("../acme"), None);
		assert_eq!(store.template_path("a/b"), None);
		assert_eq!(store.template_path(""), None);
	}

	#[tokio::test]
	async fn add_copies_and_remove_deletes() {
		let project = tempfile::tempdir().unwrap();
		let templates = tempfile::tempdir().unwrap();
		let src = project.path().join("LICENSE");
		std::fs::write(&src, "Copyright ${organization}").unwrap();

		let store = store_in(&templates.path().join("nested"));
		let def = LicenseDef {
			id: "project-acme-1".to_string(),
			display_name: "Acme".to_string(),
			src,
		};

		assert!(!store.contains_resource(&def.id));
		store.add_resource(&def).await.unwrap();
		assert!(store.contains_resource(&def.id));
		let copied = std::fs::read_to_string(store.template_path(&def.id).unwrap()).unwrap();
		assert_eq!(copied, "Copyright ${organization}");

		store.remove_resource(&def.id).await.unwrap();
		assert!(!store.contains_resource(&def.id));
		store.remove_resource(&def.id).await.unwrap();
	}

	#[test]
	fn contains_sees_templates_installed_by_others() {
		let templates = tempfile::tempdir().unwrap();
		let store = store_in(templates.path());
		assert!(!store.contains_resource("mit"));

		std::fs::write(templates.path().join("license-mit.txt"), "MIT").unwrap();
		assert!(store.contains_resource("mit"));

		std::fs::create_dir(templates.path().join("license-gpl.txt")).unwrap();
		assert!(!store.contains_resource("gpl"), "directories are not templates");
	}

	#[tokio::test]
	async fn missing_source_is_an_io_error() {
		let templates = tempfile::tempdir().unwrap();
		let store = store_in(templates.path());
		let def = LicenseDef {
			id: "project-ghost-1".to_string(),
			display_name: "Ghost".to_string(),
			src: templates.path().join("does-not-exist"),
		};

		let err = store.add_resource(&def).await.unwrap_err();
		assert!(matches!(err, StoreError::Io { ref id, .. } if id == "project-ghost-1"), "got {err:?}");
		assert!(!store.contains_resource(&def.id));
	}
}
