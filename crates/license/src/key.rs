//! License keys and definitions derived from project headers.

use std::hash::{Hash, Hasher};
use std::path::PathBuf;

use rustc_hash::FxHasher;
use tally_registry::{Derivation, ResourceDef};

use crate::header::{LicenseHeaderInfo, ProjectOwner};

/// Identity of a project-provided license: its name and resolved file.
///
/// Projects pointing at the same file under the same name share one
/// registered license.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LicenseKey {
	pub name: String,
	pub file: PathBuf,
}

/// License template materialized in a license store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseDef {
	pub id: String,
	pub display_name: String,
	pub src: PathBuf,
}

impl ResourceDef for LicenseDef {
	fn resource_id(&self) -> &str {
		&self.id
	}
}

/// Derives the key for `header`, or `None` when it needs no registration.
pub fn license_key(owner: &ProjectOwner, header: &LicenseHeaderInfo) -> Option<LicenseKey> {
	let file = header.license_file.as_deref()?;
	if header.license_name.is_empty() {
		return None;
	}
	Some(LicenseKey {
		name: header.license_name.clone(),
		file: owner.resolve(file),
	})
}

/// Builds the definition for a newly registered key.
///
/// The id is stable across runs for the same key, so a store left behind by
/// an earlier session is overwritten rather than duplicated. The hash covers
/// the whole key: names that slug alike ("MIT", "mit") on one file must not
/// share a template.
pub fn license_def(id_prefix: &str, owner: &ProjectOwner, key: &LicenseKey) -> LicenseDef {
	let mut hasher = FxHasher::default();
	key.hash(&mut hasher);
	let id = format!("{id_prefix}-{}-{:016x}", slug(&key.name), hasher.finish());
	LicenseDef {
		id,
		display_name: format!("{} ({})", key.name, owner.name),
		src: key.file.clone(),
	}
}

/// Derivation pair for a license registry with the given id prefix.
pub fn license_derivation(id_prefix: impl Into<String>) -> Derivation<ProjectOwner, LicenseHeaderInfo, LicenseKey, LicenseDef> {
	let id_prefix = id_prefix.into();
	Derivation::new(license_key, move |owner, key| license_def(&id_prefix, owner, key))
}

fn slug(name: &str) -> String {
	let mut out = String::with_capacity(name.len());
	for ch in name.chars() {
		if ch.is_ascii_alphanumeric() {
			out.push(ch.to_ascii_lowercase());
		} else if !out.ends_with('-') {
			out.push('-');
		}
	}
	let trimmed = out.trim_matches('-');
	if trimmed.is_empty() { "license".to_string() } else { trimmed.to_string() }
}

#[cfg(test)]
mod tests {
	use std::path::Path;

	use rstest::rstest;

	use super::*;

	#[rstest]
	#[case("MIT", "mit")]
	#[case("Acme Corp / Internal", "acme-corp-internal")]
	#[case("  --  ", "license")]
	#[case("Übersetzung v2", "bersetzung-v2")]
	fn slug_keeps_ids_path_safe(#[case] name: &str, #[case] expected: &str) {
		assert_eq!(slug(name), expected);
	}

	#[test]
	fn builtin_header_derives_no_key() {
		let owner = ProjectOwner::new("app", "/work/app");
		assert_eq!(license_key(&owner, &LicenseHeaderInfo::builtin("mit")), None);
		assert_eq!(license_key(&owner, &LicenseHeaderInfo::with_file("", "LICENSE")), None);
	}

	#[test]
	fn owners_resolving_to_the_same_file_share_a_key() {
		let header = LicenseHeaderInfo::with_file("acme", "/shared/LICENSE");
		let a = license_key(&ProjectOwner::new("a", "/work/a"), &header).unwrap();
		let b = license_key(&ProjectOwner::new("b", "/work/b"), &header).unwrap();
		assert_eq!(a, b);
	}

	#[test]
	fn relative_files_give_distinct_keys_per_project() {
		let header = LicenseHeaderInfo::with_file("acme", "LICENSE");
		let a = license_key(&ProjectOwner::new("a", "/work/a"), &header).unwrap();
		let b = license_key(&ProjectOwner::new("b", "/work/b"), &header).unwrap();
		assert_ne!(a, b);
		assert_eq!(a.file, Path::new("/work/a/LICENSE"));
	}

	#[test]
	fn definition_id_is_stable_and_prefixed() {
		let owner = ProjectOwner::new("app", "/work/app");
		let key = LicenseKey {
			name: "Acme Corp".to_string(),
			file: PathBuf::from("/work/app/LICENSE"),
		};
		let first = license_def("project", &owner, &key);
		let second = license_def("project", &ProjectOwner::new("other", "/elsewhere"), &key);

		assert_eq!(first.id, second.id);
		assert!(first.id.starts_with("project-acme-corp-"), "got {}", first.id);
		assert_eq!(first.display_name, "Acme Corp (app)");
		assert_eq!(first.src, key.file);
	}

	#[rstest]
	#[case("MIT", "mit")]
	#[case("Acme Corp", "acme-corp")]
	fn names_that_slug_alike_get_distinct_ids(#[case] left: &str, #[case] right: &str) {
		let owner = ProjectOwner::new("app", "/work/app");
		let file = PathBuf::from("/work/app/LICENSE");
		let key = |name: &str| LicenseKey {
			name: name.to_string(),
			file: file.clone(),
		};

		let left = license_def("project", &owner, &key(left));
		let right = license_def("project", &owner, &key(right));
		assert_ne!(left.id, right.id);
	}
}
