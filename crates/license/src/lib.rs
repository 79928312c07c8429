//! Project license templates managed through a shared registry.
//!
//! Projects whose header settings point at a license file get that file
//! installed as a template in a common store directory for as long as at
//! least one project uses it. Headers naming a built-in license need no
//! registration; lookups fall back to the license name.

mod config;
mod header;
mod key;
mod store;

use std::sync::Arc;

pub use config::{ConfigError, LicenseConfig, Result};
pub use header::{LicenseHeaderInfo, ProjectOwner};
pub use key::{LicenseDef, LicenseKey, license_def, license_derivation, license_key};
pub use store::FsLicenseStore;
use tally_registry::{BackingStore, ErrorSink, Registry};

/// Registry of project license templates.
pub type LicenseManager = Registry<ProjectOwner, LicenseHeaderInfo, LicenseKey, LicenseDef>;

/// Builds a license manager backed by an [`FsLicenseStore`].
///
/// Must be called where a tokio runtime is available, or the shared worker
/// runtime is started.
pub fn license_manager(config: &LicenseConfig, sink: Option<Arc<dyn ErrorSink>>) -> LicenseManager {
	let store: Arc<dyn BackingStore<LicenseDef>> = Arc::new(FsLicenseStore::new(config));
	let builder = Registry::builder(store, license_derivation(config.id_prefix.clone())).name("license");
	match sink {
		Some(sink) => builder.shared_sink(sink).build(),
		None => builder.build(),
	}
}
