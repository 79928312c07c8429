//! Backing store boundary.
//!
//! The registry worker is the only caller of [`BackingStore::add_resource`]
//! and [`BackingStore::remove_resource`]; calls are never issued concurrently.
//! [`BackingStore::contains_resource`] is called from arbitrary threads by
//! lookups and must not block.

use async_trait::async_trait;
use thiserror::Error;

/// Failures reported by a backing store.
#[derive(Debug, Error)]
pub enum StoreError {
	/// An I/O operation on the resource failed.
	#[error("I/O error on resource {id}: {source}")]
	Io {
		/// Resource the operation targeted.
		id: String,
		/// The underlying I/O error.
		#[source]
		source: std::io::Error,
	},

	/// The store refused the resource.
	#[error("resource {id} rejected: {reason}")]
	Rejected {
		/// Resource the operation targeted.
		id: String,
		/// Human-readable rejection cause.
		reason: String,
	},
}

impl StoreError {
	pub fn io(id: impl Into<String>, source: std::io::Error) -> Self {
		Self::Io { id: id.into(), source }
	}

	pub fn rejected(id: impl Into<String>, reason: impl Into<String>) -> Self {
		Self::Rejected {
			id: id.into(),
			reason: reason.into(),
		}
	}
}

/// External persistence target mutated by the registry worker.
#[async_trait]
pub trait BackingStore<D>: Send + Sync + 'static
where
	D: Sync,
{
	/// Materializes `def`.
	async fn add_resource(&self, def: &D) -> Result<(), StoreError>;

	/// Tears down the resource named `id`.
	async fn remove_resource(&self, id: &str) -> Result<(), StoreError>;

	/// Returns `true` if the store currently holds `id`.
	///
	/// Called synchronously by `Registry::lookup` on the caller's thread,
	/// which is often a runtime worker. Implementations should answer from
	/// memory or a single cheap probe (one `stat`), never from a scan.
	fn contains_resource(&self, id: &str) -> bool;
}
