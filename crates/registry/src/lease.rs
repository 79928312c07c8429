//! Scoped acquisition handles.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Submits the single unregister request owed by a lease.
pub(crate) trait ReleasePort<K>: Send + Sync {
	fn unregister(&self, key: K);
}

/// One unit of ownership over a registered resource.
///
/// Returned by [`Registry::register`](crate::Registry::register). The first
/// call to [`release`](Self::release) (or dropping the lease) enqueues exactly
/// one unregister request for the bound key; later calls do nothing, even when
/// raced from several threads. A no-op lease never touches the registry.
#[must_use = "dropping a lease releases it immediately"]
pub struct Lease<K>
where
	K: Send + Sync + 'static,
{
	bound: Option<(K, Arc<dyn ReleasePort<K>>)>,
	released: AtomicBool,
}

impl<K> Lease<K>
where
	K: Clone + Send + Sync + 'static,
{
	/// Lease with nothing to release.
	pub fn noop() -> Self {
		Self {
			bound: None,
			released: AtomicBool::new(true),
		}
	}

	pub(crate) fn bound(key: K, port: Arc<dyn ReleasePort<K>>) -> Self {
		Self {
			bound: Some((key, port)),
			released: AtomicBool::new(false),
		}
	}

	/// Gives up this unit of ownership. Idempotent.
	pub fn release(&self) {
		if self.released.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
			return;
		}
		if let Some((key, port)) = &self.bound {
			port.unregister(key.clone());
		}
	}

	/// Key this lease holds, or `None` for a no-op lease.
	pub fn key(&self) -> Option<&K> {
		self.bound.as_ref().map(|(key, _)| key)
	}

	pub fn is_noop(&self) -> bool {
		self.bound.is_none()
	}

	pub fn is_released(&self) -> bool {
		self.released.load(Ordering::Acquire)
	}
}

impl<K> Drop for Lease<K>
where
	K: Send + Sync + 'static,
{
	fn drop(&mut self) {
		if *self.released.get_mut() {
			return;
		}
		*self.released.get_mut() = true;
		if let Some((key, port)) = self.bound.take() {
			port.unregister(key);
		}
	}
}

impl<K> fmt::Debug for Lease<K>
where
	K: fmt::Debug + Send + Sync + 'static,
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Lease")
			.field("key", &self.bound.as_ref().map(|(key, _)| key))
			.field("released", &self.released.load(Ordering::Acquire))
			.finish()
	}
}
