//! Registration helpers for owners whose context changes over time.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::derive::{HeaderInfo, OwnerContext, RegistryKey, ResourceDef};
use crate::lease::Lease;
use crate::registry::Registry;

/// Deferred registration of one `(owner, header)` pair.
///
/// Each [`open`](Self::open) registers anew and yields its own lease, so an
/// action can be handed to UI code that opens and closes it repeatedly.
pub struct RegisterAction<O, H, K, D>
where
	D: Sync,
{
	registry: Arc<Registry<O, H, K, D>>,
	owner: O,
	header: Option<H>,
}

impl<O, H, K, D> Clone for RegisterAction<O, H, K, D>
where
	O: Clone,
	H: Clone,
	D: Sync,
{
	fn clone(&self) -> Self {
		Self {
			registry: Arc::clone(&self.registry),
			owner: self.owner.clone(),
			header: self.header.clone(),
		}
	}
}

impl<O, H, K, D> RegisterAction<O, H, K, D>
where
	O: OwnerContext,
	H: HeaderInfo,
	K: RegistryKey,
	D: ResourceDef,
{
	pub fn open(&self) -> Lease<K> {
		self.registry.register(&self.owner, self.header.as_ref())
	}
}

/// Keeps exactly one lease for the latest values of an owner/header pair.
///
/// Closing or dropping the binding releases the lease it currently holds.
pub struct Binding {
	cancel: CancellationToken,
	task: Option<JoinHandle<()>>,
}

impl Binding {
	/// Stops tracking and waits until the held lease has been released.
	pub async fn close(mut self) {
		self.cancel.cancel();
		if let Some(task) = self.task.take() {
			let _ = task.await;
		}
	}
}

impl Drop for Binding {
	fn drop(&mut self) {
		self.cancel.cancel();
	}
}

impl<O, H, K, D> Registry<O, H, K, D>
where
	O: OwnerContext,
	H: HeaderInfo + Clone,
	K: RegistryKey,
	D: ResourceDef,
{
	/// Captures `(owner, header)` for later registration.
	pub fn action(self: &Arc<Self>, owner: O, header: Option<H>) -> RegisterAction<O, H, K, D> {
		RegisterAction {
			registry: Arc::clone(self),
			owner,
			header,
		}
	}

	/// Tracks the current owner and header, re-registering whenever either
	/// changes.
	///
	/// The new pair is registered before the previous lease is released, so an
	/// unchanged key never transiently loses its entry. A closed source keeps
	/// its last value.
	pub fn bind(self: &Arc<Self>, mut owner_rx: watch::Receiver<O>, mut header_rx: watch::Receiver<Option<H>>) -> Binding {
		let registry = Arc::clone(self);
		let cancel = CancellationToken::new();
		let task_cancel = cancel.clone();

		let task = tally_worker::spawn("registry.binding", async move {
			let mut current = register_current(&registry, &mut owner_rx, &mut header_rx);
			let mut owner_open = true;
			let mut header_open = true;

			loop {
				tokio::select! {
					biased;
					_ = task_cancel.cancelled() => break,
					changed = owner_rx.changed(), if owner_open => {
						if changed.is_err() {
							owner_open = false;
							continue;
						}
					}
					changed = header_rx.changed(), if header_open => {
						if changed.is_err() {
							header_open = false;
							continue;
						}
					}
				}

				let next = register_current(&registry, &mut owner_rx, &mut header_rx);
				let previous = std::mem::replace(&mut current, next);
				previous.release();
			}

			current.release();
			tracing::trace!("registry.binding.closed");
		});

		Binding { cancel, task: Some(task) }
	}
}

fn register_current<O, H, K, D>(registry: &Registry<O, H, K, D>, owner_rx: &mut watch::Receiver<O>, header_rx: &mut watch::Receiver<Option<H>>) -> Lease<K>
where
	O: OwnerContext,
	H: HeaderInfo + Clone,
	K: RegistryKey,
	D: ResourceDef,
{
	let owner = owner_rx.borrow_and_update().clone();
	let header = header_rx.borrow_and_update().clone();
	registry.register(&owner, header.as_ref())
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;
	use std::time::Duration;

	use super::*;
	use crate::registry::tests::{Header, Owner, RecordingStore, registry_with};

	async fn wait_for<F: Fn() -> bool>(cond: F) {
		tokio::time::timeout(Duration::from_secs(2), async {
			while !cond() {
				tokio::time::sleep(Duration::from_millis(1)).await;
			}
		})
		.await
		.expect("condition not reached in time");
	}

	#[tokio::test]
	async fn action_opens_independent_leases() {
		let store = Arc::new(RecordingStore::default());
		let registry = Arc::new(registry_with(&store));
		let action = registry.action(Owner::new("a"), Some(Header::file("mit", "K1")));

		let first = action.open();
		let second = action.clone().open();
		registry.settle().await.unwrap();
		assert_eq!(registry.snapshot().use_count(&"K1".to_string()), 2);

		first.release();
		second.release();
		registry.settle().await.unwrap();
		assert!(registry.snapshot().is_empty());
		assert_eq!(store.adds(), vec!["a:K1"]);
		assert_eq!(store.removes(), vec!["a:K1"]);
	}

	#[tokio::test]
	async fn binding_follows_header_changes() {
		let store = Arc::new(RecordingStore::default());
		let registry = Arc::new(registry_with(&store));
		let (_owner_tx, owner_rx) = watch::channel(Owner::new("a"));
		let (header_tx, header_rx) = watch::channel(Some(Header::file("mit", "K1")));

		let binding = registry.bind(owner_rx, header_rx);
		wait_for(|| store.adds().len() == 1).await;

		header_tx.send_replace(Some(Header::file("apache", "K2")));
		wait_for(|| store.removes().len() == 1).await;
		registry.settle().await.unwrap();
		let snapshot = registry.snapshot();
		assert_eq!(snapshot.use_count(&"K1".to_string()), 0);
		assert_eq!(snapshot.use_count(&"K2".to_string()), 1);

		header_tx.send_replace(None);
		wait_for(|| store.removes().len() == 2).await;

		binding.close().await;
		registry.settle().await.unwrap();
		assert!(registry.snapshot().is_empty());
		assert_eq!(store.adds(), vec!["a:K1", "a:K2"]);
		assert_eq!(store.removes(), vec!["a:K1", "a:K2"]);
	}

	#[tokio::test]
	async fn binding_keeps_entry_when_key_is_unchanged() {
		let store = Arc::new(RecordingStore::default());
		let registry = Arc::new(registry_with(&store));
		let (owner_tx, owner_rx) = watch::channel(Owner::new("a"));
		let (_header_tx, header_rx) = watch::channel(Some(Header::file("mit", "K1")));

		let binding = registry.bind(owner_rx, header_rx);
		wait_for(|| store.adds().len() == 1).await;

		owner_tx.send_replace(Owner::new("b"));
		tokio::time::sleep(Duration::from_millis(50)).await;
		registry.settle().await.unwrap();

		assert_eq!(registry.snapshot().use_count(&"K1".to_string()), 1);
		assert_eq!(store.adds(), vec!["a:K1"], "re-registration must not recreate the resource");
		assert!(store.removes().is_empty());

		drop(binding);
		wait_for(|| store.removes().len() == 1).await;
	}
}
