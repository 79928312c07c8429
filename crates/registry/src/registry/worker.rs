use std::collections::hash_map::Entry;
use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use rustc_hash::FxHashMap;
use tally_worker::{SerialActor, SerialSender};

use super::{EntryView, RegistrySnapshot};
use crate::derive::{DefFn, OwnerContext, RegistryKey, ResourceDef};
use crate::lease::ReleasePort;
use crate::notice::{ErrorSink, Level, Notice};
use crate::store::BackingStore;

/// Mutation processed by the registry worker.
pub(crate) enum Command<O, K> {
	Register { owner: O, key: K },
	Unregister { key: K },
}

impl<O, K> ReleasePort<K> for SerialSender<Command<O, K>>
where
	O: Send + 'static,
	K: RegistryKey,
{
	fn unregister(&self, key: K) {
		tracing::trace!(queue = self.name(), key = ?key, "registry.release");
		if self.send(Command::Unregister { key }).is_err() {
			tracing::debug!(queue = self.name(), "registry.release_after_shutdown");
		}
	}
}

/// Sole writer of registry entries and sole caller of store mutations.
pub(crate) struct RegistryWorker<O, K, D>
where
	D: Sync,
{
	pub(super) name: Box<str>,
	pub(super) entries: FxHashMap<K, EntryView<D>>,
	pub(super) def_fn: DefFn<O, K, D>,
	pub(super) store: Arc<dyn BackingStore<D>>,
	pub(super) sink: Option<Arc<dyn ErrorSink>>,
	pub(super) snapshot: Arc<ArcSwap<RegistrySnapshot<K, D>>>,
}

#[async_trait]
impl<O, K, D> SerialActor for RegistryWorker<O, K, D>
where
	O: OwnerContext,
	K: RegistryKey,
	D: ResourceDef,
{
	type Cmd = Command<O, K>;

	async fn handle(&mut self, cmd: Self::Cmd) {
		match cmd {
			Command::Register { owner, key } => self.register(owner, key).await,
			Command::Unregister { key } => self.unregister(key).await,
		}
	}

	fn on_panic(&mut self, message: &str) {
		// Readers may otherwise miss an entry inserted before the panic.
		self.publish();
		self.report(Notice::issue(format!("registry mutation panicked: {message}")));
	}

	async fn on_stop(&mut self) {
		if !self.entries.is_empty() {
			tracing::debug!(queue = &*self.name, live = self.entries.len(), "registry.stopped_with_live_entries");
		}
	}
}

impl<O, K, D> RegistryWorker<O, K, D>
where
	O: OwnerContext,
	K: RegistryKey,
	D: ResourceDef,
{
	async fn register(&mut self, owner: O, key: K) {
		if let Some(entry) = self.entries.get_mut(&key) {
			entry.use_count += 1;
			tracing::trace!(queue = &*self.name, key = ?key, use_count = entry.use_count, "registry.use");
			self.publish();
			return;
		}

		let definition = Arc::new((self.def_fn)(&owner, &key));
		tracing::debug!(queue = &*self.name, key = ?key, id = definition.resource_id(), "registry.create");
		self.entries.insert(
			key,
			EntryView {
				definition: Arc::clone(&definition),
				use_count: 1,
			},
		);

		// The entry stays live on failure: its lease still owes one release.
		let result = self.store.add_resource(&definition).await;
		self.publish();
		if let Err(err) = result {
			self.report(Notice::issue(format!("failed to add resource {}: {err}", definition.resource_id())));
		}
	}

	async fn unregister(&mut self, key: K) {
		let mut occupied = match self.entries.entry(key) {
			Entry::Occupied(occupied) => occupied,
			Entry::Vacant(vacant) => {
				let message = format!("too many unregister calls for {:?}", vacant.key());
				self.report(Notice::warning(message));
				return;
			}
		};

		let remaining = {
			let entry = occupied.get_mut();
			entry.use_count -= 1;
			entry.use_count
		};
		if remaining > 0 {
			tracing::trace!(queue = &*self.name, key = ?occupied.key(), use_count = remaining, "registry.unuse");
			self.publish();
			return;
		}

		let (key, entry) = occupied.remove_entry();
		let id = entry.definition.resource_id();
		tracing::debug!(queue = &*self.name, key = ?key, id, "registry.remove");
		self.publish();
		if let Err(err) = self.store.remove_resource(id).await {
			self.report(Notice::issue(format!("failed to remove resource {id}: {err}")));
		}
	}

	fn publish(&self) {
		self.snapshot.store(Arc::new(RegistrySnapshot {
			entries: self.entries.clone(),
		}));
	}

	fn report(&self, notice: Notice) {
		match notice.level {
			Level::Warn => tracing::warn!(queue = &*self.name, message = %notice.message, "registry.notice"),
			Level::Error => tracing::error!(queue = &*self.name, message = %notice.message, "registry.notice"),
		}
		if let Some(sink) = &self.sink {
			sink.report(notice);
		}
	}
}
