//! Reference-counted registry of shared resources.
//!
//! Every mutation (register, unregister, and the backing-store calls they
//! imply) runs on one [`SerialQueue`] worker per registry, strictly in
//! submission order. After each mutation the worker publishes an immutable
//! [`RegistrySnapshot`]; [`Registry::lookup`] reads the latest snapshot
//! without touching the queue, so it may observe state from just before an
//! in-flight mutation.

mod worker;


use std::sync::Arc;

use arc_swap::ArcSwap;
use rustc_hash::FxHashMap;
use tally_worker::{QueueError, SerialQueue, SerialQueueSpec};

use crate::derive::{Derivation, HeaderInfo, OwnerContext, RegistryKey, ResourceDef};
use crate::lease::{Lease, ReleasePort};
use crate::notice::ErrorSink;
use crate::store::BackingStore;
use worker::{Command, RegistryWorker};

/// Published state of one live entry.
#[derive(Debug)]
pub struct EntryView<D> {
	/// Definition derived by the first registrant.
	pub definition: Arc<D>,
	/// Number of outstanding registrations, always `>= 1`.
	pub use_count: usize,
}

impl<D> Clone for EntryView<D> {
	fn clone(&self) -> Self {
		Self {
			definition: Arc::clone(&self.definition),
			use_count: self.use_count,
		}
	}
}

/// Immutable view of the live entries after some mutation.
#[derive(Debug)]
pub struct RegistrySnapshot<K, D> {
	entries: FxHashMap<K, EntryView<D>>,
}

impl<K, D> Default for RegistrySnapshot<K, D> {
	fn default() -> Self {
		Self {
			entries: FxHashMap::default(),
		}
	}
}

impl<K, D> RegistrySnapshot<K, D>
where
	K: RegistryKey,
{
	pub fn get(&self, key: &K) -> Option<&EntryView<D>> {
		self.entries.get(key)
	}

	/// Outstanding registrations for `key`; zero when no entry is live.
	pub fn use_count(&self, key: &K) -> usize {
		self.entries.get(key).map_or(0, |entry| entry.use_count)
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&K, &EntryView<D>)> {
		self.entries.iter()
	}
}

/// Builder for a [`Registry`].
pub struct RegistryBuilder<O, H, K, D>
where
	D: Sync,
{
	spec: SerialQueueSpec,
	store: Arc<dyn BackingStore<D>>,
	derivation: Derivation<O, H, K, D>,
	sink: Option<Arc<dyn ErrorSink>>,
}

impl<O, H, K, D> RegistryBuilder<O, H, K, D>
where
	O: OwnerContext,
	H: HeaderInfo,
	K: RegistryKey,
	D: ResourceDef,
{
	/// Sets the name used for the worker queue in traces.
	#[must_use]
	pub fn name(mut self, name: impl Into<Box<str>>) -> Self {
		self.spec = self.spec.name(name);
		self
	}

	/// Routes protocol violations and store failures to `sink`.
	#[must_use]
	pub fn sink(mut self, sink: impl ErrorSink) -> Self {
		self.sink = Some(Arc::new(sink));
		self
	}

	/// Routes notices to an already shared sink.
	#[must_use]
	pub fn shared_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
		self.sink = Some(sink);
		self
	}

	/// Spawns the worker and returns the registry.
	///
	/// Uses the ambient tokio runtime when called inside one.
	pub fn build(self) -> Registry<O, H, K, D> {
		let snapshot = Arc::new(ArcSwap::from_pointee(RegistrySnapshot::default()));
		let name = self.spec.queue_name().into();
		let worker = RegistryWorker {
			name,
			entries: FxHashMap::default(),
			def_fn: self.derivation.def_fn(),
			store: Arc::clone(&self.store),
			sink: self.sink,
			snapshot: Arc::clone(&snapshot),
		};
		let queue = SerialQueue::spawn(self.spec, worker);
		let release_port: Arc<dyn ReleasePort<K>> = Arc::new(queue.sender());
		Registry {
			queue,
			release_port,
			derivation: self.derivation,
			store: self.store,
			snapshot,
		}
	}
}

/// Reference-counted registry mapping derived keys to shared resources.
///
/// `register` and `Lease::release` only enqueue work and return immediately;
/// failures are delivered to the configured [`ErrorSink`], never to callers.
pub struct Registry<O, H, K, D>
where
	D: Sync,
{
	queue: SerialQueue<Command<O, K>>,
	release_port: Arc<dyn ReleasePort<K>>,
	derivation: Derivation<O, H, K, D>,
	store: Arc<dyn BackingStore<D>>,
	snapshot: Arc<ArcSwap<RegistrySnapshot<K, D>>>,
}

impl<O, H, K, D> Registry<O, H, K, D>
where
	O: OwnerContext,
	H: HeaderInfo,
	K: RegistryKey,
	D: ResourceDef,
{
	pub fn builder(store: Arc<dyn BackingStore<D>>, derivation: Derivation<O, H, K, D>) -> RegistryBuilder<O, H, K, D> {
		RegistryBuilder {
			spec: SerialQueueSpec::new("registry"),
			store,
			derivation,
			sink: None,
		}
	}

	/// Requests one unit of ownership of the resource `header` describes.
	///
	/// Returns a no-op lease when `header` is `None`, when no key can be
	/// derived, or when the registry has shut down.
	pub fn register(&self, owner: &O, header: Option<&H>) -> Lease<K> {
		let Some(header) = header else {
			return Lease::noop();
		};
		let Some(key) = self.derivation.key(owner, header) else {
			tracing::trace!("registry.register.no_key");
			return Lease::noop();
		};

		let cmd = Command::Register {
			owner: owner.clone(),
			key: key.clone(),
		};
		if let Err(err) = self.queue.send(cmd) {
			tracing::debug!(key = ?key, error = %err, "registry.register_after_shutdown");
			return Lease::noop();
		}
		tracing::trace!(key = ?key, "registry.register");
		Lease::bound(key, Arc::clone(&self.release_port))
	}

	/// Resolves the id of the resource currently registered for `header`.
	///
	/// Never blocks on the mutation queue. Prefers the live entry's id, then
	/// the id embedded in the header; either is returned only if the backing
	/// store currently holds it.
	pub fn lookup(&self, owner: &O, header: &H) -> Option<String> {
		let snapshot = self.snapshot.load();
		let live = self
			.derivation
			.key(owner, header)
			.and_then(|key| snapshot.get(&key).map(|entry| Arc::clone(&entry.definition)));

		if let Some(definition) = live {
			let id = definition.resource_id();
			if self.store.contains_resource(id) {
				return Some(id.to_owned());
			}
		}

		let fallback = header.fallback_id()?;
		self.store.contains_resource(fallback).then(|| fallback.to_owned())
	}

	/// Latest published state of the live entries.
	pub fn snapshot(&self) -> Arc<RegistrySnapshot<K, D>> {
		self.snapshot.load_full()
	}

	/// Number of queued mutations not yet processed.
	pub fn pending(&self) -> usize {
		self.queue.pending()
	}

	/// Returns `true` when called from the registry worker, e.g. from a sink
	/// or a backing store.
	pub fn is_executing_in_queue(&self) -> bool {
		self.queue.is_executing_in_this()
	}

	/// Waits until every mutation submitted before this call has run.
	pub async fn settle(&self) -> Result<(), QueueError> {
		self.queue.settle().await
	}

	/// Drains queued mutations and stops the worker. Live entries are left in
	/// the backing store.
	pub async fn shutdown(&self) -> Result<(), QueueError> {
		self.queue.shutdown().await
	}
}
