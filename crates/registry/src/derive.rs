//! Caller-supplied key and definition derivation.

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

/// Owner context passed to derivation functions.
pub trait OwnerContext: Clone + Send + Sync + 'static {}

impl<T> OwnerContext for T where T: Clone + Send + Sync + 'static {}

/// Identity of one logical shared resource within a registry.
pub trait RegistryKey: Eq + Hash + Clone + Debug + Send + Sync + 'static {}

impl<T> RegistryKey for T where T: Eq + Hash + Clone + Debug + Send + Sync + 'static {}

/// Full description needed to materialize a resource in a backing store.
pub trait ResourceDef: Send + Sync + 'static {
	/// Identifier under which the backing store knows this resource.
	fn resource_id(&self) -> &str;
}

/// Header description from which keys are derived.
pub trait HeaderInfo: Send + Sync + 'static {
	/// Resource id embedded in the header itself, used by lookups when no
	/// live registration exists for the derived key.
	fn fallback_id(&self) -> Option<&str>;
}

/// Derives a registry key; `None` means there is nothing to manage.
pub type KeyFn<O, H, K> = Arc<dyn Fn(&O, &H) -> Option<K> + Send + Sync>;

/// Derives the definition for a freshly registered key.
pub type DefFn<O, K, D> = Arc<dyn Fn(&O, &K) -> D + Send + Sync>;

/// Pair of pure derivation functions injected by the owning subsystem.
///
/// Both functions must be stable (equal logical inputs yield equal keys) and
/// must not perform I/O. The definition function runs at most once per live
/// entry, on the registry worker.
pub struct Derivation<O, H, K, D> {
	key: KeyFn<O, H, K>,
	def: DefFn<O, K, D>,
}

impl<O, H, K, D> Clone for Derivation<O, H, K, D> {
	fn clone(&self) -> Self {
		Self {
			key: Arc::clone(&self.key),
			def: Arc::clone(&self.def),
		}
	}
}

impl<O, H, K, D> Derivation<O, H, K, D> {
	pub fn new(
		key: impl Fn(&O, &H) -> Option<K> + Send + Sync + 'static,
		def: impl Fn(&O, &K) -> D + Send + Sync + 'static,
	) -> Self {
		Self {
			key: Arc::new(key),
			def: Arc::new(def),
		}
	}

	pub fn key(&self, owner: &O, header: &H) -> Option<K> {
		(self.key)(owner, header)
	}

	pub fn definition(&self, owner: &O, key: &K) -> D {
		(self.def)(owner, key)
	}

	pub(crate) fn def_fn(&self) -> DefFn<O, K, D> {
		Arc::clone(&self.def)
	}
}
