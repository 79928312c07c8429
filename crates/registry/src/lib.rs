//! Reference-counted registry of shared, derivable resources.
//!
//! Many independent owners may ask for the same logical resource. The
//! registry materializes it in a [`BackingStore`] on the first registration of
//! its key and tears it down when the last [`Lease`] is released. Mutations are
//! serialized on one worker per registry; [`Registry::lookup`] reads a
//! published snapshot and never waits for them.
//!
//! ```ignore
//! let registry = Registry::builder(store, Derivation::new(key_fn, def_fn))
//! 	.sink(sink)
//! 	.build();
//! let lease = registry.register(&owner, Some(&header));
//! // ...
//! lease.release();
//! ```

mod binding;
mod derive;
mod lease;
mod notice;
mod registry;
mod store;

pub use binding::{Binding, RegisterAction};
pub use derive::{DefFn, Derivation, HeaderInfo, KeyFn, OwnerContext, RegistryKey, ResourceDef};
pub use lease::Lease;
pub use notice::{ChannelSink, ErrorSink, Level, Notice};
pub use registry::{EntryView, Registry, RegistryBuilder, RegistrySnapshot};
pub use store::{BackingStore, StoreError};
pub use tally_worker::QueueError;
