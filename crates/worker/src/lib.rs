//! Worker runtime primitives for registry-style single-writer services.
//!
//! * [`spawn`] resolves a tokio runtime even from non-async caller threads.
//! * [`SerialQueue`] runs one [`SerialActor`] over an unbounded, strictly
//!   ordered command queue with quiescence barriers and draining shutdown.

mod panic;
mod serial;
mod spawn;

pub use panic::{join_error_panic_message, panic_message};
pub use serial::{QueueError, SerialActor, SerialQueue, SerialQueueSpec, SerialSender};
pub use spawn::{runtime_handle, spawn};
