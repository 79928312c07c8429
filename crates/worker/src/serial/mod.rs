//! In-order command queue driving a single actor.
//!
//! A [`SerialQueue`] owns one [`SerialActor`] and feeds it commands from a
//! single worker task, strictly in submission order. Submissions never block
//! and are never dropped: the channel is unbounded, and shutdown drains every
//! command queued ahead of (and racing with) the shutdown request.
//!
//! A command whose handler panics is skipped: the panic is logged, handed to
//! [`SerialActor::on_panic`], and the worker moves on to the next command.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use futures::FutureExt;
use thiserror::Error;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;


/// Single-writer actor executed by a [`SerialQueue`].
///
/// `handle` is never invoked concurrently with itself; each call completes
/// (including any awaited I/O) before the next command is taken.
#[async_trait]
pub trait SerialActor: Send + 'static {
	type Cmd: Send + 'static;

	/// Processes one command.
	async fn handle(&mut self, cmd: Self::Cmd);

	/// Called after `handle` panicked on a command, before the next one runs.
	///
	/// The actor may have been left mid-mutation; this is where it restores
	/// whatever it publishes to readers.
	fn on_panic(&mut self, _message: &str) {}

	/// Runs once after the last command has been processed.
	async fn on_stop(&mut self) {}
}

/// Errors surfaced by queue submission and shutdown.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
	/// The worker no longer accepts commands.
	#[error("serial queue is closed")]
	Closed,
	/// The worker task panicked outside a command handler (in `on_stop`).
	#[error("serial queue worker panicked: {0}")]
	Panicked(String),
	/// The worker task was aborted.
	#[error("serial queue worker was cancelled")]
	Cancelled,
}

/// Configuration for one serial queue.
#[derive(Debug, Clone)]
pub struct SerialQueueSpec {
	pub(crate) name: Box<str>,
}

impl SerialQueueSpec {
	/// Creates a spec with the queue name used in traces.
	pub fn new(name: impl Into<Box<str>>) -> Self {
		Self { name: name.into() }
	}

	/// Replaces the queue name.
	#[must_use]
	pub fn name(mut self, name: impl Into<Box<str>>) -> Self {
		self.name = name.into();
		self
	}

	/// Queue name used in traces.
	pub fn queue_name(&self) -> &str {
		&self.name
	}
}

impl Default for SerialQueueSpec {
	fn default() -> Self {
		Self::new("serial")
	}
}

enum Envelope<Cmd> {
	Cmd(Cmd),
	Barrier(oneshot::Sender<()>),
	Shutdown,
}

struct Shared {
	name: Box<str>,
	pending: AtomicUsize,
	worker: OnceLock<tokio::task::Id>,
}

/// Cloneable submission port for a [`SerialQueue`].
pub struct SerialSender<Cmd> {
	tx: mpsc::UnboundedSender<Envelope<Cmd>>,
	shared: Arc<Shared>,
}

impl<Cmd> Clone for SerialSender<Cmd> {
	fn clone(&self) -> Self {
		Self {
			tx: self.tx.clone(),
			shared: Arc::clone(&self.shared),
		}
	}
}

impl<Cmd> std::fmt::Debug for SerialSender<Cmd> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SerialSender")
			.field("name", &self.shared.name)
			.field("pending", &self.pending())
			.field("closed", &self.is_closed())
			.finish()
	}
}

impl<Cmd> SerialSender<Cmd> {
	/// Enqueues one command without waiting for it to run.
	pub fn send(&self, cmd: Cmd) -> Result<(), QueueError> {
		self.shared.pending.fetch_add(1, Ordering::AcqRel);
		if self.tx.send(Envelope::Cmd(cmd)).is_err() {
			self.shared.pending.fetch_sub(1, Ordering::AcqRel);
			return Err(QueueError::Closed);
		}
		Ok(())
	}

	/// Resolves once every command submitted before this call has been handled.
	pub async fn settle(&self) -> Result<(), QueueError> {
		let (done_tx, done_rx) = oneshot::channel();
		self.tx.send(Envelope::Barrier(done_tx)).map_err(|_| QueueError::Closed)?;
		done_rx.await.map_err(|_| QueueError::Closed)
	}

	/// Number of submitted commands not yet handled.
	pub fn pending(&self) -> usize {
		self.shared.pending.load(Ordering::Acquire)
	}

	/// Returns `true` once the worker stopped accepting commands.
	pub fn is_closed(&self) -> bool {
		self.tx.is_closed()
	}

	/// Queue name used in traces.
	pub fn name(&self) -> &str {
		&self.shared.name
	}

	/// Returns `true` when called from inside this queue's worker task.
	pub fn is_executing_in_this(&self) -> bool {
		match (self.shared.worker.get(), tokio::task::try_id()) {
			(Some(worker), Some(current)) => *worker == current,
			_ => false,
		}
	}
}

/// Owner of one serial worker task.
pub struct SerialQueue<Cmd> {
	sender: SerialSender<Cmd>,
	join: Mutex<Option<JoinHandle<()>>>,
}

impl<Cmd> SerialQueue<Cmd>
where
	Cmd: Send + 'static,
{
	/// Starts a worker task for `actor` on the ambient (or shared) runtime.
	pub fn spawn<A>(spec: SerialQueueSpec, actor: A) -> Self
	where
		A: SerialActor<Cmd = Cmd>,
	{
		let (tx, rx) = mpsc::unbounded_channel();
		let shared = Arc::new(Shared {
			name: spec.name,
			pending: AtomicUsize::new(0),
			worker: OnceLock::new(),
		});
		let task = crate::spawn(&shared.name, run_worker(actor, rx, Arc::clone(&shared)));
		Self {
			sender: SerialSender { tx, shared },
			join: Mutex::new(Some(task)),
		}
	}

	/// Returns a cloneable submission port.
	pub fn sender(&self) -> SerialSender<Cmd> {
		self.sender.clone()
	}

	/// Enqueues one command without waiting for it to run.
	pub fn send(&self, cmd: Cmd) -> Result<(), QueueError> {
		self.sender.send(cmd)
	}

	/// Resolves once every command submitted before this call has been handled.
	pub async fn settle(&self) -> Result<(), QueueError> {
		self.sender.settle().await
	}

	/// Number of submitted commands not yet handled.
	pub fn pending(&self) -> usize {
		self.sender.pending()
	}

	/// Returns `true` when called from inside this queue's worker task.
	pub fn is_executing_in_this(&self) -> bool {
		self.sender.is_executing_in_this()
	}

	/// Stops accepting commands, drains everything already queued, and joins
	/// the worker. Calling it again after completion is a no-op.
	pub async fn shutdown(&self) -> Result<(), QueueError> {
		let _ = self.sender.tx.send(Envelope::Shutdown);
		let Some(task) = self.join.lock().await.take() else {
			return Ok(());
		};
		match task.await {
			Ok(()) => Ok(()),
			Err(err) => Err(match crate::join_error_panic_message(err) {
				Some(msg) => QueueError::Panicked(msg),
				None => QueueError::Cancelled,
			}),
		}
	}
}

async fn run_worker<A>(mut actor: A, mut rx: mpsc::UnboundedReceiver<Envelope<A::Cmd>>, shared: Arc<Shared>)
where
	A: SerialActor,
{
	let _ = shared.worker.set(tokio::task::id());
	tracing::debug!(queue = &*shared.name, "serial.start");

	while let Some(envelope) = rx.recv().await {
		match envelope {
			Envelope::Cmd(cmd) => {
				let outcome = AssertUnwindSafe(actor.handle(cmd)).catch_unwind().await;
				shared.pending.fetch_sub(1, Ordering::AcqRel);
				if let Err(payload) = outcome {
					let message = crate::panic_message(payload.as_ref());
					tracing::error!(queue = &*shared.name, panic = %message, "serial.command_panicked");
					actor.on_panic(&message);
				}
			}
			Envelope::Barrier(done) => {
				let _ = done.send(());
			}
			Envelope::Shutdown => {
				tracing::debug!(
					queue = &*shared.name,
					pending = shared.pending.load(Ordering::Acquire),
					"serial.shutdown_requested"
				);
				rx.close();
			}
		}
	}

	actor.on_stop().await;
	tracing::debug!(queue = &*shared.name, "serial.stop");
}
