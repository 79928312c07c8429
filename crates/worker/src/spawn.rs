use std::future::Future;
use std::sync::OnceLock;

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;

static FALLBACK: OnceLock<Runtime> = OnceLock::new();

/// Handle of the runtime queue workers run on.
///
/// Inside a tokio context this is the ambient runtime. Registries created from
/// plain threads share one small fallback runtime, built on first use.
pub fn runtime_handle() -> Handle {
	Handle::try_current().unwrap_or_else(|_| fallback_runtime().handle().clone())
}

fn fallback_runtime() -> &'static Runtime {
	FALLBACK.get_or_init(|| {
		tracing::debug!("worker.fallback_runtime");
		Builder::new_multi_thread()
			.enable_all()
			.worker_threads(1)
			.thread_name("tally-serial")
			.build()
			.expect("failed to build fallback runtime for serial queues")
	})
}

/// Spawns `fut` for the queue called `name`.
pub fn spawn<F>(name: &str, fut: F) -> JoinHandle<F::Output>
where
	F: Future + Send + 'static,
	F::Output: Send + 'static,
{
	let handle = runtime_handle();
	tracing::trace!(queue = name, ambient = Handle::try_current().is_ok(), "worker.spawn");
	handle.spawn(fut)
}
