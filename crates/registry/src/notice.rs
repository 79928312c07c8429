//! Asynchronous problem reports for a notification surface.

use std::sync::Arc;

use tokio::sync::mpsc;

/// Severity of a [`Notice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
	/// Protocol violations that leave registry state untouched.
	Warn,
	/// Backing store failures.
	Error,
}

/// Human-readable failure or warning produced by the registry worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
	pub level: Level,
	pub message: String,
}

impl Notice {
	pub fn warning(message: impl Into<String>) -> Self {
		Self {
			level: Level::Warn,
			message: message.into(),
		}
	}

	pub fn issue(message: impl Into<String>) -> Self {
		Self {
			level: Level::Error,
			message: message.into(),
		}
	}
}

/// Consumer of registry notices.
///
/// Called on the registry worker; implementations must not block.
pub trait ErrorSink: Send + Sync + 'static {
	fn report(&self, notice: Notice);
}

impl<F> ErrorSink for F
where
	F: Fn(Notice) + Send + Sync + 'static,
{
	fn report(&self, notice: Notice) {
		self(notice);
	}
}

/// Sink forwarding notices to an unbounded channel drained by a UI.
#[derive(Debug, Clone)]
pub struct ChannelSink {
	tx: mpsc::UnboundedSender<Notice>,
}

impl ChannelSink {
	/// Creates a sink and the receiver the notification surface reads from.
	pub fn new() -> (Self, mpsc::UnboundedReceiver<Notice>) {
		let (tx, rx) = mpsc::unbounded_channel();
		(Self { tx }, rx)
	}

	pub fn into_shared(self) -> Arc<dyn ErrorSink> {
		Arc::new(self)
	}
}

impl ErrorSink for ChannelSink {
	fn report(&self, notice: Notice) {
		if self.tx.send(notice).is_err() {
			tracing::trace!("notice.receiver_closed");
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn channel_sink_delivers_in_order() {
		let (sink, mut rx) = ChannelSink::new();
		sink.report(Notice::warning("first"));
		sink.report(Notice::issue("second"));

		assert_eq!(rx.recv().await, Some(Notice::warning("first")));
		let second = rx.recv().await.unwrap();
		assert_eq!(second.level, Level::Error);
		assert_eq!(second.message, "second");
	}

	#[test]
	fn channel_sink_tolerates_dropped_receiver() {
		let (sink, rx) = ChannelSink::new();
		drop(rx);
		sink.report(Notice::issue("nobody listening"));
	}
}
