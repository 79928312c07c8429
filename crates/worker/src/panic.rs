//! Panic payload rendering for queue diagnostics.

use std::any::Any;

use tokio::task::JoinError;

/// Renders a caught panic payload as text.
///
/// `panic!` produces either a `&'static str` or a `String`; anything else
/// (`panic_any`) is reported generically.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
	if let Some(msg) = payload.downcast_ref::<&'static str>() {
		(*msg).to_string()
	} else if let Some(msg) = payload.downcast_ref::<String>() {
		msg.clone()
	} else {
		"non-string panic payload".to_string()
	}
}

/// Panic message of a failed join, or `None` if the task was cancelled.
pub fn join_error_panic_message(err: JoinError) -> Option<String> {
	let payload = err.try_into_panic().ok()?;
	Some(panic_message(payload.as_ref()))
}
