use std::any::Any;

/// Extracts a human-readable message from a panic payload.
///
/// Handles the two payload shapes produced by `panic!`: a `&'static str` for
/// literal messages and a `String` for formatted ones.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
	if let Some(msg) = payload.downcast_ref::<&'static str>() {
		return (*msg).to_string();
	}
	if let Some(msg) = payload.downcast_ref::<String>() {
		return msg.clone();
	}
	"panic with non-string payload".to_string()
}
