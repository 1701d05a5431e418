use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Run a callback, catching any panic it raises.
///
/// A panic is logged under `context` and turned into `None`, so the caller
/// can carry on with the remaining callbacks of the same notification pass.
pub(crate) fn isolate<R>(context: &'static str, f: impl FnOnce() -> R) -> Option<R> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(payload) => {
            tracing::error!(
                context,
                reason = panic_message(payload.as_ref()),
                "callback panicked, continuing"
            );
            None
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_value_when_callback_succeeds() {
        assert_eq!(isolate("test", || 7), Some(7));
    }

    #[test]
    fn swallows_panics() {
        let result: Option<()> = isolate("test", || panic!("boom"));
        assert_eq!(result, None);
    }

    #[test]
    fn extracts_panic_messages() {
        let payload = panic::catch_unwind(|| panic!("static message")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "static message");

        let payload = panic::catch_unwind(|| panic!("formatted {}", 42)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "formatted 42");
    }
}
