//! Panic containment around calls into target and registry code.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Runs `f`, turning a panic into an `Err` carrying the panic message.
///
/// Whatever `f` touched may be left half-updated; callers discard the
/// partial result.
pub(crate) fn contain<T>(f: impl FnOnce() -> T) -> Result<T, String> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| panic_message(payload.as_ref()))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_through_values() {
        assert_eq!(contain(|| 7), Ok(7));
    }

    #[test]
    fn captures_panic_message() {
        let result: Result<(), String> = contain(|| panic!("target exploded"));
        assert_eq!(result, Err("panicked: target exploded".to_string()));
    }

    #[test]
    fn captures_formatted_panic_message() {
        let id = 3;
        let result: Result<(), String> = contain(|| panic!("slot {id} missing"));
        assert_eq!(result, Err("panicked: slot 3 missing".to_string()));
    }
}
