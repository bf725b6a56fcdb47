//! Utility macros shared by the encoder implementations.

/// Returns early with the given error when the predicate does not hold.
///
/// Works like `assert!` but yields an `Err` instead of panicking.
///
/// ```ignore
/// ensure!(self.payload_encoder.is_none(), SendError::invalid_body("payload still pending"));
/// ```
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;
