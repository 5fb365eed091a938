//! Internal helper macros.

/// Early-return with an error when a condition does not hold.
///
/// Like `assert!`, except it evaluates to `return Err($error)` instead of
/// panicking, which keeps validation code flat.
///
/// # Example
///
/// ```ignore
/// ensure!(offset <= MAX_HEADER_BYTES, ParseError::too_large_header(offset, MAX_HEADER_BYTES));
/// ```
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;
