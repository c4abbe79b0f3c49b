//! Classifying database errors by what the caller should do about them.

use mongodb::error::{
    Error as DbError, ErrorKind, WriteFailure, TRANSIENT_TRANSACTION_ERROR,
    UNKNOWN_TRANSACTION_COMMIT_RESULT,
};

/// Server error code for a unique index violation.
pub const DUPLICATE_KEY: i32 = 11000;

/// Return true if the given error is a duplicate key write error, e.g. a username already taken.
pub fn is_duplicate_key_error(err: &DbError) -> bool {
    matches!(
        *err.kind,
        ErrorKind::Write(WriteFailure::WriteError(ref e)) if e.code == DUPLICATE_KEY
    )
}

/// Return true if the transaction this error aborted may succeed when run again from the start.
pub fn is_transient_transaction_error(err: &DbError) -> bool {
    err.contains_label(TRANSIENT_TRANSACTION_ERROR)
}

/// Return true if a commit failed without telling us whether it took effect.
/// Committing again is safe and reports the real outcome.
pub fn is_unknown_commit_result(err: &DbError) -> bool {
    err.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT)
}
