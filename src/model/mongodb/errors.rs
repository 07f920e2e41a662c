//! For some reason, the mongodb crate doesn't provide error code constants.
//! This module fills in the gaps.

use mongodb::error::{Error as DbError, ErrorKind, WriteFailure};

pub const DUPLICATE_KEY: i32 = 11000;
pub const WRITE_CONFLICT: i32 = 112;

/// The server error code carried by a single write or command failure.
fn error_code(err: &DbError) -> Option<i32> {
    match *err.kind {
        ErrorKind::Write(WriteFailure::WriteError(ref e)) => Some(e.code),
        ErrorKind::Command(ref e) => Some(e.code),
        _ => None,
    }
}

/// Return true if the given error is a duplicate key write error, whether it
/// came from a single write or a bulk write.
pub fn is_duplicate_key_error(err: &DbError) -> bool {
    match *err.kind {
        ErrorKind::BulkWrite(ref failure) => failure
            .write_errors
            .iter()
            .flatten()
            .any(|e| e.code == DUPLICATE_KEY),
        _ => error_code(err) == Some(DUPLICATE_KEY),
    }
}

/// Return true if a write inside a transaction lost to a concurrent
/// transaction writing the same document or index key.
pub fn is_write_conflict_error(err: &DbError) -> bool {
    error_code(err) == Some(WRITE_CONFLICT)
}


#[cfg(test)]
mod tests {
    use super::examples::*;
    use super::*;

    const NAMESPACE_NOT_FOUND: i32 = 26;

    #[test]
    fn duplicate_key() {
        assert!(is_duplicate_key_error(&write_error(DUPLICATE_KEY)));
        assert!(is_duplicate_key_error(&command_error(DUPLICATE_KEY)));
        assert!(!is_duplicate_key_error(&write_error(WRITE_CONFLICT)));
        assert!(!is_duplicate_key_error(&command_error(NAMESPACE_NOT_FOUND)));
    }

    #[test]
    fn write_conflict() {
        assert!(is_write_conflict_error(&command_error(WRITE_CONFLICT)));
        assert!(is_write_conflict_error(&write_error(WRITE_CONFLICT)));
        assert!(!is_write_conflict_error(&command_error(DUPLICATE_KEY)));
        assert!(!is_write_conflict_error(&command_error(NAMESPACE_NOT_FOUND)));
    }
}
