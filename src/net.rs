//! Classification of store errors into transient connectivity failures and
//! definitive store answers.
//!
//! Only a transient failure makes the client rotate to another endpoint. A
//! store-level answer (a rejected command, a wrong type, ...) is returned to
//! the caller as is.

use std::error::Error;
use std::io;

/// Connection refused: Linux, BSD / macOS, Windows.
const CONNECTION_REFUSED_CODES: [i32; 3] = [111, 61, 10061];

/// Network / host unreachable: Linux, BSD / macOS, Windows.
const UNREACHABLE_CODES: [i32; 6] = [101, 113, 51, 65, 10051, 10065];

const DNS_FAILURE_MARKERS: [&str; 4] = [
    "failed to lookup address",
    "name or service not known",
    "no such host is known",
    "nodename nor servname provided",
];

/// Reports whether `err`, or any error in its `source()` chain, is a
/// transient connectivity failure.
pub fn is_network_error(err: &(dyn Error + 'static)) -> bool {
    std::iter::successors(Some(err), |&e| e.source()).any(is_network_cause)
}

fn is_network_cause(err: &(dyn Error + 'static)) -> bool {
    if let Some(io_err) = err.downcast_ref::<io::Error>() {
        return is_network_io_error(io_err);
    }
    if let Some(redis_err) = err.downcast_ref::<redis::RedisError>() {
        // RedisError hides its io cause from `source()`, so ask it directly.
        return redis_err.is_io_error()
            || redis_err.is_connection_refusal()
            || redis_err.is_timeout()
            || redis_err.is_connection_dropped();
    }
    false
}

fn is_network_io_error(err: &io::Error) -> bool {
    if let Some(code) = err.raw_os_error() {
        if CONNECTION_REFUSED_CODES.contains(&code) || UNREACHABLE_CODES.contains(&code) {
            return true;
        }
    }

    match err.kind() {
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::NotConnected
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::TimedOut
        | io::ErrorKind::UnexpectedEof
        | io::ErrorKind::AddrNotAvailable => true,
        _ => is_dns_failure(err),
    }
}

fn is_dns_failure(err: &io::Error) -> bool {
    let message = err.to_string().to_lowercase();
    DNS_FAILURE_MARKERS
        .iter()
        .any(|marker| message.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LockError, StoreError};

    fn io_err(kind: io::ErrorKind) -> io::Error {
        io::Error::new(kind, "boom")
    }

    #[test]
    fn recognizes_connection_level_io_kinds() {
        for kind in [
            io::ErrorKind::ConnectionRefused,
            io::ErrorKind::ConnectionReset,
            io::ErrorKind::BrokenPipe,
            io::ErrorKind::TimedOut,
            io::ErrorKind::UnexpectedEof,
        ] {
            assert!(is_network_error(&io_err(kind)), "{:?}", kind);
        }
        assert!(!is_network_error(&io_err(io::ErrorKind::InvalidData)));
        assert!(!is_network_error(&io_err(io::ErrorKind::PermissionDenied)));
    }

    #[test]
    fn recognizes_refused_codes_of_every_platform() {
        for code in CONNECTION_REFUSED_CODES {
            let err = io::Error::from_raw_os_error(code);
            assert!(is_network_error(&err), "code {}", code);
        }
    }

    #[test]
    fn recognizes_unreachable_codes_of_every_platform() {
        for code in UNREACHABLE_CODES {
            let err = io::Error::from_raw_os_error(code);
            assert!(is_network_error(&err), "code {}", code);
            assert!(is_network_error(&StoreError::from(err)), "wrapped code {}", code);
        }
    }

    #[test]
    fn recognizes_dns_failures() {
        let err = io::Error::new(
            io::ErrorKind::Other,
            "failed to lookup address information: Name or service not known",
        );
        assert!(is_network_error(&err));
    }

    #[test]
    fn walks_wrapped_causes() {
        let store_err = StoreError::from(io_err(io::ErrorKind::ConnectionRefused));
        assert!(is_network_error(&store_err));

        let lock_err = LockError::from(StoreError::from(io_err(io::ErrorKind::UnexpectedEof)));
        assert!(is_network_error(&lock_err));
    }

    #[test]
    fn store_answers_are_definitive() {
        assert!(!is_network_error(&StoreError::Rejected("invalid expire time".into())));
        assert!(!is_network_error(&LockError::LockFailed));
        assert!(!is_network_error(&LockError::LockDoesNotExist));

        let wrong_type = redis::RedisError::from((
            redis::ErrorKind::TypeError,
            "WRONGTYPE Operation against a key holding the wrong kind of value",
        ));
        assert!(!is_network_error(&StoreError::from(wrong_type)));
    }

    #[test]
    fn recognizes_redis_io_failures() {
        let refused = redis::RedisError::from(io_err(io::ErrorKind::ConnectionRefused));
        assert!(is_network_error(&StoreError::from(refused)));

        let timed_out = redis::RedisError::from(io_err(io::ErrorKind::TimedOut));
        assert!(timed_out.is_timeout());
        assert!(is_network_error(&LockError::from(StoreError::from(timed_out))));

        let dropped = redis::RedisError::from(io_err(io::ErrorKind::BrokenPipe));
        assert!(dropped.is_connection_dropped());
        assert!(is_network_error(&StoreError::from(dropped)));
    }
}
