use crate::error::{Result, StoreError};
use rusqlite::ErrorCode;
use std::path::Path;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Bounded exponential backoff around a single store access.
///
/// Lock contention between shell sessions is expected and short-lived, so a
/// busy store is retried rather than reported. Once `max_attempts` accesses
/// have failed the caller gets `StoreError::Busy`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_backoff: Duration::from_millis(5),
            max_backoff: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_backoff,
            max_backoff,
        }
    }

    /// Delay before retry number `attempt` (0-indexed): base * 2^attempt, capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.min(16);
        self.base_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    pub fn run<T>(&self, path: &Path, mut op: impl FnMut() -> rusqlite::Result<T>) -> Result<T> {
        let mut attempt = 0;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if is_contention(&err) => {
                    attempt += 1;
                    if attempt >= self.max_attempts {
                        warn!(path = %path.display(), attempts = attempt, "history store stayed locked");
                        return Err(StoreError::Busy {
                            path: path.to_path_buf(),
                            attempts: attempt,
                        });
                    }
                    let delay = self.delay_for(attempt - 1);
                    debug!(attempt, ?delay, "history store busy, backing off");
                    thread::sleep(delay);
                }
                Err(source) => {
                    return Err(StoreError::Sqlite {
                        path: path.to_path_buf(),
                        source,
                    })
                }
            }
        }
    }
}

fn is_contention(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(code, _) => {
            matches!(code.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn busy() -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            Some("database is locked".to_string()),
        )
    }

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1), Duration::from_millis(2))
    }

    #[test]
    fn backoff_doubles_until_capped() {
        let policy = RetryPolicy::new(5, Duration::from_millis(10), Duration::from_millis(50));
        assert_eq!(policy.delay_for(0), Duration::from_millis(10));
        assert_eq!(policy.delay_for(1), Duration::from_millis(20));
        assert_eq!(policy.delay_for(2), Duration::from_millis(40));
        assert_eq!(policy.delay_for(3), Duration::from_millis(50));
        assert_eq!(policy.delay_for(40), Duration::from_millis(50));
    }

    #[test]
    fn recovers_after_transient_contention() {
        let calls = Cell::new(0);
        let result = fast(5).run(Path::new("h.db"), || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 { Err(busy()) } else { Ok(42) }
        });
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let calls = Cell::new(0);
        let result: Result<()> = fast(4).run(Path::new("h.db"), || {
            calls.set(calls.get() + 1);
            Err(busy())
        });
        match result {
            Err(StoreError::Busy { attempts, .. }) => assert_eq!(attempts, 4),
            other => panic!("expected Busy, got {:?}", other),
        }
        assert_eq!(calls.get(), 4);
    }

    #[test]
    fn other_errors_are_not_retried() {
        let calls = Cell::new(0);
        let result: Result<()> = fast(4).run(Path::new("h.db"), || {
            calls.set(calls.get() + 1);
            Err(rusqlite::Error::QueryReturnedNoRows)
        });
        assert!(matches!(result, Err(StoreError::Sqlite { .. })));
        assert_eq!(calls.get(), 1);
    }
}
