//! Stable exit-code vocabulary produced by agent supervision. These values
//! are persisted in attempt records, so they must never be renumbered.

pub const SUCCESS: i32 = 0;
pub const GENERIC_FAILURE: i32 = 1;
pub const IDLE_TIMEOUT: i32 = 124;
pub const MANIFEST_VIOLATION: i32 = 125;
pub const INTERRUPTED: i32 = 130;

/// `true` iff a failed attempt with this exit code should be retried by the
/// sequential-implementation backoff loop.
///
/// Success obviously isn't retried. Idle timeouts are not retried because a
/// hung agent is likely to hang again. Manifest violations are handled
/// out-of-band via the stricter-prompt path, not the generic retry loop.
#[must_use]
pub const fn should_retry(exit_code: i32) -> bool {
    !matches!(exit_code, SUCCESS | IDLE_TIMEOUT | MANIFEST_VIOLATION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_timeout_and_violation_are_not_retried() {
        assert!(!should_retry(SUCCESS));
        assert!(!should_retry(IDLE_TIMEOUT));
        assert!(!should_retry(MANIFEST_VIOLATION));
    }

    #[test]
    fn generic_failure_and_interrupted_are_retried() {
        assert!(should_retry(GENERIC_FAILURE));
        assert!(should_retry(INTERRUPTED));
        assert!(should_retry(7));
    }
}
