//! Bounded retry driven by an error classifier.

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    Abort,
}

#[derive(Debug, PartialEq, Eq)]
pub enum RetryError<E> {
    /// The classifier rejected the error; no further attempts were made.
    Aborted(E),
    /// Every attempt failed with a retryable error.
    Exhausted { attempts: u32, last: E },
}

/// Runs `attempt` until it succeeds, the classifier aborts, or `max_attempts` is reached.
/// At least one attempt is always made.
///
/// `attempt` receives the zero-based attempt number, so the caller can do different work on a
/// retry (such as advancing a counter past a conflicting value).
pub fn retry_with<T, E>(
    max_attempts: u32,
    mut attempt: impl FnMut(u32) -> Result<T, E>,
    mut classify: impl FnMut(&E) -> RetryDecision,
) -> Result<T, RetryError<E>> {
    let mut attempts = 0;

    loop {
        let error = match attempt(attempts) {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };
        attempts += 1;

        if classify(&error) == RetryDecision::Abort {
            return Err(RetryError::Aborted(error));
        }
        if attempts >= max_attempts {
            return Err(RetryError::Exhausted {
                attempts,
                last: error,
            });
        }
    }
}
