use std::thread::sleep;
use std::time::Duration;

/// Retries the execution of `f` after the `interval` has elapsed, until `max_attempts`
/// is reached. Returns the first successful result of `f` or the latest error if all
/// attempts fail. `max_attempts` below 1 is treated as 1.
pub fn retry<F, T, E>(max_attempts: usize, interval: Duration, mut f: F) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
{
    let mut remaining = max_attempts.max(1);
    loop {
        match f() {
            Ok(result) => return Ok(result),
            Err(err) => {
                remaining -= 1;
                if remaining == 0 {
                    return Err(err);
                }
                sleep(interval);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_success() {
        let result: Result<&str, &str> = retry(3, Duration::from_millis(10), || Ok("success"));
        assert_eq!(result, Ok("success"));
    }

    #[test]
    fn test_retry_failure() {
        let result: Result<&str, &str> = retry(3, Duration::from_millis(10), || Err("failure"));
        assert_eq!(result, Err("failure"));
    }

    #[test]
    fn test_retry_with_multiple_attempts() {
        let mut attempts = 0;
        let result = retry(3, Duration::from_millis(10), || {
            attempts += 1;
            if attempts < 3 {
                Err("try again")
            } else {
                Ok("finally succeeded")
            }
        });
        assert_eq!(result, Ok("finally succeeded"));
    }

    #[test]
    fn test_zero_attempts_still_runs_once() {
        let result: Result<&str, &str> = retry(0, Duration::ZERO, || Ok("ran"));
        assert_eq!(result, Ok("ran"));
    }
}
