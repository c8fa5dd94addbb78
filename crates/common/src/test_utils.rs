//! Test utilities for hulk-button
//!
//! Provides report builders and async helpers for testing across crates.
//!
//! # Example
//!
//! ```
//! use common::test_utils::create_mock_report;
//!
//! let report = create_mock_report(26);
//! assert_eq!(report[0], 26);
//! assert_eq!(report.len(), 8);
//! ```

use protocol::{REPORT_LEN, SAMPLE_PRESSED, SAMPLE_RELEASED};
use std::future::Future;
use std::time::Duration;

/// Default test timeout (5 seconds)
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Build an 8-byte status report whose first byte is `sample`
pub fn create_mock_report(sample: u8) -> [u8; REPORT_LEN] {
    let mut report = [0u8; REPORT_LEN];
    report[0] = sample;
    report
}

/// Sample sequence for `presses` full press/release cycles, each sample
/// repeated `hold` times to mimic a button held across several polls
///
/// # Example
/// ```
/// use common::test_utils::create_press_release_samples;
///
/// let samples = create_press_release_samples(1, 2);
/// assert_eq!(samples, vec![26, 26, 27, 27]);
/// ```
pub fn create_press_release_samples(presses: usize, hold: usize) -> Vec<u8> {
    let mut samples = Vec::with_capacity(presses * hold * 2);
    for _ in 0..presses {
        samples.extend(std::iter::repeat_n(SAMPLE_PRESSED, hold));
        samples.extend(std::iter::repeat_n(SAMPLE_RELEASED, hold));
    }
    samples
}

/// Timeout wrapper for async tests
///
/// Wraps an async operation with a timeout to prevent tests from hanging.
///
/// # Arguments
/// * `duration` - Maximum time to wait
/// * `future` - The async operation to run
///
/// # Example
/// ```ignore
/// use common::test_utils::{with_timeout, DEFAULT_TEST_TIMEOUT};
///
/// #[tokio::test]
/// async fn test_with_timeout() {
///     let result = with_timeout(DEFAULT_TEST_TIMEOUT, async { 42 }).await.unwrap();
///     assert_eq!(result, 42);
/// }
/// ```
pub async fn with_timeout<T, F>(duration: Duration, future: F) -> Result<T, TimeoutError>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(duration, future)
        .await
        .map_err(|_| TimeoutError { duration })
}

/// Error returned when a test times out
#[derive(Debug)]
pub struct TimeoutError {
    /// The timeout duration that was exceeded
    pub duration: Duration,
}

impl std::fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Test timed out after {:?}", self.duration)
    }
}

impl std::error::Error for TimeoutError {}
