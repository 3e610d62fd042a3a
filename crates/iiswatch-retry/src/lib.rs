//! Fixed backoff retry schedule for native-API discovery and state queries
//! (spec §4.2, §4.4, §9).
//!
//! The schedule is a fixed constant sequence, not an adaptive strategy (spec
//! §9): six attempts total, with a sleep between each pair of attempts drawn
//! from [`SCHEDULE`], whose last entry is `0` — the last retry is immediate,
//! not delayed.
//!
//! The two call sites in the original source disagree on whether the retry
//! counter check is `<` or `<=` against the schedule length; one variant
//! makes the final "give up" branch unreachable. We adopt a single rule
//! everywhere (spec §9's Open Questions): the schedule's last slot *is* the
//! final retry, and exhausting all six attempts logs critical and returns
//! the last error.

use std::time::Duration;

/// Approximately `exp(x/10)` for `x` in `0, 5, 10, 15, 20`, plus a trailing
/// immediate retry.
pub const SCHEDULE: [Duration; 6] = [
    Duration::from_millis(1_000),
    Duration::from_millis(1_649),
    Duration::from_millis(2_718),
    Duration::from_millis(4_482),
    Duration::from_millis(7_389),
    Duration::from_millis(0),
];

pub const MAX_ATTEMPTS: u32 = SCHEDULE.len() as u32;

/// Runs `op` up to [`MAX_ATTEMPTS`] times, sleeping [`SCHEDULE`] between
/// attempts. Logs a warning on each retryable failure and a critical on
/// exhaustion, then returns the last error. `label` identifies the
/// operation in the log lines (e.g. `"discovery"`, `"site state"`).
pub fn retry<T, E, F>(label: &str, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op() {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= MAX_ATTEMPTS {
                    tracing::error!(%label, attempts = attempt, %err, "giving up after exhausting retry schedule");
                    return Err(err);
                }
                let delay = SCHEDULE[(attempt - 1) as usize];
                tracing::warn!(%label, attempt, ?delay, %err, "retrying after failure");
                std::thread::sleep(delay);
            }
        }
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use std::cell::Cell;

    // `retry` sleeps real durations from `SCHEDULE` between attempts; keep
    // the case count low so an exhausting case (~17s) doesn't dominate the run.
    fn config() -> ProptestConfig {
        ProptestConfig::with_cases(8)
    }

    proptest! {
        #![proptest_config(config())]
        // However many times `op` fails, `retry` makes at most MAX_ATTEMPTS
        // calls and then gives up with the last error.
        #[test]
        fn never_calls_op_more_than_max_attempts(always_fails in any::<bool>()) {
            let calls = Cell::new(0u32);
            let result = retry("proptest", || {
                calls.set(calls.get() + 1);
                if always_fails { Err::<(), _>("boom") } else { Ok(()) }
            });
            prop_assert!(calls.get() <= MAX_ATTEMPTS);
            if always_fails {
                prop_assert_eq!(calls.get(), MAX_ATTEMPTS);
                prop_assert_eq!(result, Err("boom"));
            } else {
                prop_assert_eq!(calls.get(), 1);
                prop_assert_eq!(result, Ok(()));
            }
        }

        // Succeeding on attempt `n` makes exactly `n` calls, for every `n`
        // within the schedule's length.
        #[test]
        fn succeeds_after_exactly_n_attempts(n in 1..=MAX_ATTEMPTS) {
            let calls = Cell::new(0u32);
            let result = retry("proptest", || {
                let made = calls.get() + 1;
                calls.set(made);
                if made < n { Err("not yet") } else { Ok(made) }
            });
            prop_assert_eq!(result, Ok(n));
            prop_assert_eq!(calls.get(), n);
        }
    }
}
