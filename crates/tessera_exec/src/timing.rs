//! Run lengths and their conversion to whole fabric time steps.

use serde::{Deserialize, Serialize};
use std::fmt;
use tessera_common::{MapError, MapResult};

const NS_PER_MS: f64 = 1_000_000.0;
const NS_PER_US: u64 = 1_000;

/// How long to run the application.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunLength {
    /// Run for this many milliseconds of simulated time.
    Bounded(f64),
    /// Run until stopped.
    Unbounded,
}

impl RunLength {
    /// Returns `true` for [`RunLength::Unbounded`].
    pub fn is_unbounded(&self) -> bool {
        matches!(self, RunLength::Unbounded)
    }
}

impl fmt::Display for RunLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunLength::Bounded(ms) => write!(f, "{ms} ms"),
            RunLength::Unbounded => f.write_str("unbounded"),
        }
    }
}

/// Converts a bounded run into an exact number of `time_step_us` steps.
///
/// The duration must be a whole number of nanoseconds and a whole number of
/// steps. Any remainder is rejected, never rounded. Returns `None` for an
/// unbounded run.
pub fn time_steps(length: RunLength, time_step_us: u64) -> MapResult<Option<u64>> {
    let RunLength::Bounded(ms) = length else {
        return Ok(None);
    };
    if time_step_us == 0 {
        return Err(MapError::timing("the time step must be positive"));
    }
    if !ms.is_finite() || ms < 0.0 {
        return Err(MapError::timing(format!(
            "run length {ms} ms is not a finite, non-negative duration"
        )));
    }

    let exact = ms * NS_PER_MS;
    let ns = exact.round();
    if (exact - ns).abs() > 1e-3 || ns > u64::MAX as f64 {
        return Err(MapError::timing(format!(
            "run length {ms} ms is not a whole number of nanoseconds"
        )));
    }
    let ns = ns as u64;
    let step_ns = time_step_us.saturating_mul(NS_PER_US);
    if ns % step_ns != 0 {
        return Err(MapError::timing(format!(
            "run length {ms} ms is not a whole number of {} ms time steps ({} ns left over)",
            time_step_us as f64 / 1_000.0,
            ns % step_ns
        )));
    }
    Ok(Some(ns / step_ns))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifty_ms_at_a_tenth() {
        assert_eq!(time_steps(RunLength::Bounded(50.0), 100).unwrap(), Some(500));
    }

    #[test]
    fn default_one_ms_step() {
        assert_eq!(time_steps(RunLength::Bounded(1000.0), 1000).unwrap(), Some(1000));
        assert_eq!(time_steps(RunLength::Bounded(0.0), 1000).unwrap(), Some(0));
    }

    #[test]
    fn remainder_rejected() {
        let err = time_steps(RunLength::Bounded(33.05), 100).unwrap_err();
        assert!(matches!(err, MapError::InvalidTimingConfiguration { .. }));
        assert!(err.to_string().contains("time steps"));

        assert!(time_steps(RunLength::Bounded(2.5), 1000).is_err());
    }

    #[test]
    fn sub_nanosecond_rejected() {
        let err = time_steps(RunLength::Bounded(0.0000001), 100).unwrap_err();
        assert!(err.to_string().contains("nanoseconds"));
    }

    #[test]
    fn nonsense_lengths_rejected() {
        for ms in [f64::NAN, f64::INFINITY, -1.0] {
            assert!(time_steps(RunLength::Bounded(ms), 100).is_err());
        }
    }

    #[test]
    fn unbounded_has_no_step_count() {
        assert_eq!(time_steps(RunLength::Unbounded, 100).unwrap(), None);
        assert!(RunLength::Unbounded.is_unbounded());
        assert_eq!(RunLength::Bounded(5.0).to_string(), "5 ms");
    }
}
