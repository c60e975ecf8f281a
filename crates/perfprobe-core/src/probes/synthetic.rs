//! Deterministic probes for tests, demos, and wrapping ad-hoc closures.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::error::ErrorKind;
use crate::probe::{Probe, ProbeInfo, ProbeKind};

/// Always returns `value` after `delay`.
pub struct FixedProbe {
    info: ProbeInfo,
    value: f64,
    delay: Duration,
}

impl FixedProbe {
    pub fn new(name: &str, value: f64, delay: Duration) -> Self {
        Self {
            info: ProbeInfo::new(
                name,
                format!("constant {value} after {}ms", delay.as_millis()),
                ProbeKind::Synthetic,
                "value",
            ),
            value,
            delay,
        }
    }
}

impl Probe for FixedProbe {
    fn info(&self) -> &ProbeInfo {
        &self.info
    }

    fn query(&self, _timeout: Duration) -> Result<f64, ErrorKind> {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        Ok(self.value)
    }
}

/// Returns `value`, except every `fail_every`-th call fails with `QueryFailed`.
///
/// The call counter is the only state; it models a backend that flakes on a
/// fixed schedule.
pub struct FlakyProbe {
    info: ProbeInfo,
    value: f64,
    fail_every: u64,
    calls: AtomicU64,
}

impl FlakyProbe {
    pub fn new(name: &str, value: f64, fail_every: u64) -> Self {
        Self {
            info: ProbeInfo::new(
                name,
                format!("constant {value}, fails every call #{fail_every}"),
                ProbeKind::Synthetic,
                "value",
            ),
            value,
            fail_every: fail_every.max(1),
            calls: AtomicU64::new(0),
        }
    }
}

impl Probe for FlakyProbe {
    fn info(&self) -> &ProbeInfo {
        &self.info
    }

    fn query(&self, _timeout: Duration) -> Result<f64, ErrorKind> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n % self.fail_every == 0 {
            return Err(ErrorKind::QueryFailed(format!("scheduled failure on call {n}")));
        }
        Ok(self.value)
    }
}

/// Panics on every call; used to check failure containment.
pub struct PanicProbe {
    info: ProbeInfo,
}

impl PanicProbe {
    pub fn new(name: &str) -> Self {
        Self {
            info: ProbeInfo::new(name, "always panics", ProbeKind::Synthetic, "value"),
        }
    }
}

impl Probe for PanicProbe {
    fn info(&self) -> &ProbeInfo {
        &self.info
    }

    fn query(&self, _timeout: Duration) -> Result<f64, ErrorKind> {
        panic!("probe '{}' panicked on purpose", self.info.name)
    }
}

/// Wraps a closure as a probe.
pub struct FnProbe<F> {
    info: ProbeInfo,
    f: F,
}

impl<F> FnProbe<F>
where
    F: Fn(Duration) -> Result<f64, ErrorKind> + Send + Sync,
{
    pub fn new(info: ProbeInfo, f: F) -> Self {
        Self { info, f }
    }
}

impl<F> Probe for FnProbe<F>
where
    F: Fn(Duration) -> Result<f64, ErrorKind> + Send + Sync,
{
    fn info(&self) -> &ProbeInfo {
        &self.info
    }

    fn query(&self, timeout: Duration) -> Result<f64, ErrorKind> {
        (self.f)(timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_probe() {
        let p = FixedProbe::new("f", 7.0, Duration::ZERO);
        assert_eq!(p.query(Duration::from_secs(1)).unwrap(), 7.0);
        assert_eq!(p.name(), "f");
    }

    #[test]
    fn test_flaky_probe_schedule() {
        let p = FlakyProbe::new("flaky", 1.0, 3);
        let outcomes: Vec<bool> = (0..6).map(|_| p.query(Duration::ZERO).is_ok()).collect();
        assert_eq!(outcomes, vec![true, true, false, true, true, false]);
    }

    #[test]
    fn test_flaky_zero_interval_clamped() {
        let p = FlakyProbe::new("flaky", 1.0, 0);
        assert!(p.query(Duration::ZERO).is_err());
    }

    #[test]
    fn test_fn_probe() {
        let p = FnProbe::new(
            ProbeInfo::new("fn", "closure", ProbeKind::Synthetic, "value"),
            |timeout: Duration| Ok(timeout.as_millis() as f64),
        );
        assert_eq!(p.query(Duration::from_millis(25)).unwrap(), 25.0);
    }
}
