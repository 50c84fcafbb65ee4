//! Host metric sampling
//!
//! Three readings per tick, each a percentage:
//! - CPU usage across all cores
//! - Memory in use
//! - Disk space in use on one mount point (default `/`)
//!
//! A reading that cannot be taken is reported as unavailable and ends up
//! absent in the snapshot; it never stops collection.

use hoststat_core::MetricSnapshot;
use std::fmt;
use std::path::PathBuf;
use sysinfo::{Disks, System};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Cpu,
    Memory,
    Disk,
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Metric::Cpu => "cpu",
            Metric::Memory => "memory",
            Metric::Disk => "disk",
        })
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SampleError {
    #[error("{0} reading unavailable: {1}")]
    Unavailable(Metric, String),
}

/// Source of the three readings. Calls may block briefly on OS counters.
pub trait Sampler: Send {
    fn cpu(&mut self) -> Result<f64, SampleError>;
    fn memory(&mut self) -> Result<f64, SampleError>;
    fn disk(&mut self) -> Result<f64, SampleError>;

    /// Takes all three readings; failures become absent fields.
    fn sample(&mut self) -> MetricSnapshot {
        MetricSnapshot {
            cpu: absorb(self.cpu()),
            mem: absorb(self.memory()),
            disk: absorb(self.disk()),
        }
    }
}

fn absorb(reading: Result<f64, SampleError>) -> Option<f64> {
    match reading {
        Ok(value) => Some(value),
        Err(e) => {
            debug!("{e}");
            None
        }
    }
}

/// Clamps float noise into `0..=100`; NaN and infinities are unavailable.
pub fn percentage(metric: Metric, value: f64) -> Result<f64, SampleError> {
    if !value.is_finite() {
        return Err(SampleError::Unavailable(metric, format!("non-finite value {value}")));
    }
    Ok(value.clamp(0.0, 100.0))
}

fn ratio(metric: Metric, used: u64, total: u64) -> Result<f64, SampleError> {
    if total == 0 {
        return Err(SampleError::Unavailable(metric, "total reported as zero".into()));
    }
    percentage(metric, used as f64 / total as f64 * 100.0)
}

/// Reads the local machine through sysinfo.
///
/// The same `System` is kept across ticks: CPU usage is a delta between two
/// refreshes, so the very first reading after start-up is not meaningful.
pub struct SystemSampler {
    sys: System,
    disks: Disks,
    mount: PathBuf,
}

impl SystemSampler {
    pub fn new(mount: impl Into<PathBuf>) -> Self {
        let mut sys = System::new();
        sys.refresh_cpu_usage();
        Self {
            sys,
            disks: Disks::new_with_refreshed_list(),
            mount: mount.into(),
        }
    }
}

impl Sampler for SystemSampler {
    fn cpu(&mut self) -> Result<f64, SampleError> {
        self.sys.refresh_cpu_usage();
        if self.sys.cpus().is_empty() {
            return Err(SampleError::Unavailable(Metric::Cpu, "no cpu reported".into()));
        }
        percentage(Metric::Cpu, f64::from(self.sys.global_cpu_info().cpu_usage()))
    }

    fn memory(&mut self) -> Result<f64, SampleError> {
        self.sys.refresh_memory();
        ratio(Metric::Memory, self.sys.used_memory(), self.sys.total_memory())
    }

    fn disk(&mut self) -> Result<f64, SampleError> {
        self.disks.refresh();
        let disk = self
            .disks
            .list()
            .iter()
            .find(|d| d.mount_point() == self.mount)
            .ok_or_else(|| {
                SampleError::Unavailable(
                    Metric::Disk,
                    format!("no filesystem mounted at {}", self.mount.display()),
                )
            })?;
        let total = disk.total_space();
        ratio(Metric::Disk, total.saturating_sub(disk.available_space()), total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Broken;

    impl Sampler for Broken {
        fn cpu(&mut self) -> Result<f64, SampleError> {
            Ok(12.5)
        }
        fn memory(&mut self) -> Result<f64, SampleError> {
            Err(SampleError::Unavailable(Metric::Memory, "meminfo unreadable".into()))
        }
        fn disk(&mut self) -> Result<f64, SampleError> {
            Err(SampleError::Unavailable(Metric::Disk, "not mounted".into()))
        }
    }

    #[test]
    fn test_failed_readings_become_absent() {
        let snap = Broken.sample();
        assert_eq!(snap, MetricSnapshot::new(Some(12.5), None, None));
    }

    #[test]
    fn test_percentage_bounds() {
        assert_eq!(percentage(Metric::Cpu, 100.000_01).unwrap(), 100.0);
        assert_eq!(percentage(Metric::Cpu, -0.0001).unwrap(), 0.0);
        assert!(percentage(Metric::Cpu, f64::NAN).is_err());
        assert!(ratio(Metric::Disk, 1, 0).is_err());
        assert_eq!(ratio(Metric::Memory, 1, 4).unwrap(), 25.0);
    }

    #[test]
    fn test_system_sampler_stays_in_range() {
        let mut sampler = SystemSampler::new("/");
        let snap = sampler.sample();
        for value in [snap.cpu, snap.mem, snap.disk].into_iter().flatten() {
            assert!((0.0..=100.0).contains(&value));
        }
        assert!(snap.validate().is_ok());
    }

    #[test]
    fn test_unknown_mount_is_unavailable() {
        let mut sampler = SystemSampler::new("/no/such/mount/point");
        assert!(matches!(
            sampler.disk(),
            Err(SampleError::Unavailable(Metric::Disk, _))
        ));
    }
}
