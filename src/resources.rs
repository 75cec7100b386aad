use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use sysinfo::{Pid, ProcessStatus, ProcessesToUpdate, System};

/// Samples kept per server.
pub const SAMPLE_HISTORY_CAP: usize = 60;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, thiserror::Error)]
pub enum SampleError {
    #[error("no such process: {0}")]
    NoSuchProcess(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceSample {
    pub cpu_percent: f64,
    pub memory_mb: f64,
}

/// CPU and resident memory of child processes.
///
/// CPU usage is measured between two refreshes of the same pid, so the first
/// sample of a new process reads 0%. Sampling on a fixed tick gives the
/// average over the tick.
pub struct ResourceSampler {
    system: System,
}

impl Default for ResourceSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceSampler {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }

    pub fn sample(&mut self, pid: u32) -> Result<ResourceSample, SampleError> {
        let sys_pid = Pid::from_u32(pid);
        self.system
            .refresh_processes(ProcessesToUpdate::Some(&[sys_pid]), true);

        let process = self
            .system
            .process(sys_pid)
            .ok_or(SampleError::NoSuchProcess(pid))?;
        // An exited child that has not been reaped yet still has a pid.
        if matches!(process.status(), ProcessStatus::Zombie | ProcessStatus::Dead) {
            return Err(SampleError::NoSuchProcess(pid));
        }

        Ok(ResourceSample {
            cpu_percent: f64::from(process.cpu_usage()),
            memory_mb: process.memory() as f64 / BYTES_PER_MB,
        })
    }
}

/// Bounded history of samples, oldest evicted first.
#[derive(Debug, Clone, Default)]
pub struct ResourceHistory {
    samples: VecDeque<ResourceSample>,
}

impl ResourceHistory {
    pub fn push(&mut self, sample: ResourceSample) {
        self.samples.push_back(sample);
        while self.samples.len() > SAMPLE_HISTORY_CAP {
            self.samples.pop_front();
        }
    }

    pub fn latest(&self) -> Option<ResourceSample> {
        self.samples.back().copied()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn peak_memory_mb(&self) -> Option<f64> {
        self.samples.iter().map(|s| s.memory_mb).reduce(f64::max)
    }

    pub fn average(&self) -> Option<ResourceSample> {
        if self.samples.is_empty() {
            return None;
        }
        let n = self.samples.len() as f64;
        let (cpu, mem) = self
            .samples
            .iter()
            .fold((0.0, 0.0), |(c, m), s| (c + s.cpu_percent, m + s.memory_mb));
        Some(ResourceSample {
            cpu_percent: cpu / n,
            memory_mb: mem / n,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(cpu: f64, mem: f64) -> ResourceSample {
        ResourceSample {
            cpu_percent: cpu,
            memory_mb: mem,
        }
    }

    #[test]
    fn test_sample_current_process() {
        let mut sampler = ResourceSampler::new();
        let s = sampler.sample(std::process::id()).unwrap();
        assert!(s.memory_mb > 0.0);
        assert!(s.cpu_percent >= 0.0);
    }

    #[test]
    fn test_sample_nonexistent_pid() {
        let mut sampler = ResourceSampler::new();
        let err = sampler.sample(999_999_999).unwrap_err();
        assert!(matches!(err, SampleError::NoSuchProcess(999_999_999)));
    }

    #[test]
    fn test_history_cap_evicts_oldest() {
        let mut history = ResourceHistory::default();
        for i in 0..(SAMPLE_HISTORY_CAP + 10) {
            history.push(sample(i as f64, 1.0));
        }
        assert_eq!(history.len(), SAMPLE_HISTORY_CAP);
        assert_eq!(
            history.latest().unwrap().cpu_percent,
            (SAMPLE_HISTORY_CAP + 9) as f64
        );
        assert_eq!(history.samples.front().unwrap().cpu_percent, 10.0);
    }

    #[test]
    fn test_history_stats() {
        let mut history = ResourceHistory::default();
        assert!(history.average().is_none());
        assert!(history.peak_memory_mb().is_none());
        history.push(sample(10.0, 100.0));
        history.push(sample(30.0, 300.0));
        let avg = history.average().unwrap();
        assert_eq!(avg.cpu_percent, 20.0);
        assert_eq!(avg.memory_mb, 200.0);
        assert_eq!(history.peak_memory_mb(), Some(300.0));
    }
}
