// src/dispatch/memory.rs
// =============================================================================
// Memory pressure monitoring.
//
// The monitor reads two numbers:
// - how much of the host's memory is in use (the pressure signal, percent)
// - the resident set size of this process (tracked as a peak for summaries)
//
// Reading is cheap and never fails the caller: if the OS query errors, the
// last good sample is returned and a warning is logged.
//
// A background sampler task publishes the pressure signal on a tokio `watch`
// channel at a fixed interval. The dispatcher reads the latest value before
// each admission; nothing else couples the sampler to individual fetches.
//
// Rust concepts:
// - Atomics: the last sample and the peak RSS are plain numbers shared across
//   tasks, so AtomicU64 is enough (no Mutex needed)
// - f64 has no atomic type; we store its bit pattern with to_bits/from_bits
// - Drop: stopping the sampler is tied to dropping its handle
// =============================================================================

use std::fs;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemorySnapshot {
    /// Host memory in use, 0.0..=100.0
    pub used_percent: f64,
    pub process_rss_bytes: u64,
}

/// Source of memory readings. `ProcProbe` on Linux, scripted in tests.
pub trait MemoryProbe: Send + Sync {
    fn read(&self) -> io::Result<MemorySnapshot>;
}

/// Reads /proc/meminfo and /proc/self/status.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcProbe;

impl MemoryProbe for ProcProbe {
    fn read(&self) -> io::Result<MemorySnapshot> {
        // Host-wide counters and this process's own counters live in
        // different files
        let meminfo = fs::read_to_string("/proc/meminfo")?;
        let status = fs::read_to_string("/proc/self/status")?;

        let used_percent = parse_used_percent(&meminfo)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "unrecognized /proc/meminfo"))?;
        let process_rss_bytes = parse_kb_field(&status, "VmRSS:")
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "no VmRSS in /proc/self/status"))?
            * 1024; // /proc reports kB

        Ok(MemorySnapshot {
            used_percent,
            process_rss_bytes,
        })
    }
}

// Finds a "Name:   12345 kB" line and returns the number
fn parse_kb_field(text: &str, field: &str) -> Option<u64> {
    text.lines()
        .find(|line| line.starts_with(field))
        .and_then(|line| line[field.len()..].split_whitespace().next())
        .and_then(|value| value.parse().ok())
}

fn parse_used_percent(meminfo: &str) -> Option<f64> {
    let total = parse_kb_field(meminfo, "MemTotal:")?;
    let available = parse_kb_field(meminfo, "MemAvailable:")?;
    if total == 0 {
        return None;
    }
    // MemAvailable already counts reclaimable cache, so "used" is what the
    // kernel could not hand out right now
    let used = total.saturating_sub(available);
    Some(used as f64 / total as f64 * 100.0)
}

pub struct MemoryMonitor {
    probe: Box<dyn MemoryProbe>,
    // f64 bits
    last_percent: AtomicU64,
    peak_rss: AtomicU64,
}

impl MemoryMonitor {
    pub fn new(probe: impl MemoryProbe + 'static) -> Self {
        MemoryMonitor {
            probe: Box::new(probe),
            last_percent: AtomicU64::new(0f64.to_bits()),
            peak_rss: AtomicU64::new(0),
        }
    }

    /// Monitor backed by the host's /proc counters.
    pub fn system() -> Self {
        Self::new(ProcProbe)
    }

    /// Takes a fresh reading and returns the host memory usage percentage.
    pub fn sample(&self) -> f64 {
        match self.probe.read() {
            Ok(snapshot) => {
                // Remember this reading in case the next one fails
                self.last_percent
                    .store(snapshot.used_percent.to_bits(), Ordering::Relaxed);
                // fetch_max only ever raises the stored value
                self.peak_rss
                    .fetch_max(snapshot.process_rss_bytes, Ordering::Relaxed);
                snapshot.used_percent
            }
            // A failed reading is never an error for the caller
            Err(e) => {
                let last = self.last_sample();
                tracing::warn!("Memory probe failed, reusing last sample ({:.1}%): {}", last, e);
                last
            }
        }
    }

    pub fn last_sample(&self) -> f64 {
        f64::from_bits(self.last_percent.load(Ordering::Relaxed))
    }

    /// Highest process RSS seen since creation or the last `reset_peak`.
    pub fn peak_rss_bytes(&self) -> u64 {
        self.peak_rss.load(Ordering::Relaxed)
    }

    pub fn reset_peak(&self) {
        self.peak_rss.store(0, Ordering::Relaxed);
    }

    /// Starts a background task publishing a fresh sample every `interval`.
    ///
    /// The first value is sampled synchronously so the receiver never sees a
    /// stale default. The task stops when the returned handle is dropped.
    pub fn spawn_sampler(self: &Arc<Self>, interval: Duration) -> PressureSampler {
        // watch keeps only the newest value: readers never see a backlog
        let (tx, rx) = watch::channel(self.sample());
        let monitor = Arc::clone(self);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // If a tick is late, wait a full interval instead of bursting
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // interval's first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                // send fails once every receiver is gone
                if tx.send(monitor.sample()).is_err() {
                    break;
                }
            }
        });

        PressureSampler { rx, task }
    }
}

/// Handle to a running sampler task.
pub struct PressureSampler {
    rx: watch::Receiver<f64>,
    task: JoinHandle<()>,
}

impl PressureSampler {
    pub fn subscribe(&self) -> watch::Receiver<f64> {
        self.rx.clone()
    }
}

impl Drop for PressureSampler {
    fn drop(&mut self) {
        // Ends the sampling loop at its next await point
        self.task.abort();
    }
}
