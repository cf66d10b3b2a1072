// perf.rs - Performance timing infrastructure for fioricheck
//
// Timing instrumentation for the analysis phases. Controlled via the
// FIORICHECK_PERF environment variable.
//
// Usage:
//   FIORICHECK_PERF=1 fioricheck analysis-stats ./project        # Basic timing logs
//   FIORICHECK_PERF=verbose fioricheck analysis-stats ./project  # Adds threshold warnings

use std::sync::OnceLock;
use std::time::{Duration, Instant};

/// Global flag indicating whether performance timing is enabled
static PERF_ENABLED: OnceLock<bool> = OnceLock::new();

/// Global flag indicating verbose mode (includes threshold warnings)
static PERF_VERBOSE: OnceLock<bool> = OnceLock::new();

/// Check if performance timing is enabled
pub fn is_enabled() -> bool {
    *PERF_ENABLED.get_or_init(|| {
        std::env::var("FIORICHECK_PERF")
            .map(|v| !v.is_empty() && v != "0" && v.to_lowercase() != "false")
            .unwrap_or(false)
    })
}

/// Check if verbose mode is enabled
pub fn is_verbose() -> bool {
    *PERF_VERBOSE.get_or_init(|| {
        std::env::var("FIORICHECK_PERF")
            .map(|v| v.to_lowercase() == "verbose")
            .unwrap_or(false)
    })
}

/// RAII timing guard that logs duration on drop
///
/// ```
/// use fioricheck::perf::TimingGuard;
///
/// let _guard = TimingGuard::new("operation_name");
/// // ... do work ...
/// // Duration logged when _guard goes out of scope
/// ```
pub struct TimingGuard {
    start: Instant,
    name: &'static str,
    threshold_warn_ms: Option<u64>,
    enabled: bool,
}

impl TimingGuard {
    /// Create a new timing guard with the given name
    ///
    /// Duration will be logged at INFO level when the guard is dropped.
    pub fn new(name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            name,
            threshold_warn_ms: None,
            enabled: is_enabled(),
        }
    }

    /// Create a timing guard with a warning threshold
    ///
    /// If the operation takes longer than `threshold_ms`, a warning is logged
    /// in verbose mode.
    pub fn with_threshold(name: &'static str, threshold_ms: u64) -> Self {
        Self {
            start: Instant::now(),
            name,
            threshold_warn_ms: Some(threshold_ms),
            enabled: is_enabled(),
        }
    }

    /// Get the elapsed time without consuming the guard
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Complete the timing and return the duration without logging
    pub fn finish(self) -> Duration {
        let elapsed = self.start.elapsed();
        std::mem::forget(self); // Prevent Drop from running
        elapsed
    }
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        if !self.enabled {
            return;
        }

        let elapsed = self.start.elapsed();
        log::info!("[PERF] {} completed in {:?}", self.name, elapsed);

        if let Some(threshold) = self.threshold_warn_ms {
            if elapsed.as_millis() > threshold as u128 && is_verbose() {
                log::warn!(
                    "[PERF] {} exceeded threshold ({}ms > {}ms)",
                    self.name,
                    elapsed.as_millis(),
                    threshold
                );
            }
        }
    }
}

/// Per-phase metrics of one analysis run
#[derive(Debug, Default, Clone)]
pub struct PerfMetrics {
    /// Duration of document discovery and loading
    pub scan_duration: Option<Duration>,
    /// Duration of the full parse (includes service indexing)
    pub parse_duration: Option<Duration>,
    /// Duration of re-indexing every service on its own
    pub index_duration: Option<Duration>,
    /// Duration of linking every application
    pub link_duration: Option<Duration>,
    /// Number of documents loaded into the store
    pub documents_loaded: usize,
    /// Number of applications that parsed successfully
    pub apps_parsed: usize,
}

impl PerfMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log a summary of the metrics
    pub fn log_summary(&self) {
        if !is_enabled() {
            return;
        }

        log::info!("[PERF] === Analysis Summary ===");
        if let Some(d) = self.scan_duration {
            log::info!("[PERF] Scan: {:?} ({} documents)", d, self.documents_loaded);
        }
        if let Some(d) = self.parse_duration {
            log::info!("[PERF] Parse: {:?} ({} apps)", d, self.apps_parsed);
        }
        if let Some(d) = self.index_duration {
            log::info!("[PERF] Index: {:?}", d);
        }
        if let Some(d) = self.link_duration {
            log::info!("[PERF] Link: {:?}", d);
        }
    }
}

/// Returns the peak resident set size (RSS) of the current process in bytes.
///
/// Reads `VmHWM` from `/proc/self/status` on Linux; `None` elsewhere.
pub fn peak_rss_bytes() -> Option<u64> {
    #[cfg(target_os = "linux")]
    {
        peak_rss_linux()
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

#[cfg(target_os = "linux")]
fn peak_rss_linux() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    for line in status.lines() {
        if let Some(rest) = line.strip_prefix("VmHWM:") {
            // Format: "VmHWM:    12345 kB"
            let trimmed = rest.trim();
            let kb_str = trimmed.strip_suffix("kB").unwrap_or(trimmed).trim();
            let kb: u64 = kb_str.parse().ok()?;
            return Some(kb * 1024);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timing_guard_elapsed() {
        let guard = TimingGuard::new("test");
        std::thread::sleep(std::time::Duration::from_millis(10));
        let elapsed = guard.elapsed();
        assert!(elapsed.as_millis() >= 10);
    }

    #[test]
    fn test_timing_guard_finish() {
        let guard = TimingGuard::with_threshold("test", 1);
        std::thread::sleep(std::time::Duration::from_millis(10));
        let duration = guard.finish();
        assert!(duration.as_millis() >= 10);
    }

    #[test]
    fn test_perf_metrics_default() {
        let metrics = PerfMetrics::new();
        assert!(metrics.scan_duration.is_none());
        assert!(metrics.link_duration.is_none());
        assert_eq!(metrics.documents_loaded, 0);
    }

    #[test]
    fn test_peak_rss_bytes() {
        let rss = peak_rss_bytes();
        if cfg!(target_os = "linux") {
            assert!(rss.is_some_and(|bytes| bytes > 0));
        } else {
            assert!(rss.is_none());
        }
    }
}
