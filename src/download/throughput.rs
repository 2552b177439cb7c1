//! Rolling byte-rate estimate shared by all segment workers of one task.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::constants::THROUGHPUT_WINDOW;

const KIB: f64 = 1024.0;
const MIB: f64 = 1024.0 * 1024.0;

/// Thread-safe throughput estimator.
///
/// Workers report every chunk through [`add_bytes`](Self::add_bytes). The rate
/// is recomputed at most once per window from the bytes seen since the last
/// recomputation, so bursts of tiny chunks do not make the figure jitter.
#[derive(Debug)]
pub struct ThroughputMonitor {
    state: Mutex<MonitorState>,
    window: Duration,
}

#[derive(Debug)]
struct MonitorState {
    total_bytes: u64,
    window_start_bytes: u64,
    window_start: Instant,
    bytes_per_second: f64,
}

impl Default for ThroughputMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ThroughputMonitor {
    /// Creates a monitor with the default 0.5 s window.
    #[must_use]
    pub fn new() -> Self {
        Self::with_window(THROUGHPUT_WINDOW)
    }

    /// Creates a monitor with a custom recomputation window.
    #[must_use]
    pub fn with_window(window: Duration) -> Self {
        Self {
            state: Mutex::new(MonitorState {
                total_bytes: 0,
                window_start_bytes: 0,
                window_start: Instant::now(),
                bytes_per_second: 0.0,
            }),
            window,
        }
    }

    /// Records `bytes` received now.
    pub fn add_bytes(&self, bytes: usize) {
        self.add_bytes_at(bytes, Instant::now());
    }

    /// Records `bytes` received at `now`.
    #[allow(clippy::cast_precision_loss)]
    pub fn add_bytes_at(&self, bytes: usize, now: Instant) {
        let mut state = self.state.lock();
        state.total_bytes = state.total_bytes.saturating_add(bytes as u64);

        let elapsed = now.saturating_duration_since(state.window_start);
        if elapsed >= self.window && !elapsed.is_zero() {
            let delta = state.total_bytes - state.window_start_bytes;
            state.bytes_per_second = delta as f64 / elapsed.as_secs_f64();
            state.window_start_bytes = state.total_bytes;
            state.window_start = now;
        }
    }

    /// Total bytes recorded so far.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.state.lock().total_bytes
    }

    /// Most recent rate estimate in bytes per second.
    #[must_use]
    pub fn bytes_per_second(&self) -> f64 {
        self.state.lock().bytes_per_second
    }

    /// Human-readable rate, `-` until a first estimate exists.
    #[must_use]
    pub fn format(&self) -> String {
        format_rate(self.bytes_per_second())
    }
}

/// Formats a byte rate as `B/s`, `KB/s` or `MB/s` with two decimals.
#[must_use]
pub fn format_rate(bytes_per_second: f64) -> String {
    if bytes_per_second <= 0.0 {
        "-".to_string()
    } else if bytes_per_second > MIB {
        format!("{:.2} MB/s", bytes_per_second / MIB)
    } else if bytes_per_second > KIB {
        format!("{:.2} KB/s", bytes_per_second / KIB)
    } else {
        format!("{bytes_per_second:.2} B/s")
    }
}

/// Parses a string produced by [`format_rate`] back into bytes per second.
///
/// Returns `None` for `-` and anything unrecognised.
#[must_use]
pub fn parse_rate(text: &str) -> Option<f64> {
    let text = text.trim();
    let (number, scale) = if let Some(value) = text.strip_suffix("MB/s") {
        (value, MIB)
    } else if let Some(value) = text.strip_suffix("KB/s") {
        (value, KIB)
    } else if let Some(value) = text.strip_suffix("B/s") {
        (value, 1.0)
    } else {
        return None;
    };
    number.trim().parse::<f64>().ok().map(|n| n * scale)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_new_monitor_reports_dash() {
        let monitor = ThroughputMonitor::new();
        assert_eq!(monitor.format(), "-");
        assert_eq!(monitor.total_bytes(), 0);
    }

    #[test]
    fn test_rate_not_recomputed_inside_window() {
        let monitor = ThroughputMonitor::with_window(Duration::from_millis(500));
        let start = Instant::now();
        monitor.add_bytes_at(4096, start + Duration::from_millis(100));
        assert_eq!(monitor.bytes_per_second(), 0.0);
        assert_eq!(monitor.total_bytes(), 4096);
    }

    #[test]
    fn test_rate_recomputed_after_window() {
        let monitor = ThroughputMonitor::with_window(Duration::from_millis(500));
        let start = monitor.state.lock().window_start;
        monitor.add_bytes_at(1024 * 1024, start + Duration::from_secs(1));
        let rate = monitor.bytes_per_second();
        assert!((rate - 1_048_576.0).abs() < 1.0, "rate was {rate}");

        // Next window only counts the new bytes.
        monitor.add_bytes_at(512 * 1024, start + Duration::from_secs(2));
        let rate = monitor.bytes_per_second();
        assert!((rate - 524_288.0).abs() < 1.0, "rate was {rate}");
    }

    #[test]
    fn test_concurrent_add_bytes_totals() {
        let monitor = Arc::new(ThroughputMonitor::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let monitor = Arc::clone(&monitor);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        monitor.add_bytes(10);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(monitor.total_bytes(), 80_000);
    }

    #[test]
    fn test_format_rate_units() {
        assert_eq!(format_rate(0.0), "-");
        assert_eq!(format_rate(512.0), "512.00 B/s");
        assert_eq!(format_rate(2048.0), "2.00 KB/s");
        assert_eq!(format_rate(3.5 * 1024.0 * 1024.0), "3.50 MB/s");
    }

    #[test]
    fn test_parse_rate_inverts_format() {
        assert_eq!(parse_rate("512.00 B/s"), Some(512.0));
        assert_eq!(parse_rate("2.00 KB/s"), Some(2048.0));
        assert_eq!(parse_rate("1.50 MB/s"), Some(1.5 * 1024.0 * 1024.0));
        assert_eq!(parse_rate("-"), None);
        assert_eq!(parse_rate("fast"), None);
    }
}
