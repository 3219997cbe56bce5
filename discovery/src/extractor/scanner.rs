//! Reporter marker scanning over line streams.
//!
//! The marker texts are the log contract of Flink's PrometheusReporter and
//! process startup. A scan accumulates two signals per stream:
//!
//! - hostname: last match wins (hostnames are re-logged on retries)
//! - port: first match wins
//!
//! The stream is read to its end (or line budget) so a later hostname line
//! still takes precedence. A `NoReporter` line seen before any port ends the
//! scan immediately.

use std::io;

use flink_sd_common::types::Endpoint;
use futures::{Stream, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Substring identifying a bind-hostname line
pub const HOSTNAME_MARKER: &str = "hostname/address";

/// Substring identifying the reporter listener line
pub const PORT_MARKER: &str = "Started PrometheusReporter HTTP server on port";

/// Substring identifying a process without any metrics reporter
pub const NO_REPORTER_MARKER: &str = "No metrics reporter configured";

static HOSTNAME_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"TaskManager: ([0-9A-Za-z_-]+)").expect("valid regex"),
        Regex::new(r"hostname/address '([^']+)'").expect("valid regex"),
    ]
});

static PORT_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"on port (\d+)").expect("valid regex"));

/// One recognized log signal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// Bind hostname of the process
    Hostname(String),
    /// Reporter listener port
    Port(u16),
    /// The process runs without a metrics reporter
    NoReporter,
}

/// Recognizes signals in single log lines.
pub trait SignalMatcher: Send + Sync {
    /// Scan one line.
    fn scan(&self, line: &str) -> Option<Signal>;
}

/// Flink's reporter and hostname markers.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReporterMarkers;

impl SignalMatcher for ReporterMarkers {
    fn scan(&self, line: &str) -> Option<Signal> {
        if line.contains(PORT_MARKER) {
            return PORT_PATTERN
                .captures(line)
                .and_then(|caps| caps[1].parse::<u16>().ok())
                .map(Signal::Port);
        }
        if line.contains(HOSTNAME_MARKER) {
            return HOSTNAME_PATTERNS
                .iter()
                .find_map(|re| re.captures(line))
                .map(|caps| Signal::Hostname(caps[1].to_string()));
        }
        if line.contains(NO_REPORTER_MARKER) {
            return Some(Signal::NoReporter);
        }
        None
    }
}

/// Result of scanning one process log
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Both signals seen
    Found(Endpoint),
    /// The process has no reporter; retrying cannot help
    NoReporter,
    /// Stream ended without both signals
    Incomplete,
}

/// Scan parameters
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Host to use when the log never names one
    pub fallback_host: Option<String>,
    /// Maximum number of lines to read
    pub line_budget: Option<usize>,
}

/// Signal accumulator for one stream.
#[derive(Debug, Default)]
pub struct EndpointScan {
    host: Option<String>,
    port: Option<u16>,
    no_reporter: bool,
}

impl EndpointScan {
    /// Start a scan, optionally seeded with a host.
    pub fn new(fallback_host: Option<String>) -> Self {
        Self {
            host: fallback_host.filter(|h| !h.trim().is_empty()),
            ..Self::default()
        }
    }

    /// Record a signal. Returns true when the scan should stop.
    pub fn observe(&mut self, signal: Signal) -> bool {
        match signal {
            Signal::Hostname(host) => self.host = Some(host),
            Signal::Port(port) => {
                if self.port.is_none() {
                    self.port = Some(port);
                }
            }
            Signal::NoReporter => {
                if self.port.is_none() {
                    self.no_reporter = true;
                    return true;
                }
            }
        }
        false
    }

    /// Combine the signals seen so far.
    pub fn outcome(self) -> ScanOutcome {
        match (self.host, self.port) {
            (Some(host), Some(port)) => ScanOutcome::Found(Endpoint::new(host, port)),
            _ if self.no_reporter => ScanOutcome::NoReporter,
            _ => ScanOutcome::Incomplete,
        }
    }
}

/// Scan a line stream for one endpoint.
///
/// A read error (including a read timeout) makes the scan incomplete, since a
/// later hostname line may have been cut off.
pub async fn scan_log<S>(mut lines: S, matcher: &dyn SignalMatcher, options: &ScanOptions) -> ScanOutcome
where
    S: Stream<Item = io::Result<String>> + Unpin,
{
    let mut scan = EndpointScan::new(options.fallback_host.clone());
    let mut seen = 0usize;

    while let Some(line) = lines.next().await {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                debug!(error = %e, lines = seen, "Log stream ended early");
                return ScanOutcome::Incomplete;
            }
        };
        seen += 1;

        if let Some(signal) = matcher.scan(&line) {
            if scan.observe(signal) {
                break;
            }
        }

        if options.line_budget.is_some_and(|budget| seen >= budget) {
            debug!(lines = seen, "Log line budget exhausted");
            break;
        }
    }

    scan.outcome()
}
