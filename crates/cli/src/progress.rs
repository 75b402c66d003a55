//! Terminal rendering for deploy output
//!
//! Every engine log call becomes one newline-terminated status line, tagged
//! with a severity glyph. Upload progress is drawn in place on a single
//! carriage-return line that the next status line replaces.

use std::io::Write as _;
use std::sync::Mutex;

use htdeploy_core::{DeployReport, Logger, Severity};

const CLEAR: &str = "\x1b[2K\r";
const RESET: &str = "\x1b[0m";
const PROGRESS_STYLE: &str = "\x1b[36m";

/// Glyph and ANSI style rendered in front of a message.
fn decoration(severity: Severity) -> (&'static str, &'static str) {
    match severity {
        Severity::Info => ("→", "\x1b[36m"),
        Severity::Success => ("✓", "\x1b[1;32m"),
        Severity::Warning => ("!", "\x1b[1;33m"),
        Severity::Error => ("✗", "\x1b[1;31m"),
        Severity::Ignored => ("○", "\x1b[2m"),
    }
}

/// Emit a status line, replacing any pending progress line.
fn status(severity: Severity, msg: &str) {
    let (glyph, style) = decoration(severity);
    eprintln!("{CLEAR}{style}{glyph} {}{RESET}", fit(msg, 3));
}

/// Shorten `msg` so `reserved` prefix columns plus the message fit on one
/// terminal row.
fn fit(msg: &str, reserved: usize) -> String {
    let columns = console::Term::stderr().size().1 as usize;
    let budget = columns.saturating_sub(reserved);
    console::truncate_str(msg, budget, "…").into_owned()
}

/// Draw the in-place progress line.
fn redraw(line: &str) {
    let mut stderr = std::io::stderr();
    let _ = write!(stderr, "{CLEAR}{PROGRESS_STYLE}» {}{RESET}", fit(line, 3));
    let _ = stderr.flush();
}

/// One-off informational line outside a deploy.
pub fn note(msg: &str) {
    status(Severity::Info, msg);
}

/// Engine logger rendering onto stderr.
pub struct ConsoleLogger {
    /// label of the transfer currently in progress, for byte updates
    current: Mutex<String>,
}

impl ConsoleLogger {
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: Mutex::new(String::new()),
        }
    }
}

impl Default for ConsoleLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl Logger for ConsoleLogger {
    fn log(&self, message: &str, severity: Severity) {
        status(severity, message);
    }

    fn step(&self, n: usize, total: usize, label: &str) {
        let line = format!("({n}/{total}) {label}");
        *self.current.lock().unwrap() = line.clone();
        redraw(&line);
    }

    fn bytes(&self, percent: u8) {
        let label = self.current.lock().unwrap().clone();
        redraw(&format!("{label} {percent:>3}%"));
    }
}

/// Closing line for a finished deploy.
pub fn summary(report: &DeployReport) {
    let secs = report.elapsed.as_secs_f64();
    let took = if secs >= 1.0 {
        format!("{secs:.2}s")
    } else {
        format!("{}ms", report.elapsed.as_millis())
    };

    if report.uploaded == 0 && report.deleted == 0 {
        status(Severity::Success, &format!("Nothing to do ({took})"));
    } else {
        status(
            Severity::Success,
            &format!(
                "{} uploaded, {} deleted, {took}",
                report.uploaded, report.deleted
            ),
        );
    }
}
