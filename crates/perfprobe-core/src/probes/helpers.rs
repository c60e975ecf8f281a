//! Shared helpers used by multiple probe implementations.
//!
//! Subprocess execution with a deadline, command discovery, and best-effort
//! numeric extraction from free-form tool output.

use std::io::Read;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::error::ErrorKind;

// ---------------------------------------------------------------------------
// Shared command utilities
// ---------------------------------------------------------------------------

/// Check if a command exists on `PATH`.
pub fn command_exists(name: &str) -> bool {
    #[cfg(windows)]
    let finder = "where";
    #[cfg(not(windows))]
    let finder = "which";

    Command::new(finder)
        .arg(name)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> std::thread::JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut out = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut out);
        }
        out
    })
}

fn first_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or_default()
        .to_string()
}

/// Run a subprocess and return its trimmed stdout.
///
/// The child is killed once `timeout` elapses. A non-zero exit status is a
/// `QueryFailed` carrying the first line of stderr.
pub fn run_command(program: &str, args: &[&str], timeout: Duration) -> Result<String, ErrorKind> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| ErrorKind::QueryFailed(format!("{program}: {e}")))?;

    // Drain pipes concurrently so a chatty child cannot block on a full pipe.
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let start = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if start.elapsed() >= timeout {
                    reap(&mut child);
                    return Err(ErrorKind::Timeout);
                }
                std::thread::sleep(Duration::from_millis(5));
            }
            Err(e) => {
                reap(&mut child);
                return Err(ErrorKind::QueryFailed(format!("{program}: {e}")));
            }
        }
    };

    let out = stdout.join().unwrap_or_default();
    let err = stderr.join().unwrap_or_default();

    if !status.success() {
        let detail = first_line(&err);
        return Err(ErrorKind::QueryFailed(if detail.is_empty() {
            format!("{program} exited with {status}")
        } else {
            detail
        }));
    }

    Ok(String::from_utf8_lossy(&out).trim().to_string())
}

/// Kill `child` and wait on it so no zombie is left behind.
fn reap(child: &mut std::process::Child) {
    let _ = child.kill();
    let _ = child.wait();
}

// ---------------------------------------------------------------------------
// Numeric extraction
// ---------------------------------------------------------------------------

/// All decimal numbers appearing in `text`, in order.
///
/// Accepts an optional leading minus, a single decimal point and an
/// exponent (`1.5E-05`, as PowerShell prints small doubles). Digits glued
/// to letters (`GPU0`, `engtype_3D`) are skipped so instance names do not leak
/// into the values.
pub fn numbers(text: &str) -> Vec<f64> {
    let bytes = text.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        let starts_number = c.is_ascii_digit()
            || (c == b'-' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit));
        if !starts_number {
            i += 1;
            continue;
        }
        let glued = c.is_ascii_digit()
            && i > 0
            && (bytes[i - 1].is_ascii_alphabetic() || bytes[i - 1] == b'_');
        if glued {
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            continue;
        }

        let start = i;
        i += 1;
        let mut seen_dot = false;
        while i < bytes.len() {
            let d = bytes[i];
            if d.is_ascii_digit() {
                i += 1;
            } else if d == b'.' && !seen_dot && bytes.get(i + 1).is_some_and(u8::is_ascii_digit) {
                seen_dot = true;
                i += 1;
            } else {
                break;
            }
        }
        i += exponent_len(&bytes[i..]);

        let trailing_alpha = bytes
            .get(i)
            .is_some_and(|b| b.is_ascii_alphabetic() || *b == b'_');
        if trailing_alpha {
            // Identifier such as `3D` or `0x1f`; skip the rest of the token.
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            continue;
        }

        if let Ok(v) = text[start..i].parse::<f64>() {
            out.push(v);
        }
    }
    out
}

/// Length of an `e[+-]digits` exponent at the start of `rest`, or 0.
fn exponent_len(rest: &[u8]) -> usize {
    if !matches!(rest.first(), Some(b'e' | b'E')) {
        return 0;
    }
    let sign = usize::from(matches!(rest.get(1), Some(b'+' | b'-')));
    let digits = rest[1 + sign..]
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .count();
    if digits == 0 { 0 } else { 1 + sign + digits }
}

/// How to turn backend output into a single number.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", content = "label", rename_all = "snake_case")]
pub enum Extract {
    /// First number in the output.
    First,
    /// First number after `label` (case-insensitive).
    After(String),
    /// Sum of every number (multi-instance counters).
    Sum,
    /// Mean of every number (one line per device).
    Mean,
    /// Largest number.
    Max,
}

impl Extract {
    pub fn apply(&self, text: &str) -> Result<f64, ErrorKind> {
        let values = match self {
            Self::After(label) => {
                let lower = text.to_ascii_lowercase();
                let Some(pos) = lower.find(&label.to_ascii_lowercase()) else {
                    return Err(ErrorKind::ParseFailed(format!(
                        "label '{label}' not found in: {}",
                        snippet(text)
                    )));
                };
                numbers(&text[pos + label.len()..])
            }
            _ => numbers(text),
        };

        if values.is_empty() {
            return Err(ErrorKind::ParseFailed(format!(
                "no number in output: {}",
                snippet(text)
            )));
        }

        let v = match self {
            Self::First | Self::After(_) => values[0],
            Self::Sum => values.iter().sum(),
            Self::Mean => values.iter().sum::<f64>() / values.len() as f64,
            Self::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        };
        Ok(v)
    }
}

fn snippet(text: &str) -> String {
    let t = text.trim();
    if t.is_empty() {
        return "<empty>".to_string();
    }
    let mut s: String = t.chars().take(80).collect();
    if t.chars().count() > 80 {
        s.push_str("...");
    }
    s
}
