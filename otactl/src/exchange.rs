//! The fixed-budget command/response exchange.
//!
//! The device firmware offers no framing and no completion signal, so every
//! exchange is a blind timed poll: write the command, sleep a fixed
//! interval, then drain whatever bytes happen to be buffered. There is no
//! guarantee all device output has arrived when the budget elapses — a slow
//! device yields a truncated response. That inaccuracy is inherent to the
//! protocol and is documented rather than worked around.

use std::thread;
use std::time::Duration;

use crate::error::Result;
use crate::port::Port;

/// Send a command and collect the timed response.
///
/// Writes `command`, sleeps `wait`, then repeatedly reads whatever is
/// buffered (pausing `drain_pause` between reads) until the input side goes
/// quiet. Bytes are decoded lossily: invalid sequences become U+FFFD rather
/// than failing the exchange.
///
/// Any transport-level failure during write or read yields an empty string
/// rather than propagating — the caller's marker match then simply fails,
/// which is the per-operation failure path anyway.
pub fn send_command<P: Port>(
    port: &mut P,
    command: &[u8],
    wait: Duration,
    drain_pause: Duration,
) -> String {
    try_send_command(port, command, wait, drain_pause).unwrap_or_default()
}

fn try_send_command<P: Port>(
    port: &mut P,
    command: &[u8],
    wait: Duration,
    drain_pause: Duration,
) -> Result<String> {
    port.write_all_bytes(command)?;
    thread::sleep(wait);

    let mut raw = Vec::new();
    loop {
        let pending = port.bytes_to_read()?;
        if pending == 0 {
            break;
        }

        let mut buf = vec![0u8; pending];
        let n = port.read(&mut buf)?;
        if n == 0 {
            break;
        }
        raw.extend_from_slice(&buf[..n]);
        thread::sleep(drain_pause);
    }

    Ok(String::from_utf8_lossy(&raw).into_owned())
}

/// Drain the bytes currently buffered on the input side, without blocking.
///
/// Returns at most one read's worth of data — the "fresh chunk" a single
/// poll iteration observes. Transport failures yield an empty chunk.
pub fn drain_pending<P: Port>(port: &mut P) -> Vec<u8> {
    let pending = match port.bytes_to_read() {
        Ok(n) if n > 0 => n,
        _ => return Vec::new(),
    };

    let mut buf = vec![0u8; pending];
    match port.read(&mut buf) {
        Ok(n) => {
            buf.truncate(n);
            buf
        },
        Err(_) => Vec::new(),
    }
}

/// Outcome of [`poll_for_marker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The predicate matched a freshly received chunk.
    Matched {
        /// The 1-based iteration at which the match occurred.
        attempts: usize,
    },
    /// The attempt budget was exhausted without a match.
    TimedOut {
        /// Number of iterations performed (always the full budget).
        attempts: usize,
    },
    /// The registered interrupt checker requested cancellation.
    Interrupted {
        /// Number of iterations completed before cancellation.
        attempts: usize,
    },
}

/// Poll for freshly received text matching a predicate, on a fixed budget.
///
/// Each iteration sleeps `interval`, drains one fresh chunk, hands it to
/// `sink` (the operator-facing surface) and tests `is_match` against that
/// chunk alone — not against the accumulated response. A marker phrase
/// split across two chunk boundaries is therefore missed; the poll then
/// runs its full budget and reports a timeout even though the device may
/// have succeeded.
///
/// Incomplete trailing UTF-8 sequences are carried over to the next
/// iteration, so multi-byte characters split across reads decode cleanly.
pub fn poll_for_marker<P, M, S>(
    port: &mut P,
    interval: Duration,
    max_attempts: usize,
    mut is_match: M,
    mut sink: S,
) -> PollOutcome
where
    P: Port,
    M: FnMut(&str) -> bool,
    S: FnMut(&str),
{
    let mut carry: Vec<u8> = Vec::new();

    for attempt in 1..=max_attempts {
        if crate::is_interrupt_requested() {
            return PollOutcome::Interrupted {
                attempts: attempt - 1,
            };
        }

        thread::sleep(interval);

        carry.extend_from_slice(&drain_pending(port));
        let chunk = drain_utf8_lossy(&mut carry);
        if chunk.is_empty() {
            continue;
        }

        sink(&chunk);
        if is_match(&chunk) {
            return PollOutcome::Matched { attempts: attempt };
        }
    }

    PollOutcome::TimedOut {
        attempts: max_attempts,
    }
}

/// Drain buffered bytes into displayable UTF-8 text without stalling on
/// invalid bytes.
///
/// - Valid UTF-8 is emitted as-is.
/// - Invalid byte sequences emit U+FFFD and decoding continues.
/// - An incomplete UTF-8 suffix is kept in `buffer` for the next read.
pub fn drain_utf8_lossy(buffer: &mut Vec<u8>) -> String {
    let mut out = String::new();

    loop {
        match std::str::from_utf8(buffer) {
            Ok(valid) => {
                out.push_str(valid);
                buffer.clear();
                return out;
            },
            Err(err) => {
                let valid_up_to = err.valid_up_to();
                out.push_str(std::str::from_utf8(&buffer[..valid_up_to]).unwrap_or_default());

                match err.error_len() {
                    Some(invalid_len) => {
                        out.push('\u{FFFD}');
                        buffer.drain(..valid_up_to + invalid_len);
                    },
                    None => {
                        // Incomplete multi-byte suffix: hold it back.
                        buffer.drain(..valid_up_to);
                        return out;
                    },
                }
            },
        }
    }
}
