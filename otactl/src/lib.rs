//! # otactl
//!
//! A library for driving the serial OTA console exposed by ESP8266-class
//! device firmware.
//!
//! The device side speaks a deliberately simple protocol: single ASCII
//! characters as commands (`o` = OTA status, `v` = enter URL-config mode,
//! `u` = trigger an OTA update), a newline-terminated URL as the only
//! payload, and line-oriented human-readable responses. Success or failure
//! of every operation is decided by scanning the response text for fixed
//! marker phrases — there is no framing, no checksums, and no completion
//! signal to wait on.
//!
//! This crate provides:
//!
//! - A [`Port`](port::Port) abstraction over serial I/O with a native
//!   implementation backed by the `serialport` crate
//! - The fixed-budget command/response exchange and a poll-with-timeout
//!   primitive ([`exchange`])
//! - The three device operations: query status, update firmware URL,
//!   trigger OTA ([`device`])
//! - An immutable firmware release table with two distribution channels
//!   ([`release`])
//! - A sequential batch runner applying one release to an ordered list of
//!   endpoints ([`batch`])
//! - USB bridge classification for port discovery ([`detect`])
//!
//! ## Accuracy bound
//!
//! Responses are drained on a fixed time budget. A slow device may still be
//! writing when the budget elapses, so any response may be truncated; the
//! protocol offers nothing better to wait on. Callers should treat response
//! text as best-effort operator feedback, not as a complete transcript.
//!
//! ## Example
//!
//! ```rust,no_run
//! use otactl::{Channel, DeviceSession, ReleaseTable, Timing};
//!
//! fn main() -> otactl::Result<()> {
//!     let releases = ReleaseTable::builtin();
//!     let url = releases
//!         .resolve("v2.2.0", Channel::Cdn)
//!         .ok_or_else(|| otactl::Error::UnknownRelease("v2.2.0".into()))?;
//!
//!     let mut session = DeviceSession::connect("/dev/ttyUSB0", 115200, Timing::default())?;
//!     let status = session.query_status()?;
//!     println!("{status}");
//!
//!     session.update_url(url)?;
//!     session.trigger_ota(|chunk| print!("{chunk}"))?;
//!     session.close()?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::sync::{Arc, OnceLock};

pub mod batch;
pub mod detect;
pub mod device;
pub mod error;
pub mod exchange;
pub mod port;
pub mod release;

#[cfg(test)]
pub(crate) mod testing;

static INTERRUPT_CHECKER: OnceLock<Arc<dyn Fn() -> bool + Send + Sync>> = OnceLock::new();

/// Register a global interruption checker used by long-running library loops.
///
/// The checker should return `true` when the current operation should stop
/// (for example after receiving Ctrl-C in CLI applications). The OTA trigger
/// poll loop and the batch runner consult it between iterations; with no
/// checker registered they run to completion.
pub fn set_interrupt_checker<F>(checker: F)
where
    F: Fn() -> bool + Send + Sync + 'static,
{
    let _ = INTERRUPT_CHECKER.set(Arc::new(checker));
}

/// Returns whether interruption was requested by the embedding application.
#[must_use]
pub fn is_interrupt_requested() -> bool {
    INTERRUPT_CHECKER
        .get()
        .is_some_and(|checker| checker())
}

#[cfg(test)]
pub(crate) fn test_set_interrupted(value: bool) {
    use std::sync::atomic::{AtomicBool, Ordering};

    static TEST_INTERRUPT_FLAG: OnceLock<Arc<AtomicBool>> = OnceLock::new();

    let flag = TEST_INTERRUPT_FLAG
        .get_or_init(|| {
            let shared = Arc::new(AtomicBool::new(false));
            let checker = Arc::clone(&shared);
            set_interrupt_checker(move || checker.load(Ordering::Relaxed));
            shared
        })
        .clone();

    flag.store(value, Ordering::Relaxed);
}

// Re-exports for convenience
pub use {
    batch::{BatchEvent, BatchOptions, BatchOutcome, run_batch},
    detect::{DetectedPort, UsbBridge, detect_ports},
    device::{DeviceSession, Timing},
    error::{Error, Result},
    exchange::{PollOutcome, drain_pending, drain_utf8_lossy, poll_for_marker, send_command},
    port::{NativePort, NativePortEnumerator, Port, PortEnumerator, PortInfo, SerialConfig},
    release::{Channel, Release, ReleaseTable},
};
