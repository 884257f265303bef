//! Device operations: query OTA status, push a firmware URL, trigger OTA.
//!
//! The entire contract with the device firmware is three single-character
//! commands and a handful of marker phrases in its text output. Each
//! operation is a state-free request/response composed from the timed
//! exchange in [`crate::exchange`]; nothing is retried, and there is no
//! verification beyond scanning for the markers below.

use std::thread;
use std::time::Duration;

use log::{debug, info};

use crate::error::{Error, Result};
use crate::exchange::{PollOutcome, poll_for_marker, send_command};
use crate::port::{NativePort, Port};

/// Command requesting the OTA status report.
pub const STATUS_COMMAND: &[u8] = b"o";

/// Command switching the device into URL-config mode.
pub const URL_CONFIG_COMMAND: &[u8] = b"v";

/// Command triggering an OTA update.
pub const TRIGGER_COMMAND: &[u8] = b"u";

/// Marker identifying a status report.
pub const STATUS_MARKER: &str = "OTA Status Information";

/// Phrases acknowledging an accepted firmware URL.
///
/// Two spellings exist across firmware builds; either counts.
pub const URL_ACCEPTED_MARKERS: [&str; 2] = ["Firmware URL updated", "URL updated"];

/// Phrases acknowledging that an OTA update has begun.
pub const OTA_STARTED_MARKERS: [&str; 2] = ["OTA update started", "OTA Update started"];

/// Phrases reporting a completed OTA update.
pub const OTA_SUCCESS_MARKERS: [&str; 2] = ["OTA Update successful", "Update successful"];

fn contains_any(text: &str, markers: &[&str]) -> bool {
    markers.iter().any(|marker| text.contains(marker))
}

/// Fixed wait durations for the exchange and the batch runner.
///
/// Every wait in this tool is an unconditional sleep; the protocol offers no
/// event to wake on. The defaults are the production values; tests inject a
/// zeroed instance so nothing actually sleeps.
#[derive(Debug, Clone)]
pub struct Timing {
    /// Settle delay after opening a port (the device may reset on connect).
    pub connect_settle: Duration,
    /// Response wait for the status command.
    pub status_wait: Duration,
    /// Wait after the URL-config mode switch (response discarded).
    pub mode_switch_wait: Duration,
    /// Response wait after sending the URL payload.
    pub url_wait: Duration,
    /// Response wait after the OTA trigger command.
    pub trigger_wait: Duration,
    /// Pause between reads while draining a response.
    pub drain_pause: Duration,
    /// Interval between OTA completion polls.
    pub poll_interval: Duration,
    /// Maximum number of OTA completion polls.
    pub poll_attempts: usize,
    /// Settle delay between devices (a triggered device may reboot).
    pub device_settle: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            connect_settle: Duration::from_secs(2),
            status_wait: Duration::from_secs(2),
            mode_switch_wait: Duration::from_secs(1),
            url_wait: Duration::from_secs(2),
            trigger_wait: Duration::from_secs(5),
            drain_pause: Duration::from_millis(100),
            poll_interval: Duration::from_secs(1),
            poll_attempts: 60,
            device_settle: Duration::from_secs(2),
        }
    }
}

#[cfg(test)]
impl Timing {
    /// All waits zeroed, poll budget unchanged. Tests only.
    pub(crate) fn immediate() -> Self {
        Self {
            connect_settle: Duration::ZERO,
            status_wait: Duration::ZERO,
            mode_switch_wait: Duration::ZERO,
            url_wait: Duration::ZERO,
            trigger_wait: Duration::ZERO,
            drain_pause: Duration::ZERO,
            poll_interval: Duration::ZERO,
            poll_attempts: 60,
            device_settle: Duration::ZERO,
        }
    }
}

/// One open serial session to one device.
///
/// The session exclusively owns its port for its whole lifetime; the batch
/// runner never holds more than one open session at a time. A session whose
/// port failed to open never exists, so no operation can run against a dead
/// handle.
pub struct DeviceSession<P: Port> {
    port: P,
    timing: Timing,
}

impl<P: Port> DeviceSession<P> {
    /// Wrap an already-open port.
    pub fn new(port: P, timing: Timing) -> Self {
        Self { port, timing }
    }

    /// The endpoint this session is connected to.
    pub fn endpoint(&self) -> &str {
        self.port.name()
    }

    /// Query the device's OTA status.
    ///
    /// Succeeds iff the response contains [`STATUS_MARKER`]; the full
    /// response text is returned for the operator. Never retried.
    pub fn query_status(&mut self) -> Result<String> {
        debug!("Querying OTA status on {}", self.port.name());
        let response = send_command(
            &mut self.port,
            STATUS_COMMAND,
            self.timing.status_wait,
            self.timing.drain_pause,
        );

        if response.contains(STATUS_MARKER) {
            Ok(response)
        } else {
            Err(Error::UnexpectedResponse {
                operation: "query status",
                response,
            })
        }
    }

    /// Push a new firmware URL to the device.
    ///
    /// Two steps: switch into URL-config mode, then send the URL terminated
    /// by a newline. The mode switch is a blind write — the firmware prints
    /// a prompt but nothing in it is worth verifying, so only the final
    /// acknowledgment decides the outcome.
    pub fn update_url(&mut self, url: &str) -> Result<()> {
        debug!("Updating firmware URL on {} to {url}", self.port.name());

        let _ = send_command(
            &mut self.port,
            URL_CONFIG_COMMAND,
            self.timing.mode_switch_wait,
            self.timing.drain_pause,
        );

        let mut payload = url.as_bytes().to_vec();
        payload.push(b'\n');
        let response = send_command(
            &mut self.port,
            &payload,
            self.timing.url_wait,
            self.timing.drain_pause,
        );

        if contains_any(&response, &URL_ACCEPTED_MARKERS) {
            info!("Firmware URL accepted by {}", self.port.name());
            Ok(())
        } else {
            Err(Error::UnexpectedResponse {
                operation: "update URL",
                response,
            })
        }
    }

    /// Trigger an OTA update and wait for the device to report completion.
    ///
    /// If the immediate response lacks a start acknowledgment the operation
    /// fails without a single poll. Otherwise the device's output is polled
    /// once per [`Timing::poll_interval`] for up to
    /// [`Timing::poll_attempts`] iterations; every fresh chunk is handed to
    /// `sink` for the operator, and the operation succeeds as soon as a
    /// success phrase appears within one chunk.
    ///
    /// On timeout the device's actual state is unknown — it may have
    /// finished after the window closed, or still be updating.
    pub fn trigger_ota<S: FnMut(&str)>(&mut self, mut sink: S) -> Result<()> {
        debug!("Triggering OTA update on {}", self.port.name());
        let response = send_command(
            &mut self.port,
            TRIGGER_COMMAND,
            self.timing.trigger_wait,
            self.timing.drain_pause,
        );

        if !contains_any(&response, &OTA_STARTED_MARKERS) {
            return Err(Error::UnexpectedResponse {
                operation: "trigger OTA",
                response,
            });
        }

        sink(&response);
        info!("OTA update started on {}, waiting for completion", self.port.name());

        let outcome = poll_for_marker(
            &mut self.port,
            self.timing.poll_interval,
            self.timing.poll_attempts,
            |chunk| contains_any(chunk, &OTA_SUCCESS_MARKERS),
            &mut sink,
        );

        match outcome {
            PollOutcome::Matched { attempts } => {
                info!("OTA update reported success after {attempts} polls");
                Ok(())
            },
            PollOutcome::TimedOut { attempts } => Err(Error::Timeout(format!(
                "no OTA success marker after {attempts} polls; device state unknown"
            ))),
            PollOutcome::Interrupted { .. } => Err(Error::Interrupted),
        }
    }

    /// The timing profile this session runs with.
    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    /// Close the session, releasing the port.
    pub fn close(mut self) -> Result<()> {
        self.port.close()
    }

    #[cfg(test)]
    pub(crate) fn into_port(self) -> P {
        self.port
    }
}

impl DeviceSession<NativePort> {
    /// Open a serial connection to `port_name` and wait out the settle
    /// delay before the session is handed to the caller.
    ///
    /// Open failures are per-device: the batch runner counts them and moves
    /// on to the next endpoint.
    pub fn connect(port_name: &str, baud_rate: u32, timing: Timing) -> Result<Self> {
        let port = NativePort::open_simple(port_name, baud_rate)?;
        // Opening the port can reset the board; give it time to come back.
        thread::sleep(timing.connect_settle);
        Ok(Self::new(port, timing))
    }
}
