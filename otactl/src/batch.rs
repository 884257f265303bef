//! Sequential batch runner.
//!
//! Applies one firmware release to an ordered list of endpoints, one device
//! at a time: connect, observe status, push the URL, trigger the OTA, close,
//! settle, move on. Every device's outcome is independent; a failure is
//! counted and the batch continues. There is no cross-device parallelism
//! and no rollback.

use std::thread;

use log::{debug, warn};

use crate::device::{DeviceSession, Timing};
use crate::error::{Error, Result};
use crate::port::Port;
use crate::release::{Channel, ReleaseTable};

/// Options for a batch run.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Which URL table to resolve the release against.
    pub channel: Channel,
    /// Wait durations for device operations and inter-device settling.
    pub timing: Timing,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            channel: Channel::Cdn,
            timing: Timing::default(),
        }
    }
}

/// Aggregate tally of a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Devices that completed both the URL update and the OTA trigger.
    pub succeeded: usize,
    /// Devices that failed at any step.
    pub failed: usize,
    /// Number of endpoints in the batch.
    pub total: usize,
    /// Whether the batch was cut short by the interrupt checker. When set,
    /// `succeeded + failed` covers only the devices reached before the
    /// interrupt.
    pub interrupted: bool,
}

/// Progress events emitted while a batch runs.
///
/// All operator-facing reporting goes through these; the library itself
/// never prints. `ConnectFailed` and `UrlRejected` are terminal for their
/// device; `DeviceFailed` reports an OTA trigger failure.
#[derive(Debug)]
pub enum BatchEvent<'a> {
    /// The release tag resolved and the batch is about to start.
    BatchStarted {
        /// Number of endpoints to process.
        total: usize,
        /// The release tag being applied.
        tag: &'a str,
        /// The resolved firmware URL.
        url: &'a str,
    },
    /// Processing of one endpoint begins (1-based index).
    DeviceStarted {
        /// Position in the batch, starting at 1.
        index: usize,
        /// Number of endpoints in the batch.
        total: usize,
        /// The endpoint being processed.
        endpoint: &'a str,
    },
    /// The endpoint could not be opened; the device counts as failed.
    ConnectFailed {
        /// The endpoint that failed to open.
        endpoint: &'a str,
        /// The open error.
        error: &'a Error,
    },
    /// The serial connection is open and settled.
    Connected {
        /// The connected endpoint.
        endpoint: &'a str,
    },
    /// The device produced a status report.
    Status {
        /// Full status response text.
        response: &'a str,
    },
    /// The status query failed; the batch proceeds regardless.
    StatusUnavailable {
        /// The status failure.
        error: &'a Error,
    },
    /// The device acknowledged the new firmware URL.
    UrlUpdated {
        /// The URL that was pushed.
        url: &'a str,
    },
    /// The device did not acknowledge the URL; the device counts as failed.
    UrlRejected {
        /// The update failure, carrying the raw response.
        error: &'a Error,
    },
    /// A chunk of device output observed while the OTA runs.
    OtaOutput {
        /// Freshly received response text.
        chunk: &'a str,
    },
    /// The device reported a successful OTA update.
    DeviceSucceeded {
        /// The endpoint that succeeded.
        endpoint: &'a str,
    },
    /// The OTA trigger failed (no start acknowledgment, or timeout).
    DeviceFailed {
        /// The endpoint that failed.
        endpoint: &'a str,
        /// The trigger failure.
        error: &'a Error,
    },
}

/// Run a batch over `endpoints`, applying the release named by `tag`.
///
/// The tag is resolved against `releases` up front; an unknown tag aborts
/// the whole batch with [`Error::UnknownRelease`] before any connection is
/// attempted. Each endpoint is then processed independently through
/// `connect` (injected so tests supply scripted transports; production
/// callers pass [`DeviceSession::connect`]).
pub fn run_batch<P, C, E>(
    endpoints: &[String],
    tag: &str,
    releases: &ReleaseTable,
    options: &BatchOptions,
    mut connect: C,
    mut events: E,
) -> Result<BatchOutcome>
where
    P: Port,
    C: FnMut(&str) -> Result<DeviceSession<P>>,
    E: FnMut(BatchEvent<'_>),
{
    let url = releases.resolve_required(tag, options.channel)?;

    let mut outcome = BatchOutcome {
        succeeded: 0,
        failed: 0,
        total: endpoints.len(),
        interrupted: false,
    };

    events(BatchEvent::BatchStarted {
        total: endpoints.len(),
        tag,
        url,
    });

    for (index, endpoint) in endpoints.iter().enumerate() {
        if crate::is_interrupt_requested() {
            outcome.interrupted = true;
            break;
        }

        events(BatchEvent::DeviceStarted {
            index: index + 1,
            total: endpoints.len(),
            endpoint,
        });

        let mut session = match connect(endpoint) {
            Ok(session) => session,
            Err(error) => {
                warn!("Cannot open {endpoint}: {error}");
                events(BatchEvent::ConnectFailed {
                    endpoint,
                    error: &error,
                });
                outcome.failed += 1;
                // No settle here: nothing was opened, nothing is rebooting.
                continue;
            },
        };
        events(BatchEvent::Connected { endpoint });

        // Observed for the operator; never gates the update itself.
        match session.query_status() {
            Ok(response) => events(BatchEvent::Status {
                response: &response,
            }),
            Err(error) => events(BatchEvent::StatusUnavailable { error: &error }),
        }

        let device_result = match session.update_url(url) {
            Ok(()) => {
                events(BatchEvent::UrlUpdated { url });
                match session.trigger_ota(|chunk| events(BatchEvent::OtaOutput { chunk })) {
                    Ok(()) => {
                        events(BatchEvent::DeviceSucceeded { endpoint });
                        Ok(())
                    },
                    Err(error) => {
                        if !matches!(error, Error::Interrupted) {
                            events(BatchEvent::DeviceFailed {
                                endpoint,
                                error: &error,
                            });
                        }
                        Err(error)
                    },
                }
            },
            Err(error) => {
                events(BatchEvent::UrlRejected { error: &error });
                Err(error)
            },
        };

        if let Err(e) = session.close() {
            debug!("Closing {endpoint}: {e}");
        }

        match device_result {
            Ok(()) => outcome.succeeded += 1,
            Err(Error::Interrupted) => {
                // Device state unknown; report the tally so far.
                outcome.interrupted = true;
                break;
            },
            Err(_) => outcome.failed += 1,
        }

        // Let a freshly triggered device reboot before the next endpoint
        // races it.
        thread::sleep(options.timing.device_settle);
    }

    Ok(outcome)
}
