//! Batch mode: apply one release to an ordered list of endpoints.

use anyhow::Result;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use otactl::{
    BatchEvent, BatchOptions, BatchOutcome, Channel, DeviceSession, ReleaseTable, Timing,
    run_batch,
};
use std::time::Duration;

use crate::Cli;

/// Run a batch update over the given endpoints.
pub(crate) fn cmd_batch(
    cli: &Cli,
    endpoints: &[String],
    tag: &str,
    releases: &ReleaseTable,
    channel: Channel,
    baud: u32,
) -> Result<BatchOutcome> {
    let timing = Timing::default();
    let options = BatchOptions {
        channel,
        timing: timing.clone(),
    };

    let quiet = cli.quiet;
    let mut reporter = EventReporter::new(quiet);

    let outcome = run_batch(
        endpoints,
        tag,
        releases,
        &options,
        |endpoint| DeviceSession::connect(endpoint, baud, timing.clone()),
        |event| reporter.report(&event),
    )?;

    reporter.finish();
    print_summary(&outcome, quiet);
    Ok(outcome)
}

/// Renders batch events for the operator.
///
/// While an OTA runs, a spinner marks the wait and device output is printed
/// above it; everything else is plain styled lines on stderr.
struct EventReporter {
    quiet: bool,
    ota_spinner: Option<ProgressBar>,
}

impl EventReporter {
    fn new(quiet: bool) -> Self {
        Self {
            quiet,
            ota_spinner: None,
        }
    }

    fn say(&self, message: &str) {
        if let Some(pb) = &self.ota_spinner {
            pb.suspend(|| eprintln!("{message}"));
        } else {
            eprintln!("{message}");
        }
    }

    fn start_spinner(&mut self) {
        if self.quiet || !console::colors_enabled_stderr() {
            return;
        }
        #[allow(clippy::unwrap_used)] // Static template string
        let spinner_style = ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg} [{elapsed}]")
            .unwrap();
        let pb = ProgressBar::new_spinner();
        pb.set_style(spinner_style);
        pb.set_message("waiting for the device to finish updating");
        pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        pb.enable_steady_tick(Duration::from_millis(120));
        self.ota_spinner = Some(pb);
    }

    fn stop_spinner(&mut self) {
        if let Some(pb) = self.ota_spinner.take() {
            pb.finish_and_clear();
        }
    }

    fn report(&mut self, event: &BatchEvent<'_>) {
        match event {
            BatchEvent::BatchStarted { total, tag, url } => {
                if !self.quiet {
                    self.say(&format!(
                        "{} Target release: {}",
                        style("📦").cyan(),
                        style(tag).bold()
                    ));
                    self.say(&format!("  Firmware URL: {}", style(url).dim()));
                    self.say(&format!("  Updating {total} device(s)"));
                }
            },
            BatchEvent::DeviceStarted {
                index,
                total,
                endpoint,
            } => {
                self.say(&format!(
                    "\n[{index}/{total}] {}",
                    style(endpoint).cyan().bold()
                ));
            },
            BatchEvent::ConnectFailed { endpoint, error } => {
                self.say(&format!(
                    "  {} cannot open {endpoint}: {error}",
                    style("✗").red()
                ));
            },
            BatchEvent::Connected { endpoint } => {
                if !self.quiet {
                    self.say(&format!("  {} connected to {endpoint}", style("✓").green()));
                }
            },
            BatchEvent::Status { response } => {
                if !self.quiet {
                    self.say(&format!("  {} OTA status:", style("📊").cyan()));
                    self.say(&indent(response));
                }
            },
            BatchEvent::StatusUnavailable { error } => {
                self.say(&format!(
                    "  {} no OTA status report ({error}); continuing",
                    style("⚠").yellow()
                ));
            },
            BatchEvent::UrlUpdated { .. } => {
                self.say(&format!("  {} firmware URL updated", style("✓").green()));
                self.say(&format!("  {} OTA update triggered...", style("🚀").cyan()));
                self.start_spinner();
            },
            BatchEvent::UrlRejected { error } => {
                self.say(&format!(
                    "  {} firmware URL not acknowledged",
                    style("✗").red()
                ));
                self.say_response(error);
            },
            BatchEvent::OtaOutput { chunk } => {
                if !self.quiet {
                    self.say(&indent(chunk));
                }
            },
            BatchEvent::DeviceSucceeded { endpoint } => {
                self.stop_spinner();
                self.say(&format!(
                    "  {} OTA update successful on {endpoint}",
                    style("✓").green().bold()
                ));
            },
            BatchEvent::DeviceFailed { endpoint, error } => {
                self.stop_spinner();
                self.say(&format!(
                    "  {} OTA update failed on {endpoint}: {error}",
                    style("✗").red()
                ));
                self.say_response(error);
            },
        }
    }

    fn say_response(&self, error: &otactl::Error) {
        if let Some(response) = error.response() {
            if !response.is_empty() {
                self.say(&format!("  device said:\n{}", indent(response)));
            }
        }
    }

    fn finish(&mut self) {
        self.stop_spinner();
    }
}

fn indent(text: &str) -> String {
    text.trim_end_matches(['\r', '\n'])
        .lines()
        .map(|line| format!("    {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn print_summary(outcome: &BatchOutcome, quiet: bool) {
    if quiet {
        eprintln!(
            "succeeded: {} failed: {} total: {}",
            outcome.succeeded, outcome.failed, outcome.total
        );
        return;
    }

    let rule = style("════════════════════════════════════════").dim();
    eprintln!("\n{rule}");
    eprintln!("  Batch update complete");
    eprintln!("{rule}");
    eprintln!(
        "  {} Succeeded: {}",
        style("✓").green(),
        style(outcome.succeeded).green().bold()
    );
    eprintln!(
        "  {} Failed:    {}",
        style("✗").red(),
        style(outcome.failed).red().bold()
    );
    eprintln!("    Total:     {}", outcome.total);
    if outcome.interrupted {
        eprintln!(
            "  {} interrupted before all devices were reached",
            style("⚠").yellow()
        );
    }
    eprintln!("{rule}");
}
