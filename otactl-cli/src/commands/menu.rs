//! Interactive menu mode.
//!
//! Connects one session up front and reuses it for every menu action, the
//! way an operator works through a single bench device: check status, push
//! a URL, trigger the update, or do the last two in one step.

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Select, theme::ColorfulTheme};
use otactl::{Channel, DeviceSession, NativePort, ReleaseTable, Timing};

use crate::config::Config;
use crate::serial::{ensure_interactive_terminal, map_prompt_error, select_port};
use crate::{CliError, commands::releases::print_release_listing, was_interrupted};

const MENU_ITEMS: [&str; 6] = [
    "Check OTA status",
    "Update firmware URL",
    "Trigger OTA update",
    "Update URL and trigger OTA",
    "List known releases",
    "Exit",
];

/// Run the interactive menu.
pub(crate) fn cmd_menu(
    config: &Config,
    releases: &ReleaseTable,
    channel: Channel,
    baud: u32,
) -> Result<()> {
    ensure_interactive_terminal()?;

    eprintln!(
        "{}",
        style("otactl — ESP8266 firmware URL update console").bold()
    );

    let port_name = select_port(config)?;

    eprintln!(
        "{} Connecting to {} at {baud} baud...",
        style("🔌").cyan(),
        style(&port_name).cyan()
    );
    let mut session = DeviceSession::connect(&port_name, baud, Timing::default())
        .with_context(|| format!("Cannot open {port_name}"))?;
    eprintln!("{} Connected to {port_name}", style("✓").green());

    loop {
        if was_interrupted() {
            break;
        }

        let choice = Select::with_theme(&ColorfulTheme::default())
            .with_prompt("Select an operation")
            .items(&MENU_ITEMS)
            .default(0)
            .interact_opt()
            .map_err(map_prompt_error)?;

        match choice {
            Some(0) => check_status(&mut session),
            Some(1) => {
                if let Some(url) = pick_release(releases, channel)? {
                    update_url(&mut session, &url);
                }
            },
            Some(2) => trigger_ota(&mut session),
            Some(3) => {
                if let Some(url) = pick_release(releases, channel)? {
                    if update_url(&mut session, &url) {
                        trigger_ota(&mut session);
                    }
                }
            },
            Some(4) => print_release_listing(releases),
            _ => break,
        }
    }

    session.close()?;
    eprintln!("{} Bye", style("👋").cyan());
    Ok(())
}

fn check_status(session: &mut DeviceSession<NativePort>) {
    eprintln!("{} Checking OTA status...", style("📊").cyan());
    match session.query_status() {
        Ok(response) => {
            eprintln!("{} OTA status:", style("✓").green());
            eprintln!("{response}");
        },
        Err(err) => report_failure("Cannot read OTA status", &err),
    }
}

fn update_url(session: &mut DeviceSession<NativePort>, url: &str) -> bool {
    eprintln!("{} Updating firmware URL...", style("🔄").cyan());
    eprintln!("  New URL: {}", style(url).dim());
    match session.update_url(url) {
        Ok(()) => {
            eprintln!("{} Firmware URL updated", style("✓").green());
            true
        },
        Err(err) => {
            report_failure("Firmware URL update failed", &err);
            false
        },
    }
}

fn trigger_ota(session: &mut DeviceSession<NativePort>) {
    eprintln!("{} Triggering OTA update...", style("🚀").cyan());
    let result = session.trigger_ota(|chunk| eprint!("{chunk}"));
    eprintln!();
    match result {
        Ok(()) => eprintln!("{} OTA update successful", style("✓").green().bold()),
        Err(err) => report_failure("OTA update failed", &err),
    }
}

fn report_failure(what: &str, err: &otactl::Error) {
    eprintln!("{} {what}: {err}", style("✗").red());
    if let Some(response) = err.response() {
        if !response.is_empty() {
            eprintln!("  device said: {response}");
        }
    }
}

/// Pick a release from the table; `None` means the operator backed out.
fn pick_release(releases: &ReleaseTable, channel: Channel) -> Result<Option<String>> {
    if releases.is_empty() {
        return Err(CliError::Usage("the release table is empty".to_string()).into());
    }

    let labels: Vec<String> = releases
        .iter()
        .map(|release| format!("{}  {}", release.tag, style(release.url(channel)).dim()))
        .collect();

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt(format!("Select a release ({})", channel.name()))
        .items(&labels)
        .default(0)
        .interact_opt()
        .map_err(map_prompt_error)?;

    Ok(selection.and_then(|index| {
        releases
            .iter()
            .nth(index)
            .map(|release| release.url(channel).to_string())
    }))
}
