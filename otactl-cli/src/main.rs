//! otactl CLI - batch firmware-URL update and OTA trigger console for
//! ESP8266-class devices.
//!
//! ## Usage
//!
//! - `otactl` — interactive menu (port selection, status, URL update, OTA)
//! - `otactl /dev/ttyUSB0 COM3 v2.2.0` — batch mode: every leading argument
//!   is a serial endpoint, the trailing argument is the release tag
//! - `otactl --list-releases` / `otactl --list-ports` — listings
//!
//! ## Exit codes
//!
//! - 0: success (a completed batch exits 0 even when devices failed; the
//!   aggregate counts are the contract)
//! - 1: unexpected runtime error
//! - 2: usage or configuration error (including an unknown release tag)
//! - 130: interrupted
//!
//! Environment variables:
//!   OTACTL_BAUD              - Default baud rate (default: 115200)
//!   OTACTL_CHANNEL           - Default distribution channel (github, cdn)
//!   OTACTL_NON_INTERACTIVE   - Non-interactive mode (disable prompts)

use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use clap::{Parser, ValueEnum};
use console::style;
use env_logger::Env;
use log::{debug, warn};
use otactl::Channel;

mod commands;
mod config;
mod serial;

use config::Config;

/// Default baud rate when neither flag, env, nor config provides one.
const DEFAULT_BAUD: u32 = 115200;

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Whether Ctrl-C was received since startup.
pub(crate) fn was_interrupted() -> bool {
    INTERRUPTED.load(Ordering::Relaxed)
}

/// CLI errors that map to specific exit codes.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    /// Malformed invocation or unusable environment; exit code 2.
    #[error("{0}")]
    Usage(String),
    /// The operator cancelled; exit code 130.
    #[error("{0}")]
    Cancelled(String),
}

/// otactl - a serial console for batch ESP8266 OTA firmware URL updates.
#[derive(Parser)]
#[command(name = "otactl")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "For more information, visit: https://github.com/chakoe/otactl")]
struct Cli {
    /// Serial endpoints followed by a release tag (e.g. "/dev/ttyUSB0 COM3 v2.2.0").
    /// With no arguments the interactive menu starts instead.
    #[arg(value_name = "ENDPOINT|TAG")]
    targets: Vec<String>,

    /// Baud rate for the serial connection [default: 115200].
    #[arg(short, long, env = "OTACTL_BAUD")]
    baud: Option<u32>,

    /// Distribution channel to resolve firmware URLs against [default: cdn].
    #[arg(short, long, value_enum, env = "OTACTL_CHANNEL")]
    channel: Option<ChannelArg>,

    /// List known firmware releases and exit.
    #[arg(long)]
    list_releases: bool,

    /// List available serial ports and exit.
    #[arg(long)]
    list_ports: bool,

    /// Output listings as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Path to a configuration file.
    #[arg(long = "config", value_name = "PATH")]
    config_path: Option<PathBuf>,

    /// Verbose output level (-v, -vv for increasing detail).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress non-essential output).
    #[arg(short, long)]
    quiet: bool,

    /// Non-interactive mode (fail instead of prompting).
    #[arg(long, env = "OTACTL_NON_INTERACTIVE")]
    non_interactive: bool,
}

/// Distribution channel argument.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum ChannelArg {
    /// Direct GitHub release assets.
    Github,
    /// CDN-mirrored assets (recommended).
    Cdn,
}

impl From<ChannelArg> for Channel {
    fn from(channel: ChannelArg) -> Self {
        match channel {
            ChannelArg::Github => Channel::Github,
            ChannelArg::Cdn => Channel::Cdn,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            _ => "debug",
        }
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_target(cli.verbose >= 2)
        .format_timestamp(if cli.verbose >= 2 {
            Some(env_logger::TimestampPrecision::Millis)
        } else {
            None
        })
        .init();

    // NO_COLOR and TTY detection
    if env::var("NO_COLOR").is_ok() || !console::Term::stderr().is_term() {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    if let Err(e) = ctrlc::set_handler(|| {
        if INTERRUPTED.swap(true, Ordering::Relaxed) {
            // Second Ctrl-C: stop immediately.
            std::process::exit(130);
        }
    }) {
        debug!("Failed to install Ctrl-C handler: {e}");
    }

    // Let long-running library loops observe Ctrl-C.
    otactl::set_interrupt_checker(was_interrupted);

    debug!("otactl v{}", env!("CARGO_PKG_VERSION"));

    match run(&cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            let code = exit_code_for(&err);
            if code == 130 {
                eprintln!("\n{} {err:#}", style("Interrupted:").yellow().bold());
            } else {
                eprintln!("{} {err:#}", style("Error:").red().bold());
            }
            std::process::exit(code);
        },
    }
}

fn run(cli: &Cli) -> Result<i32> {
    let config = if let Some(ref path) = cli.config_path {
        Config::load_from_path(path)
    } else {
        Config::load()
    };

    let releases = config.release_table();
    let channel: Channel = cli
        .channel
        .map(Channel::from)
        .or_else(|| config.channel())
        .unwrap_or(Channel::Cdn);
    let baud = cli
        .baud
        .or(config.connection.baud)
        .unwrap_or(DEFAULT_BAUD);

    if cli.list_releases {
        commands::releases::cmd_list_releases(&releases, cli.json);
        return Ok(0);
    }

    if cli.list_ports {
        commands::ports::cmd_list_ports(cli.json);
        return Ok(0);
    }

    if cli.targets.is_empty() {
        if cli.non_interactive {
            return Err(CliError::Usage(
                "no endpoints given and prompts are disabled; \
                 pass endpoints and a release tag, or drop --non-interactive"
                    .to_string(),
            )
            .into());
        }
        commands::menu::cmd_menu(&config, &releases, channel, baud)?;
        return Ok(0);
    }

    let (endpoints, tag) = split_batch_targets(&cli.targets)?;
    let outcome = commands::batch::cmd_batch(cli, &endpoints, &tag, &releases, channel, baud)?;
    Ok(if outcome.interrupted { 130 } else { 0 })
}

/// Map an error to the documented exit code.
fn exit_code_for(err: &anyhow::Error) -> i32 {
    if let Some(cli_err) = err.downcast_ref::<CliError>() {
        return match cli_err {
            CliError::Usage(_) => 2,
            CliError::Cancelled(_) => 130,
        };
    }

    match err.downcast_ref::<otactl::Error>() {
        Some(otactl::Error::UnknownRelease(_)) => 2,
        Some(otactl::Error::Interrupted) => 130,
        _ => 1,
    }
}

/// Whether a token plausibly names a serial endpoint.
///
/// Deliberately loose: a COM prefix on Windows, anything path-like
/// elsewhere. The port either opens or the device is counted as failed.
fn looks_like_endpoint(token: &str) -> bool {
    let com_port = token
        .get(..3)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("COM"))
        && token.len() > 3;
    com_port || token.contains('/')
}

/// Split batch arguments into endpoints and the trailing release tag.
fn split_batch_targets(targets: &[String]) -> Result<(Vec<String>, String)> {
    if targets.len() < 2 {
        return Err(CliError::Usage(
            "expected one or more serial endpoints followed by a release tag, \
             e.g. `otactl /dev/ttyUSB0 v2.2.0`"
                .to_string(),
        )
        .into());
    }

    let tag = targets[targets.len() - 1].clone();
    if looks_like_endpoint(&tag) {
        return Err(CliError::Usage(format!(
            "the last argument must be a release tag, but `{tag}` looks like an endpoint"
        ))
        .into());
    }

    let mut endpoints = Vec::new();
    for token in &targets[..targets.len() - 1] {
        if looks_like_endpoint(token) {
            endpoints.push(token.clone());
        } else {
            warn!("Ignoring unrecognized endpoint token: {token}");
        }
    }

    if endpoints.is_empty() {
        return Err(CliError::Usage(
            "no recognized serial endpoints in arguments (expected COM* or a device path)"
                .to_string(),
        )
        .into());
    }

    Ok((endpoints, tag))
}

#[cfg(test)]
mod cli_tests {
    use super::*;
    use clap::CommandFactory;

    // ---- clap validation ----

    #[test]
    fn test_cli_command_is_valid() {
        // Verifies that all derive macros produce a valid clap Command
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_parse_batch_targets() {
        let cli =
            Cli::try_parse_from(["otactl", "/dev/ttyUSB0", "COM3", "v2.2.0"]).unwrap();
        assert_eq!(cli.targets, vec!["/dev/ttyUSB0", "COM3", "v2.2.0"]);
        assert!(cli.baud.is_none());
        assert!(cli.channel.is_none());
    }

    #[test]
    fn test_cli_parse_flags() {
        let cli = Cli::try_parse_from([
            "otactl",
            "--baud",
            "74880",
            "--channel",
            "github",
            "-vv",
            "--quiet",
            "--non-interactive",
            "--config",
            "/tmp/otactl.toml",
            "/dev/ttyUSB0",
            "v2.1.0",
        ])
        .unwrap();
        assert_eq!(cli.baud, Some(74880));
        assert!(matches!(cli.channel, Some(ChannelArg::Github)));
        assert_eq!(cli.verbose, 2);
        assert!(cli.quiet);
        assert!(cli.non_interactive);
        assert_eq!(
            cli.config_path.as_deref(),
            Some(std::path::Path::new("/tmp/otactl.toml"))
        );
    }

    #[test]
    fn test_cli_parse_listings() {
        let cli = Cli::try_parse_from(["otactl", "--list-releases", "--json"]).unwrap();
        assert!(cli.list_releases);
        assert!(cli.json);

        let cli = Cli::try_parse_from(["otactl", "--list-ports"]).unwrap();
        assert!(cli.list_ports);
        assert!(!cli.json);
    }

    #[test]
    fn test_cli_no_args_is_valid_menu_invocation() {
        let cli = Cli::try_parse_from(["otactl"]).unwrap();
        assert!(cli.targets.is_empty());
    }

    #[test]
    fn test_channel_arg_conversion() {
        assert_eq!(Channel::from(ChannelArg::Github), Channel::Github);
        assert_eq!(Channel::from(ChannelArg::Cdn), Channel::Cdn);
    }

    // ---- looks_like_endpoint ----

    #[test]
    fn test_endpoint_recognition() {
        assert!(looks_like_endpoint("COM3"));
        assert!(looks_like_endpoint("com12"));
        assert!(looks_like_endpoint("/dev/ttyUSB0"));
        assert!(looks_like_endpoint("/dev/cu.usbserial-0001"));

        assert!(!looks_like_endpoint("v2.2.0"));
        assert!(!looks_like_endpoint("COM")); // prefix alone is not a port
        assert!(!looks_like_endpoint("firmware"));
    }

    // ---- split_batch_targets ----

    fn strings(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_split_targets_basic() {
        let (endpoints, tag) =
            split_batch_targets(&strings(&["/dev/ttyUSB0", "COM3", "v2.2.0"])).unwrap();
        assert_eq!(endpoints, vec!["/dev/ttyUSB0", "COM3"]);
        assert_eq!(tag, "v2.2.0");
    }

    #[test]
    fn test_split_targets_requires_tag() {
        let err = split_batch_targets(&strings(&["/dev/ttyUSB0"])).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CliError>(),
            Some(CliError::Usage(_))
        ));
    }

    #[test]
    fn test_split_targets_rejects_trailing_endpoint() {
        let err = split_batch_targets(&strings(&["/dev/ttyUSB0", "COM3"])).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CliError>(),
            Some(CliError::Usage(_))
        ));
    }

    #[test]
    fn test_split_targets_requires_recognized_endpoints() {
        let err = split_batch_targets(&strings(&["banana", "v2.2.0"])).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CliError>(),
            Some(CliError::Usage(_))
        ));
    }

    #[test]
    fn test_split_targets_drops_unrecognized_tokens() {
        let (endpoints, tag) =
            split_batch_targets(&strings(&["COM3", "banana", "COM4", "v2.3.0"])).unwrap();
        assert_eq!(endpoints, vec!["COM3", "COM4"]);
        assert_eq!(tag, "v2.3.0");
    }

    // ---- exit_code_for ----

    #[test]
    fn test_exit_codes_for_cli_errors() {
        let usage: anyhow::Error = CliError::Usage("bad".into()).into();
        assert_eq!(exit_code_for(&usage), 2);

        let cancelled: anyhow::Error = CliError::Cancelled("stop".into()).into();
        assert_eq!(exit_code_for(&cancelled), 130);
    }

    #[test]
    fn test_exit_codes_for_library_errors() {
        let unknown: anyhow::Error = otactl::Error::UnknownRelease("v0".into()).into();
        assert_eq!(exit_code_for(&unknown), 2);

        let interrupted: anyhow::Error = otactl::Error::Interrupted.into();
        assert_eq!(exit_code_for(&interrupted), 130);

        let timeout: anyhow::Error = otactl::Error::Timeout("poll".into()).into();
        assert_eq!(exit_code_for(&timeout), 1);

        let other = anyhow::anyhow!("boom");
        assert_eq!(exit_code_for(&other), 1);
    }
}
