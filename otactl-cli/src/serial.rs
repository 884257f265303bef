//! Interactive serial port selection.
//!
//! The interactive menu picks its port from a freshly enumerated list with
//! USB bridge classification; ports behind bridges typical of ESP8266
//! boards are listed first. A port remembered in the configuration file
//! short-circuits selection entirely.

use {
    crate::{CliError, config::Config},
    anyhow::Result,
    console::style,
    dialoguer::{Error as DialoguerError, Select, theme::ColorfulTheme},
    log::info,
    otactl::{DetectedPort, detect_ports},
    std::io::IsTerminal,
};

/// Fail unless both stdin and stderr are terminals.
pub(crate) fn ensure_interactive_terminal() -> Result<()> {
    if std::io::stdin().is_terminal() && std::io::stderr().is_terminal() {
        Ok(())
    } else {
        Err(CliError::Usage(
            "interactive mode requires a terminal; pass endpoints and a release tag instead"
                .to_string(),
        )
        .into())
    }
}

/// Map a dialoguer prompt error to the CLI error classes.
pub(crate) fn map_prompt_error(err: DialoguerError) -> anyhow::Error {
    match err {
        DialoguerError::IO(io_err) => {
            if io_err.kind() == std::io::ErrorKind::Interrupted {
                CliError::Cancelled("selection cancelled".to_string()).into()
            } else {
                CliError::Usage("prompt failed; is this a real terminal?".to_string()).into()
            }
        },
    }
}

/// Order ports for display: likely devices first, stable within groups.
pub(crate) fn sort_for_selection(ports: &mut [DetectedPort]) {
    ports.sort_by_key(|p| !p.is_likely_device());
}

/// Select a serial port for the interactive menu.
///
/// A port from the configuration wins outright; otherwise the operator
/// picks from a freshly enumerated list.
pub(crate) fn select_port(config: &Config) -> Result<String> {
    if let Some(port) = &config.connection.port {
        info!("Using port from config: {port}");
        return Ok(port.clone());
    }

    let mut ports = detect_ports();
    if ports.is_empty() {
        return Err(CliError::Usage("no serial ports found".to_string()).into());
    }

    sort_for_selection(&mut ports);

    eprintln!(
        "{} Detected {} serial port(s); likely devices listed first.",
        style("ℹ").blue(),
        ports.len()
    );

    let labels: Vec<String> = ports
        .iter()
        .map(|port| {
            if port.is_likely_device() {
                style(port.label()).bold().to_string()
            } else {
                port.label()
            }
        })
        .collect();

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Select a serial port")
        .items(&labels)
        .default(0)
        .interact_opt()
        .map_err(map_prompt_error)?;

    match selection {
        Some(index) => Ok(ports
            .into_iter()
            .nth(index)
            .map(|p| p.name)
            .unwrap_or_default()),
        None => Err(CliError::Cancelled("selection cancelled".to_string()).into()),
    }
}
