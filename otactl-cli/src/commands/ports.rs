//! Serial port listing.

use console::style;
use otactl::detect_ports;

/// List available serial ports.
///
/// JSON goes to stdout; the human listing goes to stderr.
pub(crate) fn cmd_list_ports(json: bool) {
    let detected = detect_ports();

    if json {
        let ports: Vec<serde_json::Value> = detected
            .iter()
            .map(|p| {
                serde_json::json!({
                    "name": p.name,
                    "bridge": p.bridge.name(),
                    "known": p.bridge.is_known(),
                    "vid": p.vid,
                    "pid": p.pid,
                    "manufacturer": p.manufacturer,
                    "product": p.product,
                    "serial": p.serial,
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&ports).unwrap_or_default()
        );
        return;
    }

    eprintln!("{}", style("Available serial ports").bold().underlined());

    if detected.is_empty() {
        eprintln!("  {}", style("no serial ports found").dim());
        return;
    }

    for port in &detected {
        let marker = if port.is_likely_device() {
            style("•").green()
        } else {
            style("•").dim()
        };
        eprintln!("  {marker} {}", port.label());
    }
}
