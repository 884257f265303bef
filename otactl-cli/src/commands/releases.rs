//! Release listing.

use console::style;
use otactl::{Channel, ReleaseTable};

/// List known firmware releases.
///
/// JSON goes to stdout for script consumption; the human listing goes to
/// stderr like every other status surface.
pub(crate) fn cmd_list_releases(releases: &ReleaseTable, json: bool) {
    if json {
        let entries: Vec<serde_json::Value> = releases
            .iter()
            .map(|release| {
                serde_json::json!({
                    "tag": release.tag,
                    "github_url": release.github_url,
                    "cdn_url": release.cdn_url,
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&entries).unwrap_or_default()
        );
        return;
    }

    print_release_listing(releases);
}

/// Styled release listing on stderr (shared with the interactive menu).
pub(crate) fn print_release_listing(releases: &ReleaseTable) {
    eprintln!("{}", style("Known firmware releases").bold().underlined());

    if releases.is_empty() {
        eprintln!("  {}", style("(none)").dim());
        return;
    }

    for release in releases.iter() {
        eprintln!("\n  {}", style(&release.tag).cyan().bold());
        eprintln!(
            "    {}: {}",
            Channel::Github.name(),
            style(&release.github_url).dim()
        );
        eprintln!(
            "    {}: {}",
            Channel::Cdn.name(),
            style(&release.cdn_url).dim()
        );
    }
}
