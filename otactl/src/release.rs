//! The firmware release table.
//!
//! Each release tag maps to two download URLs: the GitHub release asset and
//! a jsDelivr CDN mirror of the same binary. The table is an immutable
//! value built once at startup and injected into whatever needs it — never
//! process-global state — so the release set is substitutable in tests and
//! extensible from configuration.

use crate::error::{Error, Result};

/// Which of the two URL tables a tag resolves against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Direct GitHub release asset.
    Github,
    /// CDN-mirrored asset (usually faster for devices behind slow links).
    Cdn,
}

impl Channel {
    /// Human-readable channel name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Github => "GitHub releases",
            Self::Cdn => "CDN mirror",
        }
    }
}

/// One firmware release: a version tag and its download URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    /// Version tag (e.g. "v2.2.0").
    pub tag: String,
    /// Direct GitHub release asset URL.
    pub github_url: String,
    /// CDN-mirrored asset URL.
    pub cdn_url: String,
}

impl Release {
    /// The URL for the given channel.
    pub fn url(&self, channel: Channel) -> &str {
        match channel {
            Channel::Github => &self.github_url,
            Channel::Cdn => &self.cdn_url,
        }
    }
}

/// Ordered, read-only lookup table from version tag to firmware URLs.
#[derive(Debug, Clone, Default)]
pub struct ReleaseTable {
    releases: Vec<Release>,
}

const RELEASE_REPO: &str = "chakoe/esp8266_ssd1306_Clock";
const RELEASE_BIN: &str = "esp8266_ssd1306_Clock.ino.bin";

fn builtin_release(tag: &str) -> Release {
    Release {
        tag: tag.to_string(),
        github_url: format!(
            "https://github.com/{RELEASE_REPO}/releases/download/Release{tag}/{RELEASE_BIN}"
        ),
        cdn_url: format!("https://cdn.jsdelivr.net/gh/{RELEASE_REPO}@Release{tag}/{RELEASE_BIN}"),
    }
}

impl ReleaseTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in release set shipped with the tool.
    pub fn builtin() -> Self {
        let mut table = Self::new();
        for tag in ["v2.1.0", "v2.2.0", "v2.3.0"] {
            table.upsert(builtin_release(tag));
        }
        table
    }

    /// Add a release, replacing any existing entry with the same tag.
    ///
    /// Used once at startup to overlay configuration-supplied releases on
    /// the built-in set; tables are never mutated after that.
    pub fn upsert(&mut self, release: Release) {
        match self.releases.iter_mut().find(|r| r.tag == release.tag) {
            Some(existing) => *existing = release,
            None => self.releases.push(release),
        }
    }

    /// Look up a release by tag.
    pub fn get(&self, tag: &str) -> Option<&Release> {
        self.releases.iter().find(|r| r.tag == tag)
    }

    /// Resolve a tag to its download URL on the given channel.
    ///
    /// Resolution is deterministic and total for known tags: the same tag
    /// always yields the same URL string.
    pub fn resolve(&self, tag: &str, channel: Channel) -> Option<&str> {
        self.get(tag).map(|r| r.url(channel))
    }

    /// Like [`resolve`](Self::resolve), but an unknown tag is the
    /// batch-aborting configuration error.
    pub fn resolve_required(&self, tag: &str, channel: Channel) -> Result<&str> {
        self.resolve(tag, channel)
            .ok_or_else(|| Error::UnknownRelease(tag.to_string()))
    }

    /// Whether the table knows this tag.
    pub fn contains(&self, tag: &str) -> bool {
        self.get(tag).is_some()
    }

    /// Iterate releases in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Release> {
        self.releases.iter()
    }

    /// Number of releases in the table.
    pub fn len(&self) -> usize {
        self.releases.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.releases.is_empty()
    }
}
