//! USB bridge classification and serial port discovery.
//!
//! ESP8266 dev boards almost always hang off one of a handful of
//! USB-to-UART bridges (CH340 on NodeMCU clones and the Wemos D1 mini,
//! CP210x on the NodeMCU Amica, occasionally FTDI or Prolific adapters).
//! Classifying ports by VID/PID lets the interactive picker highlight the
//! entries that are plausibly devices.

use log::{debug, trace};

use crate::port::{NativePortEnumerator, PortEnumerator};

/// Known USB bridge chips found on ESP8266 boards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsbBridge {
    /// CH340/CH341 USB-to-Serial converter.
    Ch340,
    /// Silicon Labs CP210x USB-to-Serial converter.
    Cp210x,
    /// FTDI FT232/FT2232 USB-to-Serial converter.
    Ftdi,
    /// Prolific PL2303 USB-to-Serial converter.
    Prolific,
    /// Unknown device.
    Unknown,
}

/// Known USB VID/PID pairs for common USB-to-UART bridges.
const KNOWN_BRIDGES: &[(u16, &[u16], UsbBridge)] = &[
    (
        0x1A86,
        &[0x7523, 0x7522, 0x5523, 0x5512, 0x55D4],
        UsbBridge::Ch340,
    ),
    (0x10C4, &[0xEA60, 0xEA70, 0xEA71, 0xEA63], UsbBridge::Cp210x),
    (
        0x0403,
        &[0x6001, 0x6010, 0x6011, 0x6014, 0x6015],
        UsbBridge::Ftdi,
    ),
    (0x067B, &[0x2303, 0x23A3, 0x23C3, 0x23D3], UsbBridge::Prolific),
];

impl UsbBridge {
    /// Classify a VID/PID pair.
    #[must_use]
    pub fn from_vid_pid(vid: u16, pid: u16) -> Self {
        for (known_vid, pids, bridge) in KNOWN_BRIDGES {
            if vid == *known_vid && (pids.is_empty() || pids.contains(&pid)) {
                return *bridge;
            }
        }
        Self::Unknown
    }

    /// Get a human-readable name for the bridge.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ch340 => "CH340/CH341",
            Self::Cp210x => "CP210x",
            Self::Ftdi => "FTDI",
            Self::Prolific => "PL2303",
            Self::Unknown => "Unknown",
        }
    }

    /// Check if this is a known/expected bridge type.
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// Detected serial port information.
#[derive(Debug, Clone)]
pub struct DetectedPort {
    /// Port name/path (e.g., "/dev/ttyUSB0" or "COM3").
    pub name: String,
    /// USB bridge type if classified.
    pub bridge: UsbBridge,
    /// USB Vendor ID (if available).
    pub vid: Option<u16>,
    /// USB Product ID (if available).
    pub pid: Option<u16>,
    /// Device manufacturer string (if available).
    pub manufacturer: Option<String>,
    /// Device product string (if available).
    pub product: Option<String>,
    /// Serial number (if available).
    pub serial: Option<String>,
}

impl DetectedPort {
    /// Whether this port sits behind a bridge chip typical of ESP8266 boards.
    pub fn is_likely_device(&self) -> bool {
        self.bridge.is_known()
    }

    /// One-line label for listings and pickers.
    pub fn label(&self) -> String {
        let bridge = if self.bridge.is_known() {
            format!(" [{}]", self.bridge.name())
        } else if let (Some(vid), Some(pid)) = (self.vid, self.pid) {
            format!(" ({vid:04X}:{pid:04X})")
        } else {
            String::new()
        };

        let product = self
            .product
            .as_ref()
            .map(|p| format!(" - {p}"))
            .unwrap_or_default();

        format!("{}{bridge}{product}", self.name)
    }
}

/// Detect all available serial ports with USB bridge classification.
pub fn detect_ports() -> Vec<DetectedPort> {
    let infos = match NativePortEnumerator::list_ports() {
        Ok(infos) => infos,
        Err(e) => {
            debug!("Failed to enumerate serial ports: {e}");
            return Vec::new();
        },
    };

    infos
        .into_iter()
        .map(|info| {
            let bridge = match (info.vid, info.pid) {
                (Some(vid), Some(pid)) => {
                    let bridge = UsbBridge::from_vid_pid(vid, pid);
                    trace!(
                        "Found USB port: {} (VID: {vid:04X}, PID: {pid:04X}, bridge: {bridge:?})",
                        info.name
                    );
                    bridge
                },
                _ => UsbBridge::Unknown,
            };

            DetectedPort {
                name: info.name,
                bridge,
                vid: info.vid,
                pid: info.pid,
                manufacturer: info.manufacturer,
                product: info.product,
                serial: info.serial_number,
            }
        })
        .collect()
}
