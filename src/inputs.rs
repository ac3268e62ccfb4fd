//! Mapping between logical input slots and vendor specific PJLink input codes
//!
//! Slots are 1 = HDMI 1, 2 = HDMI 2, 3 = HDBaseT. A code or slot of 0 means
//! "unmapped" and is never sent to the projector.

use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Vendor {
    Sony,
    Epson,
}

impl Vendor {
    /// Default input codes for slots 1..=3.
    const fn default_codes(self) -> [u16; 3] {
        match self {
            Vendor::Sony => [31, 32, 36],
            Vendor::Epson => [32, 33, 56],
        }
    }
}

impl Display for Vendor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Vendor::Sony => write!(f, "SONY"),
            Vendor::Epson => write!(f, "EPSON"),
        }
    }
}

/// Map a logical slot to the device code to send. 0 means unmapped.
pub(crate) fn logical_to_device(logical: u8, vendor: Vendor, overrides: &[u16; 3]) -> u16 {
    let Some(idx) = (logical as usize).checked_sub(1).filter(|idx| *idx < 3) else {
        return 0;
    };
    match overrides[idx] {
        0 => vendor.default_codes()[idx],
        code => code,
    }
}

/// Map a reported device code back to its logical slot. 0 means unknown.
pub(crate) fn device_to_logical(code: u16, vendor: Vendor, overrides: &[u16; 3]) -> u8 {
    (1..=3)
        .find(|&slot| logical_to_device(slot, vendor, overrides) == code)
        .unwrap_or(0)
}
