// Copyright (c) the jpegsegs Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! JPEG marker codes and their names (ITU T.81, table B.1).

use std::fmt;
use std::sync::LazyLock;

/// A JPEG marker, which usually indicates the start of a segment.
///
/// Valid markers on the wire are 0x01..=0xFE. The value 0x00 never appears as a marker in a
/// stream, so it is used as [`Marker::SCAN_DATA`] to tag entropy-coded data returned by the
/// scanner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Marker(pub u8);

impl Marker {
    /// Pseudo-marker for a chunk of scan data.
    pub const SCAN_DATA: Marker = Marker(0x00);
    /// For temporary private use in arithmetic coding.
    pub const TEM: Marker = Marker(0x01);
    /// Start of frame, baseline DCT. SOFn = SOF0 + n, n = 0-15 excluding 4, 8 and 12.
    pub const SOF0: Marker = Marker(0xC0);
    pub const DHT: Marker = Marker(0xC4);
    pub const JPG: Marker = Marker(0xC8);
    pub const DAC: Marker = Marker(0xCC);
    /// Restart with modulo 8 count. RSTn = RST0 + n, n = 0-7.
    pub const RST0: Marker = Marker(0xD0);
    pub const SOI: Marker = Marker(0xD8);
    pub const EOI: Marker = Marker(0xD9);
    pub const SOS: Marker = Marker(0xDA);
    pub const DQT: Marker = Marker(0xDB);
    pub const DNL: Marker = Marker(0xDC);
    pub const DRI: Marker = Marker(0xDD);
    pub const DHP: Marker = Marker(0xDE);
    pub const EXP: Marker = Marker(0xDF);
    /// Application segments. APPn = APP0 + n, n = 0-15.
    pub const APP0: Marker = Marker(0xE0);
    pub const APP1: Marker = Marker(0xE1);
    pub const APP2: Marker = Marker(0xE2);
    /// JPEG extensions. JPGn = JPG0 + n, n = 0-13.
    pub const JPG0: Marker = Marker(0xF0);
    pub const COM: Marker = Marker(0xFE);

    /// Returns the name of the marker, e.g. "SOS", "APP2" or "RES4F".
    pub fn name(self) -> &'static str {
        &MARKER_NAMES[self.0 as usize]
    }

    pub fn is_scan_data(self) -> bool {
        self == Marker::SCAN_DATA
    }

    pub fn is_rst(self) -> bool {
        (0xD0..=0xD7).contains(&self.0)
    }

    pub fn is_app(self) -> bool {
        (0xE0..=0xEF).contains(&self.0)
    }

    pub fn is_jpg_ext(self) -> bool {
        (0xF0..=0xFD).contains(&self.0)
    }

    /// Whether the marker is followed by a length-prefixed data segment.
    pub fn has_payload(self) -> bool {
        !(self.is_scan_data()
            || self.is_rst()
            || self == Marker::EOI
            || self == Marker::TEM)
    }

    /// Whether entropy-coded scan data follows the marker (and its segment, if any).
    pub fn starts_scan_data(self) -> bool {
        self == Marker::SOS || self.is_rst()
    }
}

impl From<u8> for Marker {
    fn from(value: u8) -> Self {
        Marker(value)
    }
}

impl From<Marker> for u8 {
    fn from(marker: Marker) -> Self {
        marker.0
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

static MARKER_NAMES: LazyLock<[String; 256]> = LazyLock::new(|| {
    std::array::from_fn(|code| {
        let code = code as u8;
        match code {
            0x00 => "NUL".to_string(),
            0x01 => "TEM".to_string(),
            0x02..=0xBF => format!("RES{code:02X}"),
            0xC4 => "DHT".to_string(),
            0xC8 => "JPG".to_string(),
            0xCC => "DAC".to_string(),
            0xC0..=0xCF => format!("SOF{}", code - 0xC0),
            0xD0..=0xD7 => format!("RST{}", code - 0xD0),
            0xD8 => "SOI".to_string(),
            0xD9 => "EOI".to_string(),
            0xDA => "SOS".to_string(),
            0xDB => "DQT".to_string(),
            0xDC => "DNL".to_string(),
            0xDD => "DRI".to_string(),
            0xDE => "DHP".to_string(),
            0xDF => "EXP".to_string(),
            0xE0..=0xEF => format!("APP{}", code - 0xE0),
            0xF0..=0xFD => format!("JPG{}", code - 0xF0),
            0xFE => "COM".to_string(),
            0xFF => "FILL".to_string(),
        }
    })
});
