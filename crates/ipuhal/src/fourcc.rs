// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies
#![forbid(unsafe_code)]

//! Fourcc codes as stored in graph settings, and the pixel format table used
//! to derive bits-per-pixel and bytes-per-line for port formats.

use core::{fmt, result::Result};
use std::str::FromStr;

use crate::Error;

/// A four character code. The graph database stores terminal ids and pixel
/// formats as these, packed little-endian into a `u32`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    pub const fn new(code: &[u8; 4]) -> Self {
        FourCC(*code)
    }

    pub const fn to_u32(self) -> u32 {
        (self.0[3] as u32) << 24 | (self.0[2] as u32) << 16 | (self.0[1] as u32) << 8 | self.0[0] as u32
    }
}

impl From<&[u8; 4]> for FourCC {
    fn from(buf: &[u8; 4]) -> FourCC {
        FourCC(*buf)
    }
}

impl From<u32> for FourCC {
    fn from(val: u32) -> FourCC {
        FourCC(val.to_le_bytes())
    }
}

impl From<FourCC> for u32 {
    fn from(val: FourCC) -> Self {
        val.to_u32()
    }
}

impl FromStr for FourCC {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != 4 {
            return Err(Error::BadValue(format!(
                "fourcc '{}' must be exactly four bytes",
                s
            )));
        }
        Ok(FourCC([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match core::str::from_utf8(&self.0) {
            Ok(s) => f.write_str(s),
            Err(_) => {
                for b in self.0 {
                    write!(f, "{}", core::ascii::escape_default(b))?;
                }
                Ok(())
            }
        }
    }
}

impl serde::Serialize for FourCC {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        f.debug_tuple("FourCC")
            .field(&format_args!("{}", self))
            .finish()
    }
}

pub const NV12: FourCC = FourCC::new(b"NV12");
pub const NV21: FourCC = FourCC::new(b"NV21");
pub const YUYV: FourCC = FourCC::new(b"YUYV");
pub const UYVY: FourCC = FourCC::new(b"UYVY");
pub const GRBG: FourCC = FourCC::new(b"GRBG");
pub const BA10: FourCC = FourCC::new(b"BA10");
pub const GR10: FourCC = FourCC::new(b"GR10");
pub const BA12: FourCC = FourCC::new(b"BA12");
pub const BV0G: FourCC = FourCC::new(b"BV0G");
pub const BV0K: FourCC = FourCC::new(b"BV0K");
pub const V420: FourCC = FourCC::new(b"V420");
pub const Y032: FourCC = FourCC::new(b"Y032");
pub const YUV420_12_P64: FourCC = FourCC::new(b"y12p");
pub const P010: FourCC = FourCC::new(b"P010");
pub const P010_LSB: FourCC = FourCC::new(b"P01L");
/// Tiled output forced onto video-record ports.
pub const TILE: FourCC = FourCC::new(b"TILE");

struct FormatInfo {
    fourcc: FourCC,
    short_name: &'static str,
    bpp: i32,
}

const FORMAT_TABLE: &[FormatInfo] = &[
    FormatInfo { fourcc: GRBG, short_name: "GRBG8", bpp: 8 },
    FormatInfo { fourcc: FourCC::new(b"BG10"), short_name: "BGGR10", bpp: 16 },
    FormatInfo { fourcc: FourCC::new(b"GB10"), short_name: "GBRG10", bpp: 16 },
    FormatInfo { fourcc: BA10, short_name: "GRBG10", bpp: 16 },
    FormatInfo { fourcc: FourCC::new(b"RG10"), short_name: "RGGB10", bpp: 16 },
    FormatInfo { fourcc: GR10, short_name: "GRBG10", bpp: 16 },
    FormatInfo { fourcc: BA12, short_name: "GRBG12", bpp: 16 },
    FormatInfo { fourcc: BV0G, short_name: "GRBG10V32", bpp: 16 },
    FormatInfo { fourcc: BV0K, short_name: "GRBG12V32", bpp: 16 },
    FormatInfo { fourcc: NV12, short_name: "NV12", bpp: 12 },
    FormatInfo { fourcc: NV21, short_name: "NV21", bpp: 12 },
    FormatInfo { fourcc: FourCC::new(b"NV16"), short_name: "NV16", bpp: 16 },
    FormatInfo { fourcc: YUYV, short_name: "YUYV", bpp: 16 },
    FormatInfo { fourcc: UYVY, short_name: "UYVY", bpp: 16 },
    FormatInfo { fourcc: FourCC::new(b"YU12"), short_name: "YUV420", bpp: 12 },
    FormatInfo { fourcc: Y032, short_name: "YUYV420V32", bpp: 24 },
    FormatInfo { fourcc: V420, short_name: "YUV420", bpp: 24 },
    FormatInfo { fourcc: YUV420_12_P64, short_name: "YUV420", bpp: 18 },
    FormatInfo { fourcc: P010, short_name: "P010", bpp: 24 },
    FormatInfo { fourcc: P010_LSB, short_name: "P01L", bpp: 24 },
    FormatInfo { fourcc: FourCC::new(b"BGR3"), short_name: "BGR24", bpp: 24 },
    FormatInfo { fourcc: FourCC::new(b"RGBP"), short_name: "RGB565", bpp: 16 },
    FormatInfo { fourcc: FourCC::new(b"JPEG"), short_name: "JPEG", bpp: 0 },
];

fn lookup(fourcc: FourCC) -> Option<&'static FormatInfo> {
    FORMAT_TABLE.iter().find(|info| info.fourcc == fourcc)
}

/// Short format name used in graph settings queries (`"NV12"`, `"GRBG10"`).
/// Unknown codes fall back to the fourcc text itself.
pub fn format_to_string(fourcc: FourCC) -> String {
    match lookup(fourcc) {
        Some(info) => info.short_name.to_string(),
        None => {
            log::warn!("no format table entry for {}", fourcc);
            fourcc.to_string()
        }
    }
}

/// Bits per pixel, 0 when the format is unknown.
pub fn bpp(fourcc: FourCC) -> i32 {
    lookup(fourcc).map(|info| info.bpp).unwrap_or(0)
}

/// Bytes per line for `width` pixels of `fourcc`.
pub fn bpl(fourcc: FourCC, width: i32) -> i32 {
    match fourcc {
        // 42 pixels per 64 byte word on the half-width UV planes
        YUV420_12_P64 => ((f64::from(width) / 2.0) / 42.0).ceil() as i32 * 64 * 2,
        Y032 => width * 6,
        BV0G | V420 | BV0K | BA10 | GR10 | BA12 | P010 | P010_LSB => width * 2,
        NV12 | GRBG => width,
        _ => {
            log::warn!("bpl defaulting to width for format {}", fourcc);
            width
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fourcc_u32_roundtrip() {
        let code = NV12;
        let raw: u32 = code.into();
        assert_eq!(raw, 0x3231_564e);
        assert_eq!(FourCC::from(raw), code);
    }

    #[test]
    fn test_fourcc_parse() {
        assert_eq!("BA10".parse::<FourCC>().unwrap(), BA10);
        assert!("NV1".parse::<FourCC>().is_err());
        assert!("NV122".parse::<FourCC>().is_err());
    }

    #[test]
    fn test_display_non_utf8() {
        let code = FourCC([0xff, b'A', b'B', b'C']);
        assert_eq!(code.to_string(), "\\xffABC");
    }

    #[test]
    fn test_bpl() {
        assert_eq!(bpl(YUV420_12_P64, 1920), 23 * 128);
        assert_eq!(bpl(Y032, 100), 600);
        assert_eq!(bpl(BA10, 1920), 3840);
        assert_eq!(bpl(P010, 64), 128);
        assert_eq!(bpl(NV12, 1920), 1920);
        assert_eq!(bpl(YUYV, 640), 640);
    }

    #[test]
    fn test_bpp_and_names() {
        assert_eq!(bpp(NV12), 12);
        assert_eq!(bpp(BA10), 16);
        assert_eq!(bpp(FourCC::new(b"ZZZZ")), 0);
        assert_eq!(format_to_string(BA10), "GRBG10");
        assert_eq!(format_to_string(FourCC::new(b"ZZZZ")), "ZZZZ");
    }

    #[test]
    fn test_serialize_as_string() {
        assert_eq!(serde_json::to_string(&YUYV).unwrap(), "\"YUYV\"");
    }
}
