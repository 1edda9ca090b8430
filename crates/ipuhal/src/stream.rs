// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use serde::Serialize;
use std::{collections::BTreeMap, fmt};

use crate::fourcc::FourCC;

/// What the client intends to do with a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamUsage {
    Preview,
    VideoCapture,
    StillCapture,
    App,
    OpaqueRaw,
}

impl fmt::Display for StreamUsage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            StreamUsage::Preview => "preview",
            StreamUsage::VideoCapture => "video",
            StreamUsage::StillCapture => "still",
            StreamUsage::App => "app",
            StreamUsage::OpaqueRaw => "raw",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for StreamUsage {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "preview" => Ok(StreamUsage::Preview),
            "video" => Ok(StreamUsage::VideoCapture),
            "still" => Ok(StreamUsage::StillCapture),
            "app" => Ok(StreamUsage::App),
            "raw" => Ok(StreamUsage::OpaqueRaw),
            _ => Err(crate::Error::BadValue(format!("unknown stream usage '{}'", s))),
        }
    }
}

/// A client output stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stream {
    pub id: i32,
    pub width: u32,
    pub height: u32,
    #[serde(serialize_with = "serialize_fourcc")]
    pub format: FourCC,
    pub usage: StreamUsage,
}

fn serialize_fourcc<S: serde::Serializer>(fourcc: &FourCC, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&fourcc.to_string())
}

impl Stream {
    pub fn new(id: i32, width: u32, height: u32, format: FourCC, usage: StreamUsage) -> Self {
        Stream {
            id,
            width,
            height,
            format,
            usage,
        }
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Use case a stream is queried for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamUseCase {
    Preview,
    Video,
    StillCapture,
    Raw,
    Zsl,
    Multi,
    Input,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    pub width: u32,
    pub height: u32,
    pub format: FourCC,
}

/// Synthetic stream used only as a key when querying graph settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HalStream {
    pub id: i32,
    pub use_case: StreamUseCase,
    pub config: StreamConfig,
}

impl HalStream {
    pub fn new(stream: &Stream, use_case: StreamUseCase) -> Self {
        HalStream {
            id: stream.id,
            use_case,
            config: StreamConfig {
                width: stream.width,
                height: stream.height,
                format: stream.format,
            },
        }
    }

    pub fn width(&self) -> u32 {
        self.config.width
    }

    pub fn height(&self) -> u32 {
        self.config.height
    }

    pub fn format(&self) -> FourCC {
        self.config.format
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Resolution { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 && self.height == 0
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// HAL stream id to the virtual sink serving it.
pub type StreamToSinkMap = BTreeMap<i32, String>;

/// Sort streams by descending area. Equal areas keep their input order.
pub fn sort_by_descending_area(streams: &[Stream]) -> Vec<Stream> {
    let mut sorted = streams.to_vec();
    sorted.sort_by(|a, b| b.area().cmp(&a.area()));
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fourcc::NV12;

    #[test]
    fn test_sort_is_stable() {
        let streams = vec![
            Stream::new(0, 640, 480, NV12, StreamUsage::Preview),
            Stream::new(1, 1920, 1080, NV12, StreamUsage::VideoCapture),
            Stream::new(2, 480, 640, NV12, StreamUsage::StillCapture),
            Stream::new(3, 3264, 2448, NV12, StreamUsage::StillCapture),
        ];
        let ids: Vec<i32> = sort_by_descending_area(&streams)
            .iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec![3, 1, 0, 2]);
    }

    #[test]
    fn test_usage_parse() {
        assert_eq!("Video".parse::<StreamUsage>().unwrap(), StreamUsage::VideoCapture);
        assert!("bogus".parse::<StreamUsage>().is_err());
    }
}
