// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::error::CliError;
use clap::Args as ClapArgs;
use ipuhal::{
    config::{OperationMode, PlatformConfig},
    fourcc::{FourCC, NV12},
    graph::SettingsDatabase,
    stream::{Stream, StreamUsage},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Platform configuration and settings database shared by the subcommands.
#[derive(ClapArgs, Debug)]
pub struct SourceArgs {
    /// Platform configuration file (JSON)
    #[arg(short, long)]
    pub config: PathBuf,

    /// Graph settings database; defaults to the camera's graph_settings_file
    /// next to the platform configuration
    #[arg(short, long)]
    pub settings: Option<PathBuf>,

    /// Camera id
    #[arg(long, default_value_t = 0)]
    pub camera: i32,
}

impl SourceArgs {
    pub fn load_platform(&self) -> Result<Arc<PlatformConfig>, CliError> {
        Ok(Arc::new(PlatformConfig::from_file(&self.config)?))
    }

    /// Settings database path given on the command line or named by the camera.
    pub fn settings_path(&self, platform: &PlatformConfig) -> Result<PathBuf, CliError> {
        if let Some(path) = &self.settings {
            return Ok(path.clone());
        }
        let camera = platform.camera(self.camera)?;
        if camera.graph_settings_file.is_empty() {
            return Err(CliError::InvalidArgs(format!(
                "camera {} names no graph settings file, pass --settings",
                self.camera
            )));
        }
        let dir = self.config.parent().unwrap_or_else(|| Path::new("."));
        Ok(dir.join(&camera.graph_settings_file))
    }

    pub fn load_database(&self, platform: &PlatformConfig) -> Result<Arc<SettingsDatabase>, CliError> {
        let path = self.settings_path(platform)?;
        log::debug!("Loading graph settings from {}", path.display());
        Ok(Arc::new(SettingsDatabase::from_file(&path)?))
    }
}

/// Parse resolution string in format "WxH" or "W*H"
pub fn parse_resolution(s: &str) -> Result<(u32, u32), CliError> {
    let (width_str, height_str) = s
        .split_once('x')
        .or_else(|| s.split_once('*'))
        .ok_or_else(|| {
            CliError::InvalidArgs(format!(
                "Invalid resolution format (expected WxH or W*H): {}",
                s
            ))
        })?;

    let width = width_str
        .parse::<u32>()
        .map_err(|_| CliError::InvalidArgs(format!("Invalid width in resolution: {}", s)))?;
    let height = height_str
        .parse::<u32>()
        .map_err(|_| CliError::InvalidArgs(format!("Invalid height in resolution: {}", s)))?;

    if width == 0 || height == 0 {
        return Err(CliError::InvalidArgs(format!(
            "Resolution dimensions must be positive: {}",
            s
        )));
    }
    Ok((width, height))
}

/// Parse a stream in format "WxH[:FOURCC[:usage]]"
///
/// The format defaults to NV12 and the usage to preview. Usages are
/// preview, video, still, app and raw.
pub fn parse_stream(id: i32, s: &str) -> Result<Stream, CliError> {
    let mut parts = s.split(':');
    let (width, height) = parse_resolution(parts.next().unwrap_or_default())?;

    let format = match parts.next() {
        Some(code) if !code.is_empty() => code
            .parse::<FourCC>()
            .map_err(|e| CliError::InvalidArgs(format!("Invalid format in stream {}: {}", s, e)))?,
        _ => NV12,
    };
    let usage = match parts.next() {
        Some(name) if !name.is_empty() => name
            .parse::<StreamUsage>()
            .map_err(|e| CliError::InvalidArgs(format!("Invalid usage in stream {}: {}", s, e)))?,
        _ => StreamUsage::Preview,
    };
    if parts.next().is_some() {
        return Err(CliError::InvalidArgs(format!(
            "Too many fields in stream (expected WxH[:FOURCC[:usage]]): {}",
            s
        )));
    }

    Ok(Stream::new(id, width, height, format, usage))
}

/// Parse every `--stream` value; stream ids follow the command line order.
pub fn parse_streams(specs: &[String]) -> Result<Vec<Stream>, CliError> {
    if specs.is_empty() {
        return Err(CliError::InvalidArgs(
            "at least one --stream is required".to_string(),
        ));
    }
    specs
        .iter()
        .enumerate()
        .map(|(id, spec)| parse_stream(id as i32, spec))
        .collect()
}

/// Parse an operation mode name such as AUTO, NORMAL or HDR
pub fn parse_operation_mode(s: &str) -> Result<OperationMode, CliError> {
    s.parse::<OperationMode>()
        .map_err(|e| CliError::InvalidArgs(format!("Invalid operation mode: {}", e)))
}

/// Print a serializable report as pretty JSON
pub fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::General(format!("Failed to serialize output: {}", e)))?;
    println!("{}", text);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ipuhal::fourcc::YUYV;

    #[test]
    fn test_parse_resolution() {
        assert_eq!(parse_resolution("1920x1080").unwrap(), (1920, 1080));
        assert_eq!(parse_resolution("1280*720").unwrap(), (1280, 720));
        assert!(parse_resolution("1920").is_err());
        assert!(parse_resolution("0x1080").is_err());
        assert!(parse_resolution("axb").is_err());
        assert!(parse_resolution("-1x5").is_err());
    }

    #[test]
    fn test_parse_stream() {
        let stream = parse_stream(0, "1920x1080").unwrap();
        assert_eq!((stream.width, stream.height), (1920, 1080));
        assert_eq!(stream.format, NV12);
        assert_eq!(stream.usage, StreamUsage::Preview);

        let stream = parse_stream(3, "3264x2448:YUYV:still").unwrap();
        assert_eq!(stream.id, 3);
        assert_eq!(stream.format, YUYV);
        assert_eq!(stream.usage, StreamUsage::StillCapture);

        let stream = parse_stream(1, "640x480::video").unwrap();
        assert_eq!(stream.format, NV12);
        assert_eq!(stream.usage, StreamUsage::VideoCapture);

        assert!(parse_stream(0, "640x480:NV1").is_err());
        assert!(parse_stream(0, "640x480:NV12:bogus").is_err());
        assert!(parse_stream(0, "640x480:NV12:still:x").is_err());
    }

    #[test]
    fn test_parse_streams_requires_one() {
        assert!(parse_streams(&[]).is_err());
        let streams = parse_streams(&["1920x1080".to_string(), "640x480".to_string()]).unwrap();
        assert_eq!(streams[1].id, 1);
    }

    #[test]
    fn test_parse_operation_mode() {
        assert_eq!(parse_operation_mode("auto").unwrap(), OperationMode::Auto);
        assert_eq!(parse_operation_mode("HDR").unwrap(), OperationMode::Hdr);
        assert!(matches!(
            parse_operation_mode("bogus"),
            Err(CliError::InvalidArgs(_))
        ));
    }
}
