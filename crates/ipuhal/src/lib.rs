// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! IPU camera HAL core for Rust
//!
//! Graph setting selection and per-frame ISP parameter adaptation for Intel
//! IPU style imaging pipelines. Given the output streams a client asks for,
//! the graph layer picks one concrete pipeline topology out of a settings
//! database and exposes it as a read-only [`graph::GraphConfig`]. The
//! [`isp::IspParamAdaptor`] then turns 3A results into per-frame parameter
//! blobs for the program groups of that topology and decodes the statistics
//! the hardware produces back into the shared [`aiq::ResultStore`].
//!
//! # Quick Start
//!
//! ## Selecting a graph
//!
//! ```no_run
//! use std::sync::Arc;
//! use ipuhal::config::PlatformConfig;
//! use ipuhal::graph::{GraphConfigManager, SettingsDatabase};
//! use ipuhal::fourcc::NV12;
//! use ipuhal::stream::{Stream, StreamUsage};
//!
//! let config = Arc::new(PlatformConfig::from_file("platform.json")?);
//! let database = Arc::new(SettingsDatabase::from_file("graph_settings.json")?);
//! let mut manager = GraphConfigManager::new(config, 0, database);
//!
//! let streams = vec![
//!     Stream::new(0, 1920, 1080, NV12, StreamUsage::Preview),
//!     Stream::new(1, 3264, 2448, NV12, StreamUsage::StillCapture),
//! ];
//! manager.config_streams(&streams, ipuhal::config::OperationMode::Auto)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Running the ISP adaptation
//!
//! ```no_run
//! # use ipuhal::isp::{IspParamAdaptor, IspSettings};
//! # fn demo(adaptor: &IspParamAdaptor) -> Result<(), ipuhal::Error> {
//! adaptor.run_isp_adapt(Some(&IspSettings::default()), 42)?;
//! let blob = adaptor.get_ipu_parameter(42, 0);
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - Two-stage graph query with default-setting fallback
//! - Port topology, connection and format resolution over the selected graph
//! - Ring buffer of per-sequence ISP parameter blobs
//! - Statistics decode into a shared, lock-protected result store
//! - Optional Custom AIC plugin loaded at runtime
//!
//! # Support
//!
//! For questions and support:
//! - Repository: <https://github.com/EdgeFirstAI/ipuhal>
//! - Professional support: support@au-zone.com

use ipuhal_sys as ffi;
use std::{error, fmt, io};

/// Legacy status codes, for callers bridging to a C HAL surface.
pub mod status {
    pub const OK: i32 = 0;
    pub const UNKNOWN_ERROR: i32 = i32::MIN;
    pub const NO_MEMORY: i32 = -12;
    pub const INVALID_OPERATION: i32 = -38;
    pub const BAD_VALUE: i32 = -22;
    pub const NAME_NOT_FOUND: i32 = -2;
    pub const NO_INIT: i32 = -19;
    pub const NO_ENTRY: i32 = -2;
}

/// Error type for IPU HAL operations
#[derive(Debug)]
pub enum Error {
    /// An argument or a graph attribute holds an unusable value
    BadValue(String),

    /// The call is not valid in the current state, or the result is ambiguous
    InvalidOperation(String),

    /// A named node, sink or camera does not exist
    NameNotFound(String),

    /// The requested entry is intentionally absent (e.g. a private port)
    NoEntry(String),

    /// The component has not been initialized
    NoInit(String),

    /// A buffer or payload could not be sized or allocated
    NoMemory(String),

    /// Any other failure, including vendor library failures
    Unknown(String),

    /// The Custom AIC plugin could not be bound
    Plugin(ffi::PluginError),

    /// I/O error while reading configuration or debug files
    Io(io::Error),

    /// JSON error while parsing configuration or the settings database
    Json(serde_json::Error),
}

impl Error {
    /// Map to the legacy negative status integer.
    pub fn status(&self) -> i32 {
        match self {
            Error::BadValue(_) => status::BAD_VALUE,
            Error::InvalidOperation(_) => status::INVALID_OPERATION,
            Error::NameNotFound(_) => status::NAME_NOT_FOUND,
            Error::NoEntry(_) => status::NO_ENTRY,
            Error::NoInit(_) => status::NO_INIT,
            Error::NoMemory(_) => status::NO_MEMORY,
            Error::Unknown(_) => status::UNKNOWN_ERROR,
            Error::Plugin(_) => status::BAD_VALUE,
            Error::Io(err) => err
                .raw_os_error()
                .map(|errno| -errno)
                .unwrap_or(status::UNKNOWN_ERROR),
            Error::Json(_) => status::BAD_VALUE,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::BadValue(msg) => write!(f, "bad value: {}", msg),
            Error::InvalidOperation(msg) => write!(f, "invalid operation: {}", msg),
            Error::NameNotFound(msg) => write!(f, "name not found: {}", msg),
            Error::NoEntry(msg) => write!(f, "no entry: {}", msg),
            Error::NoInit(msg) => write!(f, "not initialized: {}", msg),
            Error::NoMemory(msg) => write!(f, "no memory: {}", msg),
            Error::Unknown(msg) => write!(f, "unknown error: {}", msg),
            Error::Plugin(err) => write!(f, "custom AIC plugin error: {}", err),
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::Json(err) => write!(f, "JSON error: {}", err),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Plugin(err) => Some(err),
            Error::Io(err) => Some(err),
            Error::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ffi::PluginError> for Error {
    fn from(err: ffi::PluginError) -> Self {
        Error::Plugin(err)
    }
}

impl From<ffi::libloading::Error> for Error {
    fn from(err: ffi::libloading::Error) -> Self {
        Error::Plugin(ffi::PluginError::Load(err))
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}

/// The fourcc module provides portable fourcc codes and the pixel format table.
pub mod fourcc;

/// Platform and per-camera configuration.
pub mod config;

/// Client stream descriptions and the synthetic query streams.
pub mod stream;

/// Captured buffers handed to the statistics decoder and the ISA encoder.
pub mod buffer;

/// Graph query, selection and the per-mode graph config view.
pub mod graph;

/// 3A result and statistics types plus the shared result store.
pub mod aiq;

/// Per-frame ISP parameter adaptation.
pub mod isp;

/// Parameter generators: built-in vendor path or Custom AIC plugin.
pub mod aic;

/// Capture poll thread.
pub mod capture;
