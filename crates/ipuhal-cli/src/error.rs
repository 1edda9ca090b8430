// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use std::fmt;
use std::process::ExitCode;

/// CLI-specific error type with exit code mapping
#[derive(Debug)]
pub enum CliError {
    /// Invalid command-line arguments
    InvalidArgs(String),
    /// Camera, sink or configuration file not found
    NotFound(String),
    /// Custom AIC plugin could not be loaded
    PluginUnavailable(String),
    /// No graph setting could be selected or prepared
    SelectionFailed(String),
    /// General error from the ipuhal library
    General(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::InvalidArgs(msg) => write!(f, "Invalid arguments: {}", msg),
            CliError::NotFound(msg) => write!(f, "Not found: {}", msg),
            CliError::PluginUnavailable(msg) => write!(f, "Plugin unavailable: {}", msg),
            CliError::SelectionFailed(msg) => write!(f, "Graph selection failed: {}", msg),
            CliError::General(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for CliError {}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.code())
    }

    fn code(&self) -> u8 {
        match self {
            CliError::InvalidArgs(_) => 2,
            CliError::NotFound(_) => 3,
            CliError::PluginUnavailable(_) => 4,
            CliError::SelectionFailed(_) => 5,
            CliError::General(_) => 1,
        }
    }

    /// Map a failure of graph selection or preparation.
    ///
    /// A missing camera stays a lookup failure; everything else means no
    /// usable setting exists for the request.
    pub fn selection(err: ipuhal::Error) -> Self {
        match err {
            ipuhal::Error::NameNotFound(_) => CliError::from(err),
            other => CliError::SelectionFailed(other.to_string()),
        }
    }
}

/// Map ipuhal::Error to CliError with appropriate exit codes
impl From<ipuhal::Error> for CliError {
    fn from(err: ipuhal::Error) -> Self {
        use ipuhal::Error;

        match err {
            Error::NameNotFound(msg) => CliError::NotFound(msg),
            Error::NoEntry(msg) => CliError::NotFound(msg),
            Error::Plugin(plugin_err) => CliError::PluginUnavailable(plugin_err.to_string()),

            Error::Io(io_err) => match io_err.kind() {
                std::io::ErrorKind::NotFound => {
                    CliError::NotFound(format!("File not found: {}", io_err))
                }
                std::io::ErrorKind::PermissionDenied => {
                    CliError::NotFound(format!("Permission denied: {}", io_err))
                }
                _ => CliError::General(format!("I/O error: {}", io_err)),
            },

            Error::Json(json_err) => {
                CliError::InvalidArgs(format!("Malformed JSON input: {}", json_err))
            }

            other => CliError::General(other.to_string()),
        }
    }
}

/// Helper function to convert result to exit code
pub fn result_to_exit_code<T>(result: Result<T, CliError>) -> ExitCode {
    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            e.exit_code()
        }
    }
}
