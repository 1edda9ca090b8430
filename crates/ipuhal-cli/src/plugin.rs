// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::error::CliError;
use crate::utils::print_json;
use clap::Args as ClapArgs;
use ipuhal::{
    aic::{AicState, CustomizedAic, ParameterGenerator},
    config::PlatformConfig,
};
use serde::Serialize;
use std::path::PathBuf;

#[derive(ClapArgs, Debug)]
pub struct Args {
    /// Platform configuration file (JSON)
    #[arg(short, long)]
    config: PathBuf,

    /// Camera id
    #[arg(long, default_value_t = 0)]
    camera: i32,

    /// Fail when no plugin gets loaded
    #[arg(long)]
    require: bool,
}

#[derive(Debug, Serialize)]
struct PluginReport {
    camera: i32,
    generator: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    library: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<i32>,
}

fn state_name(state: AicState) -> &'static str {
    match state {
        AicState::NotInit => "not-init",
        AicState::Init => "init",
    }
}

pub fn execute(args: Args, json: bool) -> Result<(), CliError> {
    log::debug!("Executing plugin command: {:?}", args);

    let platform = PlatformConfig::from_file(&args.config)?;
    let camera = platform.camera(args.camera)?;

    let report = if camera.custom_aic_library_name.is_empty() {
        PluginReport {
            camera: args.camera,
            generator: "builtin",
            library: None,
            path: None,
            state: state_name(AicState::NotInit),
            version: None,
        }
    } else {
        let mut aic = CustomizedAic::new(args.camera, &camera.custom_aic_library_name);
        let path = aic.library_path();
        aic.init()
            .map_err(|e| CliError::PluginUnavailable(format!("{}: {}", path.display(), e)))?;

        let report = PluginReport {
            camera: args.camera,
            generator: "plugin",
            library: Some(aic.library_name().to_string()),
            path: Some(path.display().to_string()),
            state: state_name(aic.state()),
            version: aic.version(),
        };
        aic.deinit()?;
        report
    };

    if args.require && report.version.is_none() {
        return Err(CliError::PluginUnavailable(format!(
            "no Custom AIC plugin loaded for camera {}",
            args.camera
        )));
    }

    if json {
        print_json(&report)
    } else {
        println!("Camera {}: {} generator", report.camera, report.generator);
        if let (Some(library), Some(path)) = (&report.library, &report.path) {
            println!("  library: {} ({})", library, path);
        }
        println!("  state:   {}", report.state);
        if let Some(version) = report.version {
            println!("  version: {}", version);
        }
        Ok(())
    }
}
