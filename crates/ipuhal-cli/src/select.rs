// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::error::CliError;
use crate::utils::{parse_operation_mode, parse_streams, print_json, SourceArgs};
use clap::Args as ClapArgs;
use ipuhal::{
    graph::{DolInfo, GraphConfig, GraphConfigManager, SinkDependency},
    stream::Stream,
};
use serde::Serialize;

#[derive(ClapArgs, Debug)]
pub struct Args {
    #[command(flatten)]
    source: SourceArgs,

    /// Operation mode requested by the client (AUTO, NORMAL, HDR, ULL, ...)
    #[arg(short, long, default_value = "AUTO")]
    operation_mode: String,

    /// Client stream as WxH[:FOURCC[:usage]], repeat for each stream
    #[arg(long = "stream", required = true)]
    streams: Vec<String>,
}

#[derive(Debug, Serialize)]
struct SelectReport {
    camera: i32,
    operation_mode: String,
    mc_id: i32,
    streams: Vec<Stream>,
    configs: Vec<ModeReport>,
}

#[derive(Debug, Serialize)]
struct SinkReport {
    stream: i32,
    sink: String,
}

#[derive(Debug, Serialize)]
struct ModeReport {
    config_mode: String,
    key: String,
    fallback: bool,
    mc_id: i32,
    stream_ids: Vec<i32>,
    sinks: Vec<SinkReport>,
    dependencies: Vec<SinkDependency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dol: Option<DolInfo>,
}

impl ModeReport {
    fn new(config_mode: String, gc: &GraphConfig) -> Result<Self, CliError> {
        let stream_ids = gc.graph_get_stream_ids().map_err(CliError::selection)?;
        Ok(ModeReport {
            config_mode,
            key: gc.key().to_string(),
            fallback: gc.is_fallback(),
            mc_id: gc.mc_id(),
            stream_ids,
            sinks: gc
                .sinks()
                .iter()
                .map(|a| SinkReport {
                    stream: a.stream.id,
                    sink: a.sink.clone(),
                })
                .collect(),
            dependencies: gc.sink_dependencies().to_vec(),
            dol: gc.setting().dol.clone(),
        })
    }
}

pub fn execute(args: Args, json: bool) -> Result<(), CliError> {
    log::debug!("Executing select command: {:?}", args);

    let operation_mode = parse_operation_mode(&args.operation_mode)?;
    let streams = parse_streams(&args.streams)?;
    let platform = args.source.load_platform()?;
    let database = args.source.load_database(&platform)?;

    let mut manager = GraphConfigManager::new(platform, args.source.camera, database);
    manager
        .config_streams(&streams, operation_mode)
        .map_err(CliError::selection)?;

    let mut configs = Vec::new();
    for mode in manager.config_modes() {
        let gc = manager.get_graph_config(mode).ok_or_else(|| {
            CliError::SelectionFailed(format!("no graph config for config mode {}", mode))
        })?;
        configs.push(ModeReport::new(mode.to_string(), &gc)?);
    }

    let report = SelectReport {
        camera: args.source.camera,
        operation_mode: operation_mode.to_string(),
        mc_id: manager.selected_mc_id(),
        streams,
        configs,
    };

    if json {
        print_json(&report)
    } else {
        print_report(&report);
        Ok(())
    }
}

fn print_report(report: &SelectReport) {
    println!(
        "Camera {} operation mode {} (mc id {})",
        report.camera, report.operation_mode, report.mc_id
    );
    for stream in &report.streams {
        println!(
            "  stream {}: {}x{} {} {}",
            stream.id, stream.width, stream.height, stream.format, stream.usage
        );
    }

    for config in &report.configs {
        println!();
        println!(
            "Config mode {}: setting {}{}",
            config.config_mode,
            config.key,
            if config.fallback { " (default)" } else { "" }
        );
        println!("  mc id:      {}", config.mc_id);
        let ids: Vec<String> = config.stream_ids.iter().map(|id| id.to_string()).collect();
        println!("  stream ids: {}", ids.join(", "));
        for sink in &config.sinks {
            println!("  sink {} <- stream {}", sink.sink, sink.stream);
        }
        for dep in &config.dependencies {
            println!(
                "  {} depends on stream {} (input terminal {:#x}, peer {})",
                dep.sink, dep.stream_id, dep.stream_input_port_id, dep.peer
            );
        }
        if let Some(dol) = &config.dol {
            println!("  dol:        {} gain {}", dol.mode, dol.gain);
        }
    }
}
