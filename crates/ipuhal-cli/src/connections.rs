// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::error::CliError;
use crate::utils::{parse_operation_mode, parse_streams, print_json, SourceArgs};
use clap::Args as ClapArgs;
use ipuhal::graph::{GraphConfigManager, PipelineConnection};
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

    /// Config mode whose graph is inspected; the first configured one by default
    #[arg(long)]
    config_mode: Option<String>,

    /// Virtual sink whose pipeline is listed
    #[arg(long, default_value = "video0", conflicts_with = "pg")]
    sink: String,

    /// List the program groups whose names contain these instead of a sink
    #[arg(long, value_delimiter = ',')]
    pg: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ConnectionsReport {
    key: String,
    config_mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sink: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_id: Option<i32>,
    connections: Vec<PipelineConnection>,
}

pub fn execute(args: Args, json: bool) -> Result<(), CliError> {
    log::debug!("Executing connections command: {:?}", args);

    let operation_mode = parse_operation_mode(&args.operation_mode)?;
    let wanted_mode = args
        .config_mode
        .as_deref()
        .map(parse_operation_mode)
        .transpose()?;
    let streams = parse_streams(&args.streams)?;
    let platform = args.source.load_platform()?;
    let database = args.source.load_database(&platform)?;

    let mut manager = GraphConfigManager::new(platform, args.source.camera, database);
    manager
        .config_streams(&streams, operation_mode)
        .map_err(CliError::selection)?;

    let mode = match wanted_mode {
        Some(mode) => mode,
        None => manager.config_modes().first().copied().ok_or_else(|| {
            CliError::SelectionFailed("no config mode was configured".to_string())
        })?,
    };
    let gc = manager
        .get_graph_config(mode)
        .ok_or_else(|| CliError::NotFound(format!("no graph config for config mode {}", mode)))?;

    let report = if args.pg.is_empty() {
        let (stream_id, connections) = gc.pipeline_get_internal_connections(&args.sink)?;
        ConnectionsReport {
            key: gc.key().to_string(),
            config_mode: mode.to_string(),
            sink: Some(args.sink.clone()),
            stream_id: Some(stream_id),
            connections,
        }
    } else {
        let connections = gc.pipeline_get_internal_connections_for_pgs(args.pg.as_slice())?;
        ConnectionsReport {
            key: gc.key().to_string(),
            config_mode: mode.to_string(),
            sink: None,
            stream_id: None,
            connections,
        }
    };

    if json {
        print_json(&report)
    } else {
        print_report(&report);
        Ok(())
    }
}

fn print_report(report: &ConnectionsReport) {
    match (&report.sink, report.stream_id) {
        (Some(sink), Some(stream_id)) => println!(
            "Setting {} ({}), sink {} on stream {}",
            report.key, report.config_mode, sink, stream_id
        ),
        _ => println!("Setting {} ({})", report.key, report.config_mode),
    }

    for c in &report.connections {
        let format = &c.format;
        if !format.enabled {
            println!("  {:<20} disabled", c.port);
            continue;
        }
        let conn = &c.connection;
        println!(
            "  {:<20} {}x{} {} bpl {} | {}:{} -> {}:{} {:?}{}{}",
            c.port,
            format.width,
            format.height,
            format.fourcc,
            format.bpl,
            conn.source_stage,
            conn.source_terminal,
            conn.sink_stage,
            conn.sink_terminal,
            conn.connection_type,
            if c.has_edge_port { " edge" } else { "" },
            c.stream
                .map(|id| format!(" stream {}", id))
                .unwrap_or_default()
        );
    }
}
