// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use serde::Serialize;
use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet},
    sync::Arc,
};

use super::{
    kernel::{uuid, ProgramGroup, ResolutionInfo},
    model::{GraphSetting, Node, NodeId, NodeKind},
    selector::SinkAssignment,
};
use crate::{
    fourcc::{self, FourCC, TILE},
    stream::{HalStream, Resolution, StreamUseCase},
    Error,
};

pub const STILL_STREAM_ID: i32 = 60000;
pub const VIDEO_STREAM_ID: i32 = 60001;
pub const PSYS_ISA_STREAM_ID: i32 = 60002;

pub const PORT_DIRECTION_INPUT: i32 = 0;
pub const PORT_DIRECTION_OUTPUT: i32 = 1;

/// Pixel format forced on ports feeding a video record stream.
pub const VIDEO_RECORDING_FORMAT: FourCC = TILE;

const SENSOR_PORT_NAME: &str = "sensor:port_0";
const TPG_PORT_NAME: &str = "tpg:port_0";
const CSI_BE_OUTPUTS: [&str; 3] = ["csi_be:output", "csi_be_soc:output", "csi_be_dol:output"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    #[default]
    None,
    Sensor,
    Tpg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionType {
    Push,
    #[default]
    Pull,
}

/// Resolved format of one port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PortFormatSettings {
    pub enabled: bool,
    pub terminal_id: u32,
    pub width: i32,
    pub height: i32,
    #[serde(serialize_with = "serialize_fourcc")]
    pub fourcc: FourCC,
    pub bpl: i32,
    pub bpp: i32,
}

fn serialize_fourcc<S: serde::Serializer>(fourcc: &FourCC, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&fourcc.to_string())
}

/// Stage and terminal ids on both ends of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ConnectionConfig {
    pub source_stage: u32,
    pub source_terminal: u32,
    pub source_iteration: i32,
    pub sink_stage: u32,
    pub sink_terminal: u32,
    pub sink_iteration: i32,
    pub connection_type: ConnectionType,
}

/// One port of a pipeline with its connection.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct PipelineConnection {
    pub port: String,
    pub format: PortFormatSettings,
    pub connection: ConnectionConfig,
    pub has_edge_port: bool,
    /// Client stream id served by an output edge port.
    pub stream: Option<i32>,
}

/// Routing for one active virtual sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SinkDependency {
    pub sink: String,
    pub stream_id: i32,
    /// Terminal id of the stream's input port.
    pub stream_input_port_id: u32,
    /// Full name of the port feeding the stream input.
    pub peer: String,
    #[serde(skip)]
    peer_node: NodeId,
}

/// Read-only view over the graph setting selected for one config mode.
///
/// Built once by [`GraphConfig::prepare`]. The setting itself is shared and
/// never modified; the video record format override lives in a per-view
/// overlay consulted when port formats are resolved.
#[derive(Debug, Clone)]
pub struct GraphConfig {
    setting: Arc<GraphSetting>,
    fallback: bool,
    source_type: SourceType,
    source_port_name: &'static str,
    sinks: Vec<SinkAssignment>,
    sink_peer_ports: Vec<(NodeId, NodeId)>,
    format_overlay: HashMap<NodeId, FourCC>,
    sink_dependencies: Vec<SinkDependency>,
    isa_output_port_stream_ids: BTreeMap<String, i32>,
    isa_active_destinations: BTreeSet<u32>,
    active_stream_ids: BTreeSet<i32>,
    stream_tuning_modes: BTreeMap<i32, i32>,
    csi_output: Resolution,
}

impl GraphConfig {
    /// Analyze `setting` for the streams bound in `sinks`.
    pub fn prepare(
        setting: Arc<GraphSetting>,
        sinks: Vec<SinkAssignment>,
        fallback: bool,
    ) -> Result<Self, Error> {
        let mut gc = GraphConfig {
            setting,
            fallback,
            source_type: SourceType::None,
            source_port_name: "",
            sinks,
            sink_peer_ports: Vec::new(),
            format_overlay: HashMap::new(),
            sink_dependencies: Vec::new(),
            isa_output_port_stream_ids: BTreeMap::new(),
            isa_active_destinations: BTreeSet::new(),
            active_stream_ids: BTreeSet::new(),
            stream_tuning_modes: BTreeMap::new(),
            csi_output: Resolution::default(),
        };

        gc.analyze_source_type()?;
        gc.get_active_output_ports()?;
        gc.set_port_formats();
        gc.calculate_sink_dependencies();
        gc.store_tuning_modes();
        if let Err(err) = gc.analyze_csi_output() {
            log::error!("{}", err);
        }

        log::debug!(
            "graph config for setting {} prepared, {} sink(s)",
            gc.setting.key,
            gc.sinks.len()
        );
        Ok(gc)
    }

    fn node(&self, id: NodeId) -> &Node {
        self.setting.node(id)
    }

    fn analyze_source_type(&mut self) -> Result<(), Error> {
        let has_sensor = self.setting.nodes_of_kind(&NodeKind::Sensor).next().is_some();
        let has_tpg = self.setting.nodes_of_kind(&NodeKind::Tpg).next().is_some();

        if has_sensor == has_tpg {
            self.source_type = SourceType::None;
            self.source_port_name = "";
            log::error!("graph must hold exactly one of sensor or TPG");
            return Err(Error::Unknown(
                "both or neither of sensor and TPG in graph".to_string(),
            ));
        }
        if has_sensor {
            self.source_type = SourceType::Sensor;
            self.source_port_name = SENSOR_PORT_NAME;
        } else {
            self.source_type = SourceType::Tpg;
            self.source_port_name = TPG_PORT_NAME;
        }
        Ok(())
    }

    fn sink_by_name(&self, name: &str) -> Option<NodeId> {
        self.setting
            .nodes_of_kind(&NodeKind::Sink)
            .find(|id| self.node(*id).name == name)
    }

    fn get_active_output_ports(&mut self) -> Result<(), Error> {
        let mut sink_peer_ports = Vec::with_capacity(self.sinks.len());
        for assignment in &self.sinks {
            let sink = self.sink_by_name(&assignment.sink).ok_or_else(|| {
                log::error!("sink {} is not in the graph", assignment.sink);
                Error::BadValue(format!("sink {} not found", assignment.sink))
            })?;
            let stream_id = self.node(sink).attr_i32("stream_id").ok_or_else(|| {
                Error::BadValue(format!("sink {} has no stream id", assignment.sink))
            })?;
            log::trace!("sink {} stream id {}", assignment.sink, stream_id);

            let output_port = self.port_get_peer(sink).map_err(|err| {
                log::error!("no output port for sink {}: {}", assignment.sink, err);
                Error::Unknown(format!("no output port for sink {}", assignment.sink))
            })?;
            sink_peer_ports.push((sink, output_port));
        }
        self.sink_peer_ports = sink_peer_ports;
        Ok(())
    }

    fn client_stream_for_sink(&self, sink_name: &str) -> Option<&HalStream> {
        self.sinks
            .iter()
            .find(|a| a.sink == sink_name)
            .map(|a| &a.stream)
    }

    fn is_video_record_port(&self, sink: NodeId) -> bool {
        match self.client_stream_for_sink(&self.node(sink).name) {
            Some(stream) => stream.use_case == StreamUseCase::Video,
            None => {
                log::error!("no client stream for sink {}", self.node(sink).name);
                false
            }
        }
    }

    fn set_port_formats(&mut self) {
        let overrides: Vec<NodeId> = self
            .sink_peer_ports
            .iter()
            .filter(|(sink, _)| self.is_video_record_port(*sink))
            .map(|(_, peer)| *peer)
            .collect();
        for peer in overrides {
            log::debug!(
                "{} serves video record, format {}",
                self.setting.full_name(peer),
                VIDEO_RECORDING_FORMAT
            );
            self.format_overlay.insert(peer, VIDEO_RECORDING_FORMAT);
        }
    }

    /// Input port through which `stream_id` is entered from another stream.
    fn stream_input_port(&self, stream_id: i32) -> Option<NodeId> {
        self.setting.nodes_of_kind(&NodeKind::Port).find(|port| {
            if self.port_get_direction(*port) != PORT_DIRECTION_INPUT
                || self.port_get_stream_id(*port) != stream_id
            {
                return false;
            }
            match self.port_get_peer(*port) {
                Ok(peer) => self.port_is_virtual(peer) || self.port_get_stream_id(peer) != stream_id,
                Err(_) => false,
            }
        })
    }

    fn calculate_sink_dependencies(&mut self) {
        let mut dependencies = Vec::new();
        let mut isa_output_ports = BTreeMap::new();

        for (sink, _) in &self.sink_peer_ports {
            let sink_name = self.node(*sink).name.clone();
            let stream_id = self.node(*sink).attr_i32("stream_id").unwrap_or(-1);

            let Some(input_port) = self.stream_input_port(stream_id) else {
                log::error!(
                    "no input port for stream {} of sink {}",
                    stream_id,
                    sink_name
                );
                continue;
            };
            let stream_input_port_id = match self.port_fourcc_info(input_port) {
                Ok((_, terminal)) => terminal,
                Err(err) => {
                    log::error!("stream {} input port: {}", stream_id, err);
                    continue;
                }
            };
            let peer = match self.port_get_peer(input_port) {
                Ok(peer) => peer,
                Err(err) => {
                    log::error!(
                        "no peer for {}: {}",
                        self.setting.full_name(input_port),
                        err
                    );
                    continue;
                }
            };

            log::trace!("sink {} depends on stream {}", sink_name, stream_id);
            let peer_name = self.setting.full_name(peer);
            dependencies.push(SinkDependency {
                sink: sink_name,
                stream_id,
                stream_input_port_id,
                peer: peer_name.clone(),
                peer_node: peer,
            });

            let peer_stream_id = self.port_get_stream_id(peer);
            if peer_stream_id != -1 {
                isa_output_ports.entry(peer_name).or_insert(peer_stream_id);
            }
        }
        self.sink_dependencies = dependencies;
        self.isa_output_port_stream_ids = isa_output_ports;
    }

    fn store_tuning_modes(&mut self) {
        let mut tuning_modes = BTreeMap::new();
        for pg in self.setting.nodes_of_kind(&NodeKind::ProgramGroup) {
            let node = self.node(pg);
            let Some(stream_id) = node.attr_i32("stream_id") else {
                log::warn!("no stream id for program group {}", node.name);
                continue;
            };
            let tuning_mode = node.attr_i32("tuning_mode").unwrap_or_else(|| {
                log::warn!("no tuning mode for program group {}, using 0", node.name);
                0
            });
            tuning_modes.insert(stream_id, tuning_mode);
        }
        self.stream_tuning_modes = tuning_modes;
    }

    fn analyze_csi_output(&mut self) -> Result<(), Error> {
        for path in CSI_BE_OUTPUTS {
            if let Some(id) = self.setting.descendant_by_string(path) {
                let node = self.node(id);
                self.csi_output = Resolution::new(
                    node.attr_u32("width").unwrap_or(0),
                    node.attr_u32("height").unwrap_or(0),
                );
                return Ok(());
            }
        }
        Err(Error::Unknown("no CSI backend output in graph".to_string()))
    }

    /// Tuning mode of the program groups of `stream_id`, 0 when unknown.
    pub fn tuning_mode(&self, stream_id: i32) -> i32 {
        match self.stream_tuning_modes.get(&stream_id) {
            Some(mode) => *mode,
            None => {
                log::warn!("no tuning mode for stream id {}", stream_id);
                0
            }
        }
    }

    /// Mark the ISA destinations feeding the named sinks active.
    pub fn set_active_sinks<S: AsRef<str>>(&mut self, sinks: &[S]) {
        self.isa_active_destinations.clear();
        for sink in sinks {
            for dependency in &self.sink_dependencies {
                if dependency.sink == sink.as_ref() {
                    self.isa_active_destinations
                        .insert(dependency.stream_input_port_id);
                }
            }
        }
    }

    /// Mark the streams of the named sinks, and the streams feeding them, active.
    pub fn set_active_stream_id<S: AsRef<str>>(&mut self, sinks: &[S]) {
        self.active_stream_ids.clear();
        let mut active = BTreeSet::new();
        for sink in sinks {
            for dependency in &self.sink_dependencies {
                if dependency.sink != sink.as_ref() {
                    continue;
                }
                active.insert(dependency.stream_id);
                let peer_stream_id = self.port_get_stream_id(dependency.peer_node);
                if peer_stream_id == -1 {
                    log::error!("no stream id for peer {}", dependency.peer);
                    continue;
                }
                active.insert(peer_stream_id);
            }
        }
        self.active_stream_ids = active;
    }

    pub fn isa_active_destinations(&self) -> &BTreeSet<u32> {
        &self.isa_active_destinations
    }

    pub fn active_stream_ids(&self) -> &BTreeSet<i32> {
        &self.active_stream_ids
    }

    /// Kernels of every program group tagged with `stream_id`.
    ///
    /// Built fresh on each call from the graph nodes; the returned value is
    /// owned by the caller and may be modified freely.
    pub fn get_program_group(&self, stream_id: i32) -> ProgramGroup {
        let pgs: Vec<NodeId> = self
            .setting
            .nodes_of_kind(&NodeKind::ProgramGroup)
            .filter(|pg| self.node(*pg).attr_i32("stream_id") == Some(stream_id))
            .collect();
        let group = ProgramGroup::from_nodes(&self.setting, &pgs);
        for kernel in &group.kernels {
            log::trace!(
                "stream {} kernel {} enable {} stream {}",
                stream_id,
                kernel.uuid,
                kernel.enable,
                kernel.stream_id
            );
        }
        group
    }

    pub fn get_program_group_by_name(&self, pg_name: &str) -> Result<ProgramGroup, Error> {
        let pg = self
            .setting
            .nodes_of_kind(&NodeKind::ProgramGroup)
            .find(|pg| self.node(*pg).name == pg_name)
            .ok_or_else(|| Error::Unknown(format!("no program group named {}", pg_name)))?;
        Ok(ProgramGroup::from_nodes(&self.setting, &[pg]))
    }

    pub fn get_kernel_resolution_info(&self, stream_id: i32, kernel: u32) -> Option<ResolutionInfo> {
        self.get_program_group(stream_id)
            .kernels
            .iter()
            .find(|k| k.stream_id == stream_id && k.uuid == kernel)
            .and_then(|k| k.resolution_info)
    }

    pub fn is_kernel_in_stream(&self, stream_id: i32, kernel: u32) -> bool {
        self.get_program_group(stream_id).find(kernel).is_some()
    }

    /// GDC kernel in use and its input resolution.
    ///
    /// Each stream is searched for the GDC variants in priority order; the
    /// search stops at the video stream once it holds one.
    pub fn get_gdc_kernel_setting(&self) -> Result<(u32, Resolution), Error> {
        let stream_ids = self.graph_get_stream_ids().map_err(|err| {
            log::warn!("no program group stream ids: {}", err);
            err
        })?;

        let mut kernel_id = uuid::GDC3;
        let mut gdc_stream_id = VIDEO_STREAM_ID;
        for stream_id in stream_ids {
            let group = self.get_program_group(stream_id);
            if let Some(found) = uuid::GDC.iter().find(|gdc| group.find(**gdc).is_some()) {
                log::debug!("found GDC kernel {} in stream {}", found, stream_id);
                kernel_id = *found;
                gdc_stream_id = stream_id;
                if stream_id == VIDEO_STREAM_ID {
                    break;
                }
            }
        }

        match self.get_kernel_resolution_info(gdc_stream_id, kernel_id) {
            Some(info) => Ok((kernel_id, Resolution::new(info.input_width, info.input_height))),
            None => {
                log::warn!("no GDC resolution info");
                Err(Error::Unknown("no GDC resolution info".to_string()))
            }
        }
    }

    /// Program group id holding `kernel` within `stream_id`.
    pub fn get_pg_id_for_kernel(&self, stream_id: i32, kernel: u32) -> Result<i32, Error> {
        for pg in self.stream_get_program_groups(stream_id)? {
            let holds_kernel = self.setting.descendants(pg).into_iter().any(|id| {
                let node = self.node(id);
                node.kind == NodeKind::Kernel && node.attr_u32("uuid") == Some(kernel)
            });
            if !holds_kernel {
                continue;
            }
            return self.node(pg).attr_i32("pg_id").ok_or_else(|| {
                log::error!("no pg id for kernel {}", kernel);
                Error::BadValue(format!("program group {} has no pg id", self.node(pg).name))
            });
        }
        log::trace!("kernel {} is not in stream {}", kernel, stream_id);
        Err(Error::BadValue(format!(
            "kernel {} not in stream {}",
            kernel, stream_id
        )))
    }

    fn program_group_by_name(&self, pg_name: &str) -> Option<NodeId> {
        self.setting
            .nodes_of_kind(&NodeKind::ProgramGroup)
            .find(|pg| self.node(*pg).name == pg_name)
    }

    /// Stream id of the named program group, or -1.
    pub fn get_stream_id_by_pg_name(&self, pg_name: &str) -> i32 {
        self.program_group_by_name(pg_name)
            .and_then(|pg| self.node(pg).attr_i32("stream_id"))
            .unwrap_or_else(|| {
                log::error!("no stream id for program group {}", pg_name);
                -1
            })
    }

    /// Program group id of the named program group, or -1.
    pub fn get_pg_id_by_pg_name(&self, pg_name: &str) -> i32 {
        self.program_group_by_name(pg_name)
            .and_then(|pg| self.node(pg).attr_i32("pg_id"))
            .unwrap_or_else(|| {
                log::error!("no pg id for program group {}", pg_name);
                -1
            })
    }

    pub fn get_pg_names(&self) -> Vec<String> {
        self.setting
            .nodes_of_kind(&NodeKind::ProgramGroup)
            .map(|pg| self.node(pg).name.clone())
            .collect()
    }

    /// Program groups whose name contains any of `pg_names`.
    fn get_program_groups_by_name<S: AsRef<str>>(&self, pg_names: &[S]) -> Result<Vec<NodeId>, Error> {
        let all: Vec<NodeId> = self.setting.nodes_of_kind(&NodeKind::ProgramGroup).collect();
        if all.is_empty() {
            return Err(Error::Unknown("graph has no program groups".to_string()));
        }
        let mut found = Vec::new();
        for pg in all {
            let name = &self.node(pg).name;
            for wanted in pg_names {
                if name.contains(wanted.as_ref()) {
                    found.push(pg);
                }
            }
        }
        if found.is_empty() {
            return Err(Error::Unknown("no program group matches".to_string()));
        }
        Ok(found)
    }

    /// Distinct program group stream ids in graph order.
    pub fn graph_get_stream_ids(&self) -> Result<Vec<i32>, Error> {
        let mut ids = Vec::new();
        for pg in self.setting.nodes_of_kind(&NodeKind::ProgramGroup) {
            if let Some(id) = self.node(pg).attr_i32("stream_id") {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        if ids.is_empty() {
            log::error!("graph {} has no stream ids", self.setting.key);
            return Err(Error::Unknown("no stream ids in graph".to_string()));
        }
        Ok(ids)
    }

    pub fn has_stream_in_graph(&self, stream_id: i32) -> bool {
        self.graph_get_stream_ids()
            .map(|ids| ids.contains(&stream_id))
            .unwrap_or(false)
    }

    pub fn stream_get_program_groups(&self, stream_id: i32) -> Result<Vec<NodeId>, Error> {
        let all: Vec<NodeId> = self.setting.nodes_of_kind(&NodeKind::ProgramGroup).collect();
        if all.is_empty() {
            log::error!("no program groups for stream id {}", stream_id);
            return Err(Error::Unknown("graph has no program groups".to_string()));
        }
        Ok(all
            .into_iter()
            .filter(|pg| self.node(*pg).attr_i32("stream_id") == Some(stream_id))
            .collect())
    }

    /// Node connected to `port`.
    pub fn port_get_peer(&self, port: NodeId) -> Result<NodeId, Error> {
        let node = self.node(port);
        if node.attr_flag("enabled") == Some(false) {
            log::debug!("{} is disabled", self.setting.full_name(port));
            return Err(Error::InvalidOperation(format!(
                "port {} is disabled",
                self.setting.full_name(port)
            )));
        }
        if node.attr_flag("private") == Some(true) {
            return Err(Error::NoEntry(format!(
                "port {} is private",
                self.setting.full_name(port)
            )));
        }
        let peer_name = node.attr_string("peer").ok_or_else(|| {
            log::error!("{} has no peer attribute", self.setting.full_name(port));
            Error::BadValue(format!("port {} has no peer", self.setting.full_name(port)))
        })?;
        self.setting.descendant_by_string(&peer_name).ok_or_else(|| {
            log::error!("peer {} not found", peer_name);
            Error::BadValue(format!("peer {} not found", peer_name))
        })
    }

    /// Stage id of the owning node and terminal id of `port`.
    fn port_fourcc_info(&self, port: NodeId) -> Result<(u32, u32), Error> {
        let node = self.node(port);
        let terminal = node
            .attr_string("fourcc")
            .and_then(|code| code.parse::<FourCC>().ok())
            .ok_or_else(|| {
                Error::BadValue(format!("port {} has no fourcc", self.setting.full_name(port)))
            })?;
        let stage = self
            .setting
            .parent(port)
            .and_then(|parent| self.node(parent).attr_string("fourcc"))
            .and_then(|code| code.parse::<FourCC>().ok())
            .map(FourCC::to_u32)
            .unwrap_or(0);
        Ok((stage, terminal.to_u32()))
    }

    /// Connection of `port` and its peer, when it has one.
    pub fn port_get_connection(
        &self,
        port: NodeId,
    ) -> Result<(ConnectionConfig, Option<NodeId>), Error> {
        let peer = match self.port_get_peer(port) {
            Ok(peer) => Some(peer),
            Err(Error::NoEntry(_)) => None,
            Err(err) => {
                log::error!(
                    "no connection for port {}: {}",
                    self.setting.full_name(port),
                    err
                );
                return Err(err);
            }
        };

        let direction = self.node(port).attr_i32("direction").ok_or_else(|| {
            Error::BadValue(format!(
                "port {} has no direction",
                self.setting.full_name(port)
            ))
        })?;

        let mut connection = ConnectionConfig {
            connection_type: ConnectionType::Pull,
            ..Default::default()
        };
        let (own_stage, own_terminal) = self.port_fourcc_info(port)?;
        let (peer_stage, peer_terminal) = match peer {
            Some(peer) if !self.port_is_virtual(peer) => self.port_fourcc_info(peer)?,
            _ => (0, 0),
        };

        if direction == PORT_DIRECTION_INPUT {
            connection.sink_stage = own_stage;
            connection.sink_terminal = own_terminal;
            connection.source_stage = peer_stage;
            connection.source_terminal = peer_terminal;
        } else {
            connection.source_stage = own_stage;
            connection.source_terminal = own_terminal;
            connection.sink_stage = peer_stage;
            connection.sink_terminal = peer_terminal;
        }
        Ok((connection, peer))
    }

    fn node_format(&self, id: NodeId) -> Option<FourCC> {
        if let Some(format) = self.format_overlay.get(&id) {
            return Some(*format);
        }
        let text = self.node(id).attr_string("format")?;
        let bytes = text.as_bytes();
        if bytes.len() < 4 {
            return None;
        }
        Some(FourCC([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Format of `port`, taken from its peer when the port carries none.
    pub fn port_get_format(&self, port: NodeId) -> Result<PortFormatSettings, Error> {
        let mut format = PortFormatSettings {
            enabled: self.node(port).attr_flag("enabled").unwrap_or(true),
            ..Default::default()
        };
        let (_, terminal) = self.port_fourcc_info(port).map_err(|_| {
            Error::InvalidOperation(format!(
                "port {} has no terminal id",
                self.setting.full_name(port)
            ))
        })?;
        format.terminal_id = terminal;

        if !format.enabled {
            return Ok(format);
        }

        let mut source = port;
        format.width = match self.node(port).attr_i32("width") {
            Some(width) => width,
            None => {
                source = self.port_get_peer(port).map_err(|_| {
                    log::error!("no peer for {}, fix the graph", self.setting.full_name(port));
                    Error::BadValue(format!(
                        "port {} has no format and no peer",
                        self.setting.full_name(port)
                    ))
                })?;
                self.node(source).attr_i32("width").ok_or_else(|| {
                    Error::BadValue(format!(
                        "no width for {} from peer",
                        self.setting.full_name(port)
                    ))
                })?
            }
        };
        format.height = self.node(source).attr_i32("height").ok_or_else(|| {
            Error::BadValue(format!("no height for {}", self.setting.full_name(port)))
        })?;
        format.fourcc = self.node_format(source).ok_or_else(|| {
            Error::BadValue(format!("no format for {}", self.setting.full_name(port)))
        })?;

        format.bpl = fourcc::bpl(format.fourcc, format.width);
        if let Some(bpl) = self.node(source).attr_i32("bytes_per_line") {
            log::trace!("bpl {} overridden by settings to {}", format.bpl, bpl);
            format.bpl = bpl;
        }
        format.bpp = fourcc::bpp(format.fourcc);
        Ok(format)
    }

    pub fn port_get_direction(&self, port: NodeId) -> i32 {
        self.node(port).attr_i32("direction").unwrap_or_else(|| {
            log::error!(
                "no direction for {}, using input",
                self.setting.full_name(port)
            );
            PORT_DIRECTION_INPUT
        })
    }

    /// `"pg:port"`.
    pub fn port_get_full_name(&self, port: NodeId) -> Result<String, Error> {
        if self.setting.parent(port).is_none() {
            return Err(Error::BadValue(format!(
                "port {} has no ancestor",
                self.node(port).name
            )));
        }
        Ok(self.setting.full_name(port))
    }

    pub fn port_is_virtual(&self, port: NodeId) -> bool {
        self.node(port).kind == NodeKind::Sink
    }

    /// Client stream bound to a virtual sink.
    pub fn port_get_client_stream(&self, port: NodeId) -> Result<Option<HalStream>, Error> {
        if !self.port_is_virtual(port) {
            return Err(Error::InvalidOperation(format!(
                "{} is not a virtual sink",
                self.setting.full_name(port)
            )));
        }
        Ok(self.client_stream_for_sink(&self.node(port).name).copied())
    }

    /// Stream id of the node owning `port`, or -1.
    pub fn port_get_stream_id(&self, port: NodeId) -> i32 {
        self.setting
            .parent(port)
            .and_then(|parent| self.node(parent).attr_i32("stream_id"))
            .unwrap_or(-1)
    }

    /// Whether `port` sits on the boundary of its pipeline.
    pub fn is_pipe_edge_port(&self, port: NodeId) -> bool {
        let direction = self.port_get_direction(port);
        let peer = match self.port_get_peer(port) {
            Ok(peer) => peer,
            Err(Error::InvalidOperation(_)) => return true,
            Err(_) => return false,
        };

        if self.port_get_stream_id(port) < 0 {
            return false;
        }

        let mut peer_stream_id = -1;
        let mut peer_type = String::new();
        if !self.port_is_virtual(peer) {
            let Some(ancestor) = self.setting.parent(peer) else {
                log::error!("peer {} has no ancestor", self.node(peer).name);
                return false;
            };
            let Some(id) = self.node(ancestor).attr_i32("stream_id") else {
                log::error!("peer program group {} has no stream id", self.node(ancestor).name);
                return false;
            };
            peer_stream_id = id;
            peer_type = self.node(ancestor).kind.as_str().to_string();
        }

        if direction == PORT_DIRECTION_INPUT {
            peer_type == "hw" || peer_stream_id == 0 || peer_stream_id == -1
        } else {
            self.port_is_virtual(peer) || peer_stream_id == 0 || peer_stream_id == -1
        }
    }

    fn collect_connections(
        &self,
        program_groups: &[NodeId],
        resolve_streams: bool,
    ) -> Result<Vec<PipelineConnection>, Error> {
        let mut connections = Vec::new();
        let mut connected: HashSet<NodeId> = HashSet::new();

        for pg in program_groups {
            for port in self.setting.descendants(*pg) {
                let node = self.node(port);
                if node.kind != NodeKind::Port {
                    continue;
                }
                if node.attr_flag("private") == Some(true) || connected.contains(&port) {
                    continue;
                }
                if let Some(content) = node.attr_string("content_type") {
                    if content != "pixel_data" {
                        log::trace!("{} skipped, content {}", node.name, content);
                        continue;
                    }
                }

                let name = self.setting.full_name(port);
                let format = self.port_get_format(port).map_err(|err| {
                    log::error!("format of {}: {}", name, err);
                    Error::BadValue(format!("no format for port {}", name))
                })?;
                if !format.enabled {
                    log::debug!("{} disabled", name);
                    connections.push(PipelineConnection {
                        port: name,
                        format,
                        ..Default::default()
                    });
                    continue;
                }
                log::debug!(
                    "port {} terminal {:#x} {}x{} {} bpl {} bpp {}",
                    name,
                    format.terminal_id,
                    format.width,
                    format.height,
                    format.fourcc,
                    format.bpl,
                    format.bpp
                );

                let (mut connection, peer) = self.port_get_connection(port).map_err(|err| {
                    log::error!("connection of {}: {}", name, err);
                    Error::BadValue(format!("no connection for port {}", name))
                })?;

                let mut stream = None;
                let has_edge_port = self.is_pipe_edge_port(port);
                if has_edge_port {
                    if self.port_get_direction(port) == PORT_DIRECTION_INPUT {
                        connection.connection_type = ConnectionType::Push;
                    } else if resolve_streams {
                        let sink = peer.ok_or_else(|| {
                            Error::Unknown(format!("no virtual sink for port {}", name))
                        })?;
                        stream = self
                            .port_get_client_stream(sink)
                            .map_err(|_| {
                                log::error!("no client stream for the sink of {}", name);
                                Error::Unknown(format!("no client stream for port {}", name))
                            })?
                            .map(|s| s.id);
                    }
                }

                connections.push(PipelineConnection {
                    port: name,
                    format,
                    connection,
                    has_edge_port,
                    stream,
                });
                connected.insert(port);
                if let Some(peer) = peer {
                    connected.insert(peer);
                }
            }
        }
        Ok(connections)
    }

    /// Connections of the pipeline serving `sink_name` and its stream id.
    pub fn pipeline_get_internal_connections(
        &self,
        sink_name: &str,
    ) -> Result<(i32, Vec<PipelineConnection>), Error> {
        let sink = self.sink_by_name(sink_name).ok_or_else(|| {
            log::debug!("no {} sink in graph", sink_name);
            Error::NameNotFound(format!("sink {}", sink_name))
        })?;
        let stream_id = self.node(sink).attr_i32("stream_id").ok_or_else(|| {
            Error::BadValue(format!("sink {} has no stream id", sink_name))
        })?;
        let program_groups = self.stream_get_program_groups(stream_id)?;
        if program_groups.is_empty() {
            log::error!("no program groups for stream id {}", stream_id);
            return Err(Error::BadValue(format!(
                "no program groups for stream {}",
                stream_id
            )));
        }
        let connections = self.collect_connections(&program_groups, true)?;
        Ok((stream_id, connections))
    }

    /// Connections of the program groups whose names contain any of `pg_names`.
    pub fn pipeline_get_internal_connections_for_pgs<S: AsRef<str>>(
        &self,
        pg_names: &[S],
    ) -> Result<Vec<PipelineConnection>, Error> {
        let program_groups = self.get_program_groups_by_name(pg_names)?;
        let connections = self.collect_connections(&program_groups, false)?;
        for connection in &connections {
            log::trace!("{:?}", connection);
        }
        Ok(connections)
    }

    /// DOL conversion gain and mode name of the selected setting.
    pub fn get_dol_info(&self) -> Result<(f32, String), Error> {
        self.setting
            .dol
            .as_ref()
            .map(|dol| (dol.gain, dol.mode.clone()))
            .ok_or_else(|| Error::Unknown("graph setting has no DOL info".to_string()))
    }

    pub fn get_graph_id(&self) -> Result<i32, Error> {
        self.setting.graph_id.ok_or_else(|| {
            log::error!("graph setting {} has no id", self.setting.key);
            Error::BadValue("graph setting has no id".to_string())
        })
    }

    pub fn sink_dependencies(&self) -> &[SinkDependency] {
        &self.sink_dependencies
    }

    /// Stream id behind an ISA output port given by full name.
    pub fn isa_output_port_stream_id(&self, port: &str) -> Option<i32> {
        self.isa_output_port_stream_ids.get(port).copied()
    }

    pub fn csi_output_resolution(&self) -> Resolution {
        self.csi_output
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback
    }

    pub fn source_type(&self) -> SourceType {
        self.source_type
    }

    pub fn source_port_name(&self) -> &str {
        self.source_port_name
    }

    pub fn setting(&self) -> &Arc<GraphSetting> {
        &self.setting
    }

    pub fn key(&self) -> &str {
        &self.setting.key
    }

    pub fn mc_id(&self) -> i32 {
        self.setting.mc_id.unwrap_or(-1)
    }

    pub fn sinks(&self) -> &[SinkAssignment] {
        &self.sinks
    }

    /// Node id of a port given as `"pg:port"`.
    pub fn port_by_name(&self, full_name: &str) -> Option<NodeId> {
        self.setting.descendant_by_string(full_name)
    }
}
