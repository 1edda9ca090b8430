// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Graph settings, selection and the per config mode graph view.
//!
//! [`GraphConfigManager`] drives a [`GraphSelector`] once per config mode
//! and keeps the resulting [`GraphConfig`]s. Settings come from any
//! [`GraphQueryEngine`]; [`SettingsDatabase`] is the JSON backed one.

mod config;
mod database;
mod kernel;
mod manager;
mod model;
mod selector;

pub use config::{
    ConnectionConfig, ConnectionType, GraphConfig, PipelineConnection, PortFormatSettings,
    SinkDependency, SourceType, PORT_DIRECTION_INPUT, PORT_DIRECTION_OUTPUT, PSYS_ISA_STREAM_ID,
    STILL_STREAM_ID, VIDEO_RECORDING_FORMAT, VIDEO_STREAM_ID,
};
pub use database::{matches, GraphQuery, GraphQueryEngine, SettingsDatabase};
pub use kernel::{uuid, ProgramGroup, ResolutionInfo, RunKernel};
pub use manager::GraphConfigManager;
pub use model::{DolInfo, GraphSetting, Node, NodeId, NodeKind};
pub use selector::{
    select_default_setting, GraphSelector, SinkAssignment, DEFAULT_SETTING_1_STILL,
    DEFAULT_SETTING_1_VIDEO_1_STILL, DEFAULT_SETTING_2_STILL, DEFAULT_SETTING_2_VIDEO_2_STILL,
};
