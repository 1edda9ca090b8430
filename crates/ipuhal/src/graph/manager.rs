// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use std::{collections::BTreeMap, sync::Arc};

use super::{config::GraphConfig, database::GraphQueryEngine, selector::GraphSelector};
use crate::{
    config::{ConfigMode, OperationMode, PlatformConfig},
    stream::{sort_by_descending_area, HalStream, Stream, StreamUsage, StreamUseCase},
    Error,
};

/// Query use case for a client stream.
fn use_case_from_stream(config_mode: ConfigMode, stream: &Stream) -> StreamUseCase {
    if config_mode == ConfigMode::StillCapture || stream.usage == StreamUsage::StillCapture {
        StreamUseCase::StillCapture
    } else {
        StreamUseCase::Preview
    }
}

/// Owns the graph configs of one camera's current stream configuration.
///
/// A configuration is all-or-nothing: if any config mode fails to select or
/// prepare, no graph config from the attempt is kept.
pub struct GraphConfigManager {
    camera_id: i32,
    config: Arc<PlatformConfig>,
    selector: GraphSelector,
    graph_configs: BTreeMap<ConfigMode, Arc<GraphConfig>>,
    hal_streams: Vec<HalStream>,
    mc_id: i32,
    configured: bool,
}

impl GraphConfigManager {
    pub fn new(
        config: Arc<PlatformConfig>,
        camera_id: i32,
        engine: Arc<dyn GraphQueryEngine>,
    ) -> Self {
        GraphConfigManager {
            camera_id,
            config,
            selector: GraphSelector::new(camera_id, engine),
            graph_configs: BTreeMap::new(),
            hal_streams: Vec::new(),
            mc_id: -1,
            configured: false,
        }
    }

    pub fn config_streams(
        &mut self,
        streams: &[Stream],
        operation_mode: OperationMode,
    ) -> Result<(), Error> {
        let camera = self.config.camera(self.camera_id)?;
        let config_modes = camera.config_modes_by_operation_mode(operation_mode)?;

        self.graph_configs.clear();
        self.configured = false;

        let sorted = sort_by_descending_area(streams);
        for (index, stream) in sorted.iter().enumerate() {
            log::debug!(
                "stream[{}] id {} {}x{} {} {}",
                index,
                stream.id,
                stream.width,
                stream.height,
                stream.format,
                stream.usage
            );
        }
        self.hal_streams = sorted
            .iter()
            .map(|s| HalStream::new(s, use_case_from_stream(config_modes[0], s)))
            .collect();

        self.mc_id = -1;
        let mut graph_configs = BTreeMap::new();
        for mode in config_modes {
            log::debug!("operation mode {} -> config mode {}", operation_mode, mode);
            self.selector
                .config_streams(&self.hal_streams, mode)
                .map_err(|err| {
                    log::warn!("failed to configure graph for config mode {}: {}", mode, err);
                    err
                })?;

            let mc_id = self.selector.selected_mc_id();
            if mc_id != -1 && self.mc_id != -1 && self.mc_id != mc_id {
                log::warn!(
                    "two different MC ids in one configuration: {}/{}",
                    self.mc_id,
                    mc_id
                );
            }
            self.mc_id = mc_id;

            let gc = self.selector.prepare_graph_config().map_err(|err| {
                log::warn!("failed to prepare graph config for config mode {}: {}", mode, err);
                err
            })?;
            graph_configs.insert(mode, Arc::new(gc));
        }

        self.graph_configs = graph_configs;
        self.configured = true;
        Ok(())
    }

    /// Graph config for `mode`, `None` when that mode was not configured.
    pub fn get_graph_config(&self, mode: ConfigMode) -> Option<Arc<GraphConfig>> {
        self.graph_configs.get(&mode).cloned()
    }

    pub fn config_modes(&self) -> Vec<ConfigMode> {
        self.graph_configs.keys().copied().collect()
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }

    /// Media controller config of the last selected setting, or -1.
    pub fn selected_mc_id(&self) -> i32 {
        self.mc_id
    }

    pub fn hal_streams(&self) -> &[HalStream] {
        &self.hal_streams
    }

    pub fn camera_id(&self) -> i32 {
        self.camera_id
    }
}
