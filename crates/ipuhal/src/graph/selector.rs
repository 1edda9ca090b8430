// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use std::sync::Arc;

use super::{
    config::GraphConfig,
    database::{GraphQuery, GraphQueryEngine},
    model::GraphSetting,
};
use crate::{
    config::{ConfigMode, OperationMode},
    fourcc::format_to_string,
    stream::{HalStream, StreamToSinkMap, StreamUseCase},
    Error,
};

pub const DEFAULT_SETTING_1_VIDEO_1_STILL: &str = "7002";
pub const DEFAULT_SETTING_2_VIDEO_2_STILL: &str = "7004";
pub const DEFAULT_SETTING_2_STILL: &str = "7005";
pub const DEFAULT_SETTING_1_STILL: &str = "7006";

const VIDEO_SINKS: [&str; 3] = ["video0", "video1", "video2"];
const STILL_SINKS: [&str; 3] = ["still0", "still1", "still2"];

/// A HAL stream bound to the virtual sink that serves it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkAssignment {
    pub stream: HalStream,
    pub sink: String,
}

/// Default setting key for a stream mix that matched nothing.
pub fn select_default_setting(video_count: usize, still_count: usize) -> Result<&'static str, Error> {
    let key = match (video_count, still_count) {
        (0, 1) => DEFAULT_SETTING_1_STILL,
        (0, 2) => DEFAULT_SETTING_2_STILL,
        (1, 0) | (1, 1) => DEFAULT_SETTING_1_VIDEO_1_STILL,
        (1, 2) | (2, 0..=2) => DEFAULT_SETTING_2_VIDEO_2_STILL,
        (video, still) => {
            log::error!(
                "no default setting for {} video and {} still stream(s)",
                video,
                still
            );
            return Err(Error::Unknown(format!(
                "no default setting for {} video, {} still",
                video, still
            )));
        }
    };
    Ok(key)
}

fn is_video_stream(stream: &HalStream) -> bool {
    matches!(stream.use_case, StreamUseCase::Preview | StreamUseCase::Video)
}

/// Parse a comma separated `op_mode` list. Unknown names are skipped.
fn config_modes_from_string(op_mode: &str) -> Vec<ConfigMode> {
    op_mode
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .filter_map(|name| {
            let mode = ConfigMode::from_name(name);
            if mode.is_none() {
                log::warn!("unknown config mode '{}' in graph setting", name);
            }
            mode
        })
        .collect()
}

/// Two-stage graph query for one stream configuration.
///
/// The first query matches stream geometry and count. When nothing matches
/// the selector falls back to a fixed default setting; otherwise candidates
/// are narrowed by config mode and, if still ambiguous, by sink format.
pub struct GraphSelector {
    camera_id: i32,
    engine: Arc<dyn GraphQueryEngine>,
    query: GraphQuery,
    first_results: Vec<Arc<GraphSetting>>,
    selected: Option<Arc<GraphSetting>>,
    assignments: Vec<SinkAssignment>,
    fallback: bool,
    mc_id: i32,
}

impl GraphSelector {
    pub fn new(camera_id: i32, engine: Arc<dyn GraphQueryEngine>) -> Self {
        GraphSelector {
            camera_id,
            engine,
            query: GraphQuery::new(),
            first_results: Vec::new(),
            selected: None,
            assignments: Vec::new(),
            fallback: false,
            mc_id: -1,
        }
    }

    fn reset(&mut self) {
        self.query.clear();
        self.first_results.clear();
        self.selected = None;
        self.assignments.clear();
        self.fallback = false;
        self.mc_id = -1;
    }

    /// Select a graph setting for `streams`, which must already be sorted by
    /// descending area.
    pub fn config_streams(
        &mut self,
        streams: &[HalStream],
        operation_mode: OperationMode,
    ) -> Result<(), Error> {
        self.reset();
        self.query
            .insert("active_outputs".to_string(), streams.len().to_string());

        let mut video_sinks = VIDEO_SINKS.iter();
        let mut still_sinks = STILL_SINKS.iter();
        let (mut video_count, mut still_count) = (0usize, 0usize);

        for stream in streams {
            if stream.use_case == StreamUseCase::Input {
                log::error!("input streams are not supported by graph selection");
                return Err(Error::Unknown("re-processing input stream".to_string()));
            }

            let sink = if is_video_stream(stream) {
                video_count += 1;
                video_sinks.next()
            } else {
                still_count += 1;
                still_sinks.next()
            };
            let Some(sink) = sink else {
                log::error!("out of virtual sinks for stream {}", stream.id);
                return Err(Error::BadValue(format!(
                    "no free sink for stream {} ({}x{})",
                    stream.id,
                    stream.width(),
                    stream.height()
                )));
            };

            log::debug!("stream {} -> sink {}", stream.id, sink);
            self.query
                .insert(format!("{}.width", sink), stream.width().to_string());
            self.query
                .insert(format!("{}.height", sink), stream.height().to_string());
            self.assignments.push(SinkAssignment {
                stream: *stream,
                sink: (*sink).to_string(),
            });
        }

        self.dump_query();
        self.first_results = self.engine.query(&self.query);

        if self.first_results.is_empty() {
            self.fallback = true;
            self.query.clear();

            let key = select_default_setting(video_count, still_count)?;
            self.query.insert("key".to_string(), key.to_string());
            let results = self.engine.query(&self.query);
            let Some(setting) = results.first() else {
                log::error!("default setting {} is missing from the database", key);
                return Err(Error::Unknown(format!("default setting {} not found", key)));
            };
            log::info!(
                "camera {} uses default setting {} for this stream configuration",
                self.camera_id,
                setting.key
            );
            self.selected = Some(setting.clone());
        } else {
            self.select_setting(operation_mode).map_err(|err| {
                log::warn!(
                    "failed to select a setting for config mode {}: {}",
                    operation_mode,
                    err
                );
                err
            })?;
            // A default setting leaves the mc id unpinned.
            if let Some(setting) = &self.selected {
                self.mc_id = setting.mc_id.unwrap_or(-1);
            }
        }
        Ok(())
    }

    fn select_setting(&mut self, config_mode: ConfigMode) -> Result<(), Error> {
        let by_mode: Vec<Arc<GraphSetting>> = self
            .first_results
            .iter()
            .filter(|setting| {
                log::trace!("setting {} op_mode '{}'", setting.key, setting.op_mode);
                config_modes_from_string(&setting.op_mode).contains(&config_mode)
            })
            .cloned()
            .collect();

        let selected = match by_mode.len() {
            0 => None,
            1 => by_mode.into_iter().next(),
            _ => {
                // Same geometry and mode, different output formats.
                let mut format_query = GraphQuery::new();
                for assignment in &self.assignments {
                    format_query.insert(
                        format!("{}.format", assignment.sink),
                        format_to_string(assignment.stream.format()),
                    );
                }
                let second = self.engine.query_within(&format_query, &by_mode);
                if second.len() != 1 {
                    log::error!(
                        "{} settings remain after the format query, expected one",
                        second.len()
                    );
                    None
                } else {
                    second.into_iter().next()
                }
            }
        };

        let Some(setting) = selected else {
            return Err(Error::InvalidOperation(format!(
                "no unique graph setting for config mode {}",
                config_mode
            )));
        };
        log::info!(
            "camera {} uses setting {} (op_mode {}) for config mode {}",
            self.camera_id,
            setting.key,
            setting.op_mode,
            config_mode
        );
        self.selected = Some(setting);
        Ok(())
    }

    fn dump_query(&self) {
        for (item, value) in &self.query {
            log::trace!("query {} = {}", item, value);
        }
    }

    /// Build the graph config of the selected setting.
    pub fn prepare_graph_config(&self) -> Result<GraphConfig, Error> {
        let selected = self
            .selected
            .as_ref()
            .ok_or_else(|| Error::NoInit("no graph setting selected".to_string()))?;
        let setting = self.engine.create_graph(&selected.key)?;
        GraphConfig::prepare(setting, self.assignments.clone(), self.fallback)
    }

    pub fn selected(&self) -> Option<&Arc<GraphSetting>> {
        self.selected.as_ref()
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback
    }

    /// Media controller config pinned by the selected setting, or -1.
    pub fn selected_mc_id(&self) -> i32 {
        self.mc_id
    }

    pub fn query(&self) -> &GraphQuery {
        &self.query
    }

    pub fn assignments(&self) -> &[SinkAssignment] {
        &self.assignments
    }

    pub fn stream_to_sink_map(&self) -> StreamToSinkMap {
        self.assignments
            .iter()
            .map(|a| (a.stream.id, a.sink.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table() {
        assert_eq!(select_default_setting(0, 1).unwrap(), "7006");
        assert_eq!(select_default_setting(0, 2).unwrap(), "7005");
        assert_eq!(select_default_setting(1, 0).unwrap(), "7002");
        assert_eq!(select_default_setting(1, 1).unwrap(), "7002");
        assert_eq!(select_default_setting(1, 2).unwrap(), "7004");
        assert_eq!(select_default_setting(2, 0).unwrap(), "7004");
        assert_eq!(select_default_setting(2, 2).unwrap(), "7004");

        assert!(select_default_setting(0, 0).is_err());
        assert!(select_default_setting(0, 3).is_err());
        assert!(select_default_setting(1, 3).is_err());
        assert!(select_default_setting(2, 3).is_err());
        assert!(select_default_setting(3, 0).is_err());
    }

    #[test]
    fn test_op_mode_parse() {
        assert_eq!(
            config_modes_from_string("NORMAL, HDR,BOGUS"),
            vec![ConfigMode::Normal, ConfigMode::Hdr]
        );
        assert!(config_modes_from_string("").is_empty());
    }
}
