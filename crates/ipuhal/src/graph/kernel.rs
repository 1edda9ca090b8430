// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use serde::{Deserialize, Serialize};

use super::model::{GraphSetting, NodeId, NodeKind};

/// Kernel identifiers as they appear in the `uuid` attribute of kernel nodes.
pub mod uuid {
    pub const GDC3: u32 = 5394;
    pub const GDC3_1: u32 = 40280;
    pub const GDC3_1_1: u32 = 2144;
    pub const GDC5: u32 = 3421;
    pub const TNR5_21: u32 = 20119;
    pub const TNR5_22: u32 = 42936;
    pub const TNR5_25: u32 = 15316;
    pub const OFA_DP: u32 = 6800;
    pub const OFA_MP: u32 = 18789;
    pub const OFA_PPP: u32 = 31724;
    pub const DVS_STATISTICS: u32 = 48078;
    pub const AWB_STATISTICS: u32 = 1338;

    /// Temporal noise reduction kernels carrying the frame counter.
    pub const TNR: &[u32] = &[TNR5_21, TNR5_22, TNR5_25];

    /// Output formatter kernels carrying flip and YUV range.
    pub const OFA: &[u32] = &[OFA_DP, OFA_MP, OFA_PPP];

    /// GDC variants in lookup priority order.
    pub const GDC: &[u32] = &[GDC3_1, GDC3, GDC3_1_1, GDC5];
}

/// Input and output geometry of a scaling or warping kernel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionInfo {
    pub input_width: u32,
    pub input_height: u32,
    pub output_width: u32,
    pub output_height: u32,
}

/// One kernel to run inside a program group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunKernel {
    pub uuid: u32,
    pub enable: bool,
    pub stream_id: i32,
    /// Debug slots handed to the kernel: `[0]` frame counter for TNR,
    /// `[2]`/`[3]` flip mode and YUV range for the output formatters.
    pub metadata: [i32; 4],
    pub resolution_info: Option<ResolutionInfo>,
}

impl RunKernel {
    pub(crate) fn from_node(setting: &GraphSetting, id: NodeId, pg_stream_id: i32) -> Self {
        let node = setting.node(id);
        let mut metadata = [0i32; 4];
        if let Some(serde_json::Value::Array(values)) = node.attr("metadata") {
            for (slot, value) in metadata.iter_mut().zip(values) {
                *slot = value.as_i64().and_then(|v| i32::try_from(v).ok()).unwrap_or(0);
            }
        }
        let resolution_info = node
            .attr("resolution_info")
            .and_then(|value| serde_json::from_value(value.clone()).ok());

        RunKernel {
            uuid: node.attr_u32("uuid").unwrap_or(0),
            enable: node.attr_flag("enable").unwrap_or(true),
            stream_id: node.attr_i32("stream_id").unwrap_or(pg_stream_id),
            metadata,
            resolution_info,
        }
    }
}

/// Ordered kernels of one pipeline stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProgramGroup {
    pub kernels: Vec<RunKernel>,
}

impl ProgramGroup {
    /// Kernels below the given program group nodes, in graph order.
    pub(crate) fn from_nodes(setting: &GraphSetting, pgs: &[NodeId]) -> Self {
        let mut kernels = Vec::new();
        for pg in pgs {
            let stream_id = setting.node(*pg).attr_i32("stream_id").unwrap_or(-1);
            kernels.extend(
                setting
                    .descendants(*pg)
                    .into_iter()
                    .filter(|id| setting.node(*id).kind == NodeKind::Kernel)
                    .map(|id| RunKernel::from_node(setting, id, stream_id)),
            );
        }
        ProgramGroup { kernels }
    }

    pub fn kernel_count(&self) -> usize {
        self.kernels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }

    pub fn find(&self, uuid: u32) -> Option<&RunKernel> {
        self.kernels.iter().find(|kernel| kernel.uuid == uuid)
    }

    pub fn find_mut(&mut self, uuid: u32) -> Option<&mut RunKernel> {
        self.kernels.iter_mut().find(|kernel| kernel.uuid == uuid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernels_inherit_stream_id() {
        let setting: GraphSetting = serde_json::from_str(
            r#"{ "key": "1", "nodes": [
                { "name": "post_gdc", "type": "program_group", "stream_id": 60001,
                  "children": [
                    { "name": "gdc", "type": "kernel", "uuid": 5394,
                      "resolution_info": { "input_width": 1936, "input_height": 1096,
                                           "output_width": 1920, "output_height": 1080 } },
                    { "name": "tnr", "type": "kernel", "uuid": 20119, "enable": 0,
                      "stream_id": 60000, "metadata": [1, 2] }
                  ] }
            ] }"#,
        )
        .unwrap();
        let pg = setting.find_root("post_gdc").unwrap();
        let group = ProgramGroup::from_nodes(&setting, &[pg]);
        assert_eq!(group.kernel_count(), 2);

        let gdc = group.find(uuid::GDC3).unwrap();
        assert_eq!(gdc.stream_id, 60001);
        assert!(gdc.enable);
        assert_eq!(gdc.resolution_info.unwrap().input_width, 1936);

        let tnr = group.find(uuid::TNR5_21).unwrap();
        assert_eq!(tnr.stream_id, 60000);
        assert!(!tnr.enable);
        assert_eq!(tnr.metadata, [1, 2, 0, 0]);
    }
}
