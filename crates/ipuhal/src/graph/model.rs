// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{collections::BTreeMap, fmt};

/// Index of a node inside its [`GraphSetting`].
pub type NodeId = usize;

/// Node type as written in the settings database `type` field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Sensor,
    Tpg,
    Hw,
    ProgramGroup,
    Port,
    Kernel,
    /// Virtual sink: the client-visible end of a pipeline.
    Sink,
    Other(String),
}

impl NodeKind {
    fn from_type(name: &str) -> Self {
        match name {
            "sensor" => NodeKind::Sensor,
            "tpg" => NodeKind::Tpg,
            "hw" => NodeKind::Hw,
            "program_group" => NodeKind::ProgramGroup,
            "port" => NodeKind::Port,
            "kernel" => NodeKind::Kernel,
            "sink" => NodeKind::Sink,
            other => NodeKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            NodeKind::Sensor => "sensor",
            NodeKind::Tpg => "tpg",
            NodeKind::Hw => "hw",
            NodeKind::ProgramGroup => "program_group",
            NodeKind::Port => "port",
            NodeKind::Kernel => "kernel",
            NodeKind::Sink => "sink",
            NodeKind::Other(name) => name,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One node of a parsed graph setting.
///
/// Attributes keep their JSON value; the typed getters accept both numbers
/// and numeric strings because settings files mix the two freely.
#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    attributes: BTreeMap<String, Value>,
}

impl Node {
    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn has_attr(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    pub fn attr_i32(&self, key: &str) -> Option<i32> {
        match self.attributes.get(key)? {
            Value::Number(n) => n.as_i64().and_then(|v| i32::try_from(v).ok()),
            Value::String(s) => s.trim().parse().ok(),
            Value::Bool(b) => Some(i32::from(*b)),
            _ => None,
        }
    }

    pub fn attr_u32(&self, key: &str) -> Option<u32> {
        match self.attributes.get(key)? {
            Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn attr_f32(&self, key: &str) -> Option<f32> {
        match self.attributes.get(key)? {
            Value::Number(n) => n.as_f64().map(|v| v as f32),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Attribute rendered as text, the form graph queries compare against.
    pub fn attr_string(&self, key: &str) -> Option<String> {
        match self.attributes.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(i32::from(*b).to_string()),
            _ => None,
        }
    }

    /// Integer flag; absent means `None`, so callers pick their own default.
    pub fn attr_flag(&self, key: &str) -> Option<bool> {
        self.attr_i32(key).map(|v| v != 0)
    }

    pub fn is_kind(&self, kind: &NodeKind) -> bool {
        &self.kind == kind
    }
}

/// DOL readout description attached to a graph setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DolInfo {
    pub mode: String,
    #[serde(default = "default_conversion_gain")]
    pub gain: f32,
}

fn default_conversion_gain() -> f32 {
    1.0
}

#[derive(Deserialize)]
struct RawNode {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    children: Vec<RawNode>,
    #[serde(flatten)]
    attributes: BTreeMap<String, Value>,
}

#[derive(Deserialize)]
struct RawSetting {
    key: String,
    #[serde(default)]
    id: Option<i32>,
    #[serde(default)]
    op_mode: String,
    #[serde(default)]
    mc_id: Option<i32>,
    #[serde(default)]
    active_outputs: u32,
    #[serde(default)]
    dol: Option<DolInfo>,
    #[serde(default)]
    nodes: Vec<RawNode>,
}

/// One concrete pipeline topology out of the settings database.
///
/// Nodes live in a flat arena in pre-order, so iterating `nodes()` visits a
/// parent before its children and keeps the file order between siblings.
/// The structure is immutable once parsed; per-configuration changes such as
/// port format overrides are kept by [`super::GraphConfig`] as an overlay.
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "RawSetting")]
pub struct GraphSetting {
    pub key: String,
    pub graph_id: Option<i32>,
    pub op_mode: String,
    pub mc_id: Option<i32>,
    pub active_outputs: u32,
    pub dol: Option<DolInfo>,
    nodes: Vec<Node>,
    roots: Vec<NodeId>,
}

impl From<RawSetting> for GraphSetting {
    fn from(raw: RawSetting) -> Self {
        let mut setting = GraphSetting {
            key: raw.key,
            graph_id: raw.id,
            op_mode: raw.op_mode,
            mc_id: raw.mc_id,
            active_outputs: raw.active_outputs,
            dol: raw.dol,
            nodes: Vec::new(),
            roots: Vec::new(),
        };
        for node in raw.nodes {
            let id = setting.push_node(node, None);
            setting.roots.push(id);
        }
        setting
    }
}

impl GraphSetting {
    fn push_node(&mut self, raw: RawNode, parent: Option<NodeId>) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            name: raw.name,
            kind: NodeKind::from_type(&raw.kind),
            parent,
            children: Vec::new(),
            attributes: raw.attributes,
        });
        for child in raw.children {
            let child_id = self.push_node(child, Some(id));
            self.nodes[id].children.push(child_id);
        }
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn find_root(&self, name: &str) -> Option<NodeId> {
        self.roots
            .iter()
            .copied()
            .find(|id| self.nodes[*id].name == name)
    }

    /// Resolve a `"node:child:..."` path starting at the top level.
    pub fn descendant_by_string(&self, path: &str) -> Option<NodeId> {
        let mut parts = path.split(':');
        let mut current = self.find_root(parts.next()?)?;
        for part in parts {
            current = self.nodes[current]
                .children
                .iter()
                .copied()
                .find(|child| self.nodes[*child].name == part)?;
        }
        Some(current)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].parent
    }

    /// `"parent:name"`, or the bare name for top-level nodes.
    pub fn full_name(&self, id: NodeId) -> String {
        let node = &self.nodes[id];
        match node.parent {
            Some(parent) => format!("{}:{}", self.nodes[parent].name, node.name),
            None => node.name.clone(),
        }
    }

    /// Every node of `kind`, in pre-order.
    pub fn nodes_of_kind<'a>(&'a self, kind: &'a NodeKind) -> impl Iterator<Item = NodeId> + 'a {
        self.nodes
            .iter()
            .enumerate()
            .filter(move |(_, node)| &node.kind == kind)
            .map(|(id, _)| id)
    }

    /// All nodes below `id`, in pre-order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.nodes[id].children.iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.nodes[next].children.iter().rev().copied());
        }
        out
    }

    /// Value addressed by a query path.
    ///
    /// Bare names address setting level fields (`key`, `op_mode`, `mc_id`,
    /// `active_outputs`, `id`); `node.attr` addresses an attribute of a
    /// top-level node such as `video0.width`.
    pub fn query_value(&self, path: &str) -> Option<String> {
        match path.split_once('.') {
            None => match path {
                "key" => Some(self.key.clone()),
                "op_mode" => Some(self.op_mode.clone()),
                "mc_id" => self.mc_id.map(|id| id.to_string()),
                "id" => self.graph_id.map(|id| id.to_string()),
                "active_outputs" => Some(self.active_outputs.to_string()),
                _ => None,
            },
            Some((node, attr)) => {
                let id = self.find_root(node)?;
                self.nodes[id].attr_string(attr)
            }
        }
    }
}
