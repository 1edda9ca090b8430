// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use serde::Deserialize;
use std::{collections::BTreeMap, fs, path::Path, sync::Arc};

use super::model::GraphSetting;
use crate::Error;

/// Query items keyed by path (`active_outputs`, `video0.width`, `key`).
pub type GraphQuery = BTreeMap<String, String>;

/// Source of graph settings.
///
/// Results are returned in database order so that an identical query always
/// yields the same candidates in the same order.
pub trait GraphQueryEngine: Send + Sync {
    /// Every setting matching all items of `query`.
    fn query(&self, query: &GraphQuery) -> Vec<Arc<GraphSetting>>;

    /// Narrow an earlier result list with further items.
    fn query_within(
        &self,
        query: &GraphQuery,
        candidates: &[Arc<GraphSetting>],
    ) -> Vec<Arc<GraphSetting>> {
        candidates
            .iter()
            .filter(|setting| matches(setting, query))
            .cloned()
            .collect()
    }

    /// Instantiate the graph of the setting identified by `key`.
    fn create_graph(&self, key: &str) -> Result<Arc<GraphSetting>, Error>;
}

/// True when every query item equals the setting's value at that path.
pub fn matches(setting: &GraphSetting, query: &GraphQuery) -> bool {
    query
        .iter()
        .all(|(path, want)| setting.query_value(path).as_deref() == Some(want.as_str()))
}

#[derive(Deserialize)]
struct RawDatabase {
    #[serde(default)]
    settings: Vec<GraphSetting>,
}

/// Graph settings loaded from a JSON document.
#[derive(Debug, Clone, Default)]
pub struct SettingsDatabase {
    settings: Vec<Arc<GraphSetting>>,
}

impl SettingsDatabase {
    pub fn new(settings: Vec<GraphSetting>) -> Self {
        SettingsDatabase {
            settings: settings.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, Error> {
        let raw: RawDatabase = serde_json::from_str(json)?;
        Ok(Self::new(raw.settings))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let text = fs::read_to_string(path.as_ref())?;
        let database = Self::from_json(&text)?;
        log::info!(
            "loaded {} graph setting(s) from {}",
            database.len(),
            path.as_ref().display()
        );
        Ok(database)
    }

    pub fn len(&self) -> usize {
        self.settings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }

    pub fn settings(&self) -> &[Arc<GraphSetting>] {
        &self.settings
    }
}

impl GraphQueryEngine for SettingsDatabase {
    fn query(&self, query: &GraphQuery) -> Vec<Arc<GraphSetting>> {
        self.query_within(query, &self.settings)
    }

    fn create_graph(&self, key: &str) -> Result<Arc<GraphSetting>, Error> {
        self.settings
            .iter()
            .find(|setting| setting.key == key)
            .cloned()
            .ok_or_else(|| Error::Unknown(format!("no graph setting with key {}", key)))
    }
}
