//! Named outputs produced by a workflow step.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Key to file mapping returned by every step, e.g. `outputStructure`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepOutputs {
    outputs: BTreeMap<String, PathBuf>,
}

impl StepOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, path: impl Into<PathBuf>) {
        self.outputs.insert(key.into(), path.into());
    }

    pub fn with(mut self, key: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.insert(key, path);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Path> {
        self.outputs.get(key).map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.outputs.iter().map(|(k, v)| (k.as_str(), v.as_path()))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.outputs)?)
    }
}
