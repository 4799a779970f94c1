use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::resources::{Producer, Resource};

/// Resources this probe observes, as loaded from the inventory file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    #[serde(default)]
    pub resources: Vec<Resource>,
}

impl Inventory {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read inventory {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("parse inventory {}", path.display()))
    }

    pub fn find(&self, node_id: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.node_id() == node_id)
    }

    pub fn remove(&mut self, node_id: &str) -> Option<Resource> {
        let index = self.resources.iter().position(|r| r.node_id() == node_id)?;
        Some(self.resources.remove(index))
    }
}
