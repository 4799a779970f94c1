use serde::{Deserialize, Serialize};

use super::controls::Controls;
use super::node::Node;
use super::nodes::Nodes;
use super::templates::{MetadataTemplates, TableTemplates};

/// All nodes of one resource kind, plus how to display and act on them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub shape: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label_plural: String,
    #[serde(default)]
    pub nodes: Nodes,
    #[serde(default, skip_serializing_if = "Controls::is_empty")]
    pub controls: Controls,
    #[serde(default, skip_serializing_if = "MetadataTemplates::is_empty")]
    pub metadata_templates: MetadataTemplates,
    #[serde(default, skip_serializing_if = "TableTemplates::is_empty")]
    pub table_templates: TableTemplates,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shape(mut self, shape: &str) -> Self {
        self.shape = shape.to_string();
        self
    }

    pub fn with_label(mut self, label: &str, plural: &str) -> Self {
        self.label = label.to_string();
        self.label_plural = plural.to_string();
        self
    }

    pub fn with_controls(mut self, controls: &Controls) -> Self {
        self.controls = self.controls.merge(controls);
        self
    }

    pub fn with_metadata_templates(mut self, templates: &MetadataTemplates) -> Self {
        self.metadata_templates = self.metadata_templates.merge(templates);
        self
    }

    pub fn with_table_templates(mut self, templates: &TableTemplates) -> Self {
        self.table_templates = self.table_templates.merge(templates);
        self
    }

    pub fn with_node(mut self, node: Node) -> Self {
        self.add_node(node);
        self
    }

    /// Adds `node` while a producer is still assembling its report.
    pub fn add_node(&mut self, node: Node) {
        self.nodes.insert(node);
    }

    pub fn merge(&self, other: &Topology) -> Topology {
        Topology {
            shape: larger(&self.shape, &other.shape),
            label: larger(&self.label, &other.label),
            label_plural: larger(&self.label_plural, &other.label_plural),
            nodes: self.nodes.merge(&other.nodes),
            controls: self.controls.merge(&other.controls),
            metadata_templates: self.metadata_templates.merge(&other.metadata_templates),
            table_templates: self.table_templates.merge(&other.table_templates),
        }
    }
}

fn larger(a: &str, b: &str) -> String {
    a.max(b).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::controls::Control;
    use time::macros::datetime;

    #[test]
    fn merge_unions_nodes_and_controls() {
        let ts = datetime!(2024-01-01 00:00:00 UTC);
        let mut controls = Controls::new();
        controls.add_control(Control {
            id: "logs".to_string(),
            human: "Logs".to_string(),
            category: String::new(),
            icon: String::new(),
            confirmation: None,
            rank: 0,
        });

        let a = Topology::new()
            .with_shape("heptagon")
            .with_label("pod", "pods")
            .with_node(Node::new("a").with_latest("state", ts, "Running"));
        let b = Topology::new()
            .with_controls(&controls)
            .with_node(Node::new("a").with_adjacent("b"))
            .with_node(Node::new("b"));

        let merged = a.merge(&b);
        assert_eq!(merged.shape, "heptagon");
        assert_eq!(merged.label_plural, "pods");
        assert_eq!(merged.nodes.len(), 2);
        assert!(merged.controls.get("logs").is_some());
        assert_eq!(merged, b.merge(&a));
    }
}
