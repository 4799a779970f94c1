use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::merge::merge_maps;
use super::node::Node;

/// Where a metadata row reads its value from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataSource {
    #[default]
    Latest,
    Sets,
    Counters,
}

/// How one metadata key of a topology's nodes is displayed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MetadataTemplate {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub priority: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub datatype: String,
    #[serde(default)]
    pub from: MetadataSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRow {
    pub id: String,
    pub label: String,
    pub value: String,
    pub priority: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub datatype: String,
}

impl MetadataTemplate {
    pub fn new(id: &str, label: &str, priority: u32) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            priority,
            datatype: String::new(),
            from: MetadataSource::Latest,
        }
    }

    pub fn from_source(mut self, from: MetadataSource) -> Self {
        self.from = from;
        self
    }

    pub fn with_datatype(mut self, datatype: &str) -> Self {
        self.datatype = datatype.to_string();
        self
    }

    fn row(&self, node: &Node) -> Option<MetadataRow> {
        let value = match self.from {
            MetadataSource::Latest => node.lookup(&self.id)?.to_string(),
            MetadataSource::Sets => {
                let values = node.sets.lookup(&self.id)?;
                values.iter().cloned().collect::<Vec<_>>().join(", ")
            }
            MetadataSource::Counters => node.counters.lookup(&self.id)?.to_string(),
        };
        Some(MetadataRow {
            id: self.id.clone(),
            label: self.label.clone(),
            value,
            priority: self.priority,
            datatype: self.datatype.clone(),
        })
    }
}

/// Descriptive metadata shared by every node of a topology. Two probes
/// normally send identical templates; on a genuine conflict the larger
/// definition wins so merging stays order-independent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataTemplates(BTreeMap<String, MetadataTemplate>);

impl MetadataTemplates {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn merge(&self, other: &MetadataTemplates) -> MetadataTemplates {
        MetadataTemplates(merge_maps(&self.0, &other.0, |l, r| l.max(r).clone()))
    }

    /// Rows for every template with a value on `node`, by priority then ID.
    pub fn rows(&self, node: &Node) -> Vec<MetadataRow> {
        let mut rows: Vec<MetadataRow> = self.0.values().filter_map(|t| t.row(node)).collect();
        rows.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));
        rows
    }
}

impl FromIterator<MetadataTemplate> for MetadataTemplates {
    fn from_iter<I: IntoIterator<Item = MetadataTemplate>>(iter: I) -> Self {
        MetadataTemplates(iter.into_iter().map(|t| (t.id.clone(), t)).collect())
    }
}

/// Displays every latest key starting with `prefix` as a key/value table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableTemplate {
    pub id: String,
    pub label: String,
    pub prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRow {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub id: String,
    pub label: String,
    pub rows: Vec<TableRow>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableTemplates(BTreeMap<String, TableTemplate>);

impl TableTemplates {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn merge(&self, other: &TableTemplates) -> TableTemplates {
        TableTemplates(merge_maps(&self.0, &other.0, |l, r| l.max(r).clone()))
    }

    /// Non-empty tables for `node`, in template ID order.
    pub fn tables(&self, node: &Node) -> Vec<Table> {
        self.0
            .values()
            .filter_map(|t| {
                let rows: Vec<TableRow> = node
                    .latest
                    .iter()
                    .filter_map(|(key, entry)| {
                        key.strip_prefix(t.prefix.as_str()).map(|k| TableRow {
                            key: k.to_string(),
                            value: entry.value.clone(),
                        })
                    })
                    .collect();
                (!rows.is_empty()).then(|| Table {
                    id: t.id.clone(),
                    label: t.label.clone(),
                    rows,
                })
            })
            .collect()
    }
}

impl FromIterator<TableTemplate> for TableTemplates {
    fn from_iter<I: IntoIterator<Item = TableTemplate>>(iter: I) -> Self {
        TableTemplates(iter.into_iter().map(|t| (t.id.clone(), t)).collect())
    }
}
