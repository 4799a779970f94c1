use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::controls::NodeControlData;
use super::counters::Counters;
use super::id_list::IdList;
use super::keys;
use super::latest::{NodeControlDataLatestMap, StringLatestMap};
use super::nodes::Nodes;
use super::sets::{Sets, StringSet};

/// One resource instance as observed by one or more probes.
///
/// `with_*` builders consume the node and hand back the updated value; a node
/// that is shared (inside a report, behind an `Arc`) has to be cloned first,
/// so nothing already merged is ever changed in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub topology: String,
    #[serde(default, skip_serializing_if = "StringLatestMap::is_empty")]
    pub latest: StringLatestMap,
    #[serde(default, skip_serializing_if = "Sets::is_empty")]
    pub sets: Sets,
    #[serde(default, skip_serializing_if = "IdList::is_empty")]
    pub adjacency: IdList,
    #[serde(default, skip_serializing_if = "Nodes::is_empty")]
    pub children: Nodes,
    #[serde(default, skip_serializing_if = "NodeControlDataLatestMap::is_empty")]
    pub latest_controls: NodeControlDataLatestMap,
    #[serde(default, skip_serializing_if = "Counters::is_empty")]
    pub counters: Counters,
}

impl Node {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_topology(mut self, topology: impl Into<String>) -> Self {
        self.topology = topology.into();
        self
    }

    pub fn with_latest(
        mut self,
        key: impl Into<String>,
        ts: OffsetDateTime,
        value: impl Into<String>,
    ) -> Self {
        self.latest = self.latest.set(key, ts, value.into());
        self
    }

    pub fn with_latests<I, K, V>(self, ts: OffsetDateTime, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        entries
            .into_iter()
            .fold(self, |node, (k, v)| node.with_latest(k, ts, v))
    }

    pub fn with_sets(mut self, sets: &Sets) -> Self {
        self.sets = self.sets.merge(sets);
        self
    }

    pub fn with_set(mut self, key: impl Into<String>, values: StringSet) -> Self {
        self.sets = self.sets.add(key, values);
        self
    }

    pub fn with_parent(mut self, topology: &str, id: impl Into<String>) -> Self {
        self.sets = self.sets.add_string(keys::parents_key(topology), id);
        self
    }

    /// `parents` is keyed by parent topology name.
    pub fn with_parents(mut self, parents: Sets) -> Self {
        for (topology, ids) in parents.iter() {
            self.sets = self.sets.add(keys::parents_key(topology), ids.clone());
        }
        self
    }

    pub fn with_adjacent(mut self, id: impl Into<String>) -> Self {
        self.adjacency = self.adjacency.add(id);
        self
    }

    pub fn with_adjacency(mut self, ids: &IdList) -> Self {
        self.adjacency = self.adjacency.merge(ids);
        self
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children = self.children.add(child);
        self
    }

    pub fn with_children(mut self, children: &Nodes) -> Self {
        self.children = self.children.merge(children);
        self
    }

    pub fn with_counter(mut self, key: impl Into<String>, value: u64) -> Self {
        self.counters = self.counters.set(key, value);
        self
    }

    pub fn with_latest_control(
        mut self,
        control: impl Into<String>,
        ts: OffsetDateTime,
        data: NodeControlData,
    ) -> Self {
        self.latest_controls = self.latest_controls.set(control, ts, data);
        self
    }

    /// Marks each control as currently usable on this node.
    pub fn with_latest_active_controls<I, S>(self, ts: OffsetDateTime, controls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        controls.into_iter().fold(self, |node, control| {
            node.with_latest_control(control, ts, NodeControlData { dead: false })
        })
    }

    /// Records `probe_id` as an origin, last seen reporting this node at
    /// `seen`.
    pub fn with_origin(mut self, probe_id: &str, seen: OffsetDateTime) -> Self {
        if !probe_id.is_empty() {
            self.sets = self.sets.add_string(keys::ORIGINS, probe_id);
            self.latest = self
                .latest
                .set(keys::origin_seen_key(probe_id), seen, probe_id.to_string());
        }
        self
    }

    pub fn lookup(&self, key: &str) -> Option<&str> {
        self.latest.lookup(key).map(String::as_str)
    }

    pub fn parents(&self, topology: &str) -> Option<&StringSet> {
        self.sets.lookup(&keys::parents_key(topology))
    }

    pub fn origins(&self) -> Option<&StringSet> {
        self.sets.lookup(keys::ORIGINS)
    }

    pub fn origin_seen(&self, probe_id: &str) -> Option<OffsetDateTime> {
        self.latest
            .lookup_entry(&keys::origin_seen_key(probe_id))
            .map(|(_, seen)| seen)
    }

    /// Control IDs whose latest state is not dead.
    pub fn active_controls(&self) -> impl Iterator<Item = &str> {
        self.latest_controls
            .iter()
            .filter(|(_, entry)| !entry.value.dead)
            .map(|(id, _)| id)
    }

    /// Field-wise merge. Commutative, associative and idempotent for nodes
    /// sharing an ID.
    pub fn merge(&self, other: &Node) -> Node {
        Node {
            id: self.id.as_str().max(other.id.as_str()).to_string(),
            topology: self.topology.as_str().max(other.topology.as_str()).to_string(),
            latest: self.latest.merge(&other.latest),
            sets: self.sets.merge(&other.sets),
            adjacency: self.adjacency.merge(&other.adjacency),
            children: self.children.merge(&other.children),
            latest_controls: self.latest_controls.merge(&other.latest_controls),
            counters: self.counters.merge(&other.counters),
        }
    }
}
