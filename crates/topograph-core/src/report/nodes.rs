use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::merge::merge_maps;
use super::node::Node;

/// Nodes keyed by ID. Used both for a topology's nodes and a node's children.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Nodes(BTreeMap<String, Node>);

impl Nodes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.0.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.0.iter().map(|(id, n)| (id.as_str(), n))
    }

    pub fn values(&self) -> impl Iterator<Item = &Node> {
        self.0.values()
    }

    /// Inserts `node`, merging with any node already held under its ID.
    pub fn insert(&mut self, node: Node) {
        match self.0.get_mut(&node.id) {
            Some(existing) => *existing = existing.merge(&node),
            None => {
                self.0.insert(node.id.clone(), node);
            }
        }
    }

    pub fn add(mut self, node: Node) -> Self {
        self.insert(node);
        self
    }

    pub fn remove(&mut self, id: &str) -> Option<Node> {
        self.0.remove(id)
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&Node) -> bool) {
        self.0.retain(|_, n| keep(n));
    }

    pub fn merge(&self, other: &Nodes) -> Nodes {
        Nodes(merge_maps(&self.0, &other.0, Node::merge))
    }

    /// Raw map access for validation of deserialised reports.
    pub(crate) fn entries(&self) -> &BTreeMap<String, Node> {
        &self.0
    }

    pub(crate) fn map_nodes(&self, f: impl Fn(&Node) -> Option<Node>) -> Nodes {
        Nodes(
            self.0
                .iter()
                .filter_map(|(id, n)| f(n).map(|n| (id.clone(), n)))
                .collect(),
        )
    }
}

impl FromIterator<Node> for Nodes {
    fn from_iter<I: IntoIterator<Item = Node>>(iter: I) -> Self {
        iter.into_iter().fold(Nodes::new(), Nodes::add)
    }
}

impl IntoIterator for Nodes {
    type Item = Node;
    type IntoIter = std::collections::btree_map::IntoValues<String, Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn insert_merges_on_collision() {
        let ts = datetime!(2024-01-01 00:00:00 UTC);
        let mut nodes = Nodes::new();
        nodes.insert(Node::new("a").with_latest("state", ts, "up"));
        nodes.insert(Node::new("a").with_adjacent("b"));
        nodes.insert(Node::new("b"));

        assert_eq!(nodes.len(), 2);
        let a = nodes.get("a").expect("node a");
        assert_eq!(a.lookup("state"), Some("up"));
        assert!(a.adjacency.contains("b"));
    }

    #[test]
    fn merge_unions_ids() {
        let left: Nodes = [Node::new("a"), Node::new("b")].into_iter().collect();
        let right: Nodes = [Node::new("b").with_adjacent("a"), Node::new("c")]
            .into_iter()
            .collect();

        let merged = left.merge(&right);
        assert_eq!(merged.ids().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert!(merged.get("b").is_some_and(|b| b.adjacency.contains("a")));
        assert_eq!(merged, right.merge(&left));
    }
}
