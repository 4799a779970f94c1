use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use topograph_core::{
    ids, keys, Control, MetadataRow, Node, Report, Table, Topology, TopologyKind,
};

use super::RenderContext;

/// A rendered node as handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeView {
    pub id: String,
    pub topology: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub shape: String,
    pub latest: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parents: BTreeMap<String, Vec<String>>,
    pub adjacency: Vec<String>,
    pub children: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub counters: BTreeMap<String, u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metadata: Vec<MetadataRow>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tables: Vec<Table>,
    pub controls: Vec<Control>,
}

fn node_kind(node: &Node) -> Option<TopologyKind> {
    node.topology
        .parse()
        .ok()
        .or_else(|| TopologyKind::from_node_id(&node.id))
}

fn label_for(node: &Node) -> String {
    node.lookup(keys::NAME)
        .or_else(|| node.lookup(keys::HOST_NAME))
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .or_else(|| ids::parse_node_id(&node.id).map(|(key, _)| key.to_string()))
        .unwrap_or_else(|| node.id.clone())
}

impl NodeView {
    pub fn build(ctx: &RenderContext, report: &Report, node: &Node) -> NodeView {
        let empty = Topology::default();
        let kind = node_kind(node);
        let topology = kind.map_or(&empty, |k| report.topology(k));

        let registry = if ctx.admin_controls {
            topology.controls.copy()
        } else {
            topology.controls.disable_admin_controls()
        };
        let mut controls: Vec<Control> = node
            .active_controls()
            .filter_map(|id| registry.get(id).cloned())
            .collect();
        controls.sort_by(|a, b| a.rank.cmp(&b.rank).then_with(|| a.id.cmp(&b.id)));

        let parents = node
            .sets
            .iter()
            .filter_map(|(key, values)| {
                key.strip_prefix(keys::PARENTS_PREFIX)
                    .map(|t| (t.to_string(), values.iter().cloned().collect()))
            })
            .collect();

        NodeView {
            id: node.id.clone(),
            topology: kind.map(|k| k.as_str().to_string()).unwrap_or_default(),
            label: label_for(node),
            shape: topology.shape.clone(),
            latest: node
                .latest
                .iter()
                .filter(|(k, _)| !k.starts_with(keys::ORIGIN_SEEN_PREFIX))
                .map(|(k, e)| (k.to_string(), e.value.clone()))
                .collect(),
            parents,
            adjacency: node.adjacency.iter().map(str::to_string).collect(),
            children: node.children.ids().map(str::to_string).collect(),
            counters: node.counters.iter().map(|(k, v)| (k.to_string(), v)).collect(),
            metadata: topology.metadata_templates.rows(node),
            tables: topology.table_templates.tables(node),
            controls,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;
    use topograph_core::{Controls, NodeControlData, ADMIN_CONTROL};

    fn control(id: &str, category: &str, rank: i32) -> Control {
        Control {
            id: id.to_string(),
            human: id.to_string(),
            category: category.to_string(),
            icon: String::new(),
            confirmation: None,
            rank,
        }
    }

    fn report_with_pod() -> (Report, Node) {
        let ts = datetime!(2024-07-01 00:00:00 UTC);
        let controls: Controls = [
            control("delete_pod", ADMIN_CONTROL, 1),
            control("get_logs", "", 0),
            control("describe", "", 2),
        ]
        .into_iter()
        .collect();
        let node = Node::new(ids::make_pod_node_id("u1"))
            .with_topology("pod")
            .with_latest(keys::NAME, ts, "web-0")
            .with_parent("deployment", "web;<deployment>")
            .with_latest_active_controls(ts, ["get_logs", "delete_pod", "describe"])
            .with_latest_control("describe", ts, NodeControlData { dead: true });

        let mut report = Report::default();
        let pods = report.topology_mut(TopologyKind::Pod);
        *pods = pods.clone().with_controls(&controls);
        pods.add_node(node.clone());
        (report, node)
    }

    #[test]
    fn controls_respect_admin_flag_and_dead_state() {
        let (report, node) = report_with_pod();

        let view = NodeView::build(&RenderContext::default(), &report, &node);
        let ids: Vec<_> = view.controls.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["get_logs", "delete_pod"]);

        let restricted = RenderContext {
            admin_controls: false,
        };
        let view = NodeView::build(&restricted, &report, &node);
        let ids: Vec<_> = view.controls.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["get_logs"]);
    }

    #[test]
    fn view_exposes_label_parents_and_shape() {
        let (report, node) = report_with_pod();
        let view = NodeView::build(&RenderContext::default(), &report, &node);

        assert_eq!(view.label, "web-0");
        assert_eq!(view.topology, "pod");
        assert_eq!(view.shape, "heptagon");
        assert_eq!(
            view.parents.get("deployment"),
            Some(&vec!["web;<deployment>".to_string()])
        );
        assert_eq!(view.latest.get(keys::NAME).map(String::as_str), Some("web-0"));

        let bare = Node::new("10.0.0.1;<host>");
        assert_eq!(NodeView::build(&RenderContext::default(), &report, &bare).label, "10.0.0.1");
    }
}
