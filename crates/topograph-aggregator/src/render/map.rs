use smallvec::SmallVec;
use std::collections::BTreeMap;
use topograph_core::{IdList, Node, Nodes, Report, TopologyKind};

use super::{count_children, RenderContext, Rendered, Renderer};

/// Output of a map function: usually zero or one node, sometimes a few.
pub type Mapped = SmallVec<[Node; 1]>;

type MapFn = dyn Fn(&Report, &Node) -> Mapped + Send + Sync;

/// Replaces every input node by whatever the map function returns.
///
/// Outputs sharing an ID are merged, so grouping many inputs into one node
/// loses nothing and does not depend on iteration order. Adjacency is carried
/// over through the same mapping: an edge `a -> b` becomes edges from every
/// output of `a` to every output of `b`. Edges to inputs that map to nothing
/// disappear, as do edges a grouping turns into self-loops.
pub struct MapRenderer {
    input: Box<dyn Renderer>,
    map: Box<MapFn>,
}

impl MapRenderer {
    pub fn new<F>(input: impl Renderer + 'static, map: F) -> Self
    where
        F: Fn(&Report, &Node) -> Mapped + Send + Sync + 'static,
    {
        Self {
            input: Box::new(input),
            map: Box::new(map),
        }
    }
}

impl Renderer for MapRenderer {
    fn render(&self, ctx: &RenderContext, report: &Report) -> Rendered {
        let input = self.input.render(ctx, report);

        let mapped: Vec<(&Node, Mapped)> = input
            .nodes
            .values()
            .map(|node| (node, (self.map)(report, node)))
            .collect();
        let ids: BTreeMap<&str, SmallVec<[&str; 1]>> = mapped
            .iter()
            .map(|(src, outs)| (src.id.as_str(), outs.iter().map(|n| n.id.as_str()).collect()))
            .collect();

        let mut nodes = Nodes::new();
        for (src, outs) in &mapped {
            for out in outs {
                let rewired: IdList = src
                    .adjacency
                    .iter()
                    .filter_map(|adj| ids.get(adj))
                    .flatten()
                    .copied()
                    .filter(|id| *id != out.id)
                    .collect();
                nodes.insert(out.clone().with_adjacency(&rewired));
            }
        }

        Rendered {
            nodes: nodes.into_iter().map(count_children).collect(),
            filtered: input.filtered,
        }
    }
}

/// Replaces a node by its parents of topology `parent`, each carrying the
/// node as a child. Nodes without such a parent map to nothing.
pub fn map_to_parents(parent: TopologyKind) -> impl Fn(&Report, &Node) -> Mapped + Send + Sync {
    move |report, node| {
        let Some(parent_ids) = node.parents(parent.as_str()) else {
            return Mapped::new();
        };
        parent_ids
            .iter()
            .map(|id| {
                let base = match report.topology(parent).nodes.get(id) {
                    Some(known) => Node {
                        adjacency: IdList::new(),
                        children: Nodes::new(),
                        ..known.clone()
                    },
                    None => Node::new(id.as_str()).with_topology(parent.as_str()),
                };
                base.with_child(node.clone())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::TopologySelector;
    use time::macros::datetime;
    use topograph_core::{ids, keys};

    fn report() -> Report {
        let ts = datetime!(2024-07-01 00:00:00 UTC);
        let web = ids::make_deployment_node_id("web");
        let api = ids::make_deployment_node_id("api");
        let pod = |uid: &str, parent: &str| {
            Node::new(ids::make_pod_node_id(uid))
                .with_topology("pod")
                .with_parent("deployment", parent)
        };

        let mut report = Report::default();
        report
            .topology_mut(TopologyKind::Deployment)
            .add_node(
                Node::new(web.clone())
                    .with_topology("deployment")
                    .with_latest(keys::NAME, ts, "web"),
            );
        let pods = report.topology_mut(TopologyKind::Pod);
        pods.add_node(pod("w1", web.as_str()).with_adjacent(ids::make_pod_node_id("a1")));
        pods.add_node(pod("w2", web.as_str()).with_adjacent(ids::make_pod_node_id("w1")));
        pods.add_node(pod("a1", api.as_str()));
        pods.add_node(Node::new(ids::make_pod_node_id("bare")).with_topology("pod"));
        report
    }

    #[test]
    fn grouping_merges_children_and_rewires_edges() {
        let renderer = MapRenderer::new(
            TopologySelector(TopologyKind::Pod),
            map_to_parents(TopologyKind::Deployment),
        );
        let out = renderer.render(&RenderContext::default(), &report());

        let web = ids::make_deployment_node_id("web");
        let api = ids::make_deployment_node_id("api");
        assert_eq!(out.nodes.ids().collect::<Vec<_>>(), vec![api.as_str(), web.as_str()]);

        let web_node = out.nodes.get(&web).expect("web");
        assert_eq!(web_node.lookup(keys::NAME), Some("web"));
        assert_eq!(web_node.children.len(), 2);
        assert_eq!(web_node.counters.lookup("pod"), Some(2));
        // w1 -> a1 becomes web -> api; w2 -> w1 would be a self-loop
        assert_eq!(web_node.adjacency.iter().collect::<Vec<_>>(), vec![api.as_str()]);

        let api_node = out.nodes.get(&api).expect("api");
        assert_eq!(api_node.topology, "deployment");
        assert!(api_node.adjacency.is_empty());
    }

    #[test]
    fn output_does_not_depend_on_input_order() {
        let renderer = MapRenderer::new(
            TopologySelector(TopologyKind::Pod),
            map_to_parents(TopologyKind::Deployment),
        );
        let ctx = RenderContext::default();
        let first = renderer.render(&ctx, &report());
        let second = renderer.render(&ctx, &report().merge(&report()));
        assert_eq!(first, second);
    }
}
