use std::collections::BTreeSet;
use topograph_core::{Node, Nodes, Report};

use super::{RenderContext, Rendered, Renderer};

type Predicate = dyn Fn(&Nodes, &Node) -> bool + Send + Sync;

/// Keeps the nodes accepted by a predicate and strips every adjacency entry
/// and nested child that points at a removed node.
pub struct FilterRenderer {
    input: Box<dyn Renderer>,
    keep: Box<Predicate>,
}

impl FilterRenderer {
    /// `keep` sees the whole input graph as well as the node under test.
    pub fn new<F>(input: impl Renderer + 'static, keep: F) -> Self
    where
        F: Fn(&Nodes, &Node) -> bool + Send + Sync + 'static,
    {
        Self {
            input: Box::new(input),
            keep: Box::new(keep),
        }
    }
}

impl Renderer for FilterRenderer {
    fn render(&self, ctx: &RenderContext, report: &Report) -> Rendered {
        let input = self.input.render(ctx, report);

        let removed: BTreeSet<String> = input
            .nodes
            .values()
            .filter(|n| !(self.keep)(&input.nodes, *n))
            .map(|n| n.id.clone())
            .collect();
        if removed.is_empty() {
            return input;
        }

        let nodes: Nodes = input
            .nodes
            .values()
            .filter(|n| !removed.contains(&n.id))
            .map(|n| {
                let mut node = n.clone();
                node.adjacency = node.adjacency.retain(|id| !removed.contains(id));
                node.children.retain(|child| !removed.contains(child.id.as_str()));
                node
            })
            .collect();

        Rendered {
            nodes,
            filtered: input.filtered + removed.len(),
        }
    }
}

pub fn has_latest(key: &'static str) -> impl Fn(&Nodes, &Node) -> bool + Send + Sync {
    move |_, node| node.lookup(key).is_some_and(|v| !v.is_empty())
}
