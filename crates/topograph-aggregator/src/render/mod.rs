//! Composable renderers turning the accumulated report into view graphs.
//!
//! Every renderer is a pure function of its input report: no caches, no
//! interior mutability, and only ordered maps, so rendering the same report
//! twice yields identical output.

mod filter;
mod join;
mod map;
mod selection;
mod view;
mod views;

pub use filter::{has_latest, FilterRenderer};
pub use join::{JoinKey, JoinRenderer};
pub use map::{map_to_parents, MapRenderer};
pub use selection::TopologySelector;
pub use view::NodeView;
pub use views::Views;

use std::collections::BTreeMap;
use topograph_core::{Node, Nodes, Report};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderContext {
    /// Whether admin-category controls may be offered.
    pub admin_controls: bool,
}

impl Default for RenderContext {
    fn default() -> Self {
        Self {
            admin_controls: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendered {
    pub nodes: Nodes,
    /// Nodes removed by filters along the way.
    pub filtered: usize,
}

impl Rendered {
    pub fn new(nodes: Nodes) -> Self {
        Self { nodes, filtered: 0 }
    }

    pub fn merge(&self, other: &Rendered) -> Rendered {
        Rendered {
            nodes: self.nodes.merge(&other.nodes),
            filtered: self.filtered + other.filtered,
        }
    }
}

pub trait Renderer: Send + Sync {
    fn render(&self, ctx: &RenderContext, report: &Report) -> Rendered;
}

/// Merges the outputs of several renderers.
pub struct Reduce(pub Vec<Box<dyn Renderer>>);

impl Renderer for Reduce {
    fn render(&self, ctx: &RenderContext, report: &Report) -> Rendered {
        self.0
            .iter()
            .map(|r| r.render(ctx, report))
            .fold(Rendered::default(), |acc, r| acc.merge(&r))
    }
}

/// Sets each rollup counter to the number of children of that topology.
pub(crate) fn count_children(node: Node) -> Node {
    if node.children.is_empty() {
        return node;
    }
    let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
    for child in node.children.values() {
        *counts.entry(child.topology.as_str()).or_default() += 1;
    }
    let counters = counts
        .into_iter()
        .filter(|(topology, _)| !topology.is_empty())
        .fold(node.counters.clone(), |c, (topology, n)| c.set(topology, n));
    Node { counters, ..node }
}
