use std::collections::BTreeMap;
use topograph_core::{keys, Nodes, Report};

use super::{count_children, RenderContext, Rendered, Renderer};

/// How a foreign-key value finds its parent node.
#[derive(Debug, Clone, Copy)]
pub enum JoinKey {
    /// The value is the durable key the parent ID is derived from.
    Id(fn(&str) -> String),
    /// The value must equal this latest key on the parent.
    Latest(&'static str),
}

/// Attaches child nodes to parent nodes through a foreign key.
///
/// Each child's `foreign_key` value (possibly several, joined with
/// [`keys::SCOPE_DELIM`]) names a parent. A found parent gains an edge to the
/// child and nests it for rollup display. Children stay in the output either
/// way; an empty or unresolved key just leaves the child unattached.
pub struct JoinRenderer {
    parents: Box<dyn Renderer>,
    children: Box<dyn Renderer>,
    foreign_key: &'static str,
    join: JoinKey,
}

impl JoinRenderer {
    pub fn new(
        parents: impl Renderer + 'static,
        children: impl Renderer + 'static,
        foreign_key: &'static str,
        join: JoinKey,
    ) -> Self {
        Self {
            parents: Box::new(parents),
            children: Box::new(children),
            foreign_key,
            join,
        }
    }
}

impl Renderer for JoinRenderer {
    fn render(&self, ctx: &RenderContext, report: &Report) -> Rendered {
        let parents = self.parents.render(ctx, report);
        let children = self.children.render(ctx, report);

        let index: BTreeMap<String, Vec<String>> = match self.join {
            JoinKey::Id(_) => BTreeMap::new(),
            JoinKey::Latest(key) => {
                let mut index: BTreeMap<String, Vec<String>> = BTreeMap::new();
                for node in parents.nodes.values() {
                    if let Some(value) = node.lookup(key).filter(|v| !v.is_empty()) {
                        index.entry(value.to_string()).or_default().push(node.id.clone());
                    }
                }
                index
            }
        };

        let mut joined = parents.nodes;
        for child in children.nodes.values() {
            let Some(value) = child.lookup(self.foreign_key) else {
                continue;
            };
            for fk in keys::split_values(value) {
                let targets = match self.join {
                    JoinKey::Id(make_id) => vec![make_id(fk)],
                    JoinKey::Latest(_) => index.get(fk).cloned().unwrap_or_default(),
                };
                for target in targets {
                    let Some(parent) = joined.remove(&target) else {
                        continue;
                    };
                    joined.insert(
                        parent
                            .with_adjacent(child.id.clone())
                            .with_child(child.clone()),
                    );
                }
            }
        }

        let nodes: Nodes = joined.into_iter().map(count_children).collect();
        Rendered {
            nodes: nodes.merge(&children.nodes),
            filtered: parents.filtered + children.filtered,
        }
    }
}
