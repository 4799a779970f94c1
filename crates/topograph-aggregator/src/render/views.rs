use std::collections::BTreeMap;
use topograph_core::{ids, keys, Report, TopologyKind};

use super::{
    has_latest, map_to_parents, FilterRenderer, JoinKey, JoinRenderer, MapRenderer, NodeView,
    Reduce, RenderContext, Renderer, TopologySelector,
};

/// The named views served to clients, built once at startup.
pub struct Views {
    views: BTreeMap<&'static str, Box<dyn Renderer>>,
}

fn grouped(child: TopologyKind, parent: TopologyKind) -> Box<dyn Renderer> {
    Box::new(Reduce(vec![
        Box::new(TopologySelector(parent)),
        Box::new(MapRenderer::new(TopologySelector(child), map_to_parents(parent))),
    ]))
}

impl Views {
    pub fn standard() -> Self {
        let mut views: BTreeMap<&'static str, Box<dyn Renderer>> = BTreeMap::new();

        views.insert("processes", Box::new(TopologySelector(TopologyKind::Process)));
        views.insert("containers", Box::new(TopologySelector(TopologyKind::Container)));
        views.insert("hosts", Box::new(TopologySelector(TopologyKind::Host)));
        views.insert("pods", Box::new(TopologySelector(TopologyKind::Pod)));
        views.insert(
            "deployments",
            grouped(TopologyKind::Pod, TopologyKind::Deployment),
        );
        views.insert(
            "containers-by-pod",
            grouped(TopologyKind::Container, TopologyKind::Pod),
        );
        views.insert(
            "processes-by-container",
            grouped(TopologyKind::Process, TopologyKind::Container),
        );
        views.insert(
            "persistent-volumes",
            Box::new(Reduce(vec![
                Box::new(JoinRenderer::new(
                    TopologySelector(TopologyKind::PersistentVolumeClaim),
                    FilterRenderer::new(
                        TopologySelector(TopologyKind::Pod),
                        has_latest(keys::VOLUME_POD),
                    ),
                    keys::VOLUME_CLAIM,
                    JoinKey::Latest(keys::NAME),
                )),
                Box::new(TopologySelector(TopologyKind::PersistentVolume)),
            ])),
        );
        views.insert(
            "cstor-volumes",
            Box::new(JoinRenderer::new(
                TopologySelector(TopologyKind::CstorVolume),
                TopologySelector(TopologyKind::CstorVolumeReplica),
                keys::CSTOR_VOLUME_NAME,
                JoinKey::Id(ids::make_cstor_volume_node_id),
            )),
        );
        views.insert(
            "cstor-pools",
            Box::new(JoinRenderer::new(
                TopologySelector(TopologyKind::CstorPool),
                TopologySelector(TopologyKind::CstorVolumeReplica),
                keys::CSTOR_POOL_UID,
                JoinKey::Id(ids::make_cstor_pool_node_id),
            )),
        );

        Self { views }
    }

    pub fn names(&self) -> Vec<String> {
        self.views.keys().map(|k| k.to_string()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&dyn Renderer> {
        self.views.get(name).map(|r| r.as_ref())
    }

    /// Renders `name` into display nodes plus the count of filtered nodes.
    pub fn render_view(
        &self,
        name: &str,
        ctx: &RenderContext,
        report: &Report,
    ) -> Option<(Vec<NodeView>, usize)> {
        let rendered = self.get(name)?.render(ctx, report);
        let nodes = rendered
            .nodes
            .values()
            .map(|node| NodeView::build(ctx, report, node))
            .collect();
        Some((nodes, rendered.filtered))
    }
}
