use topograph_core::{Report, TopologyKind};

use super::{RenderContext, Rendered, Renderer};

/// Passes one topology's nodes through unchanged.
#[derive(Debug, Clone, Copy)]
pub struct TopologySelector(pub TopologyKind);

impl Renderer for TopologySelector {
    fn render(&self, _ctx: &RenderContext, report: &Report) -> Rendered {
        Rendered::new(report.topology(self.0).nodes.clone())
    }
}
