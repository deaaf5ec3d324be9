use std::collections::BTreeMap;

use crate::config::LayoutConfig;

use super::Layout;

pub const EMPTY_MESSAGE: &str = "No persons to display";

/// Layout for an empty person collection: floor-sized canvas, no nodes, and a
/// message for the painter.
pub(super) fn compute_empty_layout(config: &LayoutConfig, canvas: (f32, f32)) -> Layout {
    let (width, height) = config.canvas_extent(canvas.0, canvas.1);
    Layout {
        nodes: BTreeMap::new(),
        couples: Vec::new(),
        links: Vec::new(),
        width,
        height,
        canvas_width: width,
        canvas_height: height,
        message: Some(EMPTY_MESSAGE.to_string()),
    }
}
