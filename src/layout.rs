use crate::config::LayoutConfig;
use crate::ir::{Graph, Point, PositionedGraph};
use log::debug;

/// Places every node of `graph` in a single column, in discovery order.
///
/// Node `i` sits at `origin_x` and `origin_y + i * row_height`. The row height never drops
/// below `node_height + min_row_gap`, so node boxes cannot overlap whatever the config says.
pub fn compute_layout(graph: Graph, config: &LayoutConfig) -> PositionedGraph {
    let row_height = effective_row_height(config);
    let positions = graph
        .nodes()
        .enumerate()
        .map(|(idx, node)| {
            let point = Point {
                x: config.origin_x,
                y: config.origin_y + idx as f32 * row_height,
            };
            (node.id.clone(), point)
        })
        .collect();

    debug!(
        nodes = graph.node_count(),
        edges = graph.edges().len(),
        row_height;
        "computed linear layout"
    );

    PositionedGraph { graph, positions }
}

pub fn effective_row_height(config: &LayoutConfig) -> f32 {
    config
        .row_height
        .max(config.node_height + config.min_row_gap)
        .max(1.0)
}
