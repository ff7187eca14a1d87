use crate::config::LayoutConfig;
#[cfg(feature = "png")]
use crate::config::RenderConfig;
use crate::fallback::RenderResult;
use crate::ir::{GraphEdge, Point, PositionedGraph};
use crate::theme::Theme;
use anyhow::Result;
use std::path::Path;

const CANVAS_MARGIN: f32 = 40.0;
const LANE_OFFSET: f32 = 24.0;
const LANE_SPACING: f32 = 14.0;
const TEXT_WRAP: usize = 64;
const TEXT_PADDING: f32 = 16.0;

/// Produces the SVG shown for any finished render.
pub fn render_result_svg(result: &RenderResult, theme: &Theme, config: &LayoutConfig) -> String {
    match result {
        RenderResult::PrimaryEngine(svg) => svg.clone(),
        RenderResult::GenericGraph(positioned) => render_graph_svg(positioned, theme, config),
        RenderResult::TextFallback(text) => render_text_svg(text, theme),
    }
}

/// Draws a positioned graph as boxes in a column.
///
/// Positions are box centres. Edges between neighbouring rows are straight; every other
/// edge (skips, back edges, self loops) is routed through its own lane right of the column.
pub fn render_graph_svg(positioned: &PositionedGraph, theme: &Theme, config: &LayoutConfig) -> String {
    let half_w = config.node_width / 2.0;
    let half_h = config.node_height / 2.0;

    let mut paths = Vec::new();
    let mut lanes = 0usize;
    for edge in positioned.graph.edges() {
        let Some(points) = edge_points(positioned, edge, config, &mut lanes) else {
            continue;
        };
        paths.push(points);
    }

    let right = positioned
        .positions
        .values()
        .map(|p| p.x + half_w)
        .fold(0.0f32, f32::max);
    let bottom = positioned
        .positions
        .values()
        .map(|p| p.y + half_h)
        .fold(0.0f32, f32::max);
    let width = (right + LANE_OFFSET + lanes as f32 * LANE_SPACING + CANVAS_MARGIN).max(200.0);
    let height = (bottom + CANVAS_MARGIN).max(200.0);

    let mut svg = String::new();
    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\">",
    ));
    svg.push_str(&format!(
        "<rect width=\"100%\" height=\"100%\" fill=\"{}\"/>",
        theme.background
    ));
    svg.push_str("<defs>");
    svg.push_str(&format!(
        "<marker id=\"arrow\" viewBox=\"0 0 10 10\" refX=\"10\" refY=\"5\" markerWidth=\"6\" markerHeight=\"6\" orient=\"auto-start-reverse\"><path d=\"M 0 0 L 10 5 L 0 10 z\" fill=\"{}\"/></marker>",
        theme.line_color
    ));
    svg.push_str("</defs>");

    for points in &paths {
        svg.push_str(&format!(
            "<path d=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"1.4\" marker-end=\"url(#arrow)\"/>",
            points_to_path(points),
            theme.line_color
        ));
    }

    for node in positioned.graph.nodes() {
        let Some(center) = positioned.position(&node.id) else {
            continue;
        };
        svg.push_str(&format!(
            "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" rx=\"10\" ry=\"10\" fill=\"{}\" stroke=\"{}\" stroke-width=\"1.4\"/>",
            center.x - half_w,
            center.y - half_h,
            config.node_width,
            config.node_height,
            theme.node_fill,
            theme.node_border
        ));
        svg.push_str(&format!(
            "<text x=\"{:.2}\" y=\"{:.2}\" text-anchor=\"middle\" dominant-baseline=\"central\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\">{}</text>",
            center.x,
            center.y,
            escape_xml(&theme.font_family),
            theme.font_size,
            theme.node_text_color,
            escape_xml(&node.label)
        ));
    }

    svg.push_str("</svg>");
    svg
}

fn edge_points(
    positioned: &PositionedGraph,
    edge: &GraphEdge,
    config: &LayoutConfig,
    lanes: &mut usize,
) -> Option<Vec<Point>> {
    let source_row = positioned.positions.get_index_of(&edge.source_id)?;
    let target_row = positioned.positions.get_index_of(&edge.target_id)?;
    let source = positioned.position(&edge.source_id)?;
    let target = positioned.position(&edge.target_id)?;
    let half_w = config.node_width / 2.0;
    let half_h = config.node_height / 2.0;

    if target_row == source_row + 1 {
        return Some(vec![
            Point { x: source.x, y: source.y + half_h },
            Point { x: target.x, y: target.y - half_h },
        ]);
    }

    let lane_x = source.x.max(target.x) + half_w + LANE_OFFSET + *lanes as f32 * LANE_SPACING;
    *lanes += 1;
    let (start_y, end_y) = if source_row == target_row {
        (source.y - half_h / 2.0, target.y + half_h / 2.0)
    } else {
        (source.y, target.y)
    };
    Some(vec![
        Point { x: source.x + half_w, y: start_y },
        Point { x: lane_x, y: start_y },
        Point { x: lane_x, y: end_y },
        Point { x: target.x + half_w, y: end_y },
    ])
}

/// Shows diagram text in a note box, wrapped to a readable width.
pub fn render_text_svg(text: &str, theme: &Theme) -> String {
    let lines = wrap_lines(text, TEXT_WRAP);
    let char_width = theme.font_size * 0.6;
    let line_height = theme.font_size * 1.5;
    let longest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
    let box_w = (longest as f32 * char_width + TEXT_PADDING * 2.0).max(160.0);
    let box_h = lines.len().max(1) as f32 * line_height + TEXT_PADDING * 2.0;
    let width = box_w + CANVAS_MARGIN;
    let height = box_h + CANVAS_MARGIN;
    let origin = CANVAS_MARGIN / 2.0;

    let mut svg = String::new();
    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\">",
    ));
    svg.push_str(&format!(
        "<rect width=\"100%\" height=\"100%\" fill=\"{}\"/>",
        theme.background
    ));
    svg.push_str(&format!(
        "<rect x=\"{origin}\" y=\"{origin}\" width=\"{box_w:.2}\" height=\"{box_h:.2}\" rx=\"6\" ry=\"6\" fill=\"{}\" stroke=\"{}\" stroke-width=\"1\"/>",
        theme.text_fallback_fill,
        theme.text_fallback_border
    ));

    let x = origin + TEXT_PADDING;
    let start_y = origin + TEXT_PADDING + theme.font_size;
    svg.push_str(&format!(
        "<text x=\"{x:.2}\" y=\"{start_y:.2}\" font-family=\"monospace\" font-size=\"{}\" fill=\"{}\" xml:space=\"preserve\">",
        theme.font_size,
        theme.text_fallback_color
    ));
    for (idx, line) in lines.iter().enumerate() {
        let dy = if idx == 0 { 0.0 } else { line_height };
        svg.push_str(&format!(
            "<tspan x=\"{x:.2}\" dy=\"{dy:.2}\">{}</tspan>",
            escape_xml(line)
        ));
    }
    svg.push_str("</text></svg>");
    svg
}

fn wrap_lines(text: &str, width: usize) -> Vec<String> {
    let mut out = Vec::new();
    for line in text.lines() {
        let chars: Vec<char> = line.chars().collect();
        if chars.is_empty() {
            out.push(String::new());
            continue;
        }
        for chunk in chars.chunks(width) {
            out.push(chunk.iter().collect());
        }
    }
    out
}

fn points_to_path(points: &[Point]) -> String {
    let Some((first, rest)) = points.split_first() else {
        return String::new();
    };
    let mut d = format!("M {:.2} {:.2}", first.x, first.y);
    for point in rest {
        d.push_str(&format!(" L {:.2} {:.2}", point.x, point.y));
    }
    d
}

pub fn write_output_svg(svg: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, svg)?;
        }
        None => {
            print!("{}", svg);
        }
    }
    Ok(())
}

#[cfg(feature = "png")]
pub fn write_output_png(svg: &str, output: &Path, render_cfg: &RenderConfig) -> Result<()> {
    let mut opt = usvg::Options::default();
    opt.default_size = usvg::Size::from_wh(render_cfg.width, render_cfg.height)
        .ok_or_else(|| anyhow::anyhow!("Invalid output size"))?;
    opt.fontdb_mut().load_system_fonts();

    let tree = usvg::Tree::from_str(svg, &opt)?;
    let size = tree.size().to_int_size();
    let mut pixmap = resvg::tiny_skia::Pixmap::new(size.width(), size.height())
        .ok_or_else(|| anyhow::anyhow!("Failed to allocate pixmap"))?;

    let mut pixmap_mut = pixmap.as_mut();
    resvg::render(&tree, resvg::tiny_skia::Transform::default(), &mut pixmap_mut);
    pixmap.save_png(output)?;
    Ok(())
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Graph;
    use crate::layout::compute_layout;

    fn sample() -> PositionedGraph {
        let mut graph = Graph::new();
        graph.add_node("A", "Alpha");
        graph.add_node("B", "Beta");
        graph.add_node("C", "Gamma");
        graph.add_edge("A", "B");
        graph.add_edge("A", "C");
        graph.add_edge("C", "A");
        compute_layout(graph, &LayoutConfig::default())
    }

    #[test]
    fn render_graph_svg_basic() {
        let svg = render_graph_svg(&sample(), &Theme::modern(), &LayoutConfig::default());
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains(">Alpha</text>"));
        assert!(svg.contains(">Gamma</text>"));
        assert_eq!(svg.matches("marker-end").count(), 3);
    }

    #[test]
    fn neighbour_edges_are_straight() {
        let positioned = sample();
        let config = LayoutConfig::default();
        let mut lanes = 0;
        let straight = edge_points(&positioned, &positioned.graph.edges()[0], &config, &mut lanes).unwrap();
        assert_eq!(straight.len(), 2);
        assert_eq!(straight[0].x, straight[1].x);
        assert_eq!(lanes, 0);

        let skip = edge_points(&positioned, &positioned.graph.edges()[1], &config, &mut lanes).unwrap();
        let back = edge_points(&positioned, &positioned.graph.edges()[2], &config, &mut lanes).unwrap();
        assert_eq!(skip.len(), 4);
        assert_eq!(lanes, 2);
        assert!(back[1].x > skip[1].x);
    }

    #[test]
    fn empty_graph_still_renders() {
        let positioned = compute_layout(Graph::new(), &LayoutConfig::default());
        let svg = render_graph_svg(&positioned, &Theme::mermaid_default(), &LayoutConfig::default());
        assert!(svg.contains("width=\"200\""));
    }

    #[test]
    fn text_svg_escapes_and_wraps() {
        let text = format!("graph TD\nA[<b>] & {}", "x".repeat(100));
        let svg = render_text_svg(&text, &Theme::mermaid_default());
        assert!(svg.contains("A[&lt;b&gt;] &amp; "));
        assert_eq!(svg.matches("<tspan").count(), 3);
    }

    #[test]
    fn engine_svg_passes_through() {
        let result = RenderResult::PrimaryEngine("<svg id=\"x\"/>".to_string());
        let svg = render_result_svg(&result, &Theme::modern(), &LayoutConfig::default());
        assert_eq!(svg, "<svg id=\"x\"/>");
    }
}
