use crate::ir::Graph;
use crate::label::display_label;
use crate::repair::ARROW;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

static NODE_DECL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Za-z0-9_]+)\[([^\[\]\n]*)").unwrap());
static LEADING_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:\|[^|]*\|\s*)?([A-Za-z0-9_]+)").unwrap());
static IMPLICIT_NODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:\|[^|]*\|\s*)?([A-Za-z0-9_]+)\s*(?:[({]+([^)}]*)[)}]*)?\s*$").unwrap()
});

/// Recovers a node/edge graph from diagram text without requiring it to be valid.
///
/// Nodes come from every `id[label` occurrence in document order (first one wins) and,
/// for complete edges, from sides that are a bare id or an id with a round/curly shape.
/// Edges are only kept when both endpoints are known nodes.
pub fn extract_graph(text: &str) -> Graph {
    let mut graph = Graph::new();

    // Labels never span an arrow, so an unclosed label stops at the next edge token.
    for segment in text.lines().flat_map(|line| line.split(ARROW)) {
        for caps in NODE_DECL_RE.captures_iter(segment) {
            let (Some(id), Some(raw)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            graph.add_node(id.as_str(), node_label(id.as_str(), raw.as_str()));
        }
    }

    for line in text.lines().filter(|line| line.contains(ARROW)) {
        let sides: Vec<&str> = line.split(ARROW).collect();
        for pair in sides.windows(2) {
            let (source, target) = (pair[0], pair[1]);
            let (Some(source_id), Some(target_id)) = (leading_id(source), leading_id(target))
            else {
                continue;
            };
            if resolves(&graph, source_id, source) && resolves(&graph, target_id, target) {
                register_implicit(&mut graph, source);
                register_implicit(&mut graph, target);
            }
            if graph.add_edge(source_id, target_id).is_none() {
                debug!(
                    source = source_id,
                    target = target_id;
                    "dropping edge with unknown endpoint"
                );
            }
        }
    }

    graph
}

fn node_label(id: &str, raw: &str) -> String {
    let label = display_label(raw);
    if label.is_empty() { id.to_string() } else { label }
}

fn leading_id(side: &str) -> Option<&str> {
    LEADING_ID_RE
        .captures(side)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn resolves(graph: &Graph, id: &str, side: &str) -> bool {
    graph.contains_node(id) || IMPLICIT_NODE_RE.is_match(side)
}

fn register_implicit(graph: &mut Graph, side: &str) {
    let Some(caps) = IMPLICIT_NODE_RE.captures(side) else {
        return;
    };
    let Some(id) = caps.get(1).map(|m| m.as_str()) else {
        return;
    };
    let raw = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
    graph.add_node(id, node_label(id, raw));
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ids(graph: &Graph) -> Vec<&str> {
        graph.nodes().map(|node| node.id.as_str()).collect()
    }

    #[test]
    fn extracts_declared_nodes_and_edges() {
        let graph = extract_graph("graph TD\nA[Start] --> B[Middle]\nB --> C[End]");
        assert_eq!(ids(&graph), vec!["A", "B", "C"]);
        assert_eq!(graph.edges().len(), 2);
        assert_eq!(graph.edges()[1].source_id, "B");
        assert_eq!(graph.edges()[1].target_id, "C");
        assert_eq!(graph.node("B").unwrap().label, "Middle");
    }

    #[test]
    fn bare_edge_endpoints_become_nodes() {
        let graph = extract_graph("A[Emoji 🎯] --> B");
        assert_eq!(ids(&graph), vec!["A", "B"]);
        assert_eq!(graph.node("A").unwrap().label, "Emoji");
        assert_eq!(graph.node("B").unwrap().label, "B");
        assert_eq!(graph.edges().len(), 1);
    }

    #[test]
    fn shaped_endpoints_use_their_text() {
        let graph = extract_graph("graph TD\nA --> B(Round one)\nB --> C{Decide?}");
        assert_eq!(graph.node("B").unwrap().label, "Round one");
        assert_eq!(graph.node("C").unwrap().label, "Decide?");
        assert_eq!(graph.edges().len(), 2);
    }

    #[test]
    fn first_declaration_wins() {
        let graph = extract_graph("A[First]\nA[Second]");
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.node("A").unwrap().label, "First");
    }

    #[test]
    fn drops_edges_to_unknown_nodes() {
        let graph = extract_graph("A[Start]\nA --> the next step");
        assert_eq!(ids(&graph), vec!["A"]);
        assert!(graph.edges().is_empty());
    }

    #[test]
    fn prose_yields_empty_graph() {
        let graph = extract_graph("First you gather data, then you analyse it.");
        assert!(graph.is_empty());
        assert!(graph.edges().is_empty());
    }

    #[test]
    fn pipe_labels_are_skipped_on_targets() {
        let graph = extract_graph("A[Ask] -->|Yes| B[Go]\nA -->|No|C");
        assert_eq!(ids(&graph), vec!["A", "B", "C"]);
        assert_eq!(graph.edges()[1].target_id, "C");
    }

    #[test]
    fn labels_are_truncated_for_display() {
        let graph = extract_graph(&format!("A[{}]", "x".repeat(80)));
        assert_eq!(graph.node("A").unwrap().label.len(), 40);
    }

    #[test]
    fn unclosed_labels_still_count() {
        let graph = extract_graph("A[Start --> B[End]");
        assert_eq!(ids(&graph), vec!["A", "B"]);
        assert_eq!(graph.node("A").unwrap().label, "Start");
        assert_eq!(graph.edges().len(), 1);
    }

    proptest! {
        #[test]
        fn edges_never_dangle(input in "[A-Za-z0-9_\\[\\]\\(\\)|>\\- \n]{0,160}") {
            let graph = extract_graph(&input);
            for edge in graph.edges() {
                prop_assert!(graph.contains_node(&edge.source_id));
                prop_assert!(graph.contains_node(&edge.target_id));
            }
        }
    }
}
