use indexmap::IndexMap;
use serde::Serialize;

/// Header line used when the input does not start with a recognized one.
pub const DEFAULT_HEADER: &str = "graph TD";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagramType {
    #[default]
    FlowchartTopDown,
    FlowchartLeftRight,
    Sequence,
    Mindmap,
    Pie,
    Gantt,
    Journey,
    Class,
    State,
    EntityRelationship,
}

impl DiagramType {
    /// Recognizes a header line. The keyword is matched case-insensitively and must be a
    /// whole word, so `pieces[...]` is not a pie chart.
    pub fn from_header(line: &str) -> Option<Self> {
        let lower = line.trim().to_ascii_lowercase();
        let keyword_end = lower
            .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '-'))
            .unwrap_or(lower.len());
        let (keyword, rest) = lower.split_at(keyword_end);
        match keyword {
            "graph" | "flowchart" => {
                let direction: String = rest
                    .trim_start()
                    .chars()
                    .take_while(|ch| ch.is_ascii_alphanumeric())
                    .collect();
                match direction.as_str() {
                    "lr" | "rl" => Some(Self::FlowchartLeftRight),
                    _ => Some(Self::FlowchartTopDown),
                }
            }
            "sequencediagram" => Some(Self::Sequence),
            "mindmap" => Some(Self::Mindmap),
            "pie" => Some(Self::Pie),
            "gantt" => Some(Self::Gantt),
            "journey" => Some(Self::Journey),
            "classdiagram" | "classdiagram-v2" => Some(Self::Class),
            "statediagram" | "statediagram-v2" => Some(Self::State),
            "erdiagram" => Some(Self::EntityRelationship),
            _ => None,
        }
    }

    pub fn is_flowchart(self) -> bool {
        matches!(self, Self::FlowchartTopDown | Self::FlowchartLeftRight)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphEdge {
    pub id: String,
    pub source_id: String,
    pub target_id: String,
}

/// Node/edge graph recovered from diagram text.
///
/// Nodes keep their insertion order, which the layout uses for vertical placement.
/// Edges can only be added between nodes that already exist.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Graph {
    nodes: IndexMap<String, GraphNode>,
    edges: Vec<GraphEdge>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a node unless the id is already taken. Returns whether it was inserted.
    pub fn add_node(&mut self, id: &str, label: impl Into<String>) -> bool {
        if self.nodes.contains_key(id) {
            return false;
        }
        self.nodes.insert(
            id.to_string(),
            GraphNode {
                id: id.to_string(),
                label: label.into(),
            },
        );
        true
    }

    /// Adds a directed edge. Edges with an unknown endpoint are refused.
    pub fn add_edge(&mut self, source_id: &str, target_id: &str) -> Option<&GraphEdge> {
        if !self.contains_node(source_id) || !self.contains_node(target_id) {
            return None;
        }
        let id = format!("edge-{}", self.edges.len());
        self.edges.push(GraphEdge {
            id,
            source_id: source_id.to_string(),
            target_id: target_id.to_string(),
        });
        self.edges.last()
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionedGraph {
    pub graph: Graph,
    pub positions: IndexMap<String, Point>,
}

impl PositionedGraph {
    pub fn position(&self, id: &str) -> Option<Point> {
        self.positions.get(id).copied()
    }
}
