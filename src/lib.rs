#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod dump;
pub mod engine;
pub mod extract;
pub mod fallback;
pub mod fence;
pub mod ir;
pub mod label;
pub mod layout;
pub mod render;
pub mod repair;
pub mod theme;

#[cfg(feature = "cli")]
pub use cli::{Args, run};
pub use config::{Config, LayoutConfig, load_config};
pub use engine::{CommandEngine, EngineError, PrimaryEngine};
pub use extract::extract_graph;
pub use fallback::{Orchestrator, RenderKind, RenderResult, RenderState, Rendered};
pub use fence::{extract_diagram_sources, extract_mermaid_blocks};
pub use ir::{DiagramType, Graph, PositionedGraph};
pub use label::{display_label, sanitize_label};
pub use layout::compute_layout;
pub use render::{render_graph_svg, render_result_svg, render_text_svg};
pub use repair::{RepairEvent, RepairKind, SanitizedDiagram, validate_and_sanitize};
pub use theme::Theme;
