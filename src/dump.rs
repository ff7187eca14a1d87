use crate::fallback::{RenderKind, RenderResult, Rendered, Transition};
use crate::repair::RepairEvent;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Flat JSON view of a finished render.
#[derive(Debug, Serialize)]
pub struct RenderDump<'a> {
    pub kind: RenderKind,
    pub valid: bool,
    pub repairs: &'a [RepairEvent],
    pub transitions: &'a [Transition],
    /// Engine SVG or fallback text; absent for the generic graph view.
    pub content: Option<&'a str>,
    pub nodes: Vec<NodeDump<'a>>,
    pub edges: Vec<EdgeDump<'a>>,
}

#[derive(Debug, Serialize)]
pub struct NodeDump<'a> {
    pub id: &'a str,
    pub label: &'a str,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Serialize)]
pub struct EdgeDump<'a> {
    pub id: &'a str,
    pub from: &'a str,
    pub to: &'a str,
}

impl<'a> RenderDump<'a> {
    pub fn from_rendered(rendered: &'a Rendered) -> Self {
        let mut dump = Self {
            kind: rendered.kind(),
            valid: rendered.valid,
            repairs: &rendered.repairs,
            transitions: &rendered.transitions,
            content: None,
            nodes: Vec::new(),
            edges: Vec::new(),
        };

        match &rendered.result {
            RenderResult::PrimaryEngine(content) | RenderResult::TextFallback(content) => {
                dump.content = Some(content.as_str());
            }
            RenderResult::GenericGraph(positioned) => {
                dump.nodes = positioned
                    .graph
                    .nodes()
                    .filter_map(|node| {
                        let point = positioned.position(&node.id)?;
                        Some(NodeDump {
                            id: &node.id,
                            label: &node.label,
                            x: point.x,
                            y: point.y,
                        })
                    })
                    .collect();
                dump.edges = positioned
                    .graph
                    .edges()
                    .iter()
                    .map(|edge| EdgeDump {
                        id: &edge.id,
                        from: &edge.source_id,
                        to: &edge.target_id,
                    })
                    .collect();
            }
        }

        dump
    }
}

pub fn render_dump_json(rendered: &Rendered) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(&RenderDump::from_rendered(rendered))?)
}

pub fn write_render_dump(path: Option<&Path>, rendered: &Rendered) -> anyhow::Result<()> {
    let dump = RenderDump::from_rendered(rendered);
    match path {
        Some(path) => {
            let writer = BufWriter::new(File::create(path)?);
            serde_json::to_writer_pretty(writer, &dump)?;
        }
        None => println!("{}", serde_json::to_string_pretty(&dump)?),
    }
    Ok(())
}
