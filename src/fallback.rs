//! Fallback orchestration for one diagram instance.
//!
//! A render walks three tiers in strict priority order: the primary engine, the generic
//! graph view built from a leniently extracted graph, and finally the diagram text itself.
//! Failures in a tier are never returned; they move the state machine to the next tier and
//! are kept in the [`Rendered`] record.

use crate::config::{Config, FallbackConfig, LayoutConfig};
use crate::engine::{EngineError, PrimaryEngine};
use crate::extract::extract_graph;
use crate::ir::PositionedGraph;
use crate::layout::compute_layout;
use crate::repair::{RepairEvent, validate_and_sanitize};
use log::debug;
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::time::timeout;

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RenderKind {
    PrimaryEngine,
    GenericGraph,
    TextFallback,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "content", rename_all = "kebab-case")]
pub enum RenderResult {
    /// SVG produced by the primary engine.
    PrimaryEngine(String),
    GenericGraph(PositionedGraph),
    TextFallback(String),
}

impl RenderResult {
    pub fn kind(&self) -> RenderKind {
        match self {
            Self::PrimaryEngine(_) => RenderKind::PrimaryEngine,
            Self::GenericGraph(_) => RenderKind::GenericGraph,
            Self::TextFallback(_) => RenderKind::TextFallback,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", content = "kind", rename_all = "kebab-case")]
pub enum RenderState {
    #[default]
    Idle,
    AttemptingPrimary,
    AttemptingGeneric,
    AttemptingText,
    Finished(RenderKind),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "cause", rename_all = "kebab-case")]
pub enum TransitionCause {
    EmptyInput,
    InputRepaired { repairs: usize },
    EngineAccepted,
    EngineRejected { reason: String },
    GraphExtracted { nodes: usize, edges: usize },
    ExtractionEmpty,
    TextReady,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub from: RenderState,
    pub to: RenderState,
    pub cause: TransitionCause,
}

/// Outcome of one finished render.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rendered {
    pub result: RenderResult,
    /// Whether the input needed no repairs.
    pub valid: bool,
    pub repairs: Vec<RepairEvent>,
    pub transitions: Vec<Transition>,
}

impl Rendered {
    pub fn kind(&self) -> RenderKind {
        self.result.kind()
    }
}

/// Drives the fallback tiers for one diagram.
///
/// Calling [`render`](Self::render) again while an earlier call is still waiting on the engine
/// supersedes it: the earlier call finishes its engine request, discards the answer and
/// returns `None`. Only the latest call updates [`current`](Self::current) and
/// [`state`](Self::state).
///
/// With an engine timeout configured (the default), `render` must run inside a tokio
/// runtime with the time driver enabled. Set `engine_timeout_ms` to `None` to drive it from
/// any executor.
pub struct Orchestrator<E> {
    engine: E,
    layout: LayoutConfig,
    fallback: FallbackConfig,
    instance: u64,
    generation: Cell<u64>,
    state: Cell<RenderState>,
    current: RefCell<Option<Rendered>>,
}

/// Transitions recorded by one render call.
struct Attempt {
    generation: u64,
    state: RenderState,
    transitions: Vec<Transition>,
}

impl<E: PrimaryEngine> Orchestrator<E> {
    pub fn new(engine: E) -> Self {
        Self::with_config(engine, &Config::default())
    }

    pub fn with_config(engine: E, config: &Config) -> Self {
        Self {
            engine,
            layout: config.layout.clone(),
            fallback: config.fallback.clone(),
            instance: NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed),
            generation: Cell::new(0),
            state: Cell::new(RenderState::Idle),
            current: RefCell::new(None),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn instance(&self) -> u64 {
        self.instance
    }

    pub fn state(&self) -> RenderState {
        self.state.get()
    }

    /// The result currently on display, if any render has finished.
    pub fn current(&self) -> Option<Rendered> {
        self.current.borrow().clone()
    }

    /// Renders `raw` from a fresh [`RenderState::Idle`], returning `None` when a newer call
    /// superseded this one.
    pub async fn render(&self, raw: &str) -> Option<Rendered> {
        let generation = self.generation.get() + 1;
        self.generation.set(generation);
        self.state.set(RenderState::Idle);
        let mut attempt = Attempt {
            generation,
            state: RenderState::Idle,
            transitions: Vec::new(),
        };

        if raw.trim().is_empty() {
            self.advance(
                &mut attempt,
                RenderState::Finished(RenderKind::TextFallback),
                TransitionCause::EmptyInput,
            );
            let result = RenderResult::TextFallback(self.fallback.empty_message.clone());
            return Some(self.finish(attempt, result, false, Vec::new()));
        }

        let sanitized = validate_and_sanitize(raw);
        let text = sanitized.text();
        self.advance(
            &mut attempt,
            RenderState::AttemptingPrimary,
            TransitionCause::InputRepaired {
                repairs: sanitized.repairs.len(),
            },
        );

        let unique_id = format!("diagram-{}-{}", self.instance, generation);
        let request = self.engine.render(&unique_id, &text);
        let outcome = match self.fallback.engine_timeout() {
            Some(limit) => match timeout(limit, request).await {
                Ok(outcome) => outcome,
                Err(_) => Err(EngineError::Timeout(limit)),
            },
            None => request.await,
        };

        if self.generation.get() != generation {
            debug!(
                instance = self.instance,
                generation,
                latest = self.generation.get();
                "discarding superseded engine response"
            );
            return None;
        }

        let result = match outcome {
            Ok(svg) => {
                self.advance(
                    &mut attempt,
                    RenderState::Finished(RenderKind::PrimaryEngine),
                    TransitionCause::EngineAccepted,
                );
                RenderResult::PrimaryEngine(svg)
            }
            Err(err) => {
                self.advance(
                    &mut attempt,
                    RenderState::AttemptingGeneric,
                    TransitionCause::EngineRejected {
                        reason: err.to_string(),
                    },
                );
                self.render_fallback(&mut attempt, raw, &text)
            }
        };

        Some(self.finish(attempt, result, sanitized.valid, sanitized.repairs))
    }

    fn render_fallback(&self, attempt: &mut Attempt, raw: &str, text: &str) -> RenderResult {
        let mut graph = extract_graph(text);
        if graph.is_empty() {
            graph = extract_graph(raw);
        }

        if !graph.is_empty() {
            self.advance(
                attempt,
                RenderState::Finished(RenderKind::GenericGraph),
                TransitionCause::GraphExtracted {
                    nodes: graph.node_count(),
                    edges: graph.edges().len(),
                },
            );
            return RenderResult::GenericGraph(compute_layout(graph, &self.layout));
        }

        self.advance(
            attempt,
            RenderState::AttemptingText,
            TransitionCause::ExtractionEmpty,
        );
        let shown = truncate_text(text, self.fallback.text_budget);
        self.advance(
            attempt,
            RenderState::Finished(RenderKind::TextFallback),
            TransitionCause::TextReady,
        );
        RenderResult::TextFallback(shown)
    }

    fn advance(&self, attempt: &mut Attempt, to: RenderState, cause: TransitionCause) {
        debug!(
            instance = self.instance,
            generation = attempt.generation,
            from:? = attempt.state,
            to:? = to,
            cause:? = cause;
            "render transition"
        );
        attempt.transitions.push(Transition {
            from: attempt.state,
            to,
            cause,
        });
        attempt.state = to;
        if self.generation.get() == attempt.generation {
            self.state.set(to);
        }
    }

    fn finish(
        &self,
        attempt: Attempt,
        result: RenderResult,
        valid: bool,
        repairs: Vec<RepairEvent>,
    ) -> Rendered {
        let rendered = Rendered {
            result,
            valid,
            repairs,
            transitions: attempt.transitions,
        };
        *self.current.borrow_mut() = Some(rendered.clone());
        rendered
    }
}

/// Cuts `text` to `budget` characters, marking the cut with `...`.
pub fn truncate_text(text: &str, budget: usize) -> String {
    match text.char_indices().nth(budget) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
