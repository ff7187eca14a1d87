use crate::ir::{DEFAULT_HEADER, DiagramType};
use crate::label::{has_markdown, has_non_ascii, sanitize_label};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

/// Directed edge token of the flowchart subset.
pub const ARROW: &str = "-->";

const PLACEHOLDER_PREFIX: &str = "MissingNode";
const MISSING_SOURCE_LABEL: &str = "Start";
const MISSING_TARGET_LABEL: &str = "Continue";

/// Mermaid entity code for `]`, used for stray closing brackets inside other label text.
const CLOSE_BRACKET_ENTITY: &str = "#93;";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RepairKind {
    MissingHeader,
    UnclosedBracket,
    ConcatenatedNodes,
    MalformedArrow,
    MarkdownInLabel,
    NonAsciiInLabel,
    MismatchedBracketCount,
}

impl RepairKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingHeader => "missing-header",
            Self::UnclosedBracket => "unclosed-bracket",
            Self::ConcatenatedNodes => "concatenated-nodes",
            Self::MalformedArrow => "malformed-arrow",
            Self::MarkdownInLabel => "markdown-in-label",
            Self::NonAsciiInLabel => "non-ascii-in-label",
            Self::MismatchedBracketCount => "mismatched-bracket-count",
        }
    }
}

impl fmt::Display for RepairKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One repair applied to the input. `line_number` is 1-based and counts blank lines of the
/// raw input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepairEvent {
    pub line_number: usize,
    pub kind: RepairKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SanitizedDiagram {
    pub diagram_type: DiagramType,
    pub lines: Vec<String>,
    pub valid: bool,
    pub repairs: Vec<RepairEvent>,
}

impl SanitizedDiagram {
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn has_repair(&self, kind: RepairKind) -> bool {
        self.repairs.iter().any(|event| event.kind == kind)
    }
}

struct LinePattern {
    regex: Regex,
    kind: RepairKind,
    message: &'static str,
}

// Order matters only for the order in which events are reported.
static LINE_PATTERNS: Lazy<Vec<LinePattern>> = Lazy::new(|| {
    let pattern = |re: &str, kind: RepairKind, message: &'static str| LinePattern {
        regex: Regex::new(re).unwrap(),
        kind,
        message,
    };
    vec![
        pattern(
            r"\][ \t]*[A-Za-z0-9_]+[ \t]*\[",
            RepairKind::ConcatenatedNodes,
            "node declaration runs into another node declaration",
        ),
        pattern(
            r"\][ \t]*[A-Za-z0-9_]+[ \t]*-->",
            RepairKind::ConcatenatedNodes,
            "node declaration runs into an edge",
        ),
        pattern(
            r"\][ \t]*[A-Za-z0-9_]+[ \t]*$",
            RepairKind::ConcatenatedNodes,
            "node declaration runs into a bare node",
        ),
        pattern(
            r"\]-->",
            RepairKind::MalformedArrow,
            "arrow is glued to a closing bracket",
        ),
        pattern(
            r"-->[ \t]*\|[^|]*\|[A-Za-z0-9_]",
            RepairKind::MalformedArrow,
            "edge label is glued to its target",
        ),
        pattern(
            r"^-->|-->(?:[ \t]*\|[^|]*\|)?$|-->[ \t]*(?:\|[^|]*\|)?[ \t]*-->",
            RepairKind::MalformedArrow,
            "arrow is missing a source or target",
        ),
    ]
});

static ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]+").unwrap());
static CLOSED_NODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z0-9_]+)\[([^\]]*)\]").unwrap());
static OPEN_NODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([A-Za-z0-9_]+)\[(.*)$").unwrap());
static CLASS_SUFFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^:::[A-Za-z0-9_-]+$").unwrap());
static EDGE_LABEL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\|([^|]*)\|\s*(.*)$").unwrap());

/// Repairs model-generated diagram text into something the primary engine is more likely
/// to accept.
///
/// This is a heuristic pass, not a grammar: it favours the most likely intended structure
/// and never fails. The returned diagram always has balanced square brackets.
pub fn validate_and_sanitize(raw: &str) -> SanitizedDiagram {
    let mut repairer = Repairer::default();
    let mut body = raw
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty());

    let diagram_type = match body.next() {
        Some((line_number, first)) => match DiagramType::from_header(first) {
            Some(diagram_type) => {
                repairer.push(line_number, first.to_string());
                diagram_type
            }
            None => {
                repairer.record(
                    line_number,
                    RepairKind::MissingHeader,
                    format!("missing or unrecognized diagram type, assuming '{DEFAULT_HEADER}'"),
                );
                repairer.push(line_number, DEFAULT_HEADER.to_string());
                repairer.repair_flowchart_line(line_number, first);
                DiagramType::default()
            }
        },
        None => {
            repairer.record(1, RepairKind::MissingHeader, "diagram is empty".to_string());
            repairer.push(1, DEFAULT_HEADER.to_string());
            DiagramType::default()
        }
    };

    for (line_number, line) in body {
        if diagram_type.is_flowchart() {
            repairer.repair_flowchart_line(line_number, line);
        } else {
            repairer.push(line_number, line.to_string());
        }
    }

    repairer.finish(diagram_type)
}

#[derive(Default)]
struct Repairer {
    lines: Vec<(usize, String)>,
    repairs: Vec<RepairEvent>,
    placeholders: usize,
}

impl Repairer {
    fn record(&mut self, line_number: usize, kind: RepairKind, message: String) {
        debug!(line_number = line_number, kind = kind.as_str(); "diagram repair: {message}");
        self.repairs.push(RepairEvent {
            line_number,
            kind,
            message,
        });
    }

    fn push(&mut self, line_number: usize, line: String) {
        self.lines.push((line_number, line));
    }

    fn placeholder(&mut self) -> String {
        self.placeholders += 1;
        format!("{PLACEHOLDER_PREFIX}{}", self.placeholders)
    }

    /// Allocates a placeholder and queues its labeled declaration.
    fn declare_placeholder(
        &mut self,
        declarations: &mut Vec<(String, Option<String>)>,
        label: &str,
    ) -> String {
        let id = self.placeholder();
        declarations.push((id.clone(), Some(label.to_string())));
        id
    }

    fn repair_flowchart_line(&mut self, line_number: usize, line: &str) {
        if line.starts_with("%%") {
            self.push(line_number, line.to_string());
            return;
        }

        let mut matched: Vec<RepairKind> = Vec::new();
        for pattern in LINE_PATTERNS.iter() {
            if !pattern.regex.is_match(line) {
                continue;
            }
            if !matched.contains(&pattern.kind) {
                matched.push(pattern.kind);
                self.record(line_number, pattern.kind, pattern.message.to_string());
            }
        }
        if !matched.is_empty() {
            self.split_statements(line_number, line);
            return;
        }

        if line.contains(ARROW) {
            self.repair_edge_line(line_number, line);
        } else {
            let node = self.repair_node(line_number, line);
            self.push(line_number, node);
        }
    }

    fn repair_edge_line(&mut self, line_number: usize, line: &str) {
        let sides: Vec<&str> = line.split(ARROW).map(str::trim).collect();
        if sides.len() != 2 {
            // Chains become one edge per line.
            self.split_statements(line_number, line);
            return;
        }

        let (edge_label, target_side) = split_edge_label(sides[1]);
        let source = self.repair_side(line_number, sides[0], "source");
        let target = self.repair_side(line_number, target_side, "target");
        let edge_label = edge_label.and_then(|raw| self.clean_edge_label(line_number, raw));
        self.push(line_number, format_edge(&source, &target, edge_label.as_deref()));
    }

    fn repair_side(&mut self, line_number: usize, side: &str, role: &str) -> String {
        if side.is_empty() {
            let placeholder = self.placeholder();
            self.record(
                line_number,
                RepairKind::MalformedArrow,
                format!("arrow has no {role}, using '{placeholder}'"),
            );
            let label = if role == "source" {
                MISSING_SOURCE_LABEL
            } else {
                MISSING_TARGET_LABEL
            };
            return format!("{placeholder}[{label}]");
        }
        self.repair_node(line_number, side)
    }

    /// Rewrites `id[label]` with a sanitized label. A `:::class` suffix is kept; any other
    /// text after the closing bracket is dropped and reported. Anything that is not a node
    /// declaration is returned untouched.
    fn repair_node(&mut self, line_number: usize, text: &str) -> String {
        if let Some(caps) = CLOSED_NODE_RE.captures(text) {
            let id = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let raw = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
            let tail = caps.get(0).map_or("", |m| &text[m.end()..]).trim();
            let label = self.clean_node_label(line_number, id, raw);
            if CLASS_SUFFIX_RE.is_match(tail) {
                return format!("{id}[{label}]{tail}");
            }
            if !tail.is_empty() {
                self.record(
                    line_number,
                    RepairKind::ConcatenatedNodes,
                    format!("dropped '{tail}' after node '{id}'"),
                );
            }
            return format!("{id}[{label}]");
        }
        if let Some(caps) = OPEN_NODE_RE.captures(text) {
            let id = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let raw = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
            self.record(
                line_number,
                RepairKind::UnclosedBracket,
                format!("closed the label bracket of node '{id}'"),
            );
            let label = self.clean_node_label(line_number, id, raw);
            return format!("{id}[{label}]");
        }
        text.to_string()
    }

    fn clean_node_label(&mut self, line_number: usize, id: &str, raw: &str) -> String {
        self.note_label_issues(line_number, &format!("node '{id}'"), raw);
        let label = sanitize_label(raw);
        if label.is_empty() {
            id.to_string()
        } else {
            label
        }
    }

    fn clean_edge_label(&mut self, line_number: usize, raw: &str) -> Option<String> {
        self.note_label_issues(line_number, "edge label", raw);
        let label = sanitize_label(raw);
        (!label.is_empty()).then_some(label)
    }

    fn note_label_issues(&mut self, line_number: usize, owner: &str, raw: &str) {
        if has_markdown(raw) {
            self.record(
                line_number,
                RepairKind::MarkdownInLabel,
                format!("removed markdown formatting from {owner}"),
            );
        }
        if has_non_ascii(raw) {
            self.record(
                line_number,
                RepairKind::NonAsciiInLabel,
                format!("removed non-ASCII characters from {owner}"),
            );
        }
    }

    /// Re-emits a line one statement per line: labeled nodes as declarations first, then
    /// every edge between bare ids. A bare id with no edge is declared with itself as label.
    /// Arrows missing an endpoint get a labeled placeholder node.
    fn split_statements(&mut self, line_number: usize, line: &str) {
        let mut declarations: Vec<(String, Option<String>)> = Vec::new();
        let mut edges: Vec<String> = Vec::new();
        let mut connected: HashSet<String> = HashSet::new();
        let mut previous: Option<String> = None;
        let mut pending: Option<Option<String>> = None;

        for token in tokenize(line) {
            match token {
                Token::Node { id, label, closed } => {
                    let label = match label {
                        Some(raw) => {
                            if !closed {
                                self.record(
                                    line_number,
                                    RepairKind::UnclosedBracket,
                                    format!("closed the label bracket of node '{id}'"),
                                );
                            }
                            Some(self.clean_node_label(line_number, id, raw))
                        }
                        None => None,
                    };
                    declarations.push((id.to_string(), label));
                    if let Some(edge_label) = pending.take() {
                        let source = match previous.take() {
                            Some(source) => source,
                            None => {
                                self.declare_placeholder(&mut declarations, MISSING_SOURCE_LABEL)
                            }
                        };
                        edges.push(format_edge(&source, id, edge_label.as_deref()));
                        connected.insert(source);
                        connected.insert(id.to_string());
                    }
                    previous = Some(id.to_string());
                }
                Token::Arrow { label } => {
                    if let Some(edge_label) = pending.take() {
                        let source = match previous.take() {
                            Some(source) => source,
                            None => {
                                self.declare_placeholder(&mut declarations, MISSING_SOURCE_LABEL)
                            }
                        };
                        let target =
                            self.declare_placeholder(&mut declarations, MISSING_TARGET_LABEL);
                        edges.push(format_edge(&source, &target, edge_label.as_deref()));
                        connected.insert(source);
                        previous = Some(target);
                    }
                    if previous.is_none() {
                        let source =
                            self.declare_placeholder(&mut declarations, MISSING_SOURCE_LABEL);
                        previous = Some(source);
                    }
                    pending = Some(label.and_then(|raw| self.clean_edge_label(line_number, raw)));
                }
            }
        }
        if let Some(edge_label) = pending.take() {
            let source = match previous.take() {
                Some(source) => source,
                None => self.declare_placeholder(&mut declarations, MISSING_SOURCE_LABEL),
            };
            let target = self.declare_placeholder(&mut declarations, MISSING_TARGET_LABEL);
            edges.push(format_edge(&source, &target, edge_label.as_deref()));
        }

        for (id, label) in declarations {
            match label {
                Some(label) => self.push(line_number, format!("{id}[{label}]")),
                None if !connected.contains(&id) => {
                    self.push(line_number, format!("{id}[{id}]"))
                }
                None => {}
            }
        }
        for edge in edges {
            self.push(line_number, edge);
        }
    }

    fn finish(mut self, diagram_type: DiagramType) -> SanitizedDiagram {
        let mut lines = Vec::with_capacity(self.lines.len());
        for (line_number, line) in std::mem::take(&mut self.lines) {
            match balance_brackets(&line) {
                Some(balanced) => {
                    let open = line.matches('[').count();
                    let close = line.matches(']').count();
                    self.record(
                        line_number,
                        RepairKind::MismatchedBracketCount,
                        format!("mismatched brackets: {open} opening vs {close} closing"),
                    );
                    lines.push(balanced);
                }
                None => lines.push(line),
            }
        }
        SanitizedDiagram {
            diagram_type,
            lines,
            valid: self.repairs.is_empty(),
            repairs: self.repairs,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Token<'a> {
    Node {
        id: &'a str,
        label: Option<&'a str>,
        closed: bool,
    },
    Arrow {
        label: Option<&'a str>,
    },
}

/// Splits a flowchart line into node references and arrows. Characters that belong to
/// neither are skipped.
fn tokenize(line: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut rest = line;
    while let Some(ch) = rest.chars().next() {
        if let Some(after) = rest.strip_prefix(ARROW) {
            if let Some(inner) = after.trim_start().strip_prefix('|') {
                if let Some(end) = inner.find('|') {
                    tokens.push(Token::Arrow {
                        label: Some(&inner[..end]),
                    });
                    rest = &inner[end + 1..];
                    continue;
                }
            }
            tokens.push(Token::Arrow { label: None });
            rest = after;
            continue;
        }

        if let Some(found) = ID_RE.find(rest) {
            let id = found.as_str();
            let after = &rest[found.end()..];
            match shape_closer(after) {
                Some(closer) => {
                    let body = &after[1..];
                    let close_at = body.find(closer);
                    let arrow_at = body.find(ARROW);
                    match (close_at, arrow_at) {
                        (Some(close), arrow) if arrow.is_none_or(|arrow| close < arrow) => {
                            tokens.push(Token::Node {
                                id,
                                label: Some(&body[..close]),
                                closed: true,
                            });
                            rest = &body[close + closer.len_utf8()..];
                        }
                        (_, Some(arrow)) => {
                            tokens.push(Token::Node {
                                id,
                                label: Some(&body[..arrow]),
                                closed: false,
                            });
                            rest = &body[arrow..];
                        }
                        (_, None) => {
                            tokens.push(Token::Node {
                                id,
                                label: Some(body),
                                closed: false,
                            });
                            rest = "";
                        }
                    }
                }
                None => {
                    tokens.push(Token::Node {
                        id,
                        label: None,
                        closed: true,
                    });
                    rest = after;
                }
            }
            continue;
        }

        rest = &rest[ch.len_utf8()..];
    }
    tokens
}

fn shape_closer(text: &str) -> Option<char> {
    match text.chars().next()? {
        '[' => Some(']'),
        '(' => Some(')'),
        '{' => Some('}'),
        _ => None,
    }
}

fn split_edge_label(side: &str) -> (Option<&str>, &str) {
    match EDGE_LABEL_RE.captures(side) {
        Some(caps) => (
            caps.get(1).map(|m| m.as_str()),
            caps.get(2).map(|m| m.as_str().trim()).unwrap_or_default(),
        ),
        None => (None, side),
    }
}

fn format_edge(source: &str, target: &str, label: Option<&str>) -> String {
    match label {
        Some(label) => format!("{source} {ARROW}|{label}| {target}"),
        None => format!("{source} {ARROW} {target}"),
    }
}

/// Appends the missing closers and resolves closing brackets that have no opener: inside
/// round, curly or pipe label text they are encoded, elsewhere they are dropped.
/// Returns `None` when the line is already balanced.
fn balance_brackets(line: &str) -> Option<String> {
    let mut depth = 0usize;
    let mut label_depth = 0usize;
    let mut in_pipe = false;
    let mut changed = false;
    let mut out = String::with_capacity(line.len() + 2);
    for ch in line.chars() {
        match ch {
            '[' => {
                depth += 1;
                out.push(ch);
            }
            ']' if depth == 0 => {
                if label_depth > 0 || in_pipe {
                    out.push_str(CLOSE_BRACKET_ENTITY);
                }
                changed = true;
            }
            ']' => {
                depth -= 1;
                out.push(ch);
            }
            '(' | '{' => {
                label_depth += 1;
                out.push(ch);
            }
            ')' | '}' => {
                label_depth = label_depth.saturating_sub(1);
                out.push(ch);
            }
            '|' => {
                in_pipe = !in_pipe;
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
    if depth > 0 {
        out.push_str(&"]".repeat(depth));
        changed = true;
    }
    changed.then_some(out)
}
