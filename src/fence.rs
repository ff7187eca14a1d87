//! Locating diagram sources inside chat messages and Markdown documents.

use crate::ir::DiagramType;

/// Returns the diagram sources carried by a chat message.
///
/// Fenced Mermaid blocks win. A message without any is taken as a bare diagram when its
/// first line is a `graph`/`flowchart` header; otherwise it carries no diagram.
pub fn extract_diagram_sources(message: &str) -> Vec<String> {
    let blocks = extract_mermaid_blocks(message);
    if !blocks.is_empty() {
        return blocks;
    }
    let trimmed = message.trim();
    let first_line = trimmed.lines().next().unwrap_or_default();
    match DiagramType::from_header(first_line) {
        Some(kind) if kind.is_flowchart() => vec![trimmed.to_string()],
        _ => Vec::new(),
    }
}

/// Collects the bodies of ```` ```mermaid ````, `~~~mermaid` and `:::mermaid` blocks.
///
/// A block left open at the end of the input still counts, since model output is often cut
/// off before the closing fence.
pub fn extract_mermaid_blocks(markdown: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut fence: Option<&'static str> = None;

    for line in markdown.lines() {
        let trimmed = line.trim();
        match fence {
            None => fence = detect_mermaid_fence(trimmed),
            Some(open) if is_fence_end(trimmed, open) => {
                blocks.push(current.join("\n"));
                current.clear();
                fence = None;
            }
            Some(_) => current.push(line),
        }
    }

    if fence.is_some() && current.iter().any(|line| !line.trim().is_empty()) {
        blocks.push(current.join("\n"));
    }

    blocks
}

fn detect_mermaid_fence(line: &str) -> Option<&'static str> {
    for (fence, marker) in [("```", '`'), ("~~~", '~'), (":::", ':')] {
        if line.starts_with(fence) && line.trim_start_matches(marker).trim().starts_with("mermaid") {
            return Some(fence);
        }
    }
    None
}

fn is_fence_end(line: &str, fence: &str) -> bool {
    line.strip_prefix(fence)
        .is_some_and(|rest| rest.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_mermaid_blocks() {
        let input = r#"
text
``` mermaid
flowchart LR
  A --> B
```
more
~~~mermaid
flowchart TD
  X --> Y
~~~
::: mermaid
sequenceDiagram
  A->>B: hi
:::
```rust
fn main() {}
```
"#;
        let blocks = extract_mermaid_blocks(input);
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0], "flowchart LR\n  A --> B");
        assert!(blocks[1].contains("X --> Y"));
        assert!(blocks[2].contains("sequenceDiagram"));
    }

    #[test]
    fn keeps_unterminated_block() {
        let blocks = extract_mermaid_blocks("Here you go:\n```mermaid\ngraph TD\nA[Start] --> B[");
        assert_eq!(blocks, vec!["graph TD\nA[Start] --> B["]);
        assert!(extract_mermaid_blocks("```mermaid\n\n").is_empty());
    }

    #[test]
    fn bare_flowchart_message_is_a_diagram() {
        let sources = extract_diagram_sources("  graph TD\nA[Idea] --> B[Plan]\n");
        assert_eq!(sources, vec!["graph TD\nA[Idea] --> B[Plan]"]);
        let sources = extract_diagram_sources("flowchart LR\nA --> B");
        assert_eq!(sources.len(), 1);
    }

    #[test]
    fn plain_messages_carry_no_diagram() {
        assert!(extract_diagram_sources("Great question! Graphs are everywhere.").is_empty());
        assert!(extract_diagram_sources("sequenceDiagram\nA->>B: hi").is_empty());
        assert!(extract_diagram_sources("").is_empty());
    }

    #[test]
    fn fenced_blocks_take_precedence() {
        let sources = extract_diagram_sources("graph TD\n```mermaid\nflowchart LR\nA --> B\n```");
        assert_eq!(sources, vec!["flowchart LR\nA --> B"]);
    }
}
